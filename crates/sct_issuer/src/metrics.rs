// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Metrics for SCT issuance.
use prometheus::{
    self, register_counter_vec_with_registry, register_histogram_with_registry, CounterVec,
    Histogram, Registry, TextEncoder,
};

#[derive(Clone, Debug)]
pub struct Metrics {
    registry: Registry,

    pub(crate) issued: CounterVec,
    pub(crate) errors: CounterVec,
    pub(crate) sign_duration: Histogram,
}

impl Metrics {
    /// Registers the issuance metrics with `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics are already registered.
    pub fn new(registry: Registry) -> prometheus::Result<Self> {
        let r = &registry;
        let issued = register_counter_vec_with_registry!(
            "scts_issued_total",
            "SCTs issued, by entry type.",
            &["entry_type"],
            r
        )?;
        let errors = register_counter_vec_with_registry!(
            "sct_errors_total",
            "Failed issuance attempts, by failing stage.",
            &["stage"],
            r
        )?;
        let sign_duration = register_histogram_with_registry!(
            "sct_signing_duration_seconds",
            "Duration of signing operations, successful or not.",
            vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0],
            r
        )?;
        Ok(Self {
            registry,
            issued,
            errors,
            sign_duration,
        })
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Renders all registered metrics in the Prometheus text format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded.
    pub fn encode(&self) -> prometheus::Result<String> {
        let mut buffer = String::new();
        TextEncoder::new().encode_utf8(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}
