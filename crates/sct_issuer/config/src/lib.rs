// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

// SCT issuer configuration, in a separate crate so deployment tooling can
// validate config files without pulling in the signing stack.
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Deserialize, Debug)]
pub struct AppConfig {
    pub logging_level: Option<String>,
    pub logs: HashMap<String, LogParams>,
}

impl AppConfig {
    /// Parses a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not match the config schema.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[derive(Deserialize, Debug)]
pub struct LogParams {
    pub description: Option<String>,
    pub signing_key: SigningKeyConfig,
}

/// Key material for an in-process signer.
#[derive(Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SigningKeyConfig {
    EcdsaP256 { pkcs8_pem: String },
    Ed25519 { pkcs8_pem: String },
}

// Never print key material.
impl fmt::Debug for SigningKeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningKeyConfig::EcdsaP256 { .. } => f.write_str("EcdsaP256 { .. }"),
            SigningKeyConfig::Ed25519 { .. } => f.write_str("Ed25519 { .. }"),
        }
    }
}
