// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Issues [RFC 6962](https://datatracker.ietf.org/doc/html/rfc6962) Signed
//! Certificate Timestamps.
//!
//! A submitted certificate or precertificate is turned into a
//! [`MerkleTreeLeaf`] by [`build_leaf`], and the leaf's
//! [`TimestampedEntry`] is signed by a [`LogSigner`] in [`issue_sct`],
//! producing a [`SignedCertificateTimestamp`]. The leaf goes on to the log's
//! tree storage and the SCT back to the submitter.
//!
//! # Examples
//!
//! ```
//! use sct_issuer::{
//!     issue_sct_for_certificate, EcdsaLogSigner, FixedClock, LogEntryType, LogSigner, RawCertificate,
//! };
//! use p256::ecdsa::SigningKey;
//!
//! let signer = EcdsaLogSigner::new(SigningKey::from_slice(&[1; 32]).unwrap()).unwrap();
//! let cert = RawCertificate {
//!     der: Some(b"certificate".to_vec()),
//!     ..Default::default()
//! };
//!
//! let (leaf, sct) =
//!     issue_sct_for_certificate(&cert, false, &signer, &FixedClock(1_504_786_523_000)).unwrap();
//!
//! assert_eq!(leaf.timestamped_entry.entry_type(), LogEntryType::X509Entry);
//! assert_eq!(sct.timestamp, leaf.timestamped_entry.timestamp);
//! assert_eq!(sct.log_id, signer.log_id());
//! ```

pub mod cert;
pub mod clock;
pub mod issuer;
pub mod leaf;
pub mod metrics;
pub mod rfc6962;
pub mod signer;

pub use cert::ParsedCertificate;
pub use clock::{Clock, FixedClock, SystemClock};
pub use issuer::{issue_sct, issue_sct_for_certificate, SctIssuer};
pub use leaf::{build_leaf, CertificateSource, RawCertificate, Submission};
pub use metrics::Metrics;
pub use rfc6962::*;
pub use signer::{
    load_signer, log_id_from_spki, EcdsaLogSigner, Ed25519LogSigner, LogSigner, RemoteLogSigner,
    RemoteSigningBackend,
};

use log::Level;
use std::str::FromStr;

/// Unix timestamp, measured since the epoch (January 1, 1970, 00:00),
/// ignoring leap seconds, in milliseconds.
pub type UnixTimestamp = u64;

/// SHA-256 hash of the log's DER-encoded `SubjectPublicKeyInfo`.
pub type LogId = [u8; 32];

/// An error that prevents an SCT from being issued. No leaf or SCT is
/// returned alongside any of these.
#[derive(thiserror::Error, Debug)]
pub enum IssuerError {
    #[error("malformed certificate: {0}")]
    MalformedCertificate(String),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
    #[error(transparent)]
    Signing(#[from] SigningError),
}

impl IssuerError {
    /// Returns the stage of issuance that failed.
    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            IssuerError::MalformedCertificate(_) => "build_leaf",
            IssuerError::Serialization(_) => "serialize",
            IssuerError::Signing(_) => "sign",
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SerializationError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("{field} too long: {len} bytes")]
    FieldTooLong { field: &'static str, len: usize },
    #[error(transparent)]
    IO(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum SigningError {
    #[error(transparent)]
    Signature(#[from] signature::Error),
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
    #[error("signer unavailable: {0}")]
    Unavailable(String),
    #[error("signer returned an invalid signature: {0}")]
    InvalidSignature(String),
}

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("unknown version {0}")]
    UnknownVersion(u8),
    #[error("unknown leaf type {0}")]
    UnknownLeafType(u8),
    #[error("unknown entry type {0}")]
    UnknownEntryType(u16),
    #[error("unknown hash algorithm {0}")]
    UnknownHashAlgorithm(u8),
    #[error("unknown signature algorithm {0}")]
    UnknownSignatureAlgorithm(u8),
    #[error("invalid log ID length {0}")]
    InvalidLogId(usize),
    #[error("empty list")]
    EmptyList,
    #[error("trailing data")]
    TrailingData,
    #[error(transparent)]
    IO(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("unknown log: {0}")]
    UnknownLog(String),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Parses the configured logging level (default `Info`) and applies it as
/// the global maximum level. Installing a logger is left to the binary.
pub fn init_logging(level: Option<&str>) -> Level {
    let level = level
        .and_then(|l| Level::from_str(l).ok())
        .unwrap_or(Level::Info);
    log::set_max_level(level.to_level_filter());
    level
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging() {
        assert_eq!(init_logging(Some("debug")), Level::Debug);
        assert_eq!(init_logging(Some("nonsense")), Level::Info);
        assert_eq!(init_logging(None), Level::Info);
    }

    #[test]
    fn test_error_stage() {
        assert_eq!(
            IssuerError::MalformedCertificate("x".into()).stage(),
            "build_leaf"
        );
        assert_eq!(
            IssuerError::from(SerializationError::EmptyField("certificate")).stage(),
            "serialize"
        );
        assert_eq!(
            IssuerError::from(SigningError::Unavailable("down".into())).stage(),
            "sign"
        );
    }
}
