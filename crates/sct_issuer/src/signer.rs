// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Signing capabilities for SCTs.
//!
//! A [`LogSigner`] signs arbitrary bytes and reports the [`LogId`] of its
//! key. Key custody stays behind the trait: in-process keys are never
//! exposed, and remote keys (HSM, KMS, a signing service) are reached
//! through a [`RemoteSigningBackend`].

use crate::{ConfigError, DigitallySigned, HashAlgorithm, LogId, SignatureAlgorithm, SigningError};
use config::{AppConfig, SigningKeyConfig};
use ed25519_dalek::SigningKey as Ed25519SigningKey;
use log::debug;
use p256::{
    ecdsa::{Signature as EcdsaSignature, SigningKey as EcdsaSigningKey, VerifyingKey},
    pkcs8::{DecodePrivateKey, EncodePublicKey},
};
use sha2::{Digest, Sha256};
use signature::Signer;
use std::{fmt, sync::Arc};

/// A key that can sign SCTs on behalf of a log.
pub trait LogSigner: Send + Sync {
    /// Signs `msg`, returning the signature with its algorithm identifiers.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unusable or signing fails. Callers
    /// do not retry.
    fn sign(&self, msg: &[u8]) -> Result<DigitallySigned, SigningError>;

    /// The log's identity, the SHA-256 hash of its DER-encoded `SubjectPublicKeyInfo`.
    fn log_id(&self) -> LogId;
}

impl<T: LogSigner + ?Sized> LogSigner for &T {
    fn sign(&self, msg: &[u8]) -> Result<DigitallySigned, SigningError> {
        (**self).sign(msg)
    }
    fn log_id(&self) -> LogId {
        (**self).log_id()
    }
}

impl<T: LogSigner + ?Sized> LogSigner for Box<T> {
    fn sign(&self, msg: &[u8]) -> Result<DigitallySigned, SigningError> {
        (**self).sign(msg)
    }
    fn log_id(&self) -> LogId {
        (**self).log_id()
    }
}

impl<T: LogSigner + ?Sized> LogSigner for Arc<T> {
    fn sign(&self, msg: &[u8]) -> Result<DigitallySigned, SigningError> {
        (**self).sign(msg)
    }
    fn log_id(&self) -> LogId {
        (**self).log_id()
    }
}

/// Calculates a log ID from a DER-encoded `SubjectPublicKeyInfo`.
#[must_use]
pub fn log_id_from_spki(spki_der: &[u8]) -> LogId {
    Sha256::digest(spki_der).into()
}

/// Signs with an in-process ECDSA P-256 key.
///
/// Signatures are deterministic (RFC 6979), so re-signing the same entry
/// yields a byte-identical SCT.
pub struct EcdsaLogSigner {
    key: EcdsaSigningKey,
    log_id: LogId,
}

impl EcdsaLogSigner {
    /// Returns a new signer for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the public key cannot be DER-encoded.
    pub fn new(key: EcdsaSigningKey) -> Result<Self, SigningError> {
        let pkix = key
            .verifying_key()
            .to_public_key_der()
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        Ok(Self {
            log_id: log_id_from_spki(pkix.as_bytes()),
            key,
        })
    }

    /// Loads a PKCS#8 PEM-encoded private key.
    ///
    /// # Errors
    ///
    /// Returns an error if the PEM is not a P-256 private key.
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, SigningError> {
        let key = EcdsaSigningKey::from_pkcs8_pem(pem)
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        Self::new(key)
    }

    #[must_use]
    pub fn verifying_key(&self) -> &VerifyingKey {
        self.key.verifying_key()
    }
}

impl LogSigner for EcdsaLogSigner {
    fn sign(&self, msg: &[u8]) -> Result<DigitallySigned, SigningError> {
        let sig: EcdsaSignature = self.key.try_sign(msg)?;
        Ok(DigitallySigned {
            hash_algorithm: HashAlgorithm::Sha256,
            signature_algorithm: SignatureAlgorithm::Ecdsa,
            signature: sig.to_der().as_bytes().to_vec(),
        })
    }

    fn log_id(&self) -> LogId {
        self.log_id
    }
}

impl fmt::Debug for EcdsaLogSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcdsaLogSigner")
            .field("log_id", &hex::encode(self.log_id))
            .finish_non_exhaustive()
    }
}

/// Signs with an in-process Ed25519 key, reported as
/// (`intrinsic`, `ed25519`) per RFC 8422.
pub struct Ed25519LogSigner {
    key: Ed25519SigningKey,
    log_id: LogId,
}

impl Ed25519LogSigner {
    /// Returns a new signer for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the public key cannot be DER-encoded.
    pub fn new(key: Ed25519SigningKey) -> Result<Self, SigningError> {
        let pkix = key
            .verifying_key()
            .to_public_key_der()
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        Ok(Self {
            log_id: log_id_from_spki(pkix.as_bytes()),
            key,
        })
    }

    /// Loads a PKCS#8 PEM-encoded private key.
    ///
    /// # Errors
    ///
    /// Returns an error if the PEM is not an Ed25519 private key.
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, SigningError> {
        let key = Ed25519SigningKey::from_pkcs8_pem(pem)
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        Self::new(key)
    }

    #[must_use]
    pub fn verifying_key(&self) -> ed25519_dalek::VerifyingKey {
        self.key.verifying_key()
    }
}

impl LogSigner for Ed25519LogSigner {
    fn sign(&self, msg: &[u8]) -> Result<DigitallySigned, SigningError> {
        let sig = self.key.try_sign(msg)?;
        Ok(DigitallySigned {
            hash_algorithm: HashAlgorithm::Intrinsic,
            signature_algorithm: SignatureAlgorithm::Ed25519,
            signature: sig.to_bytes().to_vec(),
        })
    }

    fn log_id(&self) -> LogId {
        self.log_id
    }
}

impl fmt::Debug for Ed25519LogSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519LogSigner")
            .field("log_id", &hex::encode(self.log_id))
            .finish_non_exhaustive()
    }
}

/// A key held outside this process.
///
/// Timeouts, retries and authentication belong to the backend; a failed
/// call is reported once and the submission is rejected.
pub trait RemoteSigningBackend: Send + Sync {
    /// Returns the DER-encoded `SubjectPublicKeyInfo` of the remote key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    fn public_key_info(&self) -> Result<Vec<u8>, SigningError>;

    /// Signs `msg` with the remote key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached or refuses to sign.
    fn sign(&self, msg: &[u8]) -> Result<DigitallySigned, SigningError>;
}

/// A [`LogSigner`] backed by a [`RemoteSigningBackend`]. The log ID is
/// fetched once, when the signer is created.
pub struct RemoteLogSigner<B> {
    backend: B,
    log_id: LogId,
}

impl<B: RemoteSigningBackend> RemoteLogSigner<B> {
    /// Returns a new signer, fetching the backend's public key.
    ///
    /// # Errors
    ///
    /// Returns an error if the public key cannot be fetched or is empty.
    pub fn new(backend: B) -> Result<Self, SigningError> {
        let spki = backend.public_key_info()?;
        if spki.is_empty() {
            return Err(SigningError::InvalidKey(
                "remote backend returned an empty public key".to_string(),
            ));
        }
        Ok(Self {
            log_id: log_id_from_spki(&spki),
            backend,
        })
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: RemoteSigningBackend> LogSigner for RemoteLogSigner<B> {
    fn sign(&self, msg: &[u8]) -> Result<DigitallySigned, SigningError> {
        self.backend.sign(msg)
    }

    fn log_id(&self) -> LogId {
        self.log_id
    }
}

impl<B> fmt::Debug for RemoteLogSigner<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteLogSigner")
            .field("log_id", &hex::encode(self.log_id))
            .finish_non_exhaustive()
    }
}

/// Loads the in-process signer configured for the log `name`.
///
/// # Errors
///
/// Returns an error if the log is not configured or its key is invalid.
pub fn load_signer(config: &AppConfig, name: &str) -> Result<Box<dyn LogSigner>, ConfigError> {
    let params = config
        .logs
        .get(name)
        .ok_or_else(|| ConfigError::UnknownLog(name.to_string()))?;
    let signer: Box<dyn LogSigner> = match &params.signing_key {
        SigningKeyConfig::EcdsaP256 { pkcs8_pem } => {
            Box::new(EcdsaLogSigner::from_pkcs8_pem(pkcs8_pem)?)
        }
        SigningKeyConfig::Ed25519 { pkcs8_pem } => {
            Box::new(Ed25519LogSigner::from_pkcs8_pem(pkcs8_pem)?)
        }
    };
    debug!(
        "{name}: Loaded signing key; log_id={}",
        hex::encode(signer.log_id())
    );
    Ok(signer)
}
