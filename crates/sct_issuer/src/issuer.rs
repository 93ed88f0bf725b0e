// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Signs leaves into SCTs.

use crate::{
    build_leaf, sct_signature_input, CertificateSource, Clock, IssuerError, LogId, LogSigner,
    MerkleTreeLeaf, Metrics, SignedCertificateTimestamp, SigningError, Submission, SystemClock,
};
use log::{debug, warn};

/// Issues an SCT for `leaf`, signing its `TimestampedEntry` with `signer`.
///
/// The signer is invoked exactly once and failures are not retried. The SCT
/// takes its version, timestamp and extensions from the leaf, since the
/// signature covers all three.
///
/// # Errors
///
/// Returns [`IssuerError::Serialization`] if the entry cannot be encoded, and
/// [`IssuerError::Signing`] if the signer fails or returns an empty or
/// oversized signature.
pub fn issue_sct<S: LogSigner + ?Sized>(
    signer: &S,
    leaf: &MerkleTreeLeaf,
) -> Result<SignedCertificateTimestamp, IssuerError> {
    sign_leaf(signer, leaf, None)
}

fn sign_leaf<S: LogSigner + ?Sized>(
    signer: &S,
    leaf: &MerkleTreeLeaf,
    metrics: Option<&Metrics>,
) -> Result<SignedCertificateTimestamp, IssuerError> {
    let entry = &leaf.timestamped_entry;
    let msg = sct_signature_input(leaf.version, entry)?;

    let timer = metrics.map(|m| m.sign_duration.start_timer());
    let signature = signer.sign(&msg);
    drop(timer);
    let signature = signature?;

    if signature.signature.is_empty() {
        return Err(SigningError::InvalidSignature("empty signature".to_string()).into());
    }
    if signature.signature.len() > usize::from(u16::MAX) {
        return Err(SigningError::InvalidSignature(format!(
            "signature too long: {} bytes",
            signature.signature.len()
        ))
        .into());
    }

    Ok(SignedCertificateTimestamp {
        version: leaf.version,
        log_id: signer.log_id(),
        timestamp: entry.timestamp,
        extensions: entry.extensions.clone(),
        signature,
    })
}

/// Builds the leaf for `cert` at the clock's current time and issues its SCT.
///
/// # Errors
///
/// Returns an error if the leaf cannot be built or signed; see [`build_leaf`]
/// and [`issue_sct`].
pub fn issue_sct_for_certificate<'a, C, S, K>(
    cert: &C,
    submission: impl Into<Submission<'a>>,
    signer: &S,
    clock: &K,
) -> Result<(MerkleTreeLeaf, SignedCertificateTimestamp), IssuerError>
where
    C: CertificateSource + ?Sized,
    S: LogSigner + ?Sized,
    K: Clock + ?Sized,
{
    let leaf = build_leaf(cert, submission, clock.now_millis())?;
    let sct = issue_sct(signer, &leaf)?;
    Ok((leaf, sct))
}

/// A named log's issuance front end, with its signer, clock and optional
/// metrics.
#[derive(Debug)]
pub struct SctIssuer<S, K = SystemClock> {
    name: String,
    signer: S,
    clock: K,
    metrics: Option<Metrics>,
}

impl<S: LogSigner> SctIssuer<S> {
    /// Creates an issuer that timestamps with the system clock.
    pub fn new(name: impl Into<String>, signer: S) -> Self {
        Self::with_clock(name, signer, SystemClock)
    }
}

impl<S: LogSigner, K: Clock> SctIssuer<S, K> {
    pub fn with_clock(name: impl Into<String>, signer: S, clock: K) -> Self {
        Self {
            name: name.into(),
            signer,
            clock,
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log_id(&self) -> LogId {
        self.signer.log_id()
    }

    pub fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    /// Builds the leaf for `cert` and issues its SCT, recording the outcome.
    ///
    /// # Errors
    ///
    /// See [`issue_sct_for_certificate`].
    pub fn issue<'a, C: CertificateSource + ?Sized>(
        &self,
        cert: &C,
        submission: impl Into<Submission<'a>>,
    ) -> Result<(MerkleTreeLeaf, SignedCertificateTimestamp), IssuerError> {
        let result = build_leaf(cert, submission, self.clock.now_millis()).and_then(|leaf| {
            let sct = sign_leaf(&self.signer, &leaf, self.metrics.as_ref())?;
            Ok((leaf, sct))
        });
        match &result {
            Ok((leaf, sct)) => {
                let entry_type = leaf.timestamped_entry.entry_type().as_str();
                debug!(
                    "{}: Issued SCT; entry_type={entry_type}, timestamp={}",
                    self.name, sct.timestamp
                );
                if let Some(m) = &self.metrics {
                    m.issued.with_label_values(&[entry_type]).inc();
                }
            }
            Err(e) => {
                warn!("{}: Failed to issue SCT: {e}", self.name);
                if let Some(m) = &self.metrics {
                    m.errors.with_label_values(&[e.stage()]).inc();
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DigitallySigned, EcdsaLogSigner, FixedClock, HashAlgorithm, LogEntryType, MerkleLeafType,
        RawCertificate, SignatureAlgorithm, Version,
    };
    use p256::ecdsa::{signature::Verifier, Signature, SigningKey};
    use prometheus::Registry;
    use sha2::{Digest, Sha256};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CERT_LOG_ID: LogId = [
        0x05, 0x62, 0x4f, 0xb4, 0x9e, 0x32, 0x14, 0xb6, 0x0c, 0xb8, 0x51, 0x28, 0x23, 0x93, 0x2c,
        0x7a, 0x3d, 0x80, 0x93, 0x5f, 0xcd, 0x76, 0xef, 0x91, 0x6a, 0xaf, 0x1b, 0x8c, 0xe8, 0xb5,
        0x02, 0xb5,
    ];
    const PRECERT_LOG_ID: LogId = [
        0x77, 0xf3, 0x5c, 0xc6, 0xad, 0x85, 0xfd, 0xe0, 0x38, 0xfd, 0x36, 0x34, 0x5c, 0x1e, 0x45,
        0x58, 0x60, 0x95, 0xb1, 0x7c, 0x28, 0xaa, 0xa5, 0xa5, 0x84, 0x96, 0x37, 0x4b, 0xf8, 0xbb,
        0xd9, 0x08,
    ];
    const TIMESTAMP: u64 = 1_504_786_523_000;

    /// Returns a fixed signature and records what it was asked to sign.
    struct StubSigner {
        log_id: LogId,
        signature: Option<Vec<u8>>,
        calls: AtomicUsize,
        last: std::sync::Mutex<Vec<u8>>,
    }

    impl StubSigner {
        fn new(log_id: LogId) -> Self {
            Self::returning(log_id, Some(b"signed".to_vec()))
        }

        fn returning(log_id: LogId, signature: Option<Vec<u8>>) -> Self {
            Self {
                log_id,
                signature,
                calls: AtomicUsize::new(0),
                last: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    impl LogSigner for StubSigner {
        fn sign(&self, msg: &[u8]) -> Result<DigitallySigned, SigningError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = msg.to_vec();
            match &self.signature {
                Some(signature) => Ok(DigitallySigned {
                    hash_algorithm: HashAlgorithm::Sha256,
                    signature_algorithm: SignatureAlgorithm::Rsa,
                    signature: signature.clone(),
                }),
                None => Err(SigningError::Unavailable("key manager down".to_string())),
            }
        }

        fn log_id(&self) -> LogId {
            self.log_id
        }
    }

    fn raw_cert() -> RawCertificate {
        RawCertificate {
            der: Some(b"leaf signed by fake intermediate".to_vec()),
            tbs: Some(b"precert TBS".to_vec()),
            subject_public_key_info: Some(b"issuer SPKI".to_vec()),
        }
    }

    fn expected_sct(log_id: LogId) -> SignedCertificateTimestamp {
        SignedCertificateTimestamp {
            version: Version::V1,
            log_id,
            timestamp: TIMESTAMP,
            extensions: Vec::new(),
            signature: DigitallySigned {
                hash_algorithm: HashAlgorithm::Sha256,
                signature_algorithm: SignatureAlgorithm::Rsa,
                signature: b"signed".to_vec(),
            },
        }
    }

    #[test]
    fn test_sct_for_certificate() {
        let cert = raw_cert();
        let signer = StubSigner::new(CERT_LOG_ID);
        let (leaf, sct) =
            issue_sct_for_certificate(&cert, false, &signer, &FixedClock(TIMESTAMP)).unwrap();

        assert_eq!(sct, expected_sct(CERT_LOG_ID));
        assert_eq!(sct.version as u8, 0);
        assert_eq!(leaf.version, Version::V1);
        assert_eq!(leaf.leaf_type, MerkleLeafType::TimestampedEntry);
        assert_eq!(leaf.timestamped_entry.entry_type(), LogEntryType::X509Entry);
        assert_eq!(leaf.timestamped_entry.timestamp, sct.timestamp);
        assert_eq!(
            leaf.timestamped_entry.x509_entry().unwrap().data,
            cert.der.unwrap()
        );
    }

    #[test]
    fn test_sct_for_precertificate() {
        let cert = raw_cert();
        let signer = StubSigner::new(PRECERT_LOG_ID);
        let (leaf, sct) =
            issue_sct_for_certificate(&cert, true, &signer, &FixedClock(TIMESTAMP)).unwrap();

        assert_eq!(sct, expected_sct(PRECERT_LOG_ID));
        let entry = &leaf.timestamped_entry;
        assert_eq!(entry.entry_type(), LogEntryType::PrecertEntry);
        assert_eq!(entry.timestamp, sct.timestamp);
        let precert = entry.precert_entry().unwrap();
        let want: [u8; 32] = Sha256::digest(b"issuer SPKI").into();
        assert_eq!(precert.issuer_key_hash, want);
        assert_eq!(precert.tbs_certificate, cert.tbs.unwrap());
    }

    #[test]
    fn test_signed_bytes() {
        let cert = raw_cert();
        let signer = StubSigner::new(CERT_LOG_ID);
        let leaf = build_leaf(&cert, false, TIMESTAMP).unwrap();
        issue_sct(&signer, &leaf).unwrap();

        let mut want = vec![0, 0];
        want.extend_from_slice(&leaf.timestamped_entry.to_bytes().unwrap());
        assert_eq!(*signer.last.lock().unwrap(), want);
        assert_eq!(signer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_deterministic() {
        let cert = raw_cert();
        let signer = StubSigner::new(CERT_LOG_ID);
        let clock = FixedClock(TIMESTAMP);
        for is_precert in [false, true] {
            let (leaf_a, sct_a) =
                issue_sct_for_certificate(&cert, is_precert, &signer, &clock).unwrap();
            let (leaf_b, sct_b) =
                issue_sct_for_certificate(&cert, is_precert, &signer, &clock).unwrap();
            assert_eq!(leaf_a.to_bytes().unwrap(), leaf_b.to_bytes().unwrap());
            assert_eq!(sct_a.to_bytes().unwrap(), sct_b.to_bytes().unwrap());
        }
    }

    #[test]
    fn test_signer_failure() {
        let leaf = build_leaf(&raw_cert(), false, TIMESTAMP).unwrap();
        let signer = StubSigner::returning(CERT_LOG_ID, None);
        assert!(matches!(
            issue_sct(&signer, &leaf),
            Err(IssuerError::Signing(SigningError::Unavailable(_)))
        ));
        assert_eq!(signer.calls.load(Ordering::SeqCst), 1);
    }

    macro_rules! test_invalid_signature {
        ($name:ident, $signature:expr) => {
            #[test]
            fn $name() {
                let leaf = build_leaf(&raw_cert(), false, TIMESTAMP).unwrap();
                let signer = StubSigner::returning(CERT_LOG_ID, Some($signature));
                assert!(matches!(
                    issue_sct(&signer, &leaf),
                    Err(IssuerError::Signing(SigningError::InvalidSignature(_)))
                ));
            }
        };
    }

    test_invalid_signature!(empty_signature, Vec::new());
    test_invalid_signature!(oversized_signature, vec![1; 0x1_0000]);

    #[test]
    fn test_precert_missing_tbs() {
        let cert = RawCertificate {
            tbs: None,
            ..raw_cert()
        };
        let signer = StubSigner::new(PRECERT_LOG_ID);
        assert!(matches!(
            issue_sct_for_certificate(&cert, true, &signer, &FixedClock(TIMESTAMP)),
            Err(IssuerError::MalformedCertificate(_))
        ));
        assert_eq!(signer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_ecdsa_end_to_end() {
        let signer = EcdsaLogSigner::new(SigningKey::from_slice(&[3; 32]).unwrap()).unwrap();
        let cert = raw_cert();
        let (leaf, sct) =
            issue_sct_for_certificate(&cert, true, &signer, &FixedClock(TIMESTAMP)).unwrap();

        let parsed = SignedCertificateTimestamp::from_bytes(&sct.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed, sct);
        assert_eq!(parsed.log_id, signer.log_id());

        let msg = sct_signature_input(leaf.version, &leaf.timestamped_entry).unwrap();
        let sig = Signature::from_der(&parsed.signature.signature).unwrap();
        signer.verifying_key().verify(&msg, &sig).unwrap();
    }

    #[test]
    fn test_decoded_leaf_extensions_carried() {
        let signer = EcdsaLogSigner::new(SigningKey::from_slice(&[3; 32]).unwrap()).unwrap();
        let mut leaf = build_leaf(&raw_cert(), false, TIMESTAMP).unwrap();
        leaf.timestamped_entry.extensions = vec![0, 0, 5, 0, 0, 0, 0, 0, 7];
        let leaf = MerkleTreeLeaf::from_bytes(&leaf.to_bytes().unwrap()).unwrap();

        let sct = issue_sct(&signer, &leaf).unwrap();
        assert_eq!(sct.extensions, leaf.timestamped_entry.extensions);

        // Rebuild the signed struct from the SCT alone, as a CT client does.
        let mut entry = leaf.timestamped_entry.clone();
        entry.timestamp = sct.timestamp;
        entry.extensions = sct.extensions.clone();
        let msg = sct_signature_input(sct.version, &entry).unwrap();
        let sig = Signature::from_der(&sct.signature.signature).unwrap();
        signer.verifying_key().verify(&msg, &sig).unwrap();
    }

    #[test]
    fn test_issuer_metrics() {
        let metrics = Metrics::new(Registry::new()).unwrap();
        let issuer = SctIssuer::with_clock(
            "testlog",
            StubSigner::new(CERT_LOG_ID),
            FixedClock(TIMESTAMP),
        )
        .with_metrics(metrics);
        assert_eq!(issuer.name(), "testlog");
        assert_eq!(issuer.log_id(), CERT_LOG_ID);

        let (_, sct) = issuer.issue(&raw_cert(), false).unwrap();
        assert_eq!(sct, expected_sct(CERT_LOG_ID));
        issuer.issue(&raw_cert(), true).unwrap();
        issuer
            .issue(&RawCertificate::default(), Submission::Certificate)
            .unwrap_err();

        let m = issuer.metrics().unwrap();
        assert_eq!(
            m.issued.with_label_values(&["x509_entry"]).get() as u64,
            1
        );
        assert_eq!(
            m.issued.with_label_values(&["precert_entry"]).get() as u64,
            1
        );
        assert_eq!(m.errors.with_label_values(&["build_leaf"]).get() as u64, 1);
        assert_eq!(m.sign_duration.get_sample_count(), 2);
    }

    #[test]
    fn test_issuer_system_clock() {
        let issuer = SctIssuer::new("testlog", StubSigner::new(CERT_LOG_ID));
        let (leaf, sct) = issuer.issue(&raw_cert(), false).unwrap();
        assert_eq!(sct.timestamp, leaf.timestamped_entry.timestamp);
        assert!(sct.timestamp > TIMESTAMP);
    }
}
