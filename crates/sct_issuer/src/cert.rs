// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! A [`CertificateSource`] backed by a parsed X.509 certificate.

use crate::{CertificateSource, IssuerError, Submission};
use const_oid::db::rfc6962::CT_PRECERT_POISON;
use der::{
    asn1::Null,
    oid::{AssociatedOid, ObjectIdentifier},
    Decode, Encode,
};
use log::warn;
use std::borrow::Cow;
use x509_cert::{impl_newtype, Certificate, TbsCertificate};

/// Precertificate poison extension that can be decoded with [`TbsCertificate::get`].
#[derive(Debug)]
struct CTPrecertPoison(Null);

impl AssociatedOid for CTPrecertPoison {
    const OID: ObjectIdentifier = CT_PRECERT_POISON;
}
impl_newtype!(CTPrecertPoison, Null);

/// A certificate as submitted, with its original DER kept verbatim.
#[derive(Clone, Debug)]
pub struct ParsedCertificate {
    raw: Vec<u8>,
    cert: Certificate,
    is_precert: bool,
}

impl ParsedCertificate {
    /// Parses a DER-encoded certificate.
    ///
    /// # Errors
    ///
    /// Returns [`IssuerError::MalformedCertificate`] if the bytes are not a
    /// certificate, or if the CT poison extension is present but not
    /// critical or not `NULL`.
    pub fn from_der(bytes: &[u8]) -> Result<Self, IssuerError> {
        let cert = Certificate::from_der(bytes).map_err(malformed)?;
        let is_precert = is_precert(&cert.tbs_certificate)?;
        Ok(Self {
            raw: bytes.to_vec(),
            cert,
            is_precert,
        })
    }

    /// Wraps an already-parsed certificate, re-encoding it to obtain its DER.
    ///
    /// # Errors
    ///
    /// Returns [`IssuerError::MalformedCertificate`] if the certificate
    /// cannot be encoded or has an invalid poison extension.
    pub fn from_certificate(cert: Certificate) -> Result<Self, IssuerError> {
        let raw = cert.to_der().map_err(malformed)?;
        let is_precert = is_precert(&cert.tbs_certificate)?;
        Ok(Self {
            raw,
            cert,
            is_precert,
        })
    }

    #[must_use]
    pub fn certificate(&self) -> &Certificate {
        &self.cert
    }

    /// Whether the certificate carries the CT poison extension.
    #[must_use]
    pub fn is_precert(&self) -> bool {
        self.is_precert
    }

    /// Returns the DER `TBSCertificate` to log, with the CT poison extension
    /// removed for a precertificate.
    ///
    /// # Errors
    ///
    /// Returns [`IssuerError::MalformedCertificate`] with the encoding
    /// failure if the TBS cannot be produced.
    pub fn tbs_der(&self) -> Result<Vec<u8>, IssuerError> {
        if self.is_precert {
            strip_poison(&self.cert.tbs_certificate)
        } else {
            self.cert.tbs_certificate.to_der().map_err(malformed)
        }
    }

    /// Classifies the certificate for [`build_leaf`](crate::build_leaf).
    /// `issuer_spki` is only used for precertificates; see
    /// [`Submission::Precertificate`].
    #[must_use]
    pub fn submission<'a>(&self, issuer_spki: Option<&'a [u8]>) -> Submission<'a> {
        if self.is_precert {
            Submission::Precertificate { issuer_spki }
        } else {
            Submission::Certificate
        }
    }
}

impl CertificateSource for ParsedCertificate {
    fn raw_der(&self) -> Option<Cow<'_, [u8]>> {
        Some(Cow::Borrowed(self.raw.as_slice()))
    }

    fn raw_tbs(&self) -> Option<Cow<'_, [u8]>> {
        match self.tbs_der() {
            Ok(tbs) => Some(Cow::Owned(tbs)),
            Err(e) => {
                warn!("Failed to encode TBSCertificate: {e}");
                None
            }
        }
    }

    fn raw_subject_public_key_info(&self) -> Option<Cow<'_, [u8]>> {
        self.cert
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .ok()
            .map(Cow::Owned)
    }

    fn is_precert(&self) -> Option<bool> {
        Some(self.is_precert)
    }
}

/// Returns whether or not the certificate contains the precertificate poison extension.
fn is_precert(tbs: &TbsCertificate) -> Result<bool, IssuerError> {
    match tbs.get::<CTPrecertPoison>().map_err(malformed)? {
        Some((true, _)) => Ok(true),
        Some((false, _)) => Err(IssuerError::MalformedCertificate(
            "CT poison extension is not critical".to_string(),
        )),
        None => Ok(false),
    }
}

/// Returns the DER `TBSCertificate` with the CT poison extension removed,
/// preserving the order of the other extensions.
fn strip_poison(tbs: &TbsCertificate) -> Result<Vec<u8>, IssuerError> {
    let mut tbs = tbs.clone();
    let exts = tbs
        .extensions
        .as_mut()
        .ok_or_else(|| IssuerError::MalformedCertificate("missing extensions".to_string()))?;
    let ct_poison_idx = exts
        .iter()
        .position(|v| v.extn_id == CT_PRECERT_POISON)
        .ok_or_else(|| IssuerError::MalformedCertificate("missing CT poison".to_string()))?;
    exts.remove(ct_poison_idx);
    if exts.is_empty() {
        tbs.extensions = None;
    }
    tbs.to_der().map_err(malformed)
}

fn malformed(e: der::Error) -> IssuerError {
    IssuerError::MalformedCertificate(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_leaf, LogEntryType};
    use der::asn1::{BitString, OctetString};
    use p256::{ecdsa::SigningKey, pkcs8::EncodePublicKey};
    use sha2::{Digest, Sha256};
    use std::{str::FromStr, time::Duration};
    use x509_cert::{
        ext::Extension,
        name::Name,
        serial_number::SerialNumber,
        spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned},
        time::Validity,
        Version,
    };

    const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
    const BASIC_CONSTRAINTS: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.19");

    fn spki(seed: u8) -> SubjectPublicKeyInfoOwned {
        let key = SigningKey::from_slice(&[seed; 32]).unwrap();
        let der = key.verifying_key().to_public_key_der().unwrap();
        SubjectPublicKeyInfoOwned::from_der(der.as_bytes()).unwrap()
    }

    fn poison(critical: bool) -> Extension {
        Extension {
            extn_id: CT_PRECERT_POISON,
            critical,
            extn_value: OctetString::new(Null.to_der().unwrap()).unwrap(),
        }
    }

    /// Builds a syntactically valid certificate. The signature is filler;
    /// nothing in this crate verifies it.
    fn test_certificate(extensions: Option<Vec<Extension>>) -> Certificate {
        let alg = AlgorithmIdentifierOwned {
            oid: ECDSA_WITH_SHA256,
            parameters: None,
        };
        Certificate {
            tbs_certificate: TbsCertificate {
                version: Version::V3,
                serial_number: SerialNumber::new(&[0x01, 0x02]).unwrap(),
                signature: alg.clone(),
                issuer: Name::from_str("CN=Test Intermediate,O=Example").unwrap(),
                validity: Validity::from_now(Duration::from_secs(90 * 24 * 60 * 60)).unwrap(),
                subject: Name::from_str("CN=example.com").unwrap(),
                subject_public_key_info: spki(7),
                issuer_unique_id: None,
                subject_unique_id: None,
                extensions,
            },
            signature_algorithm: alg,
            signature: BitString::from_bytes(&[0x30, 0x00]).unwrap(),
        }
    }

    fn test_precertificate() -> Certificate {
        test_certificate(Some(vec![
            Extension {
                extn_id: BASIC_CONSTRAINTS,
                critical: true,
                extn_value: OctetString::new(vec![0x30, 0x00]).unwrap(),
            },
            poison(true),
        ]))
    }

    #[test]
    fn test_final_certificate() {
        let cert = test_certificate(None);
        let der = cert.to_der().unwrap();
        let parsed = ParsedCertificate::from_der(&der).unwrap();
        assert!(!parsed.is_precert());
        assert_eq!(parsed.submission(None), Submission::Certificate);
        assert_eq!(parsed.raw_der().unwrap().as_ref(), der.as_slice());
        assert_eq!(
            parsed.raw_tbs().unwrap().as_ref(),
            cert.tbs_certificate.to_der().unwrap().as_slice()
        );
    }

    #[test]
    fn test_precertificate_tbs_loses_poison() {
        let parsed = ParsedCertificate::from_certificate(test_precertificate()).unwrap();
        assert!(parsed.is_precert());

        let tbs = TbsCertificate::from_der(&parsed.raw_tbs().unwrap()).unwrap();
        assert!(parsed
            .certificate()
            .tbs_certificate
            .get::<CTPrecertPoison>()
            .unwrap()
            .is_some());
        assert!(tbs.get::<CTPrecertPoison>().unwrap().is_none());
        let exts = tbs.extensions.unwrap();
        assert_eq!(exts.len(), 1);
        assert_eq!(exts[0].extn_id, BASIC_CONSTRAINTS);
    }

    #[test]
    fn test_tbs_der_matches_source() {
        for cert in [test_certificate(None), test_precertificate()] {
            let parsed = ParsedCertificate::from_certificate(cert).unwrap();
            assert_eq!(
                parsed.tbs_der().unwrap(),
                parsed.raw_tbs().unwrap().as_ref()
            );
        }
    }

    #[test]
    fn test_tbs_der_reports_cause() {
        // Marked as a precertificate but without any extensions to strip.
        let parsed = ParsedCertificate {
            raw: Vec::new(),
            cert: test_certificate(None),
            is_precert: true,
        };
        match parsed.tbs_der() {
            Err(IssuerError::MalformedCertificate(msg)) => {
                assert_eq!(msg, "missing extensions");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(parsed.raw_tbs().is_none());
    }

    #[test]
    fn test_poison_only_extension() {
        let parsed =
            ParsedCertificate::from_certificate(test_certificate(Some(vec![poison(true)])))
                .unwrap();
        let tbs = TbsCertificate::from_der(&parsed.raw_tbs().unwrap()).unwrap();
        assert!(tbs.extensions.is_none());
    }

    #[test]
    fn test_poison_non_critical() {
        let cert = test_certificate(Some(vec![poison(false)]));
        assert!(matches!(
            ParsedCertificate::from_certificate(cert),
            Err(IssuerError::MalformedCertificate(_))
        ));
    }

    #[test]
    fn test_poison_non_null() {
        let cert = test_certificate(Some(vec![Extension {
            extn_id: CT_PRECERT_POISON,
            critical: true,
            extn_value: OctetString::new([]).unwrap(),
        }]));
        assert!(ParsedCertificate::from_certificate(cert).is_err());
    }

    #[test]
    fn test_not_a_certificate() {
        assert!(matches!(
            ParsedCertificate::from_der(b"not DER"),
            Err(IssuerError::MalformedCertificate(_))
        ));
    }

    #[test]
    fn test_precert_leaf_from_parsed() {
        let parsed = ParsedCertificate::from_certificate(test_precertificate()).unwrap();
        let issuer = spki(9).to_der().unwrap();
        let leaf = build_leaf(&parsed, parsed.submission(Some(issuer.as_slice())), 10).unwrap();
        let entry = &leaf.timestamped_entry;
        assert_eq!(entry.entry_type(), LogEntryType::PrecertEntry);
        let precert = entry.precert_entry().unwrap();
        let want: [u8; 32] = Sha256::digest(&issuer).into();
        assert_eq!(precert.issuer_key_hash, want);
        assert_eq!(precert.tbs_certificate, parsed.raw_tbs().unwrap().as_ref());
    }

    #[test]
    fn test_precert_submitted_as_certificate() {
        let parsed = ParsedCertificate::from_certificate(test_precertificate()).unwrap();
        assert!(matches!(
            build_leaf(&parsed, false, 10),
            Err(IssuerError::MalformedCertificate(_))
        ));
    }
}
