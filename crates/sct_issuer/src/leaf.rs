// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Builds the [`MerkleTreeLeaf`] for a submitted certificate or precertificate.
//!
//! This is pure data transformation: the raw byte fields come from a
//! [`CertificateSource`] and are copied into the leaf verbatim. Nothing here
//! parses certificates, strips extensions or walks chains.

use crate::{
    rfc6962::MAX_CERT_LENGTH, IssuerError, MerkleTreeLeaf, PrecertEntry, SignedEntry,
    TimestampedEntry, UnixTimestamp, X509Entry,
};
use sha2::{Digest, Sha256};
use std::borrow::Cow;

/// Raw byte fields of a certificate, as exposed by whatever parsed it.
///
/// A field the certificate cannot produce is `None`, and building a leaf
/// that needs it fails with [`IssuerError::MalformedCertificate`].
pub trait CertificateSource {
    /// DER encoding of the whole certificate.
    fn raw_der(&self) -> Option<Cow<'_, [u8]>>;

    /// DER encoding of the `TBSCertificate` to log. For a precertificate
    /// the CT poison extension must already be removed.
    fn raw_tbs(&self) -> Option<Cow<'_, [u8]>>;

    /// DER encoding of the certificate's `SubjectPublicKeyInfo`.
    fn raw_subject_public_key_info(&self) -> Option<Cow<'_, [u8]>>;

    /// Whether the certificate carries the CT poison extension, if the
    /// source knows. Used to reject submissions whose classification
    /// disagrees with the certificate.
    fn is_precert(&self) -> Option<bool> {
        None
    }
}

impl<T: CertificateSource + ?Sized> CertificateSource for &T {
    fn raw_der(&self) -> Option<Cow<'_, [u8]>> {
        (**self).raw_der()
    }
    fn raw_tbs(&self) -> Option<Cow<'_, [u8]>> {
        (**self).raw_tbs()
    }
    fn raw_subject_public_key_info(&self) -> Option<Cow<'_, [u8]>> {
        (**self).raw_subject_public_key_info()
    }
    fn is_precert(&self) -> Option<bool> {
        (**self).is_precert()
    }
}

/// A [`CertificateSource`] with pre-extracted fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawCertificate {
    pub der: Option<Vec<u8>>,
    pub tbs: Option<Vec<u8>>,
    pub subject_public_key_info: Option<Vec<u8>>,
}

impl CertificateSource for RawCertificate {
    fn raw_der(&self) -> Option<Cow<'_, [u8]>> {
        self.der.as_deref().map(Cow::Borrowed)
    }
    fn raw_tbs(&self) -> Option<Cow<'_, [u8]>> {
        self.tbs.as_deref().map(Cow::Borrowed)
    }
    fn raw_subject_public_key_info(&self) -> Option<Cow<'_, [u8]>> {
        self.subject_public_key_info.as_deref().map(Cow::Borrowed)
    }
}

/// How a certificate was submitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Submission<'a> {
    /// A final certificate, logged as an `x509_entry`.
    #[default]
    Certificate,
    /// A precertificate, logged as a `precert_entry`.
    ///
    /// `issuer_spki` is the DER `SubjectPublicKeyInfo` of the CA that will
    /// issue the final certificate. When a Precertificate Signing Certificate
    /// was used this is the key of *its* issuer; resolving that is the
    /// caller's job. When `None`, the certificate's own
    /// `raw_subject_public_key_info` is taken as the supplied key.
    Precertificate { issuer_spki: Option<&'a [u8]> },
}

impl Submission<'_> {
    #[must_use]
    pub fn is_precert(&self) -> bool {
        matches!(self, Submission::Precertificate { .. })
    }
}

impl From<bool> for Submission<'_> {
    fn from(is_precert: bool) -> Self {
        if is_precert {
            Submission::Precertificate { issuer_spki: None }
        } else {
            Submission::Certificate
        }
    }
}

/// Builds the v1 `timestamped_entry` leaf for `cert`.
///
/// Identical inputs always produce identical leaves.
///
/// # Errors
///
/// Returns [`IssuerError::MalformedCertificate`] if a field the submission
/// type needs is unavailable, empty or too long to log, or if the
/// certificate's own precertificate marking disagrees with `submission`.
pub fn build_leaf<'a, C: CertificateSource + ?Sized>(
    cert: &C,
    submission: impl Into<Submission<'a>>,
    timestamp: UnixTimestamp,
) -> Result<MerkleTreeLeaf, IssuerError> {
    let submission = submission.into();
    if let Some(is_precert) = cert.is_precert() {
        if is_precert != submission.is_precert() {
            return Err(IssuerError::MalformedCertificate(format!(
                "{}certificate submitted as a {}certificate",
                if is_precert { "pre-" } else { "final " },
                if is_precert { "final " } else { "pre-" },
            )));
        }
    }

    let signed_entry = match submission {
        Submission::Certificate => SignedEntry::X509(X509Entry {
            data: required(cert.raw_der(), "DER")?,
        }),
        Submission::Precertificate { issuer_spki } => {
            let tbs_certificate = required(cert.raw_tbs(), "TBSCertificate")?;
            let issuer_key_hash: [u8; 32] = match issuer_spki {
                Some(spki) => Sha256::digest(spki).into(),
                None => {
                    let spki = cert.raw_subject_public_key_info().ok_or_else(|| {
                        IssuerError::MalformedCertificate(
                            "missing SubjectPublicKeyInfo".to_string(),
                        )
                    })?;
                    Sha256::digest(&spki).into()
                }
            };
            SignedEntry::Precert(PrecertEntry {
                issuer_key_hash,
                tbs_certificate,
            })
        }
    };

    Ok(MerkleTreeLeaf::new(TimestampedEntry {
        timestamp,
        signed_entry,
        extensions: Vec::new(),
    }))
}

fn required(field: Option<Cow<'_, [u8]>>, name: &str) -> Result<Vec<u8>, IssuerError> {
    match field {
        None => Err(IssuerError::MalformedCertificate(format!("missing {name}"))),
        Some(bytes) if bytes.is_empty() => {
            Err(IssuerError::MalformedCertificate(format!("empty {name}")))
        }
        Some(bytes) if bytes.len() > MAX_CERT_LENGTH => Err(IssuerError::MalformedCertificate(
            format!("{name} too long: {} bytes", bytes.len()),
        )),
        Some(bytes) => Ok(bytes.into_owned()),
    }
}
