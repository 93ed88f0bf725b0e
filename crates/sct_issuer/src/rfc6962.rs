// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Wire structures from [RFC 6962](https://datatracker.ietf.org/doc/html/rfc6962)
//! and their canonical TLS encodings.
//!
//! The encodings in this module are a compatibility contract: the bytes
//! produced here are what CT clients hash and verify, so every field is
//! written with the exact width and length prefix the RFC gives it.
//!
//! ```text
//! struct {
//!     uint64 timestamp;
//!     LogEntryType entry_type;
//!     select(entry_type) {
//!         case x509_entry: ASN.1Cert;
//!         case precert_entry: PreCert;
//!     } signed_entry;
//!     CtExtensions extensions;
//! } TimestampedEntry;
//!
//! struct {
//!     Version version;
//!     MerkleLeafType leaf_type;
//!     select (leaf_type) {
//!         case timestamped_entry: TimestampedEntry;
//!     }
//! } MerkleTreeLeaf;
//! ```

use crate::{DecodeError, LogId, SerializationError, UnixTimestamp};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use length_prefixed::{max_length, ReadLengthPrefixedBytesExt, WriteLengthPrefixedBytesExt};
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use sha2::{Digest, Sha256};
use std::io::{Cursor, Read};

/// Width of the `ASN.1Cert` and `TBSCertificate` length prefixes.
pub const CERT_LENGTH_BYTES: usize = 3;

/// Width of the `CtExtensions` and `DigitallySigned.signature` length prefixes.
pub const EXTENSIONS_LENGTH_BYTES: usize = 2;

/// Maximum length of an `ASN.1Cert` or `TBSCertificate` (2^24-1).
pub const MAX_CERT_LENGTH: usize = 0xff_ffff;

/// Protocol version of the leaf and SCT.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Version {
    #[default]
    V1 = 0,
}

/// `MerkleLeafType`, only `timestamped_entry` is defined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MerkleLeafType {
    #[default]
    TimestampedEntry = 0,
}

/// `LogEntryType`, encoded as a `uint16`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum LogEntryType {
    X509Entry = 0,
    PrecertEntry = 1,
}

impl LogEntryType {
    /// Label used in logs and metrics.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LogEntryType::X509Entry => "x509_entry",
            LogEntryType::PrecertEntry => "precert_entry",
        }
    }
}

/// `SignatureType` of the `digitally-signed` SCT input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SignatureType {
    CertificateTimestamp = 0,
}

/// `HashAlgorithm` from [RFC 5246](https://datatracker.ietf.org/doc/html/rfc5246#section-7.4.1.4.1),
/// plus `intrinsic` from [RFC 8422](https://datatracker.ietf.org/doc/html/rfc8422#section-5.1.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HashAlgorithm {
    None = 0,
    Md5 = 1,
    Sha1 = 2,
    Sha224 = 3,
    Sha256 = 4,
    Sha384 = 5,
    Sha512 = 6,
    Intrinsic = 8,
}

impl TryFrom<u8> for HashAlgorithm {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => HashAlgorithm::None,
            1 => HashAlgorithm::Md5,
            2 => HashAlgorithm::Sha1,
            3 => HashAlgorithm::Sha224,
            4 => HashAlgorithm::Sha256,
            5 => HashAlgorithm::Sha384,
            6 => HashAlgorithm::Sha512,
            8 => HashAlgorithm::Intrinsic,
            _ => return Err(DecodeError::UnknownHashAlgorithm(value)),
        })
    }
}

/// `SignatureAlgorithm` from [RFC 5246](https://datatracker.ietf.org/doc/html/rfc5246#section-7.4.1.4.1),
/// plus `ed25519` from [RFC 8422](https://datatracker.ietf.org/doc/html/rfc8422#section-5.1.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SignatureAlgorithm {
    Anonymous = 0,
    Rsa = 1,
    Dsa = 2,
    Ecdsa = 3,
    Ed25519 = 7,
}

impl TryFrom<u8> for SignatureAlgorithm {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => SignatureAlgorithm::Anonymous,
            1 => SignatureAlgorithm::Rsa,
            2 => SignatureAlgorithm::Dsa,
            3 => SignatureAlgorithm::Ecdsa,
            7 => SignatureAlgorithm::Ed25519,
            _ => return Err(DecodeError::UnknownSignatureAlgorithm(value)),
        })
    }
}

/// The `ASN.1Cert` payload of an `x509_entry`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct X509Entry {
    /// DER bytes of the leaf certificate, verbatim.
    pub data: Vec<u8>,
}

/// The `PreCert` payload of a `precert_entry`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrecertEntry {
    /// SHA-256 of the final issuer's DER-encoded `SubjectPublicKeyInfo`.
    pub issuer_key_hash: [u8; 32],
    /// DER bytes of the `TBSCertificate`, without the poison extension.
    pub tbs_certificate: Vec<u8>,
}

/// The `signed_entry` of a [`TimestampedEntry`]. The variant is the
/// `entry_type`, so a payload can never disagree with its type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignedEntry {
    X509(X509Entry),
    Precert(PrecertEntry),
}

impl SignedEntry {
    #[must_use]
    pub fn entry_type(&self) -> LogEntryType {
        match self {
            SignedEntry::X509(_) => LogEntryType::X509Entry,
            SignedEntry::Precert(_) => LogEntryType::PrecertEntry,
        }
    }
}

/// An RFC 6962 `TimestampedEntry`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimestampedEntry {
    pub timestamp: UnixTimestamp,
    pub signed_entry: SignedEntry,
    /// Raw `CtExtensions`. Always empty for entries built by this crate.
    pub extensions: Vec<u8>,
}

impl TimestampedEntry {
    #[must_use]
    pub fn entry_type(&self) -> LogEntryType {
        self.signed_entry.entry_type()
    }

    /// Returns the X.509 payload, if this is an `x509_entry`.
    #[must_use]
    pub fn x509_entry(&self) -> Option<&X509Entry> {
        match &self.signed_entry {
            SignedEntry::X509(e) => Some(e),
            SignedEntry::Precert(_) => None,
        }
    }

    /// Returns the precertificate payload, if this is a `precert_entry`.
    #[must_use]
    pub fn precert_entry(&self) -> Option<&PrecertEntry> {
        match &self.signed_entry {
            SignedEntry::Precert(e) => Some(e),
            SignedEntry::X509(_) => None,
        }
    }

    /// Returns the canonical encoding of the entry.
    ///
    /// # Errors
    ///
    /// Returns an error if a certificate field is empty or longer than
    /// 2^24-1 bytes, or the extensions are longer than 2^16-1 bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializationError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(buffer)
    }

    fn write_to(&self, buffer: &mut Vec<u8>) -> Result<(), SerializationError> {
        buffer.write_u64::<BigEndian>(self.timestamp)?;
        buffer.write_u16::<BigEndian>(self.entry_type() as u16)?;
        match &self.signed_entry {
            SignedEntry::X509(e) => {
                write_vector(buffer, "certificate", &e.data, CERT_LENGTH_BYTES, 1)?;
            }
            SignedEntry::Precert(e) => {
                buffer.extend_from_slice(&e.issuer_key_hash);
                write_vector(
                    buffer,
                    "tbs_certificate",
                    &e.tbs_certificate,
                    CERT_LENGTH_BYTES,
                    1,
                )?;
            }
        }
        write_vector(
            buffer,
            "extensions",
            &self.extensions,
            EXTENSIONS_LENGTH_BYTES,
            0,
        )
    }

    fn read_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let timestamp = reader.read_u64::<BigEndian>()?;
        let signed_entry = match reader.read_u16::<BigEndian>()? {
            0 => SignedEntry::X509(X509Entry {
                data: reader.read_length_prefixed(CERT_LENGTH_BYTES)?,
            }),
            1 => {
                let mut issuer_key_hash = [0; 32];
                reader.read_exact(&mut issuer_key_hash)?;
                SignedEntry::Precert(PrecertEntry {
                    issuer_key_hash,
                    tbs_certificate: reader.read_length_prefixed(CERT_LENGTH_BYTES)?,
                })
            }
            other => return Err(DecodeError::UnknownEntryType(other)),
        };
        let extensions = reader.read_length_prefixed(EXTENSIONS_LENGTH_BYTES)?;
        Ok(Self {
            timestamp,
            signed_entry,
            extensions,
        })
    }
}

/// An RFC 6962 `MerkleTreeLeaf`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleTreeLeaf {
    pub version: Version,
    pub leaf_type: MerkleLeafType,
    pub timestamped_entry: TimestampedEntry,
}

impl MerkleTreeLeaf {
    /// Wraps a [`TimestampedEntry`] in a v1 leaf.
    #[must_use]
    pub fn new(timestamped_entry: TimestampedEntry) -> Self {
        Self {
            version: Version::V1,
            leaf_type: MerkleLeafType::TimestampedEntry,
            timestamped_entry,
        }
    }

    /// Returns the canonical encoding of the leaf, as stored in the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the timestamped entry cannot be encoded.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializationError> {
        let mut buffer = vec![self.version as u8, self.leaf_type as u8];
        self.timestamped_entry.write_to(&mut buffer)?;
        Ok(buffer)
    }

    /// Returns the RFC 6962 Merkle tree hash of the leaf, `SHA-256(0x00 || leaf)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the leaf cannot be encoded.
    pub fn leaf_hash(&self) -> Result<[u8; 32], SerializationError> {
        let mut hasher = Sha256::new();
        hasher.update([0]);
        hasher.update(self.to_bytes()?);
        Ok(hasher.finalize().into())
    }

    /// Parses an encoded leaf.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is truncated, carries unknown
    /// discriminants, or has trailing data.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut cursor = Cursor::new(bytes);
        let version = read_version(&mut cursor)?;
        let leaf_type = match cursor.read_u8()? {
            0 => MerkleLeafType::TimestampedEntry,
            other => return Err(DecodeError::UnknownLeafType(other)),
        };
        let timestamped_entry = TimestampedEntry::read_from(&mut cursor)?;
        ensure_consumed(&cursor)?;
        Ok(Self {
            version,
            leaf_type,
            timestamped_entry,
        })
    }
}

/// A signature with the algorithms used to produce it, as in RFC 5246
/// `digitally-signed`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DigitallySigned {
    pub hash_algorithm: HashAlgorithm,
    pub signature_algorithm: SignatureAlgorithm,
    pub signature: Vec<u8>,
}

impl DigitallySigned {
    /// Returns the encoded `DigitallySigned` struct.
    ///
    /// # Errors
    ///
    /// Returns an error if the signature is longer than 2^16-1 bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializationError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(buffer)
    }

    fn write_to(&self, buffer: &mut Vec<u8>) -> Result<(), SerializationError> {
        buffer.write_u8(self.hash_algorithm as u8)?;
        buffer.write_u8(self.signature_algorithm as u8)?;
        write_vector(
            buffer,
            "signature",
            &self.signature,
            EXTENSIONS_LENGTH_BYTES,
            0,
        )
    }

    fn read_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            hash_algorithm: reader.read_u8()?.try_into()?,
            signature_algorithm: reader.read_u8()?.try_into()?,
            signature: reader.read_length_prefixed(EXTENSIONS_LENGTH_BYTES)?,
        })
    }

    /// Parses an encoded `DigitallySigned` struct.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is malformed or has trailing data.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut cursor = Cursor::new(bytes);
        let ds = Self::read_from(&mut cursor)?;
        ensure_consumed(&cursor)?;
        Ok(ds)
    }
}

/// An RFC 6962 `SignedCertificateTimestamp`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedCertificateTimestamp {
    pub version: Version,
    pub log_id: LogId,
    pub timestamp: UnixTimestamp,
    pub extensions: Vec<u8>,
    pub signature: DigitallySigned,
}

impl SignedCertificateTimestamp {
    /// Returns the SCT in the wire format CT clients expect (RFC 6962 section 3.2).
    ///
    /// # Errors
    ///
    /// Returns an error if the extensions or signature overflow their length prefixes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializationError> {
        let mut buffer = Vec::with_capacity(1 + 32 + 8 + 2 + 4 + self.signature.signature.len());
        buffer.write_u8(self.version as u8)?;
        buffer.extend_from_slice(&self.log_id);
        buffer.write_u64::<BigEndian>(self.timestamp)?;
        write_vector(
            &mut buffer,
            "extensions",
            &self.extensions,
            EXTENSIONS_LENGTH_BYTES,
            0,
        )?;
        self.signature.write_to(&mut buffer)?;
        Ok(buffer)
    }

    /// Parses a serialized SCT.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is truncated, carries unknown
    /// algorithms, or has trailing data.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut cursor = Cursor::new(bytes);
        let version = read_version(&mut cursor)?;
        let mut log_id = [0; 32];
        cursor.read_exact(&mut log_id)?;
        let timestamp = cursor.read_u64::<BigEndian>()?;
        let extensions = cursor.read_length_prefixed(EXTENSIONS_LENGTH_BYTES)?;
        let signature = DigitallySigned::read_from(&mut cursor)?;
        ensure_consumed(&cursor)?;
        Ok(Self {
            version,
            log_id,
            timestamp,
            extensions,
            signature,
        })
    }
}

/// Serializes the `digitally-signed` input of an SCT according to
/// [RFC 6962 section 3.2](https://datatracker.ietf.org/doc/html/rfc6962#section-3.2):
/// ```text
/// digitally-signed struct {
///     Version sct_version;
///     SignatureType signature_type = certificate_timestamp;
///     uint64 timestamp;
///     LogEntryType entry_type;
///     select(entry_type) {
///         case x509_entry: ASN.1Cert;
///         case precert_entry: PreCert;
///     } signed_entry;
///     CtExtensions extensions;
/// };
/// ```
/// Everything after the two leading bytes is the canonical
/// [`TimestampedEntry`] encoding.
///
/// # Errors
///
/// Returns an error if the entry cannot be encoded.
pub fn sct_signature_input(
    version: Version,
    entry: &TimestampedEntry,
) -> Result<Vec<u8>, SerializationError> {
    let mut buffer = vec![version as u8, SignatureType::CertificateTimestamp as u8];
    entry.write_to(&mut buffer)?;
    Ok(buffer)
}

/// Serializes a `SignedCertificateTimestampList` (RFC 6962 section 3.3),
/// the contents of the SCT list certificate extension and TLS extension.
///
/// # Errors
///
/// Returns an error if `scts` is empty or any length overflows its prefix.
pub fn sct_list_to_bytes(scts: &[SignedCertificateTimestamp]) -> Result<Vec<u8>, SerializationError> {
    let mut list = Vec::new();
    for sct in scts {
        write_vector(
            &mut list,
            "serialized_sct",
            &sct.to_bytes()?,
            EXTENSIONS_LENGTH_BYTES,
            1,
        )?;
    }
    let mut buffer = Vec::with_capacity(list.len() + EXTENSIONS_LENGTH_BYTES);
    write_vector(&mut buffer, "sct_list", &list, EXTENSIONS_LENGTH_BYTES, 1)?;
    Ok(buffer)
}

/// Parses a `SignedCertificateTimestampList`.
///
/// # Errors
///
/// Returns an error if the list or any SCT in it is malformed.
pub fn sct_list_from_bytes(bytes: &[u8]) -> Result<Vec<SignedCertificateTimestamp>, DecodeError> {
    let mut cursor = Cursor::new(bytes);
    let list = cursor.read_length_prefixed(EXTENSIONS_LENGTH_BYTES)?;
    ensure_consumed(&cursor)?;
    if list.is_empty() {
        return Err(DecodeError::EmptyList);
    }
    let mut scts = Vec::new();
    let mut cursor = Cursor::new(list);
    while !is_consumed(&cursor) {
        let sct = cursor.read_length_prefixed(EXTENSIONS_LENGTH_BYTES)?;
        scts.push(SignedCertificateTimestamp::from_bytes(&sct)?);
    }
    Ok(scts)
}

// Data structure for the [RFC 6962 add-chain and add-pre-chain responses](https://datatracker.ietf.org/doc/html/rfc6962#section-4.1).

/// Add-(pre-)chain response.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct AddChainResponse {
    pub sct_version: u8,
    #[serde_as(as = "Base64")]
    pub id: Vec<u8>,
    pub timestamp: UnixTimestamp,
    #[serde_as(as = "Base64")]
    pub extensions: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub signature: Vec<u8>,
}

impl TryFrom<&SignedCertificateTimestamp> for AddChainResponse {
    type Error = SerializationError;

    fn try_from(sct: &SignedCertificateTimestamp) -> Result<Self, Self::Error> {
        Ok(Self {
            sct_version: sct.version as u8,
            id: sct.log_id.to_vec(),
            timestamp: sct.timestamp,
            extensions: sct.extensions.clone(),
            signature: sct.signature.to_bytes()?,
        })
    }
}

impl TryFrom<&AddChainResponse> for SignedCertificateTimestamp {
    type Error = DecodeError;

    fn try_from(resp: &AddChainResponse) -> Result<Self, Self::Error> {
        let version = match resp.sct_version {
            0 => Version::V1,
            other => return Err(DecodeError::UnknownVersion(other)),
        };
        let log_id = resp
            .id
            .as_slice()
            .try_into()
            .map_err(|_| DecodeError::InvalidLogId(resp.id.len()))?;
        Ok(Self {
            version,
            log_id,
            timestamp: resp.timestamp,
            extensions: resp.extensions.clone(),
            signature: DigitallySigned::from_bytes(&resp.signature)?,
        })
    }
}

/// Writes `data` with an `nbytes` length prefix, enforcing the
/// `<min..2^(8*nbytes)-1>` bounds of the vector.
fn write_vector(
    buffer: &mut Vec<u8>,
    field: &'static str,
    data: &[u8],
    nbytes: usize,
    min: usize,
) -> Result<(), SerializationError> {
    if data.len() < min {
        return Err(SerializationError::EmptyField(field));
    }
    if data.len() as u64 > max_length(nbytes) {
        return Err(SerializationError::FieldTooLong {
            field,
            len: data.len(),
        });
    }
    buffer.write_length_prefixed(data, nbytes)?;
    Ok(())
}

fn read_version<R: Read>(reader: &mut R) -> Result<Version, DecodeError> {
    match reader.read_u8()? {
        0 => Ok(Version::V1),
        other => Err(DecodeError::UnknownVersion(other)),
    }
}

fn is_consumed<T: AsRef<[u8]>>(cursor: &Cursor<T>) -> bool {
    cursor.position() == cursor.get_ref().as_ref().len() as u64
}

fn ensure_consumed<T: AsRef<[u8]>>(cursor: &Cursor<T>) -> Result<(), DecodeError> {
    if is_consumed(cursor) {
        Ok(())
    } else {
        Err(DecodeError::TrailingData)
    }
}
