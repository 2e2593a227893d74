//! Blob identity and payload types.
//!
//! A blob is an opaque piece of key material or attestation data issued by
//! the HSM. The types in this module describe what the processing context
//! knows *about* a blob (its category, store identity and secondary name);
//! the payload itself is never interpreted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Category of an HSM blob.
///
/// The set is fixed by the HSM protocol. Every variant has a stable numeric
/// code that is used as the persistent representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlobType {
    EndorsementKey,
    AttestationPublicKey,
    AttestationKeyPair,
    Quote,
    EciesKeypair,
    TaskKeyDerivation,
    CommunicationKeyDerivation,
    AuditLogKeyDerivation,
    ChargeItemKeyDerivation,
    KvnrHashKey,
    TelematikIdHashKey,
    VauSig,
    VauAut,
    VauSigPrivateKey,
    PseudonameKey,
}

impl BlobType {
    /// All blob types in code order.
    pub const ALL: [BlobType; 15] = [
        Self::EndorsementKey,
        Self::AttestationPublicKey,
        Self::AttestationKeyPair,
        Self::Quote,
        Self::EciesKeypair,
        Self::TaskKeyDerivation,
        Self::CommunicationKeyDerivation,
        Self::AuditLogKeyDerivation,
        Self::ChargeItemKeyDerivation,
        Self::KvnrHashKey,
        Self::TelematikIdHashKey,
        Self::VauSig,
        Self::VauAut,
        Self::VauSigPrivateKey,
        Self::PseudonameKey,
    ];

    /// Persistent numeric code of this blob type.
    pub fn code(self) -> i16 {
        match self {
            Self::EndorsementKey => 1,
            Self::AttestationPublicKey => 2,
            Self::AttestationKeyPair => 3,
            Self::Quote => 4,
            Self::EciesKeypair => 5,
            Self::TaskKeyDerivation => 6,
            Self::CommunicationKeyDerivation => 7,
            Self::AuditLogKeyDerivation => 8,
            Self::ChargeItemKeyDerivation => 9,
            Self::KvnrHashKey => 10,
            Self::TelematikIdHashKey => 11,
            Self::VauSig => 12,
            Self::VauAut => 13,
            Self::VauSigPrivateKey => 14,
            Self::PseudonameKey => 15,
        }
    }

    /// Resolve a blob type from its persistent code.
    pub fn from_code(code: i16) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|blob_type| blob_type.code() == code)
            .ok_or(CoreError::UnknownBlobTypeCode(code))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::EndorsementKey => "EndorsementKey",
            Self::AttestationPublicKey => "AttestationPublicKey",
            Self::AttestationKeyPair => "AttestationKeyPair",
            Self::Quote => "Quote",
            Self::EciesKeypair => "EciesKeypair",
            Self::TaskKeyDerivation => "TaskKeyDerivation",
            Self::CommunicationKeyDerivation => "CommunicationKeyDerivation",
            Self::AuditLogKeyDerivation => "AuditLogKeyDerivation",
            Self::ChargeItemKeyDerivation => "ChargeItemKeyDerivation",
            Self::KvnrHashKey => "KvnrHashKey",
            Self::TelematikIdHashKey => "TelematikIdHashKey",
            Self::VauSig => "VauSig",
            Self::VauAut => "VauAut",
            Self::VauSigPrivateKey => "VauSigPrivateKey",
            Self::PseudonameKey => "PseudonameKey",
        }
    }

    /// Blob types whose rows belong to a single server instance (host).
    pub fn is_host_bound(self) -> bool {
        matches!(
            self,
            Self::EndorsementKey | Self::AttestationPublicKey | Self::AttestationKeyPair
        )
    }

    /// Blob types whose rows belong to a single build of the server.
    pub fn is_build_bound(self) -> bool {
        matches!(self, Self::Quote)
    }
}

impl fmt::Display for BlobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlobType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|blob_type| blob_type.as_str() == s)
            .ok_or_else(|| CoreError::unknown_blob_type(s))
    }
}

impl TryFrom<i16> for BlobType {
    type Error = CoreError;

    fn try_from(code: i16) -> Result<Self> {
        Self::from_code(code)
    }
}

/// Store-assigned blob identity. Unique, increasing and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(u64);

impl BlobId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for BlobId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl TryFrom<i64> for BlobId {
    type Error = CoreError;

    fn try_from(id: i64) -> Result<Self> {
        u64::try_from(id)
            .map(Self)
            .map_err(|_| CoreError::invalid_blob_id(id.to_string()))
    }
}

/// Caller-chosen secondary key of a blob, unique within its type.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobName(Vec<u8>);

impl BlobName {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for BlobName {
    fn from(name: &str) -> Self {
        Self(name.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for BlobName {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

// Names are usually printable, hashes are not.
impl fmt::Display for BlobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(text) if text.chars().all(|c| !c.is_control()) => f.write_str(text),
            _ => write!(f, "0x{}", hex::encode(&self.0)),
        }
    }
}

impl fmt::Debug for BlobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobName({self})")
    }
}

/// Opaque HSM blob payload together with the HSM's generation counter.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct ErpBlob {
    pub data: Vec<u8>,
    pub generation: u32,
}

impl ErpBlob {
    pub fn new(data: impl Into<Vec<u8>>, generation: u32) -> Self {
        Self {
            data: data.into(),
            generation,
        }
    }
}

// Key material must not end up in logs.
impl fmt::Debug for ErpBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErpBlob")
            .field("data", &format_args!("<{} bytes>", self.data.len()))
            .field("generation", &self.generation)
            .finish()
    }
}

/// Metadata attached to attestation related blobs.
///
/// Opaque to the cache; carried through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobMetadata {
    /// TPM name of the attestation key.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_bytes")]
    pub ak_name: Option<Vec<u8>>,

    /// PCR register indices the quote was taken over.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pcr_set: Option<Vec<u8>>,

    /// Certificate associated with the key, PEM or base64 DER.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
}

impl BlobMetadata {
    pub fn is_empty(&self) -> bool {
        self.ak_name.is_none() && self.pcr_set.is_none() && self.certificate.is_none()
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| STANDARD.decode(encoded).map_err(serde::de::Error::custom))
            .transpose()
    }
}
