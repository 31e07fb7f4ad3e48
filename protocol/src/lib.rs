pub mod credentials;
pub mod encoding;
mod error;
mod record;

pub use crate::{
    credentials::{DownloadToken, EncryptionSecret},
    error::{StorageError, StorageResult},
    record::{
        DocumentMetadata, IntegrityReport, MetadataEnvelope, RetrieveOptions, RetrievedDocument,
        StorageOutcome, StorageRecord, StoreOptions,
    },
};
use {
    anyhow::{bail, format_err},
    chrono::Utc,
    derive_more::{Display, From, Into},
    serde::{Deserialize, Deserializer, Serialize, Serializer, de},
    std::{borrow::Cow, fmt, str::FromStr},
    uuid::Uuid,
};

pub type DateTimeUtc = chrono::DateTime<Utc>;

/// Free-form JSON metadata supplied by the caller together with a document.
pub type CustomMetadata = serde_json::Map<String, serde_json::Value>;

/// Identifier of the document entity that owns a stored blob.
///
/// The entity itself lives outside of the storage core.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    From,
    Into,
    Display,
)]
#[serde(transparent)]
pub struct DocumentId(pub i64);

impl FromStr for DocumentId {
    type Err = anyhow::Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Opaque handle returned by a successful store.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    From,
    Into,
    Display,
)]
#[serde(transparent)]
pub struct StorageId(pub Uuid);

impl StorageId {
    #[must_use]
    #[inline]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl FromStr for StorageId {
    type Err = anyhow::Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageProvider {
    #[serde(rename = "s3")]
    ObjectStore,
    #[serde(rename = "local")]
    LocalFs,
}

impl StorageProvider {
    #[must_use]
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ObjectStore => "s3",
            Self::LocalFs => "local",
        }
    }
}

impl fmt::Display for StorageProvider {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageProvider {
    type Err = anyhow::Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s3" => Ok(Self::ObjectStore),
            "local" => Ok(Self::LocalFs),
            _ => bail!("invalid value for StorageProvider: {s:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncryptionType {
    #[default]
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
    #[serde(rename = "aes-256-cbc")]
    Aes256Cbc,
}

impl EncryptionType {
    #[must_use]
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aes256Gcm => "aes-256-gcm",
            Self::Aes256Cbc => "aes-256-cbc",
        }
    }

    /// Whether ciphertexts of this type carry an authentication tag.
    #[must_use]
    #[inline]
    pub const fn is_authenticated(self) -> bool {
        matches!(self, Self::Aes256Gcm)
    }
}

impl fmt::Display for EncryptionType {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncryptionType {
    type Err = anyhow::Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aes-256-gcm" => Ok(Self::Aes256Gcm),
            "aes-256-cbc" => Ok(Self::Aes256Cbc),
            _ => bail!("invalid value for EncryptionType: {s:?}"),
        }
    }
}

pub const DOCUMENT_HASH_LENGTH: usize = 32;

/// SHA-256 digest of a plaintext document. Displayed and serialized as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, From, Into)]
pub struct DocumentHash(pub [u8; DOCUMENT_HASH_LENGTH]);

impl fmt::Display for DocumentHash {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for DocumentHash {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentHash({self})")
    }
}

impl FromStr for DocumentHash {
    type Err = anyhow::Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let array = <[u8; DOCUMENT_HASH_LENGTH]>::try_from(bytes).map_err(|bytes| {
            format_err!(
                "invalid length; got {}, expected {DOCUMENT_HASH_LENGTH}",
                bytes.len()
            )
        })?;
        Ok(Self(array))
    }
}

impl Serialize for DocumentHash {
    #[inline]
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DocumentHash {
    #[inline]
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Cow::<'_, str>::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}
