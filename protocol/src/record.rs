use {
    crate::{
        CustomMetadata, DateTimeUtc, DocumentHash, DocumentId, EncryptionType, StorageError,
        StorageId, StorageProvider,
    },
    derivative::Derivative,
    serde::{Deserialize, Serialize},
};

/// Encrypted form of [`DocumentMetadata`] as persisted in the record.
///
/// All binary fields are standard base64. The auth tag is present only for GCM;
/// the metadata path only for the filesystem backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataEnvelope {
    pub encrypted_metadata_base64: String,
    pub metadata_iv: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_auth_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_path: Option<String>,
}

/// Persisted mapping from a storage handle to the encrypted bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageRecord {
    pub id: StorageId,
    pub document_id: DocumentId,
    pub provider: StorageProvider,
    pub encryption_type: EncryptionType,
    /// Object key or filesystem path, interpreted only by `provider`.
    pub storage_location: String,
    pub document_hash: DocumentHash,
    pub metadata: MetadataEnvelope,
    pub created_at: DateTimeUtc,
}

/// Metadata sealed alongside each document: caller fields plus the reserved fields
/// needed to open the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub document_id: DocumentId,
    pub document_hash: DocumentHash,
    pub encryption_type: EncryptionType,
    /// Base64 IV of the document body.
    pub iv: String,
    /// Base64 GCM tag of the document body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_tag: Option<String>,
    #[serde(flatten)]
    pub custom: CustomMetadata,
}

impl DocumentMetadata {
    pub const RESERVED_KEYS: [&'static str; 5] =
        ["documentId", "documentHash", "encryptionType", "iv", "authTag"];

    /// Caller keys that collide with reserved ones are dropped.
    #[must_use]
    #[inline]
    pub fn new(
        mut custom: CustomMetadata,
        document_id: DocumentId,
        document_hash: DocumentHash,
        encryption_type: EncryptionType,
        iv: String,
        auth_tag: Option<String>,
    ) -> Self {
        for key in Self::RESERVED_KEYS {
            custom.remove(key);
        }
        Self {
            document_id,
            document_hash,
            encryption_type,
            iv,
            auth_tag,
            custom,
        }
    }

    #[must_use]
    #[inline]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.custom.get(key)
    }
}

/// Result of a store call. Failures are reported here instead of as `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageOutcome {
    pub success: bool,
    pub storage_id: StorageId,
    pub provider: StorageProvider,
    pub encryption_type: EncryptionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_hash: Option<DocumentHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StorageOutcome {
    #[must_use]
    #[inline]
    pub const fn stored(record: &StorageRecord, file_url: String) -> Self {
        Self {
            success: true,
            storage_id: record.id,
            provider: record.provider,
            encryption_type: record.encryption_type,
            document_hash: Some(record.document_hash),
            file_url: Some(file_url),
            error: None,
        }
    }

    /// The storage id of a failed outcome is a fresh placeholder that refers to nothing.
    #[must_use]
    #[inline]
    pub fn failed(
        provider: StorageProvider,
        encryption_type: EncryptionType,
        error: &StorageError,
    ) -> Self {
        Self {
            success: false,
            storage_id: StorageId::generate(),
            provider,
            encryption_type,
            document_hash: None,
            file_url: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Backend to use instead of the configured default.
    pub provider: Option<StorageProvider>,
    pub encryption_type: Option<EncryptionType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrieveOptions {
    /// If false, the raw ciphertext is returned and the hash check is skipped.
    pub decrypt: bool,
}

impl Default for RetrieveOptions {
    #[inline]
    fn default() -> Self {
        Self { decrypt: true }
    }
}

#[derive(Derivative, Clone, PartialEq, Eq)]
#[derivative(Debug)]
pub struct RetrievedDocument {
    /// Plaintext, or ciphertext if decryption was not requested.
    #[derivative(Debug = "ignore")]
    pub data: Vec<u8>,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_hash: Option<DocumentHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IntegrityReport {
    #[must_use]
    #[inline]
    pub const fn valid(document_hash: DocumentHash) -> Self {
        Self {
            is_valid: true,
            document_hash: Some(document_hash),
            error: None,
        }
    }

    /// On a hash mismatch the report carries the recomputed hash.
    #[must_use]
    #[inline]
    pub fn invalid(error: &StorageError) -> Self {
        let document_hash = match error {
            StorageError::HashMismatch { actual, .. } => Some(*actual),
            _ => None,
        };
        Self {
            is_valid: false,
            document_hash,
            error: Some(error.to_string()),
        }
    }
}
