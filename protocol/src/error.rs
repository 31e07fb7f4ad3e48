use {crate::DocumentHash, thiserror::Error};

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    /// A required secret, credential or backend is missing.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Authentication tag verification or CBC padding check failed.
    ///
    /// Content hash mismatches use [`StorageError::HashMismatch`]. Use
    /// [`StorageError::is_tampering`] to match both.
    #[error("integrity check failed: {0}")]
    Integrity(String),
    /// Decrypted plaintext does not match the hash recorded at store time. This is
    /// how tampering with CBC ciphertext usually shows up.
    #[error("document hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        expected: DocumentHash,
        actual: DocumentHash,
    },
    #[error("not found: {0}")]
    NotFound(String),
    /// Ciphertext, IV, tag or envelope is malformed.
    #[error("decryption failed: {0}")]
    Decryption(String),
    #[error("encryption failed: {0}")]
    Encryption(String),
    /// Database, network or filesystem failure.
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

impl StorageError {
    /// True if the stored data was modified after it was written.
    #[must_use]
    #[inline]
    pub const fn is_tampering(&self) -> bool {
        matches!(self, Self::Integrity(_) | Self::HashMismatch { .. })
    }

    #[must_use]
    #[inline]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
