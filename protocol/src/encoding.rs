use {
    crate::{StorageError, StorageResult},
    base64::{Engine, prelude::BASE64_STANDARD},
    serde::{Serialize, de::DeserializeOwned},
};

pub fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(value)
}

pub fn deserialize<T: DeserializeOwned>(data: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(data)
}

#[must_use]
#[inline]
pub fn encode_base64(data: &[u8]) -> String {
    BASE64_STANDARD.encode(data)
}

/// Decodes a base64 field of a stored envelope. `field` names the field in the error.
#[inline]
pub fn decode_base64(field: &str, value: &str) -> StorageResult<Vec<u8>> {
    BASE64_STANDARD
        .decode(value)
        .map_err(|err| StorageError::Decryption(format!("invalid base64 in {field}: {err}")))
}
