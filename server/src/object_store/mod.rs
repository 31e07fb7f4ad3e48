mod memory;
mod s3;

pub use self::{
    memory::{MemoryObjectStore, StoredObject},
    s3::S3ObjectStore,
};
use {
    async_trait::async_trait,
    securedoc_protocol::StorageResult,
    std::{collections::BTreeMap, fmt::Debug, time::Duration},
};

/// User-defined attributes attached to an object.
pub type ObjectAttributes = BTreeMap<String, String>;

/// Flat key/value blob storage with presigned read links.
#[async_trait]
pub trait ObjectStore: Debug + Send + Sync {
    async fn put(&self, key: &str, data: Vec<u8>, attributes: ObjectAttributes)
    -> StorageResult<()>;
    /// Fails with `NotFound` if the object does not exist.
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;
    /// Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;
    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String>;
}
