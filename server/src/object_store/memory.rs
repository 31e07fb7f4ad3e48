use {
    super::{ObjectAttributes, ObjectStore},
    async_trait::async_trait,
    parking_lot::Mutex,
    securedoc_protocol::{StorageError, StorageResult},
    std::{collections::HashMap, time::Duration},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub attributes: ObjectAttributes,
}

/// In-process object store. Presigned links use the `memory://` scheme.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, StoredObject>>,
}

impl MemoryObjectStore {
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    #[inline]
    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().get(key).cloned()
    }

    #[inline]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.objects.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Overwrites the stored bytes, keeping attributes. Returns false if the key is absent.
    #[inline]
    pub fn replace_data(&self, key: &str, data: Vec<u8>) -> bool {
        match self.objects.lock().get_mut(key) {
            Some(object) => {
                object.data = data;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        attributes: ObjectAttributes,
    ) -> StorageResult<()> {
        self.objects
            .lock()
            .insert(key.to_owned(), StoredObject { data, attributes });
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.objects
            .lock()
            .get(key)
            .map(|object| object.data.clone())
            .ok_or_else(|| StorageError::NotFound(format!("object {key:?} does not exist")))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.objects.lock().remove(key);
        Ok(())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        Ok(format!("memory:///{key}?expires_in={}", expires_in.as_secs()))
    }
}
