use {
    super::{StorageBackend, date_partition, delete_outcome, load_record, log_tampering, store_outcome},
    crate::{
        object_store::{ObjectAttributes, ObjectStore},
        records::RecordStore,
    },
    async_trait::async_trait,
    chrono::Utc,
    securedoc_protocol::{
        CustomMetadata, DocumentId, EncryptionType, RetrieveOptions, RetrievedDocument,
        StorageError, StorageId, StorageOutcome, StorageProvider, StorageRecord, StorageResult,
    },
    securedoc_sdk::{
        content::{SealedDocument, open_document, seal_document},
        crypto::Cipher,
    },
    std::{sync::Arc, time::Duration},
    tracing::warn,
};

/// Attribute names as sent to S3. The service adds the `x-amz-meta-` prefix.
pub mod attributes {
    pub const ENCRYPTED: &str = "encrypted";
    pub const ENCRYPTION_TYPE: &str = "encryption-type";
    pub const DOCUMENT_HASH: &str = "document-hash";
    pub const METADATA_IV: &str = "metadata-iv";
    pub const METADATA_AUTH_TAG: &str = "metadata-auth-tag";
    pub const ENCRYPTED_METADATA: &str = "encrypted-metadata";
}

/// Stores documents under `documents/<year>/<month>/<day>/<id>.bin` in an object
/// store, with the encrypted metadata attached as object attributes.
#[derive(Debug)]
pub struct ObjectBackend {
    store: Arc<dyn ObjectStore>,
    records: Arc<dyn RecordStore>,
    cipher: Arc<Cipher>,
    url_ttl: Duration,
}

fn object_attributes(sealed: &SealedDocument) -> ObjectAttributes {
    let mut map = ObjectAttributes::from([
        (attributes::ENCRYPTED.to_owned(), "true".to_owned()),
        (
            attributes::ENCRYPTION_TYPE.to_owned(),
            sealed.encryption_type.to_string(),
        ),
        (
            attributes::DOCUMENT_HASH.to_owned(),
            sealed.document_hash.to_string(),
        ),
        (
            attributes::METADATA_IV.to_owned(),
            sealed.metadata.metadata_iv.clone(),
        ),
        (
            attributes::ENCRYPTED_METADATA.to_owned(),
            sealed.metadata.encrypted_metadata_base64.clone(),
        ),
    ]);
    if let Some(tag) = &sealed.metadata.metadata_auth_tag {
        map.insert(attributes::METADATA_AUTH_TAG.to_owned(), tag.clone());
    }
    map
}

impl ObjectBackend {
    /// `url_ttl` is the lifetime of the link returned by `store`.
    #[must_use]
    #[inline]
    pub fn new(
        store: Arc<dyn ObjectStore>,
        records: Arc<dyn RecordStore>,
        cipher: Arc<Cipher>,
        url_ttl: Duration,
    ) -> Self {
        Self {
            store,
            records,
            cipher,
            url_ttl,
        }
    }

    async fn try_store(
        &self,
        document_id: DocumentId,
        data: &[u8],
        metadata: CustomMetadata,
        encryption_type: EncryptionType,
    ) -> StorageResult<(StorageRecord, String)> {
        let id = StorageId::generate();
        let created_at = Utc::now();
        let sealed = seal_document(&self.cipher, document_id, data, metadata, encryption_type)?;
        let key = format!("documents/{}/{id}.bin", date_partition(&created_at));
        let attributes = object_attributes(&sealed);

        self.store
            .put(&key, sealed.body.ciphertext, attributes)
            .await?;
        let record = StorageRecord {
            id,
            document_id,
            provider: StorageProvider::ObjectStore,
            encryption_type,
            storage_location: key,
            document_hash: sealed.document_hash,
            metadata: sealed.metadata,
            created_at,
        };
        let linked = async {
            let file_url = self
                .store
                .presign_get(&record.storage_location, self.url_ttl)
                .await?;
            self.records.insert(&record).await?;
            Ok::<_, StorageError>(file_url)
        }
        .await;
        match linked {
            Ok(file_url) => Ok((record, file_url)),
            Err(err) => {
                if let Err(cleanup_err) = self.store.delete(&record.storage_location).await {
                    warn!(
                        err = ?cleanup_err,
                        key = %record.storage_location,
                        "failed to remove object of failed store"
                    );
                }
                Err(err)
            }
        }
    }

    async fn try_delete(&self, storage_id: StorageId) -> StorageResult<()> {
        let record =
            load_record(&*self.records, storage_id, StorageProvider::ObjectStore).await?;
        self.store.delete(&record.storage_location).await?;
        self.records.delete(storage_id).await?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for ObjectBackend {
    #[inline]
    fn provider(&self) -> StorageProvider {
        StorageProvider::ObjectStore
    }

    async fn store(
        &self,
        document_id: DocumentId,
        data: &[u8],
        metadata: CustomMetadata,
        encryption_type: EncryptionType,
    ) -> StorageOutcome {
        let result = self
            .try_store(document_id, data, metadata, encryption_type)
            .await;
        store_outcome(self.provider(), encryption_type, result)
    }

    async fn retrieve(
        &self,
        storage_id: StorageId,
        options: RetrieveOptions,
    ) -> StorageResult<RetrievedDocument> {
        let record =
            load_record(&*self.records, storage_id, StorageProvider::ObjectStore).await?;
        let ciphertext = self.store.get(&record.storage_location).await?;
        log_tampering(
            storage_id,
            open_document(&self.cipher, &record, ciphertext, options),
        )
    }

    async fn generate_presigned_url(
        &self,
        storage_id: StorageId,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let record =
            load_record(&*self.records, storage_id, StorageProvider::ObjectStore).await?;
        self.store
            .presign_get(&record.storage_location, expires_in)
            .await
    }

    async fn delete_document(&self, storage_id: StorageId) -> bool {
        let result = self.try_delete(storage_id).await;
        delete_outcome(self.provider(), storage_id, result)
    }
}
