use {
    crate::{
        Config,
        backend::{LocalBackend, ObjectBackend, StorageBackend},
        object_store::{ObjectStore, S3ObjectStore},
        records::{PgRecordStore, RecordStore},
    },
    anyhow::Context as _,
    securedoc_protocol::{
        CustomMetadata, DocumentId, IntegrityReport, RetrieveOptions, RetrievedDocument,
        StorageError, StorageId, StorageOutcome, StorageProvider, StorageRecord, StorageResult,
        StoreOptions,
    },
    securedoc_sdk::crypto::Cipher,
    sqlx::PgPool,
    std::{collections::HashMap, sync::Arc, time::Duration},
    tracing::{info, warn},
};

/// Entry point for storing and reading documents.
///
/// New documents go to the default backend unless the caller picks one.
/// Existing documents are always served by the backend recorded for them.
#[derive(Debug)]
pub struct SecureStorage {
    records: Arc<dyn RecordStore>,
    backends: HashMap<StorageProvider, Arc<dyn StorageBackend>>,
    default_provider: StorageProvider,
    url_ttl: Duration,
}

impl SecureStorage {
    /// `url_ttl` is used when a presigned URL is requested without an explicit expiry.
    #[must_use]
    #[inline]
    pub fn new(
        records: Arc<dyn RecordStore>,
        default_provider: StorageProvider,
        url_ttl: Duration,
    ) -> Self {
        Self {
            records,
            backends: HashMap::new(),
            default_provider,
            url_ttl,
        }
    }

    #[must_use]
    #[inline]
    pub fn with_backend(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.backends.insert(backend.provider(), backend);
        self
    }

    /// Connects to the database and sets up every backend the configuration allows.
    ///
    /// Fails with a configuration error if no encryption secret is set.
    #[inline]
    pub async fn from_config(config: &Config) -> StorageResult<Self> {
        let secret = config.encryption_secret.as_ref().ok_or_else(|| {
            StorageError::Configuration("ENCRYPTION_KEY is required for secure storage".into())
        })?;
        let cipher = Arc::new(Cipher::derive(secret)?);
        let pool = PgPool::connect(&config.database_url)
            .await
            .context("failed to connect to database")?;
        let records: Arc<dyn RecordStore> = Arc::new(PgRecordStore::new(pool));
        let object_store: Option<Arc<dyn ObjectStore>> = if config.has_object_store() {
            Some(Arc::new(S3ObjectStore::from_config(config)?))
        } else {
            None
        };
        Self::with_parts(config, records, cipher, object_store).await
    }

    /// Like [`SecureStorage::from_config`], with the record store, key and object
    /// store supplied by the caller.
    #[inline]
    pub async fn with_parts(
        config: &Config,
        records: Arc<dyn RecordStore>,
        cipher: Arc<Cipher>,
        object_store: Option<Arc<dyn ObjectStore>>,
    ) -> StorageResult<Self> {
        let local = LocalBackend::new(
            config.local_storage_dir.clone(),
            Arc::clone(&records),
            Arc::clone(&cipher),
            config.app_url.clone(),
        )
        .await;
        let default_provider = if object_store.is_some() {
            StorageProvider::ObjectStore
        } else {
            StorageProvider::LocalFs
        };
        let mut storage = Self::new(Arc::clone(&records), default_provider, config.presigned_url_ttl);
        match local {
            Ok(local) => storage = storage.with_backend(Arc::new(local)),
            // Object store deployments keep working without a writable local directory.
            Err(err) if object_store.is_some() => {
                warn!(
                    ?err,
                    dir = %config.local_storage_dir.display(),
                    "local storage is unavailable"
                );
            }
            Err(err) => return Err(err),
        }
        if let Some(object_store) = object_store {
            storage = storage.with_backend(Arc::new(ObjectBackend::new(
                object_store,
                records,
                cipher,
                config.presigned_url_ttl,
            )));
        }
        info!(%default_provider, "secure storage initialized");
        Ok(storage)
    }

    #[must_use]
    #[inline]
    pub const fn default_provider(&self) -> StorageProvider {
        self.default_provider
    }

    #[inline]
    pub fn set_default_provider(&mut self, provider: StorageProvider) {
        self.default_provider = provider;
    }

    fn backend(&self, provider: StorageProvider) -> StorageResult<&Arc<dyn StorageBackend>> {
        self.backends.get(&provider).ok_or_else(|| {
            StorageError::Configuration(format!("{provider} storage is not configured"))
        })
    }

    async fn record(&self, storage_id: StorageId) -> StorageResult<StorageRecord> {
        self.records.get(storage_id).await?.ok_or_else(|| {
            StorageError::NotFound(format!("storage record {storage_id} does not exist"))
        })
    }

    /// Never fails; check `success` on the outcome.
    #[inline]
    pub async fn store_document(
        &self,
        document_id: DocumentId,
        data: &[u8],
        metadata: CustomMetadata,
        options: StoreOptions,
    ) -> StorageOutcome {
        let provider = options.provider.unwrap_or(self.default_provider);
        let encryption_type = options.encryption_type.unwrap_or_default();
        match self.backend(provider) {
            Ok(backend) => {
                backend
                    .store(document_id, data, metadata, encryption_type)
                    .await
            }
            Err(err) => {
                warn!(?err, %document_id, "cannot store document");
                StorageOutcome::failed(provider, encryption_type, &err)
            }
        }
    }

    #[inline]
    pub async fn retrieve_document(
        &self,
        storage_id: StorageId,
        options: RetrieveOptions,
    ) -> StorageResult<RetrievedDocument> {
        let record = self.record(storage_id).await?;
        self.backend(record.provider)?
            .retrieve(storage_id, options)
            .await
    }

    /// Without `expires_in`, the configured URL lifetime is used.
    #[inline]
    pub async fn generate_presigned_url(
        &self,
        storage_id: StorageId,
        expires_in: Option<Duration>,
    ) -> StorageResult<String> {
        let record = self.record(storage_id).await?;
        self.backend(record.provider)?
            .generate_presigned_url(storage_id, expires_in.unwrap_or(self.url_ttl))
            .await
    }

    /// Returns false on any failure, including an unknown storage id.
    #[inline]
    pub async fn delete_document(&self, storage_id: StorageId) -> bool {
        let record = match self.record(storage_id).await {
            Ok(record) => record,
            Err(err) => {
                warn!(?err, %storage_id, "cannot delete document");
                return false;
            }
        };
        match self.backend(record.provider) {
            Ok(backend) => backend.delete_document(storage_id).await,
            Err(err) => {
                warn!(?err, %storage_id, "cannot delete document");
                false
            }
        }
    }

    /// Decrypts the document and checks its hash. The plaintext is discarded.
    #[inline]
    pub async fn verify_document_integrity(&self, storage_id: StorageId) -> IntegrityReport {
        match self
            .retrieve_document(storage_id, RetrieveOptions::default())
            .await
        {
            Ok(document) => IntegrityReport::valid(document.metadata.document_hash),
            Err(err) => IntegrityReport::invalid(&err),
        }
    }

    /// All stored versions of a document, newest first.
    #[inline]
    pub async fn find_records(&self, document_id: DocumentId) -> StorageResult<Vec<StorageRecord>> {
        self.records.find_by_document(document_id).await
    }
}
