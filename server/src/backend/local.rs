use {
    super::{StorageBackend, date_partition, delete_outcome, load_record, log_tampering, store_outcome},
    crate::{
        records::RecordStore,
        storage::{DocumentPaths, Storage},
    },
    anyhow::{Context as _, format_err},
    async_trait::async_trait,
    chrono::Utc,
    securedoc_protocol::{
        CustomMetadata, DocumentId, DownloadToken, EncryptionType, MetadataEnvelope,
        RetrieveOptions, RetrievedDocument, StorageError, StorageId, StorageOutcome,
        StorageProvider, StorageRecord, StorageResult, encoding::serialize,
    },
    securedoc_sdk::{
        content::{open_document, seal_document},
        crypto::Cipher,
    },
    std::{
        path::{Path, PathBuf},
        sync::Arc,
        time::Duration,
    },
    tracing::{debug, warn},
    url::Url,
};

/// Stores documents as `<root>/<year>/<month>/<day>/<id>.bin` with the encrypted
/// metadata in a `<id>_metadata.json` sidecar next to it.
#[derive(Debug)]
pub struct LocalBackend {
    storage: Storage,
    records: Arc<dyn RecordStore>,
    cipher: Arc<Cipher>,
    app_url: Option<Url>,
}

fn path_to_string(path: &Path) -> StorageResult<String> {
    Ok(path
        .to_str()
        .ok_or_else(|| format_err!("non-UTF-8 storage path: {}", path.display()))?
        .to_owned())
}

impl LocalBackend {
    #[inline]
    pub async fn new(
        root: PathBuf,
        records: Arc<dyn RecordStore>,
        cipher: Arc<Cipher>,
        app_url: Option<Url>,
    ) -> StorageResult<Self> {
        Ok(Self {
            storage: Storage::new(root).await?,
            records,
            cipher,
            app_url,
        })
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
        let paths = self
            .storage
            .document_paths(&date_partition(&created_at), id);
        let sidecar = serialize(&sealed.metadata)
            .map_err(|err| StorageError::Encryption(format!("failed to serialize metadata: {err}")))?;

        let file_url = Url::from_file_path(&paths.data)
            .map_err(|()| format_err!("cannot build file URL for {}", paths.data.display()))?;
        let record = StorageRecord {
            id,
            document_id,
            provider: StorageProvider::LocalFs,
            encryption_type,
            storage_location: path_to_string(&paths.data)?,
            document_hash: sealed.document_hash,
            metadata: MetadataEnvelope {
                metadata_path: Some(path_to_string(&paths.metadata)?),
                ..sealed.metadata
            },
            created_at,
        };

        let written = async {
            self.storage
                .commit_file(&paths.data, sealed.body.ciphertext)
                .await?;
            self.storage.commit_file(&paths.metadata, sidecar).await?;
            self.records.insert(&record).await
        }
        .await;
        if let Err(err) = written {
            self.cleanup(&paths).await;
            return Err(err);
        }

        Ok((record, file_url.into()))
    }

    async fn cleanup(&self, paths: &DocumentPaths) {
        for path in [&paths.data, &paths.metadata] {
            if let Err(err) = self.storage.remove_file(path).await {
                warn!(?err, path = %path.display(), "failed to remove file of failed store");
            }
        }
    }

    async fn try_delete(&self, storage_id: StorageId) -> StorageResult<()> {
        let record = load_record(&*self.records, storage_id, StorageProvider::LocalFs).await?;
        if !self
            .storage
            .remove_file(Path::new(&record.storage_location))
            .await?
        {
            debug!(%storage_id, "document file was already removed");
        }
        if let Some(metadata_path) = &record.metadata.metadata_path {
            self.storage.remove_file(Path::new(metadata_path)).await?;
        }
        self.records.delete(storage_id).await?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    #[inline]
    fn provider(&self) -> StorageProvider {
        StorageProvider::LocalFs
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
        let record = load_record(&*self.records, storage_id, StorageProvider::LocalFs).await?;
        let ciphertext = self
            .storage
            .read_file(Path::new(&record.storage_location))
            .await?;
        log_tampering(
            storage_id,
            open_document(&self.cipher, &record, ciphertext, options),
        )
    }

    /// The link carries a random token and an expiry; checking them is up to the
    /// download endpoint.
    async fn generate_presigned_url(
        &self,
        storage_id: StorageId,
        expires_in: Duration,
    ) -> StorageResult<String> {
        load_record(&*self.records, storage_id, StorageProvider::LocalFs).await?;
        let token = DownloadToken::generate()?;
        let expires = i64::try_from(expires_in.as_secs())
            .ok()
            .and_then(|secs| Utc::now().timestamp().checked_add(secs))
            .context("URL expiry out of range")?;
        let base = self
            .app_url
            .as_ref()
            .map_or("", |url| url.as_str().trim_end_matches('/'));
        Ok(format!(
            "{base}/api/secure-documents/{storage_id}/download?token={}&expires={expires}",
            token.display_unmasked()
        ))
    }

    async fn delete_document(&self, storage_id: StorageId) -> bool {
        let result = self.try_delete(storage_id).await;
        delete_outcome(self.provider(), storage_id, result)
    }
}
