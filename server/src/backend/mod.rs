mod local;
mod object;

pub use self::{
    local::LocalBackend,
    object::{ObjectBackend, attributes},
};
use {
    crate::records::RecordStore,
    async_trait::async_trait,
    chrono::Datelike,
    securedoc_protocol::{
        CustomMetadata, DateTimeUtc, DocumentId, EncryptionType, RetrieveOptions,
        RetrievedDocument, StorageError, StorageId, StorageOutcome, StorageProvider,
        StorageRecord, StorageResult,
    },
    std::{fmt::Debug, time::Duration},
    tracing::{info, warn},
};

/// A medium that holds encrypted documents.
///
/// `store` and `delete_document` never fail: failures are reported in the return
/// value and logged.
#[async_trait]
pub trait StorageBackend: Debug + Send + Sync {
    fn provider(&self) -> StorageProvider;

    async fn store(
        &self,
        document_id: DocumentId,
        data: &[u8],
        metadata: CustomMetadata,
        encryption_type: EncryptionType,
    ) -> StorageOutcome;

    async fn retrieve(
        &self,
        storage_id: StorageId,
        options: RetrieveOptions,
    ) -> StorageResult<RetrievedDocument>;

    async fn generate_presigned_url(
        &self,
        storage_id: StorageId,
        expires_in: Duration,
    ) -> StorageResult<String>;

    async fn delete_document(&self, storage_id: StorageId) -> bool;
}

/// Relative `year/month/day` path of the UTC date, without zero padding.
#[must_use]
#[inline]
pub fn date_partition(time: &DateTimeUtc) -> String {
    format!("{}/{}/{}", time.year(), time.month(), time.day())
}

/// Looks up a record that belongs to `provider`.
async fn load_record(
    records: &dyn RecordStore,
    storage_id: StorageId,
    provider: StorageProvider,
) -> StorageResult<StorageRecord> {
    match records.get(storage_id).await? {
        Some(record) if record.provider == provider => Ok(record),
        Some(record) => Err(StorageError::NotFound(format!(
            "storage record {storage_id} belongs to {} storage, not {provider}",
            record.provider
        ))),
        None => Err(StorageError::NotFound(format!(
            "storage record {storage_id} does not exist"
        ))),
    }
}

fn store_outcome(
    provider: StorageProvider,
    encryption_type: EncryptionType,
    result: StorageResult<(StorageRecord, String)>,
) -> StorageOutcome {
    match result {
        Ok((record, file_url)) => {
            info!(
                storage_id = %record.id,
                document_id = %record.document_id,
                %provider,
                %encryption_type,
                "stored document"
            );
            StorageOutcome::stored(&record, file_url)
        }
        Err(err) => {
            warn!(?err, %provider, %encryption_type, "failed to store document");
            StorageOutcome::failed(provider, encryption_type, &err)
        }
    }
}

fn delete_outcome(
    provider: StorageProvider,
    storage_id: StorageId,
    result: StorageResult<()>,
) -> bool {
    match result {
        Ok(()) => {
            info!(%storage_id, %provider, "deleted document");
            true
        }
        Err(err) => {
            warn!(?err, %storage_id, %provider, "failed to delete document");
            false
        }
    }
}

fn log_tampering<T>(storage_id: StorageId, result: StorageResult<T>) -> StorageResult<T> {
    if let Err(err) = &result
        && err.is_tampering()
    {
        warn!(%storage_id, %err, "stored document failed integrity check");
    }
    result
}
