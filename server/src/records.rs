use {
    anyhow::{Context as _, Result, format_err},
    async_trait::async_trait,
    chrono::DateTime,
    parking_lot::Mutex,
    securedoc_protocol::{
        DateTimeUtc, DocumentId, MetadataEnvelope, StorageId, StorageRecord, StorageResult,
    },
    sqlx::{
        FromRow, PgPool, query, query_as,
        types::{Json, time::OffsetDateTime},
    },
    std::{collections::HashMap, fmt::Debug},
};

pub trait FromDb {
    type Db;
    fn from_db(value: Self::Db) -> Result<Self>
    where
        Self: Sized;
}

pub trait ToDb {
    type Db;
    fn to_db(&self) -> Result<Self::Db>;
}

impl FromDb for DateTimeUtc {
    type Db = OffsetDateTime;

    #[inline]
    fn from_db(value: Self::Db) -> Result<Self> {
        let nanos = i64::try_from(value.unix_timestamp_nanos())
            .context("timestamp out of range")?;
        Ok(DateTime::from_timestamp_nanos(nanos))
    }
}

impl ToDb for DateTimeUtc {
    type Db = OffsetDateTime;

    #[inline]
    fn to_db(&self) -> Result<Self::Db> {
        let nanos = self
            .timestamp_nanos_opt()
            .ok_or_else(|| format_err!("timestamp out of range: {self}"))?;
        Ok(OffsetDateTime::from_unix_timestamp_nanos(nanos.into())?)
    }
}

/// Persistence of [`StorageRecord`]s, keyed by storage id.
#[async_trait]
pub trait RecordStore: Debug + Send + Sync {
    async fn insert(&self, record: &StorageRecord) -> StorageResult<()>;
    async fn get(&self, id: StorageId) -> StorageResult<Option<StorageRecord>>;
    /// Returns false if there was no such record.
    async fn delete(&self, id: StorageId) -> StorageResult<bool>;
    /// Newest first.
    async fn find_by_document(&self, document_id: DocumentId)
    -> StorageResult<Vec<StorageRecord>>;
}

#[derive(Debug, FromRow)]
struct RecordRow {
    id: String,
    document_id: i64,
    provider: String,
    encryption_type: String,
    storage_location: String,
    document_hash: String,
    metadata: Json<MetadataEnvelope>,
    created_at: OffsetDateTime,
}

impl TryFrom<RecordRow> for StorageRecord {
    type Error = anyhow::Error;

    #[inline]
    fn try_from(row: RecordRow) -> Result<Self> {
        Ok(Self {
            id: row.id.parse()?,
            document_id: DocumentId(row.document_id),
            provider: row.provider.parse()?,
            encryption_type: row.encryption_type.parse()?,
            storage_location: row.storage_location,
            document_hash: row.document_hash.parse()?,
            metadata: row.metadata.0,
            created_at: DateTimeUtc::from_db(row.created_at)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    #[must_use]
    #[inline]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn insert(&self, record: &StorageRecord) -> StorageResult<()> {
        query(
            "INSERT INTO document_storage_records
                (id, document_id, provider, encryption_type, storage_location,
                 document_hash, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(record.id.to_string())
        .bind(record.document_id.0)
        .bind(record.provider.as_str())
        .bind(record.encryption_type.as_str())
        .bind(&record.storage_location)
        .bind(record.document_hash.to_string())
        .bind(Json(&record.metadata))
        .bind(record.created_at.to_db()?)
        .execute(&self.pool)
        .await
        .context("failed to insert storage record")?;
        Ok(())
    }

    async fn get(&self, id: StorageId) -> StorageResult<Option<StorageRecord>> {
        let row: Option<RecordRow> =
            query_as("SELECT * FROM document_storage_records WHERE id = $1")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .context("failed to fetch storage record")?;
        Ok(row
            .map(StorageRecord::try_from)
            .transpose()
            .with_context(|| format!("invalid storage record {id}"))?)
    }

    async fn delete(&self, id: StorageId) -> StorageResult<bool> {
        let rows = query("DELETE FROM document_storage_records WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("failed to delete storage record")?
            .rows_affected();
        Ok(rows > 0)
    }

    async fn find_by_document(
        &self,
        document_id: DocumentId,
    ) -> StorageResult<Vec<StorageRecord>> {
        let rows: Vec<RecordRow> = query_as(
            "SELECT * FROM document_storage_records
            WHERE document_id = $1
            ORDER BY created_at DESC",
        )
        .bind(document_id.0)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch storage records")?;
        Ok(rows
            .into_iter()
            .map(StorageRecord::try_from)
            .collect::<Result<Vec<_>>>()?)
    }
}

/// Process-local record store, used by tests and tooling without a database.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<StorageId, StorageRecord>>,
}

impl MemoryRecordStore {
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, record: &StorageRecord) -> StorageResult<()> {
        let mut records = self.records.lock();
        if records.contains_key(&record.id) {
            return Err(format_err!("duplicate storage id {}", record.id).into());
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn get(&self, id: StorageId) -> StorageResult<Option<StorageRecord>> {
        Ok(self.records.lock().get(&id).cloned())
    }

    async fn delete(&self, id: StorageId) -> StorageResult<bool> {
        Ok(self.records.lock().remove(&id).is_some())
    }

    async fn find_by_document(
        &self,
        document_id: DocumentId,
    ) -> StorageResult<Vec<StorageRecord>> {
        let mut records: Vec<_> = self
            .records
            .lock()
            .values()
            .filter(|record| record.document_id == document_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}
