mod random;

use {
    anyhow::{Context as _, Result, bail, ensure},
    fs_err::File,
    rand::{Rng, seq::IndexedRandom},
    random::{random_content, random_document_id, random_metadata, random_options, random_title},
    securedoc_protocol::{
        DocumentId, RetrieveOptions, StorageId, StorageProvider, StorageRecord,
    },
    securedoc_sdk::{content::document_hash, crypto::Cipher},
    securedoc_server::{
        Config, SecureStorage,
        object_store::{MemoryObjectStore, ObjectStore},
        records::{PgRecordStore, RecordStore},
        util::migrate,
    },
    serde_json::json,
    sqlx::{PgPool, query},
    std::{
        collections::{BTreeMap, BTreeSet},
        env,
        path::Path,
        sync::{Arc, Mutex},
        time::Duration,
    },
    tempfile::TempDir,
    tracing::{debug, info},
    tracing_subscriber::{EnvFilter, util::SubscriberInitExt},
};

const ITERATIONS: usize = 500;

#[derive(Debug)]
struct Expected {
    document_id: DocumentId,
    data: Vec<u8>,
    title: String,
    provider: StorageProvider,
    tampered: bool,
}

struct Context {
    storage: SecureStorage,
    records: Arc<PgRecordStore>,
    objects: Arc<MemoryObjectStore>,
    expected: BTreeMap<StorageId, Expected>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = try_main().await {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

async fn try_main() -> Result<()> {
    let dir = TempDir::new()?.keep();
    println!("dir: {}", dir.display());

    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(Mutex::new(File::create(dir.join("1.log"))?))
        .with_env_filter(EnvFilter::try_new("info,sqlx=warn,securedoc_server=debug")?)
        .finish()
        .init();

    let database_url = env::args().nth(1).context("missing database url argument")?;
    let pool = PgPool::connect(&database_url).await?;
    migrate(&pool).await?;
    query("DELETE FROM document_storage_records")
        .execute(&pool)
        .await?;

    let config: Config = serde_json::from_value(json!({
        "database_url": database_url,
        "encryption_secret": "randomized end-to-end secret",
        "local_storage_dir": dir.join("documents"),
        "app_url": "https://notaria.example.cl",
    }))?;
    let secret = config
        .encryption_secret
        .as_ref()
        .context("missing encryption secret")?;
    let records = Arc::new(PgRecordStore::new(pool));
    let objects = Arc::new(MemoryObjectStore::new());
    let storage = SecureStorage::with_parts(
        &config,
        Arc::clone(&records) as Arc<dyn RecordStore>,
        Arc::new(Cipher::derive(secret)?),
        Some(Arc::clone(&objects) as Arc<dyn ObjectStore>),
    )
    .await?;

    let mut ctx = Context {
        storage,
        records,
        objects,
        expected: BTreeMap::new(),
    };
    for iteration in 0..ITERATIONS {
        let action = rand::rng().random_range(0..10);
        debug!(iteration, action, "next action");
        match action {
            0..=3 => check_store(&mut ctx).await?,
            4 | 5 => {
                if let Some(id) = random_id(&ctx) {
                    check_retrieve(&ctx, id).await?;
                }
            }
            6 => {
                if let Some(id) = random_id(&ctx) {
                    check_delete(&mut ctx, id).await?;
                }
            }
            7 => {
                if let Some(id) = random_id(&ctx) {
                    tamper(&mut ctx, id).await?;
                    check_retrieve(&ctx, id).await?;
                }
            }
            8 => {
                if let Some(id) = random_id(&ctx) {
                    check_presigned_url(&ctx, id).await?;
                }
            }
            _ => {
                if let Some(id) = random_id(&ctx) {
                    check_verify(&ctx, id).await?;
                }
            }
        }
    }

    for &id in ctx.expected.keys() {
        check_retrieve(&ctx, id).await?;
        check_verify(&ctx, id).await?;
    }
    check_records(&ctx).await?;
    info!(documents = ctx.expected.len(), "done");
    println!("Ok. {} documents left in storage.", ctx.expected.len());
    Ok(())
}

fn random_id(ctx: &Context) -> Option<StorageId> {
    let ids: Vec<StorageId> = ctx.expected.keys().copied().collect();
    ids.choose(&mut rand::rng()).copied()
}

async fn record(ctx: &Context, id: StorageId) -> Result<StorageRecord> {
    ctx.records
        .get(id)
        .await?
        .with_context(|| format!("record {id} is missing"))
}

async fn check_store(ctx: &mut Context) -> Result<()> {
    let document_id = random_document_id();
    let data = random_content();
    let title = random_title();
    let options = random_options();
    let outcome = ctx
        .storage
        .store_document(document_id, &data, random_metadata(&title), options)
        .await;
    ensure!(outcome.success, "store failed: {outcome:?}");
    ensure!(
        outcome.provider == options.provider.unwrap_or(StorageProvider::ObjectStore),
        "unexpected provider: {outcome:?}"
    );
    ensure!(
        outcome.encryption_type == options.encryption_type.unwrap_or_default(),
        "unexpected encryption type: {outcome:?}"
    );
    ensure!(outcome.document_hash == Some(document_hash(&data)));
    debug!(storage_id = %outcome.storage_id, len = data.len(), "stored");
    ctx.expected.insert(
        outcome.storage_id,
        Expected {
            document_id,
            data,
            title,
            provider: outcome.provider,
            tampered: false,
        },
    );
    Ok(())
}

async fn check_retrieve(ctx: &Context, id: StorageId) -> Result<()> {
    let expected = ctx.expected.get(&id).context("unknown id")?;
    let result = ctx
        .storage
        .retrieve_document(id, RetrieveOptions::default())
        .await;
    if expected.tampered {
        match result {
            Ok(_) => bail!("tampered document {id} was returned"),
            Err(err) if err.is_tampering() => return Ok(()),
            Err(err) => bail!("unexpected error for tampered document {id}: {err:?}"),
        }
    }
    let document = result?;
    ensure!(document.data == expected.data, "content mismatch for {id}");
    ensure!(document.metadata.document_id == expected.document_id);
    ensure!(document.metadata.get("title") == Some(&json!(expected.title)));
    ensure!(document.metadata.document_hash == document_hash(&expected.data));

    let raw = ctx
        .storage
        .retrieve_document(id, RetrieveOptions { decrypt: false })
        .await?;
    ensure!(
        expected.data.is_empty() || raw.data != expected.data,
        "raw retrieval returned plaintext for {id}"
    );
    Ok(())
}

async fn check_delete(ctx: &mut Context, id: StorageId) -> Result<()> {
    let record = record(ctx, id).await?;
    ensure!(ctx.storage.delete_document(id).await, "delete failed for {id}");
    ctx.expected.remove(&id);
    let err = match ctx
        .storage
        .retrieve_document(id, RetrieveOptions::default())
        .await
    {
        Ok(_) => bail!("deleted document {id} is still readable"),
        Err(err) => err,
    };
    ensure!(err.is_not_found(), "unexpected error after delete: {err:?}");
    match record.provider {
        StorageProvider::LocalFs => {
            ensure!(!Path::new(&record.storage_location).try_exists()?);
            if let Some(path) = &record.metadata.metadata_path {
                ensure!(!Path::new(path).try_exists()?);
            }
        }
        StorageProvider::ObjectStore => {
            ensure!(ctx.objects.object(&record.storage_location).is_none());
        }
    }
    Ok(())
}

/// Flips one bit of the stored ciphertext. Empty ciphertexts are left alone.
async fn tamper(ctx: &mut Context, id: StorageId) -> Result<()> {
    if ctx.expected.get(&id).is_some_and(|expected| expected.tampered) {
        return Ok(());
    }
    let record = record(ctx, id).await?;
    let mut bytes = match record.provider {
        StorageProvider::LocalFs => fs_err::read(&record.storage_location)?,
        StorageProvider::ObjectStore => ctx
            .objects
            .object(&record.storage_location)
            .context("object is missing")?
            .data,
    };
    if bytes.is_empty() {
        return Ok(());
    }
    let mut rng = rand::rng();
    let index = rng.random_range(0..bytes.len());
    let bit = rng.random_range(0..8_u32);
    if let Some(byte) = bytes.get_mut(index) {
        *byte ^= 1 << bit;
    }
    match record.provider {
        StorageProvider::LocalFs => fs_err::write(&record.storage_location, bytes)?,
        StorageProvider::ObjectStore => {
            ensure!(ctx.objects.replace_data(&record.storage_location, bytes));
        }
    }
    debug!(%id, index, bit, "tampered");
    if let Some(expected) = ctx.expected.get_mut(&id) {
        expected.tampered = true;
    }
    Ok(())
}

async fn check_presigned_url(ctx: &Context, id: StorageId) -> Result<()> {
    let expected = ctx.expected.get(&id).context("unknown id")?;
    let url = ctx
        .storage
        .generate_presigned_url(id, Some(Duration::from_secs(300)))
        .await?;
    match expected.provider {
        StorageProvider::LocalFs => ensure!(
            url.starts_with(&format!(
                "https://notaria.example.cl/api/secure-documents/{id}/download?token="
            )),
            "unexpected download URL: {url}"
        ),
        StorageProvider::ObjectStore => ensure!(
            url.starts_with("memory:///documents/") && url.ends_with("expires_in=300"),
            "unexpected presigned URL: {url}"
        ),
    }
    Ok(())
}

async fn check_verify(ctx: &Context, id: StorageId) -> Result<()> {
    let expected = ctx.expected.get(&id).context("unknown id")?;
    let report = ctx.storage.verify_document_integrity(id).await;
    ensure!(
        report.is_valid != expected.tampered,
        "unexpected integrity report for {id}: {report:?}"
    );
    if !expected.tampered {
        ensure!(report.document_hash == Some(document_hash(&expected.data)));
    }
    Ok(())
}

async fn check_records(ctx: &Context) -> Result<()> {
    let document_ids: BTreeSet<DocumentId> = ctx
        .expected
        .values()
        .map(|expected| expected.document_id)
        .collect();
    for document_id in document_ids {
        let records = ctx.storage.find_records(document_id).await?;
        let actual: BTreeSet<StorageId> = records.iter().map(|record| record.id).collect();
        let expected: BTreeSet<StorageId> = ctx
            .expected
            .iter()
            .filter(|(_, expected)| expected.document_id == document_id)
            .map(|(id, _)| *id)
            .collect();
        ensure!(actual == expected, "record mismatch for document {document_id}");
        ensure!(
            records
                .windows(2)
                .all(|pair| pair.first().map(|r| r.created_at) >= pair.get(1).map(|r| r.created_at)),
            "records of document {document_id} are not ordered newest first"
        );
    }
    Ok(())
}
