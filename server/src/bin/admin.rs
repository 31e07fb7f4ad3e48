use {
    anyhow::{Context as _, Result, bail},
    clap::{Parser, Subcommand},
    securedoc_protocol::{
        CustomMetadata, DocumentId, EncryptionType, RetrieveOptions, StorageId, StorageProvider,
        StoreOptions,
    },
    securedoc_server::{Config, SecureStorage, util::init_logging},
    sqlx::PgPool,
    std::{path::PathBuf, time::Duration},
};

#[derive(Debug, Parser)]
#[clap(about = "Administration tool for secure document storage")]
pub struct Cli {
    /// json5 config file. Configuration is read from the environment if omitted.
    #[clap(long)]
    pub config: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Create or update the database schema.
    Migrate,
    /// Encrypt and store a file.
    Store {
        document_id: i64,
        file: PathBuf,
        /// JSON object stored, encrypted, alongside the document.
        #[clap(long)]
        metadata: Option<String>,
        #[clap(long)]
        provider: Option<StorageProvider>,
        #[clap(long)]
        encryption_type: Option<EncryptionType>,
    },
    /// Decrypt a stored document into a file.
    Retrieve {
        storage_id: StorageId,
        output: PathBuf,
        /// Write the ciphertext without decrypting or checking the hash.
        #[clap(long)]
        raw: bool,
    },
    PresignedUrl {
        storage_id: StorageId,
        #[clap(long, value_parser = humantime::parse_duration)]
        expires_in: Option<Duration>,
    },
    Delete {
        storage_id: StorageId,
    },
    Verify {
        storage_id: StorageId,
    },
    /// List stored versions of a document.
    Records {
        document_id: i64,
    },
}

fn parse_metadata(metadata: Option<&str>) -> Result<CustomMetadata> {
    let Some(metadata) = metadata else {
        return Ok(CustomMetadata::new());
    };
    match serde_json::from_str(metadata).context("invalid metadata")? {
        serde_json::Value::Object(map) => Ok(map),
        _ => bail!("metadata must be a JSON object"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::parse(path)?,
        None => Config::from_env()?,
    };
    init_logging(&config)?;

    if cli.command == Command::Migrate {
        let pool = PgPool::connect(&config.database_url).await?;
        println!("Running migrations...");
        securedoc_server::util::migrate(&pool).await?;
        println!("Done");
        return Ok(());
    }

    let storage = SecureStorage::from_config(&config).await?;
    match cli.command {
        Command::Migrate => {}
        Command::Store {
            document_id,
            file,
            metadata,
            provider,
            encryption_type,
        } => {
            let data = fs_err::tokio::read(&file).await?;
            let outcome = storage
                .store_document(
                    DocumentId(document_id),
                    &data,
                    parse_metadata(metadata.as_deref())?,
                    StoreOptions {
                        provider,
                        encryption_type,
                    },
                )
                .await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.success {
                bail!("failed to store {}", file.display());
            }
        }
        Command::Retrieve {
            storage_id,
            output,
            raw,
        } => {
            let document = storage
                .retrieve_document(storage_id, RetrieveOptions { decrypt: !raw })
                .await?;
            fs_err::tokio::write(&output, &document.data).await?;
            println!("{}", serde_json::to_string_pretty(&document.metadata)?);
        }
        Command::PresignedUrl {
            storage_id,
            expires_in,
        } => {
            println!(
                "{}",
                storage.generate_presigned_url(storage_id, expires_in).await?
            );
        }
        Command::Delete { storage_id } => {
            if !storage.delete_document(storage_id).await {
                bail!("failed to delete {storage_id}");
            }
            println!("Deleted {storage_id}");
        }
        Command::Verify { storage_id } => {
            let report = storage.verify_document_integrity(storage_id).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_valid {
                bail!("integrity check failed for {storage_id}");
            }
        }
        Command::Records { document_id } => {
            let records = storage.find_records(DocumentId(document_id)).await?;
            if records.is_empty() {
                println!("No stored versions.");
            }
            for record in records {
                println!(
                    "{}  {}  {}  {}  {}",
                    record.created_at, record.id, record.provider, record.encryption_type,
                    record.document_hash
                );
            }
        }
    }
    Ok(())
}
