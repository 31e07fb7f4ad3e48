use {
    anyhow::{Context as _, Result},
    derivative::Derivative,
    securedoc_protocol::{EncryptionSecret, StorageProvider},
    serde::{Deserialize, Serialize},
    std::{
        env,
        path::{Path, PathBuf},
        time::Duration,
    },
    url::Url,
};

#[derive(Derivative, Clone, Serialize, Deserialize)]
#[derivative(Debug)]
pub struct Config {
    pub database_url: String,
    /// Secret from which the encryption key is derived. Backends refuse to start
    /// without it.
    #[serde(default)]
    #[derivative(Debug = "ignore")]
    pub encryption_secret: Option<EncryptionSecret>,

    #[serde(default)]
    pub aws_access_key_id: Option<String>,
    #[serde(default)]
    #[derivative(Debug = "ignore")]
    pub aws_secret_access_key: Option<String>,
    #[serde(default = "default_aws_region")]
    pub aws_region: String,
    #[serde(default)]
    pub s3_bucket_name: Option<String>,
    /// Custom endpoint for S3-compatible services. Enables path-style addressing.
    #[serde(default)]
    pub s3_endpoint: Option<Url>,

    #[serde(default = "default_local_storage_dir")]
    pub local_storage_dir: PathBuf,
    /// Base of filesystem download links. Links are relative if unset.
    #[serde(default)]
    pub app_url: Option<Url>,
    #[serde(default = "default_presigned_url_ttl", with = "humantime_serde")]
    pub presigned_url_ttl: Duration,

    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_aws_region() -> String {
    "us-east-1".into()
}

fn default_local_storage_dir() -> PathBuf {
    "./uploads/secure-documents".into()
}

fn default_presigned_url_ttl() -> Duration {
    Duration::from_secs(3600)
}

fn default_log_filter() -> String {
    "info".into()
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

impl Config {
    #[inline]
    pub fn parse(path: impl AsRef<Path>) -> Result<Self> {
        json5::from_str(&fs_err::read_to_string(path)?).context("failed to parse config")
    }

    /// Reads the configuration from the process environment.
    #[inline]
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL is not set")?,
            encryption_secret: non_empty_var("ENCRYPTION_KEY")
                .map(|value| value.parse())
                .transpose()?,
            aws_access_key_id: non_empty_var("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: non_empty_var("AWS_SECRET_ACCESS_KEY"),
            aws_region: non_empty_var("AWS_REGION").unwrap_or_else(default_aws_region),
            s3_bucket_name: non_empty_var("S3_BUCKET_NAME"),
            s3_endpoint: non_empty_var("S3_ENDPOINT")
                .map(|value| value.parse())
                .transpose()
                .context("invalid S3_ENDPOINT")?,
            local_storage_dir: non_empty_var("LOCAL_STORAGE_DIR")
                .map_or_else(default_local_storage_dir, PathBuf::from),
            app_url: non_empty_var("APP_URL")
                .map(|value| value.parse())
                .transpose()
                .context("invalid APP_URL")?,
            presigned_url_ttl: non_empty_var("PRESIGNED_URL_TTL")
                .map(|value| humantime::parse_duration(&value))
                .transpose()
                .context("invalid PRESIGNED_URL_TTL")?
                .unwrap_or_else(default_presigned_url_ttl),
            log_file: non_empty_var("LOG_FILE").map(PathBuf::from),
            log_filter: non_empty_var("LOG_FILTER").unwrap_or_else(default_log_filter),
        })
    }

    /// Object storage is usable only when both credentials and the bucket are set.
    #[must_use]
    #[inline]
    pub const fn has_object_store(&self) -> bool {
        self.aws_access_key_id.is_some()
            && self.aws_secret_access_key.is_some()
            && self.s3_bucket_name.is_some()
    }

    #[must_use]
    #[inline]
    pub const fn default_provider(&self) -> StorageProvider {
        if self.has_object_store() {
            StorageProvider::ObjectStore
        } else {
            StorageProvider::LocalFs
        }
    }
}
