use {
    super::{ObjectAttributes, ObjectStore},
    crate::Config,
    anyhow::format_err,
    async_trait::async_trait,
    aws_sdk_s3::{
        Client,
        config::{BehaviorVersion, Credentials, Region},
        error::SdkError,
        presigning::PresigningConfig,
        primitives::ByteStream,
    },
    securedoc_protocol::{StorageError, StorageResult},
    std::{fmt, time::Duration},
};

const CONTENT_TYPE: &str = "application/octet-stream";

/// S3-compatible object storage (AWS S3, Minio and similar).
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    #[must_use]
    #[inline]
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Builds a client from static credentials. Fails if credentials or bucket are missing.
    #[inline]
    pub fn from_config(config: &Config) -> StorageResult<Self> {
        let (Some(access_key), Some(secret_key), Some(bucket)) = (
            &config.aws_access_key_id,
            &config.aws_secret_access_key,
            &config.s3_bucket_name,
        ) else {
            return Err(StorageError::Configuration(
                "object storage requires AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY and S3_BUCKET_NAME"
                    .into(),
            ));
        };
        let credentials = Credentials::new(access_key, secret_key, None, None, "securedoc");
        let mut builder = aws_sdk_s3::Config::builder()
            .region(Region::new(config.aws_region.clone()))
            .credentials_provider(credentials)
            .behavior_version(BehaviorVersion::latest());
        if let Some(endpoint) = &config.s3_endpoint {
            builder = builder
                .endpoint_url(endpoint.as_str().trim_end_matches('/'))
                .force_path_style(true);
        }
        Ok(Self::new(Client::from_conf(builder.build()), bucket))
    }
}

impl fmt::Debug for S3ObjectStore {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3ObjectStore")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

fn is_not_found<E>(err: &SdkError<E>) -> bool {
    matches!(err, SdkError::ServiceError(e) if e.raw().status().as_u16() == 404)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        attributes: ObjectAttributes,
    ) -> StorageResult<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(CONTENT_TYPE)
            .body(ByteStream::from(data));
        for (name, value) in attributes {
            request = request.metadata(name, value);
        }
        request
            .send()
            .await
            .map_err(|err| format_err!("S3 PUT failed for {key:?}: {err}"))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if is_not_found(&err) {
                    StorageError::NotFound(format!("object {key:?} does not exist"))
                } else {
                    format_err!("S3 GET failed for {key:?}: {err}").into()
                }
            })?;
        let data = response
            .body
            .collect()
            .await
            .map_err(|err| format_err!("failed to read body of {key:?}: {err}"))?
            .into_bytes()
            .to_vec();
        Ok(data)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| format_err!("S3 DELETE failed for {key:?}: {err}"))?;
        Ok(())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|err| StorageError::Configuration(format!("invalid URL expiry: {err}")))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|err| format_err!("failed to presign {key:?}: {err}"))?;
        Ok(request.uri().to_owned())
    }
}
