//! Object-store adapter for immutable audit records. Write-only: the
//! service never reads an audit blob back.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use chrono::Utc;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::AppError;
use crate::ports::AuditStore;

#[derive(Clone)]
pub struct S3AuditStore {
    client: Client,
    bucket: String,
}

impl S3AuditStore {
    /// Builds the client and ensures the bucket exists. A bootstrap failure
    /// is fatal; construction refuses to return a client it could not verify.
    pub async fn new(config: &Config) -> Result<Self> {
        let base = crate::aws_base_config(config).await;
        let s3_config = aws_sdk_s3::config::Builder::from(&base)
            // Path-style addressing, required by LocalStack-compatible endpoints.
            .force_path_style(true)
            .build();
        let client = Client::from_conf(s3_config);

        ensure_bucket(&client, &config.s3_bucket)
            .await
            .with_context(|| format!("failed to ensure bucket {} exists", config.s3_bucket))?;

        info!(
            endpoint = %config.aws_endpoint,
            region = %config.aws_region,
            bucket = %config.s3_bucket,
            "S3 client initialized"
        );

        Ok(Self {
            client,
            bucket: config.s3_bucket.clone(),
        })
    }
}

async fn ensure_bucket(client: &Client, bucket: &str) -> Result<()> {
    if client.head_bucket().bucket(bucket).send().await.is_ok() {
        return Ok(());
    }

    match client.create_bucket().bucket(bucket).send().await {
        Ok(_) => Ok(()),
        Err(create_err) => {
            // A concurrent bootstrap may have won the race; check again
            // before treating the create failure as real.
            client
                .head_bucket()
                .bucket(bucket)
                .send()
                .await
                .map(|_| ())
                .with_context(|| format!("failed to create bucket: {create_err}"))
        }
    }
}

#[async_trait]
impl AuditStore for S3AuditStore {
    async fn write(&self, key: &str, body: Vec<u8>) -> Result<(), AppError> {
        debug!(bucket = %self.bucket, key = %key, "writing audit record");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| AppError::Infra(format!("failed to write audit record: {e}")))?;

        info!(bucket = %self.bucket, key = %key, "audit record written");
        Ok(())
    }

    async fn write_timestamped(&self, prefix: &str, body: Vec<u8>) -> Result<(), AppError> {
        let now = Utc::now();
        let key = format!(
            "{}/{}-{}.json",
            prefix,
            now.format("%Y-%m-%dT%H-%M-%S"),
            now.timestamp_nanos_opt().unwrap_or(0)
        );
        self.write(&key, body).await
    }

    async fn health(&self) -> Result<(), AppError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| AppError::Infra(format!("S3 health check failed: {e}")))?;
        Ok(())
    }
}
