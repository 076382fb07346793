use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use tracing::debug;

use crate::config::StorageConfig;

/// Object-storage collaborator. Deleting a key that does not exist is not an
/// error; the cleanup paths rely on that.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
    /// All object keys under the given prefix.
    async fn list_keys(&self, prefix: &str) -> anyhow::Result<Vec<String>>;
    /// Delete every object under the given prefix. Returns how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> anyhow::Result<usize>;
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
}

impl Storage {
    pub async fn new(cfg: &StorageConfig) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
        })
    }
}

#[async_trait]
impl StorageClient for Storage {
    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("s3 delete_object {key}"))?;
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .with_context(|| format!("s3 list_objects_v2 {prefix}"))?;
            for obj in resp.contents() {
                if let Some(key) = obj.key() {
                    keys.push(key.to_string());
                }
            }
            match resp.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }
        Ok(keys)
    }

    async fn delete_prefix(&self, prefix: &str) -> anyhow::Result<usize> {
        let keys = self.list_keys(prefix).await?;
        for key in &keys {
            self.delete_object(key).await?;
        }
        debug!(prefix, removed = keys.len(), "deleted storage prefix");
        Ok(keys.len())
    }
}
