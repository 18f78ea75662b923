//! Remote store gateway.
//!
//! Reads probe the public blob host first and fall back to the API proxy
//! when the direct path fails: direct URLs can be blocked, anonymous access
//! disabled, or an edge cache can serve a stale miss for a just-written
//! blob. Writes always go through the API, which is the only holder of the
//! store's write token. Every request carries a cache-busting timestamp
//! because blobs are addressed by key, not by content.

use crate::api_client::BackupApiClient;
use crate::config::BackupConfig;
use crate::error::CloudResult;
use crate::types::{now_millis, BlobKey, BlobProbe};
use reqwest::Client;
use std::sync::Arc;
use tracing::debug;

/// Blob operations with direct-then-API fallback.
#[derive(Clone)]
pub struct BlobGateway {
    client: Client,
    api: Arc<BackupApiClient>,
    config: BackupConfig,
}

impl BlobGateway {
    pub fn new(config: BackupConfig, api: Arc<BackupApiClient>) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            api,
            config,
        }
    }

    /// Uploads content for `key`, replacing any existing blob. Returns the
    /// blob's public URL.
    pub async fn put_blob(&self, key: &BlobKey, content: &str) -> CloudResult<String> {
        self.api.backup(key, content).await
    }

    /// Whether a backup exists for `key`.
    pub async fn blob_exists(&self, key: &BlobKey) -> CloudResult<BlobProbe> {
        let url = self.direct_url(key);
        match self
            .client
            .head(&url)
            .header("Cache-Control", "no-cache")
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                return Ok(BlobProbe {
                    exists: true,
                    url: Some(self.canonical_url(key)),
                });
            }
            Ok(resp) => {
                debug!(
                    "direct probe for {} returned {}, trying API",
                    key.id(),
                    resp.status()
                );
            }
            Err(e) => {
                debug!("direct probe for {} failed, trying API: {e}", key.id());
            }
        }

        self.api.check(key).await
    }

    /// Fetches backup content for `key`.
    pub async fn get_blob(&self, key: &BlobKey) -> CloudResult<String> {
        let url = self.direct_url(key);
        match self
            .client
            .get(&url)
            .header("Cache-Control", "no-cache")
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                return Ok(resp.text().await?);
            }
            Ok(resp) => {
                debug!(
                    "direct fetch for {} returned {}, trying API",
                    key.id(),
                    resp.status()
                );
            }
            Err(e) => {
                debug!("direct fetch for {} failed, trying API: {e}", key.id());
            }
        }

        self.api.import(key).await
    }

    /// Direct public URL with a cache-busting timestamp.
    fn direct_url(&self, key: &BlobKey) -> String {
        format!(
            "{}/{}?t={}",
            self.config.blob_base_url,
            key.object_path(&self.config.blob_prefix),
            now_millis()
        )
    }

    /// Stable public URL, without the cache-buster.
    fn canonical_url(&self, key: &BlobKey) -> String {
        format!(
            "{}/{}",
            self.config.blob_base_url,
            key.object_path(&self.config.blob_prefix)
        )
    }
}
