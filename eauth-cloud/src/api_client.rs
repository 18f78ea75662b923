//! HTTP client for the backup API.
//!
//! Holds the optional authenticated session and talks to the backup,
//! check, and import endpoints. Uses reqwest with JSON serialization.

use crate::config::BackupConfig;
use crate::error::{CloudError, CloudResult};
use crate::types::{now_millis, BackupRequest, BlobKey, BlobProbe, ImportResponse, PutBlobResponse};
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Signed-in identity attached to API writes.
#[derive(Clone)]
struct AuthSession {
    user_id: String,
    token: String,
}

/// HTTP client for the EAuth backup API.
///
/// Works unauthenticated for the passphrase flow; a session installed via
/// [`BackupApiClient::set_session`] adds the auth token header to writes.
pub struct BackupApiClient {
    client: Client,
    config: BackupConfig,
    auth: Arc<RwLock<Option<AuthSession>>>,
}

impl BackupApiClient {
    pub fn new(config: BackupConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            config,
            auth: Arc::new(RwLock::new(None)),
        }
    }

    /// Installs the signed-in user's id and API token.
    pub async fn set_session(&self, user_id: String, token: String) {
        *self.auth.write().await = Some(AuthSession { user_id, token });
    }

    pub async fn clear_session(&self) {
        *self.auth.write().await = None;
    }

    pub async fn is_authenticated(&self) -> bool {
        self.auth.read().await.is_some()
    }

    pub async fn user_id(&self) -> Option<String> {
        self.auth.read().await.as_ref().map(|s| s.user_id.clone())
    }

    async fn token(&self) -> Option<String> {
        self.auth.read().await.as_ref().map(|s| s.token.clone())
    }

    // ── Backup endpoints ──

    /// Uploads snapshot content for `key`, replacing any existing blob.
    /// Returns the blob's public URL.
    pub async fn backup(&self, key: &BlobKey, content: &str) -> CloudResult<String> {
        let url = format!("{}/api/user-backup", self.config.api_base_url);
        let body = BackupRequest {
            user_id: key.id().to_string(),
            data: content.to_string(),
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = self.token().await {
            request = request.header("x-auth-token", token);
        }

        let resp: PutBlobResponse = request
            .send()
            .await?
            .error_for_status()
            .map_err(|e| CloudError::Api(e.to_string()))?
            .json()
            .await?;

        if !resp.success {
            return Err(CloudError::Api("backup upload was not accepted".to_string()));
        }
        Ok(resp.url)
    }

    /// Asks the API whether a backup exists for `key`.
    pub async fn check(&self, key: &BlobKey) -> CloudResult<BlobProbe> {
        let url = format!("{}/api/user-check", self.config.api_base_url);
        let t = now_millis().to_string();

        let probe: BlobProbe = self
            .client
            .get(&url)
            .query(&[("userId", key.id()), ("t", t.as_str())])
            .header("Cache-Control", "no-cache")
            .send()
            .await?
            .error_for_status()
            .map_err(|e| CloudError::Api(e.to_string()))?
            .json()
            .await?;

        Ok(probe)
    }

    /// Fetches backup content for `key` through the API.
    pub async fn import(&self, key: &BlobKey) -> CloudResult<String> {
        let url = format!("{}/api/user-import", self.config.api_base_url);
        let t = now_millis().to_string();

        let resp = self
            .client
            .get(&url)
            .query(&[("userId", key.id()), ("t", t.as_str())])
            .header("Cache-Control", "no-cache")
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CloudError::NotFound(key.id().to_string()));
        }

        let resp: ImportResponse = resp
            .error_for_status()
            .map_err(|e| CloudError::Api(e.to_string()))?
            .json()
            .await?;

        if !resp.success {
            return Err(CloudError::Api("import was not accepted".to_string()));
        }
        Ok(resp.data)
    }
}
