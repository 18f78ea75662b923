//! Wire types for the backup API and blob store.

use serde::{Deserialize, Serialize};

/// Identifies one backup blob in the remote store.
///
/// The id is either the authenticated user id or a passphrase-derived
/// backup identifier; blob naming is the same for both.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobKey {
    id: String,
}

impl BlobKey {
    /// Key for an authenticated user's backup.
    pub fn for_user(user_id: &str) -> Self {
        Self {
            id: user_id.to_string(),
        }
    }

    /// Key derived from a backup passphrase.
    pub fn from_passphrase(passphrase: &str) -> Self {
        Self {
            id: eauth_crypto::derive_backup_id(passphrase),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Path of the blob object under the store's public host.
    pub fn object_path(&self, prefix: &str) -> String {
        format!("{prefix}/{}.json", self.id)
    }
}

/// Response from a backup upload.
#[derive(Clone, Debug, Deserialize)]
pub struct PutBlobResponse {
    pub url: String,
    pub success: bool,
}

/// Result of an existence probe.
#[derive(Clone, Debug, Deserialize)]
pub struct BlobProbe {
    pub exists: bool,
    #[serde(default)]
    pub url: Option<String>,
}

/// Response from the import endpoint: the raw snapshot text plus a flag.
#[derive(Clone, Debug, Deserialize)]
pub struct ImportResponse {
    pub data: String,
    pub success: bool,
}

/// Body of a backup upload request.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRequest {
    pub user_id: String,
    pub data: String,
}

/// Milliseconds since the epoch, used for cache-busting query strings.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
