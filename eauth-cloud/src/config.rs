//! Backup engine configuration.

use std::time::Duration;

/// Configuration for the backup engine and sync session.
#[derive(Clone, Debug)]
pub struct BackupConfig {
    /// Base URL for the EAuth API (e.g., "https://eauth.app").
    pub api_base_url: String,

    /// Public host of the blob store, tried first for reads.
    pub blob_base_url: String,

    /// Key prefix under which backup blobs live.
    pub blob_prefix: String,

    /// Interval between periodic pull syncs.
    pub sync_interval: Duration,

    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://eauth.app".to_string(),
            blob_base_url: "https://public.blob.vercel-storage.com".to_string(),
            blob_prefix: "eauth".to_string(),
            sync_interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
        }
    }
}
