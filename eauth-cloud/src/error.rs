//! Backup engine error types.

use thiserror::Error;

/// Result type for backup operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// Errors that can occur in backup and sync operations.
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("API request failed: {0}")]
    Api(String),

    #[error("no backup found for {0}")]
    NotFound(String),

    #[error("remote snapshot unusable: {0}")]
    BadSnapshot(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("crypto error: {0}")]
    Crypto(#[from] eauth_crypto::CryptoError),

    #[error("ledger error: {0}")]
    Ledger(#[from] eauth_ledger::LedgerError),

    #[error("storage error: {0}")]
    Store(#[from] eauth_store::StoreError),
}
