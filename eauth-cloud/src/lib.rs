//! Cloud backup engine for EAuth.
//!
//! - [`api_client`]: authenticated client for the backup API endpoints.
//! - [`gateway`]: blob reads direct from storage with API fallback, writes
//!   through the API only.
//! - [`session`]: the per-sign-in sync session (periodic pull, push on
//!   ledger change, final backup on sign-out).
//! - [`manual`]: passphrase-derived backup and restore, usable without an
//!   account.

pub mod api_client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod manual;
pub mod session;
pub mod types;

pub use api_client::BackupApiClient;
pub use config::BackupConfig;
pub use error::{CloudError, CloudResult};
pub use gateway::BlobGateway;
pub use manual::{backup_with_passphrase, cached_backup_id, restore_with_passphrase};
pub use session::{
    create_sync_session, SessionCommand, SessionEvent, SessionHandle, SessionState, SyncSession,
};
pub use types::*;
