//! The per-sign-in sync session.
//!
//! One session owns the periodic pull timer, the ledger change
//! subscription, and the re-entrancy guards for its user; all of it dies
//! with the session, so a stale timer can never sync into the next user's
//! ledger. The loop mirrors the remote blob into the ledger on pull and
//! the ledger into the remote blob on push; whichever side is fetched last
//! wins in full, there is no merge.
//!
//! Pulls and backups spawn onto the runtime so a slow pull never delays a
//! backup trigger. A per-kind try-lock keeps at most one pull and one
//! backup in flight; an operation arriving while its kind is busy is
//! skipped, not queued.

use crate::config::BackupConfig;
use crate::error::{CloudError, CloudResult};
use crate::gateway::BlobGateway;
use crate::types::BlobKey;
use eauth_ledger::{Ledger, LedgerChange};
use eauth_types::LedgerSnapshot;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Where the session is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Initializing,
    Idle,
    Syncing,
    BackingUp,
}

/// Commands a caller can send into the session loop.
#[derive(Debug)]
pub enum SessionCommand {
    SyncNow,
    BackupNow,
    Stop,
}

/// Outcomes surfaced to the caller. All of these are non-fatal; the
/// session keeps running after any failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// The initial pull replaced the ledger with the remote backup.
    RestoreCompleted { records: usize },
    /// No remote backup existed; the local ledger seeded one.
    RemoteSeeded { url: String },
    BackupCompleted { url: String },
    BackupFailed { reason: String },
    /// A periodic or requested pull applied a changed remote snapshot.
    SyncApplied { records: usize },
    SyncFailed { reason: String },
    Stopped,
}

/// Handle for talking to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<SessionCommand>,
    shared: Arc<SessionShared>,
}

impl SessionHandle {
    /// Requests an immediate pull sync.
    pub async fn sync_now(&self) -> CloudResult<()> {
        self.command_tx
            .send(SessionCommand::SyncNow)
            .await
            .map_err(|_| CloudError::Api("sync session not running".to_string()))
    }

    /// Requests an immediate backup.
    pub async fn backup_now(&self) -> CloudResult<()> {
        self.command_tx
            .send(SessionCommand::BackupNow)
            .await
            .map_err(|_| CloudError::Api("sync session not running".to_string()))
    }

    /// Signs the session out: one final backup attempt, then teardown.
    pub async fn stop(&self) -> CloudResult<()> {
        self.command_tx
            .send(SessionCommand::Stop)
            .await
            .map_err(|_| CloudError::Api("sync session not running".to_string()))
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.read().unwrap()
    }
}

/// State shared between the loop, its spawned operations, and handles.
struct SessionShared {
    gateway: BlobGateway,
    ledger: Ledger,
    key: BlobKey,
    state: RwLock<SessionState>,
    /// At most one pull in flight per session.
    sync_guard: tokio::sync::Mutex<()>,
    /// At most one backup in flight per session.
    backup_guard: tokio::sync::Mutex<()>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
}

/// The session event loop. Created by [`create_sync_session`] and driven
/// by [`SyncSession::run`] on the session's task.
pub struct SyncSession {
    shared: Arc<SessionShared>,
    config: BackupConfig,
    command_rx: mpsc::Receiver<SessionCommand>,
    changes_rx: mpsc::UnboundedReceiver<LedgerChange>,
}

/// Creates a sync session for a signed-in user, subscribing it to the
/// ledger's change notifications. Returns the command handle, the event
/// stream, and the session itself.
pub fn create_sync_session(
    config: BackupConfig,
    gateway: BlobGateway,
    ledger: Ledger,
    user_id: &str,
) -> (
    SessionHandle,
    mpsc::UnboundedReceiver<SessionEvent>,
    SyncSession,
) {
    let (command_tx, command_rx) = mpsc::channel(64);
    let (changes_tx, changes_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    ledger.set_notifier(changes_tx);

    let shared = Arc::new(SessionShared {
        gateway,
        ledger,
        key: BlobKey::for_user(user_id),
        state: RwLock::new(SessionState::Unauthenticated),
        sync_guard: tokio::sync::Mutex::new(()),
        backup_guard: tokio::sync::Mutex::new(()),
        event_tx,
    });

    let handle = SessionHandle {
        command_tx,
        shared: shared.clone(),
    };

    let session = SyncSession {
        shared,
        config,
        command_rx,
        changes_rx,
    };

    (handle, event_rx, session)
}

impl SyncSession {
    /// Runs the session loop until `Stop` or until every handle is dropped.
    pub async fn run(mut self) {
        info!("sync session started for backup id {}", self.shared.key.id());

        self.shared.set_state(SessionState::Initializing);
        self.shared.initialize().await;
        self.shared.set_state(SessionState::Idle);

        let mut pull_interval = tokio::time::interval(self.config.sync_interval);
        // Skip first immediate tick
        pull_interval.tick().await;

        loop {
            tokio::select! {
                _ = pull_interval.tick() => {
                    tokio::spawn(self.shared.clone().pull_sync());
                }
                Some(_) = self.changes_rx.recv() => {
                    tokio::spawn(self.shared.clone().backup());
                }
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::SyncNow) => {
                            tokio::spawn(self.shared.clone().pull_sync());
                        }
                        Some(SessionCommand::BackupNow) => {
                            tokio::spawn(self.shared.clone().backup());
                        }
                        Some(SessionCommand::Stop) => {
                            info!("sync session stopping");
                            self.shared.final_backup().await;
                            break;
                        }
                        None => {
                            info!("command channel closed, stopping sync session");
                            break;
                        }
                    }
                }
            }
        }

        // The timer and the change subscription die with the loop.
        self.shared.ledger.clear_notifier();
        self.shared.set_state(SessionState::Unauthenticated);
        let _ = self.shared.event_tx.send(SessionEvent::Stopped);
        info!("sync session stopped");
    }
}

impl SessionShared {
    fn set_state(&self, state: SessionState) {
        *self.state.write().unwrap() = state;
    }

    /// First contact after sign-in: pull the remote backup if one exists,
    /// otherwise seed the remote from a non-empty local ledger.
    async fn initialize(&self) {
        match self.gateway.blob_exists(&self.key).await {
            Ok(probe) if probe.exists => match self.fetch_and_apply().await {
                Ok(Some(records)) => {
                    info!("restored {records} records from remote backup");
                    let _ = self
                        .event_tx
                        .send(SessionEvent::RestoreCompleted { records });
                }
                Ok(None) => debug!("remote backup matches local state"),
                Err(e) => {
                    warn!("initial restore failed: {e}");
                    let _ = self.event_tx.send(SessionEvent::SyncFailed {
                        reason: e.to_string(),
                    });
                }
            },
            Ok(_) => {
                if self.ledger.is_empty() {
                    debug!("nothing to restore and nothing to seed");
                    return;
                }
                match self.push_snapshot().await {
                    Ok(url) => {
                        info!("seeded remote backup at {url}");
                        let _ = self.event_tx.send(SessionEvent::RemoteSeeded { url });
                    }
                    Err(e) => {
                        warn!("initial backup failed: {e}");
                        let _ = self.event_tx.send(SessionEvent::BackupFailed {
                            reason: e.to_string(),
                        });
                    }
                }
            }
            Err(e) => {
                warn!("remote probe failed: {e}");
                let _ = self.event_tx.send(SessionEvent::SyncFailed {
                    reason: e.to_string(),
                });
            }
        }
    }

    /// One guarded pull. Skipped when a pull is already in flight.
    async fn pull_sync(self: Arc<Self>) {
        let _guard = match self.sync_guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("pull sync already in flight, skipping");
                return;
            }
        };

        self.set_state(SessionState::Syncing);
        match self.fetch_and_apply().await {
            Ok(Some(records)) => {
                info!("pull sync applied {records} remote records");
                let _ = self.event_tx.send(SessionEvent::SyncApplied { records });
            }
            Ok(None) => debug!("pull sync found no changes"),
            Err(CloudError::NotFound(id)) => {
                debug!("no remote backup yet for {id}");
            }
            Err(e) => {
                warn!("pull sync failed: {e}");
                let _ = self.event_tx.send(SessionEvent::SyncFailed {
                    reason: e.to_string(),
                });
            }
        }
        self.set_state(SessionState::Idle);
    }

    /// One guarded backup. Skipped when a backup is already in flight.
    async fn backup(self: Arc<Self>) {
        let _guard = match self.backup_guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("backup already in flight, skipping");
                return;
            }
        };

        self.set_state(SessionState::BackingUp);
        match self.push_snapshot().await {
            Ok(url) => {
                debug!("backup uploaded to {url}");
                let _ = self.event_tx.send(SessionEvent::BackupCompleted { url });
            }
            Err(e) => {
                warn!("backup failed: {e}");
                let _ = self.event_tx.send(SessionEvent::BackupFailed {
                    reason: e.to_string(),
                });
            }
        }
        self.set_state(SessionState::Idle);
    }

    /// Pulls the remote snapshot and replaces the ledger when it differs.
    /// Returns the applied record count, or `None` when already current.
    async fn fetch_and_apply(&self) -> CloudResult<Option<usize>> {
        let body = self.gateway.get_blob(&self.key).await?;
        let snapshot = LedgerSnapshot::parse(&body)
            .map_err(|e| CloudError::BadSnapshot(e.to_string()))?;

        // Compare canonical serializations: the remote body may differ in
        // formatting without differing in content.
        let canonical = snapshot.to_json()?;
        if canonical == self.ledger.snapshot_json()? {
            return Ok(None);
        }

        let records = snapshot.auth_codes.len();
        self.ledger.replace_with(snapshot)?;
        Ok(Some(records))
    }

    async fn push_snapshot(&self) -> CloudResult<String> {
        let snapshot = self.ledger.snapshot_json()?;
        self.gateway.put_blob(&self.key, &snapshot).await
    }

    /// Sign-out backup: one bounded attempt, never retried.
    async fn final_backup(&self) {
        match self.push_snapshot().await {
            Ok(url) => debug!("final backup uploaded to {url}"),
            Err(e) => {
                warn!("final backup failed: {e}");
                let _ = self.event_tx.send(SessionEvent::BackupFailed {
                    reason: e.to_string(),
                });
            }
        }
    }
}
