//! The local auth-code ledger.
//!
//! Single in-memory source of truth for records and groups, mirrored to the
//! device store on every mutation. Mutations are synchronous and total once
//! their precondition (existing id or group) has been checked; each one
//! re-persists the full ledger, then emits a change notification so an
//! attached sync session can schedule a backup.
//!
//! Wholesale replacement from a remote snapshot goes through
//! [`Ledger::replace_with`], which persists but deliberately does not notify,
//! so a pulled backup never echoes back out as a fresh backup.

use eauth_crypto::{decrypt_secret, encrypt_secret};
use eauth_store::{DeviceStore, AUTH_CODES_KEY, GROUPS_KEY};
use eauth_types::{
    AuthCode, ExportDocument, ExportToken, LedgerSnapshot, DEFAULT_GROUP, EXPORT_VERSION,
};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

// ============================================================================
// Error types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("record not found: {0}")]
    RecordNotFound(String),
    #[error("group not found: {0}")]
    GroupNotFound(String),
    #[error("group already exists: {0}")]
    GroupExists(String),
    #[error("the default group cannot be removed")]
    ReservedGroup,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("storage error: {0}")]
    Store(#[from] eauth_store::StoreError),
    #[error("crypto error: {0}")]
    Crypto(#[from] eauth_crypto::CryptoError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

// ============================================================================
// Change notifications
// ============================================================================

/// Which part of the ledger a mutation touched.
///
/// Observers treat any change as a backup trigger; the distinction exists
/// for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerChange {
    Records,
    Groups,
}

// ============================================================================
// Ledger
// ============================================================================

struct LedgerState {
    records: Vec<AuthCode>,
    groups: Vec<String>,
    notifier: Option<UnboundedSender<LedgerChange>>,
}

/// The session's auth-code collection. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Ledger {
    state: Arc<RwLock<LedgerState>>,
    store: DeviceStore,
}

impl Ledger {
    /// Loads ledger state from the device store.
    ///
    /// Unreadable stored values are logged and treated as empty rather than
    /// failing the load; the device copy must never brick startup.
    pub fn load(store: DeviceStore) -> LedgerResult<Self> {
        let records = match store.get(AUTH_CODES_KEY)? {
            Some(raw) => match serde_json::from_str::<Vec<AuthCode>>(&raw) {
                Ok(records) => records,
                Err(e) => {
                    warn!("stored records unreadable, starting empty: {e}");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        let groups = match store.get(GROUPS_KEY)? {
            Some(raw) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(groups) => groups,
                Err(e) => {
                    warn!("stored groups unreadable, starting empty: {e}");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let mut snapshot = LedgerSnapshot {
            auth_codes: records,
            groups,
        };
        snapshot.normalize();

        Ok(Self {
            state: Arc::new(RwLock::new(LedgerState {
                records: snapshot.auth_codes,
                groups: snapshot.groups,
                notifier: None,
            })),
            store,
        })
    }

    /// The device store backing this ledger.
    pub fn store(&self) -> &DeviceStore {
        &self.store
    }

    // ── Record operations ──

    /// Adds a record. `secret` is the plaintext TOTP secret; it is encrypted
    /// into stored form here. Returns the stored record.
    pub fn add_record(
        &self,
        issuer: &str,
        account: &str,
        secret: &str,
        group: &str,
        service: &str,
    ) -> LedgerResult<AuthCode> {
        if issuer.trim().is_empty() {
            return Err(LedgerError::MissingField("issuer"));
        }
        if secret.trim().is_empty() {
            return Err(LedgerError::MissingField("secret"));
        }

        let record = {
            let mut state = self.state.write().unwrap();
            if !state.groups.iter().any(|g| g == group) {
                return Err(LedgerError::GroupNotFound(group.to_string()));
            }
            let stored = encrypt_secret(secret)?;
            let record = AuthCode::new(issuer, account, stored, group, service);
            state.records.push(record.clone());
            let json = serde_json::to_string(&state.records)?;
            self.store.put(AUTH_CODES_KEY, &json)?;
            record
        };

        self.notify(LedgerChange::Records);
        Ok(record)
    }

    /// Replaces the stored record with the same id.
    ///
    /// The incoming record's `secret` must remain in stored form; updates do
    /// not re-encrypt.
    pub fn update_record(&self, record: AuthCode) -> LedgerResult<()> {
        {
            let mut state = self.state.write().unwrap();
            if !state.groups.iter().any(|g| g == &record.group) {
                return Err(LedgerError::GroupNotFound(record.group.clone()));
            }
            let pos = state
                .records
                .iter()
                .position(|r| r.id == record.id)
                .ok_or_else(|| LedgerError::RecordNotFound(record.id.clone()))?;
            state.records[pos] = record;
            let json = serde_json::to_string(&state.records)?;
            self.store.put(AUTH_CODES_KEY, &json)?;
        }

        self.notify(LedgerChange::Records);
        Ok(())
    }

    /// Deletes the record with the given id.
    pub fn delete_record(&self, id: &str) -> LedgerResult<()> {
        {
            let mut state = self.state.write().unwrap();
            let pos = state
                .records
                .iter()
                .position(|r| r.id == id)
                .ok_or_else(|| LedgerError::RecordNotFound(id.to_string()))?;
            state.records.remove(pos);
            let json = serde_json::to_string(&state.records)?;
            self.store.put(AUTH_CODES_KEY, &json)?;
        }

        self.notify(LedgerChange::Records);
        Ok(())
    }

    /// Flips the pinned flag on the record with the given id. Returns the
    /// new pinned state.
    pub fn toggle_pin(&self, id: &str) -> LedgerResult<bool> {
        let pinned = {
            let mut state = self.state.write().unwrap();
            let record = state
                .records
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| LedgerError::RecordNotFound(id.to_string()))?;
            record.is_pinned = !record.is_pinned;
            let pinned = record.is_pinned;
            let json = serde_json::to_string(&state.records)?;
            self.store.put(AUTH_CODES_KEY, &json)?;
            pinned
        };

        self.notify(LedgerChange::Records);
        Ok(pinned)
    }

    // ── Group operations ──

    /// Adds a group. Rejects empty names and duplicates.
    pub fn add_group(&self, name: &str) -> LedgerResult<()> {
        if name.trim().is_empty() {
            return Err(LedgerError::MissingField("group"));
        }

        {
            let mut state = self.state.write().unwrap();
            if state.groups.iter().any(|g| g == name) {
                return Err(LedgerError::GroupExists(name.to_string()));
            }
            state.groups.push(name.to_string());
            let json = serde_json::to_string(&state.groups)?;
            self.store.put(GROUPS_KEY, &json)?;
        }

        self.notify(LedgerChange::Groups);
        Ok(())
    }

    /// Removes a group, reassigning its members to the default group.
    ///
    /// Both lists are persisted in one transaction so no intermediate state
    /// with orphaned records is ever visible.
    pub fn remove_group(&self, name: &str) -> LedgerResult<()> {
        if name == DEFAULT_GROUP {
            return Err(LedgerError::ReservedGroup);
        }

        {
            let mut state = self.state.write().unwrap();
            let pos = state
                .groups
                .iter()
                .position(|g| g == name)
                .ok_or_else(|| LedgerError::GroupNotFound(name.to_string()))?;
            state.groups.remove(pos);
            for record in &mut state.records {
                if record.group == name {
                    record.group = DEFAULT_GROUP.to_string();
                }
            }
            let records_json = serde_json::to_string(&state.records)?;
            let groups_json = serde_json::to_string(&state.groups)?;
            self.store
                .put_many(&[(AUTH_CODES_KEY, &records_json), (GROUPS_KEY, &groups_json)])?;
        }

        self.notify(LedgerChange::Groups);
        Ok(())
    }

    // ── Views ──

    /// All records in insertion order.
    pub fn records(&self) -> Vec<AuthCode> {
        self.state.read().unwrap().records.clone()
    }

    /// All groups, default group first.
    pub fn groups(&self) -> Vec<String> {
        self.state.read().unwrap().groups.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().unwrap().records.is_empty()
    }

    /// Records in display order: pinned first, then by issuer
    /// (case-insensitive). Ties keep insertion order.
    pub fn sorted_records(&self) -> Vec<AuthCode> {
        let mut records = self.records();
        records.sort_by(|a, b| {
            b.is_pinned
                .cmp(&a.is_pinned)
                .then_with(|| a.issuer.to_lowercase().cmp(&b.issuer.to_lowercase()))
        });
        records
    }

    /// Records belonging to a group; the default group shows everything.
    pub fn records_in_group(&self, group: &str) -> Vec<AuthCode> {
        let records = self.sorted_records();
        if group == DEFAULT_GROUP {
            return records;
        }
        records.into_iter().filter(|r| r.group == group).collect()
    }

    // ── Snapshots ──

    /// Current ledger content as a snapshot.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let state = self.state.read().unwrap();
        LedgerSnapshot {
            auth_codes: state.records.clone(),
            groups: state.groups.clone(),
        }
    }

    /// Canonical serialized snapshot, as uploaded in backups.
    pub fn snapshot_json(&self) -> LedgerResult<String> {
        Ok(self.snapshot().to_json()?)
    }

    /// Wholesale-replaces ledger content from a remote snapshot and persists
    /// both lists together. Does not notify: a pulled backup must not turn
    /// around and schedule another backup.
    pub fn replace_with(&self, mut snapshot: LedgerSnapshot) -> LedgerResult<()> {
        snapshot.normalize();
        let records_json = serde_json::to_string(&snapshot.auth_codes)?;
        let groups_json = serde_json::to_string(&snapshot.groups)?;

        let mut state = self.state.write().unwrap();
        state.records = snapshot.auth_codes;
        state.groups = snapshot.groups;
        self.store
            .put_many(&[(AUTH_CODES_KEY, &records_json), (GROUPS_KEY, &groups_json)])?;
        Ok(())
    }

    // ── Export / import ──

    /// Exports all records as the v1 interchange document with decrypted
    /// secrets. A secret that fails to decrypt exports as an empty string
    /// rather than failing the whole export.
    pub fn export_snapshot(&self) -> ExportDocument {
        let state = self.state.read().unwrap();
        let tokens = state
            .records
            .iter()
            .map(|record| {
                let secret = match decrypt_secret(&record.secret) {
                    Ok(secret) => secret,
                    Err(e) => {
                        warn!("record {} secret did not decrypt for export: {e}", record.id);
                        String::new()
                    }
                };
                ExportToken::totp(
                    record.issuer.clone(),
                    record.account.clone(),
                    secret,
                    record.group.clone(),
                    record.service.clone(),
                )
            })
            .collect();

        ExportDocument {
            version: EXPORT_VERSION,
            tokens,
        }
    }

    /// Imports a v1 interchange document, replacing all records.
    ///
    /// Only `version == 1` with a token array is accepted; anything else is
    /// a hard rejection with no state change. Imported records get fresh
    /// ids, reset pins, and re-encrypted secrets. Groups referenced by
    /// imported tokens are added to the existing group set.
    pub fn import_snapshot(&self, raw: &str) -> LedgerResult<usize> {
        let document: ExportDocument =
            serde_json::from_str(raw).map_err(|e| LedgerError::InvalidSnapshot(e.to_string()))?;
        if document.version != EXPORT_VERSION {
            return Err(LedgerError::InvalidSnapshot(format!(
                "unsupported version {}",
                document.version
            )));
        }

        let mut imported = Vec::with_capacity(document.tokens.len());
        for token in document.tokens {
            let stored = encrypt_secret(&token.secret)?;
            imported.push(AuthCode::new(
                token.issuer,
                token.account,
                stored,
                token.group,
                token.service,
            ));
        }
        let count = imported.len();

        {
            let mut state = self.state.write().unwrap();
            let mut snapshot = LedgerSnapshot {
                auth_codes: imported,
                groups: state.groups.clone(),
            };
            snapshot.normalize();
            let records_json = serde_json::to_string(&snapshot.auth_codes)?;
            let groups_json = serde_json::to_string(&snapshot.groups)?;
            state.records = snapshot.auth_codes;
            state.groups = snapshot.groups;
            self.store
                .put_many(&[(AUTH_CODES_KEY, &records_json), (GROUPS_KEY, &groups_json)])?;
        }

        self.notify(LedgerChange::Records);
        Ok(count)
    }

    // ── Change notification ──

    /// Attaches a change notifier. One observer at a time; attaching
    /// replaces any previous one.
    pub fn set_notifier(&self, tx: UnboundedSender<LedgerChange>) {
        self.state.write().unwrap().notifier = Some(tx);
    }

    /// Detaches the change notifier.
    pub fn clear_notifier(&self) {
        self.state.write().unwrap().notifier = None;
    }

    fn notify(&self, change: LedgerChange) {
        let state = self.state.read().unwrap();
        if let Some(tx) = &state.notifier {
            let _ = tx.send(change);
        }
    }
}
