//! Shared types for EAuth.
//!
//! Defines the auth-code record, the ledger snapshot stored in backup blobs,
//! and the v1 export interchange document. All interchange types serialize
//! with camelCase field names to stay readable by earlier exports and
//! backups.

use serde::{Deserialize, Serialize};

/// The reserved default group. Always present, never removable.
pub const DEFAULT_GROUP: &str = "All";

/// Version accepted and produced by the export format.
pub const EXPORT_VERSION: u32 = 1;

fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}

fn default_groups() -> Vec<String> {
    vec![DEFAULT_GROUP.to_string()]
}

/// Generates a fresh record id: time-ordered with a random component, so ids
/// sort roughly by creation and never collide in practice.
pub fn new_record_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

// ── Records ──

/// A single stored authenticator entry.
///
/// `secret` always holds the codec composite `"<key>:<ciphertext>"`, never a
/// plaintext TOTP secret.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCode {
    pub id: String,
    pub issuer: String,
    pub account: String,
    pub secret: String,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default)]
    pub service: String,
}

impl AuthCode {
    /// Builds an unpinned record with a fresh id. `secret` must already be
    /// in stored (encrypted) form.
    pub fn new(
        issuer: impl Into<String>,
        account: impl Into<String>,
        secret: impl Into<String>,
        group: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            id: new_record_id(),
            issuer: issuer.into(),
            account: account.into(),
            secret: secret.into(),
            is_pinned: false,
            group: group.into(),
            service: service.into(),
        }
    }
}

// ── Snapshots ──

/// Full ledger content as stored in a remote backup blob.
///
/// Current form is an object carrying both records and groups. Early backups
/// were a bare array of records; [`LedgerSnapshot::parse`] accepts both.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub auth_codes: Vec<AuthCode>,
    #[serde(default = "default_groups")]
    pub groups: Vec<String>,
}

impl LedgerSnapshot {
    /// Parses snapshot JSON, accepting the object form and the legacy bare
    /// array. The result is normalized.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let mut snapshot = match serde_json::from_str::<Self>(raw) {
            Ok(snapshot) => snapshot,
            Err(_) => {
                let auth_codes: Vec<AuthCode> = serde_json::from_str(raw)?;
                Self {
                    auth_codes,
                    groups: default_groups(),
                }
            }
        };
        snapshot.normalize();
        Ok(snapshot)
    }

    /// Canonical serialized form, used for staleness comparison and upload.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Enforces the group invariants: the default group first, no
    /// duplicates, and every group referenced by a record present in the
    /// set. Idempotent.
    pub fn normalize(&mut self) {
        let mut groups = vec![DEFAULT_GROUP.to_string()];
        for group in self.groups.drain(..) {
            if !groups.contains(&group) {
                groups.push(group);
            }
        }
        for record in &self.auth_codes {
            if !groups.contains(&record.group) {
                groups.push(record.group.clone());
            }
        }
        self.groups = groups;
    }
}

// ── Export format ──

/// The v1 export document. Interchange with earlier exports relies on this
/// exact schema, including field order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub version: u32,
    pub tokens: Vec<ExportToken>,
}

/// One exported token with a plaintext (decrypted) secret.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportToken {
    pub issuer: String,
    pub account: String,
    pub secret: String,
    pub algorithm: String,
    pub digits: u32,
    pub period: u32,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default)]
    pub service: String,
}

impl ExportToken {
    /// Builds a standard TOTP token entry (SHA1, 6 digits, 30s period).
    pub fn totp(
        issuer: impl Into<String>,
        account: impl Into<String>,
        secret: impl Into<String>,
        group: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            account: account.into(),
            secret: secret.into(),
            algorithm: "SHA1".to_string(),
            digits: 6,
            period: 30,
            kind: "TOTP".to_string(),
            group: group.into(),
            service: service.into(),
        }
    }
}
