//! Passphrase backup and restore.
//!
//! The pre-sign-in flow: the passphrase both names the blob (via the
//! derived backup identifier) and encrypts its content. Unlike session
//! backups, the uploaded blob holds a passphrase envelope rather than the
//! plain snapshot.

use crate::error::{CloudError, CloudResult};
use crate::gateway::BlobGateway;
use crate::types::BlobKey;
use eauth_crypto::{open_with_passphrase, seal_with_passphrase, PassphraseEnvelope};
use eauth_ledger::Ledger;
use eauth_store::CACHED_BACKUP_ID_KEY;
use eauth_types::LedgerSnapshot;
use tracing::{info, warn};

/// Encrypts the ledger under `passphrase` and uploads it to the derived
/// backup id. Returns the id so the caller can show it to the user.
pub async fn backup_with_passphrase(
    gateway: &BlobGateway,
    ledger: &Ledger,
    passphrase: &str,
) -> CloudResult<String> {
    let key = BlobKey::from_passphrase(passphrase);
    let snapshot = ledger.snapshot_json()?;
    let envelope = seal_with_passphrase(&snapshot, passphrase)?;
    let body = serde_json::to_string(&envelope)?;

    let url = gateway.put_blob(&key, &body).await?;
    info!("passphrase backup uploaded to {url}");

    cache_backup_id(ledger, &key);
    Ok(key.id().to_string())
}

/// Fetches the blob at `passphrase`'s derived id, decrypts it, and replaces
/// the ledger. Returns the number of restored records.
pub async fn restore_with_passphrase(
    gateway: &BlobGateway,
    ledger: &Ledger,
    passphrase: &str,
) -> CloudResult<usize> {
    let key = BlobKey::from_passphrase(passphrase);
    let body = gateway.get_blob(&key).await?;

    let envelope: PassphraseEnvelope = serde_json::from_str(&body)
        .map_err(|e| CloudError::BadSnapshot(format!("not a passphrase backup: {e}")))?;
    let plaintext = open_with_passphrase(&envelope, passphrase)?;
    let snapshot = LedgerSnapshot::parse(&plaintext)
        .map_err(|e| CloudError::BadSnapshot(e.to_string()))?;

    let count = snapshot.auth_codes.len();
    ledger.replace_with(snapshot)?;

    cache_backup_id(ledger, &key);
    Ok(count)
}

/// The backup id cached by the last passphrase backup or restore, if any.
pub fn cached_backup_id(ledger: &Ledger) -> CloudResult<Option<String>> {
    Ok(ledger.store().get(CACHED_BACKUP_ID_KEY)?)
}

fn cache_backup_id(ledger: &Ledger, key: &BlobKey) {
    if let Err(e) = ledger.store().put(CACHED_BACKUP_ID_KEY, key.id()) {
        warn!("could not cache backup id: {e}");
    }
}
