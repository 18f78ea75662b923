//! Backup identifier derivation.

use crate::codec::APP_SALT;
use sha2::{Digest, Sha256};

/// Derives the stable identifier that names a passphrase-keyed backup blob.
///
/// Deterministic one-way hash: SHA-256 over the passphrase plus the
/// application salt, hex-encoded. Total over all input strings; the same
/// passphrase always maps to the same id.
pub fn derive_backup_id(passphrase: &str) -> String {
    hex::encode(Sha256::digest(format!("{passphrase}{APP_SALT}").as_bytes()))
}
