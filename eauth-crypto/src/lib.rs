//! Encryption layer for EAuth.
//!
//! Three concerns, all keyed off the same fixed application salt:
//!
//! 1. **Secret codec**: each stored TOTP secret is encrypted under its own
//!    random key, packed as `"<key>:<ciphertext>"`. The key travels with
//!    the ciphertext so exports and backups stay self-contained.
//! 2. **Backup identifiers**: a passphrase hashes to the stable id that
//!    names a backup blob before any authenticated identity exists.
//! 3. **Passphrase envelopes**: Argon2id-derived keys seal whole snapshots
//!    for the passphrase-keyed backup flow.

mod codec;
mod error;
mod identity;
pub mod passphrase;

pub use codec::{
    decrypt_secret, decrypt_secret_or_empty, encrypt_secret, generate_record_key, NONCE_SIZE,
    RECORD_KEY_SIZE,
};
pub use error::{CryptoError, CryptoResult};
pub use identity::derive_backup_id;
pub use passphrase::{
    open_with_passphrase, seal_with_passphrase, KdfParams, PassphraseEnvelope, SALT_SIZE,
};
