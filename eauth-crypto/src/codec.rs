//! Per-record secret codec.
//!
//! Each secret is encrypted with ChaCha20-Poly1305 under a key derived from
//! a fresh random record key plus the application salt, then stored as
//! `"<hexKey>:<base64(nonce || ciphertext)>"`.
//!
//! Known limitation, kept deliberately for compatibility with existing
//! exports and backups: the record key is embedded next to the ciphertext,
//! so this layer only guards against casual inspection of storage. Real
//! confidentiality for a backup comes from the channel carrying it (the
//! passphrase envelope, or the authenticated blob namespace).

use crate::error::{CryptoError, CryptoResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit, Nonce};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Application-wide salt mixed into every key derivation and backup id.
/// Changing it invalidates all previously written secrets and backup ids.
pub(crate) const APP_SALT: &str = "default-salt-value";

/// Random record key length in bytes (hex-encoded in the composite).
pub const RECORD_KEY_SIZE: usize = 32;

/// ChaCha20-Poly1305 nonce length in bytes.
pub const NONCE_SIZE: usize = 12;

/// Generates a fresh hex-encoded per-record key.
pub fn generate_record_key() -> String {
    let mut bytes = [0u8; RECORD_KEY_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// The actual cipher key: SHA-256 over the record key string plus the salt.
fn cipher_key(record_key: &str) -> Key {
    let digest = Sha256::digest(format!("{record_key}{APP_SALT}").as_bytes());
    Key::clone_from_slice(digest.as_slice())
}

/// Encrypts a plaintext secret under a fresh random key, returning the
/// composite stored form.
pub fn encrypt_secret(plain: &str) -> CryptoResult<String> {
    let record_key = generate_record_key();
    let cipher = ChaCha20Poly1305::new(&cipher_key(&record_key));

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plain.as_bytes())
        .map_err(|e| CryptoError::Encryption(format!("secret encryption failed: {e}")))?;

    let mut packed = Vec::with_capacity(NONCE_SIZE + sealed.len());
    packed.extend_from_slice(&nonce_bytes);
    packed.extend_from_slice(&sealed);

    Ok(format!("{record_key}:{}", STANDARD.encode(packed)))
}

/// Decrypts a composite stored secret back to plaintext.
///
/// Splits on the first `:`; anything that does not decode, decrypt, and
/// authenticate is an error value, never a panic.
pub fn decrypt_secret(stored: &str) -> CryptoResult<String> {
    let (record_key, payload) = stored.split_once(':').ok_or(CryptoError::MalformedSecret)?;
    if record_key.is_empty() || payload.is_empty() {
        return Err(CryptoError::MalformedSecret);
    }

    let packed = STANDARD
        .decode(payload)
        .map_err(|e| CryptoError::Encoding(e.to_string()))?;
    if packed.len() <= NONCE_SIZE {
        return Err(CryptoError::MalformedSecret);
    }
    let (nonce_bytes, sealed) = packed.split_at(NONCE_SIZE);

    let cipher = ChaCha20Poly1305::new(&cipher_key(record_key));
    let plain = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), sealed)
        .map_err(|_| CryptoError::Decryption("wrong key or tampered data".to_string()))?;

    String::from_utf8(plain).map_err(|e| CryptoError::Encoding(e.to_string()))
}

/// Decrypts for display. Any failure yields an empty string so one bad
/// record cannot take down list rendering.
pub fn decrypt_secret_or_empty(stored: &str) -> String {
    decrypt_secret(stored).unwrap_or_default()
}
