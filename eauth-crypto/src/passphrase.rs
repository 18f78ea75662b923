//! Passphrase envelopes for snapshot backups.
//!
//! Argon2id -> ChaCha20-Poly1305. The Argon2id salt and work parameters
//! travel inside the envelope so the passphrase is the only input needed to
//! open it later.

use crate::error::{CryptoError, CryptoResult};
use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::codec::NONCE_SIZE;

/// Argon2id salt length in bytes.
pub const SALT_SIZE: usize = 16;

/// Argon2id work parameters stored alongside the ciphertext.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// A passphrase-sealed payload, JSON-serializable for storage in a blob.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassphraseEnvelope {
    pub salt: [u8; SALT_SIZE],
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
    pub params: KdfParams,
}

fn derive_passphrase_key(
    passphrase: &str,
    salt: &[u8; SALT_SIZE],
    params: &KdfParams,
) -> CryptoResult<Key> {
    let argon_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(32),
    )
    .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut key_bytes = Zeroizing::new([0u8; 32]);
    argon
        .hash_password_into(passphrase.as_bytes(), salt, key_bytes.as_mut())
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    Ok(Key::clone_from_slice(key_bytes.as_ref()))
}

/// Seals a plaintext payload under a passphrase.
pub fn seal_with_passphrase(payload: &str, passphrase: &str) -> CryptoResult<PassphraseEnvelope> {
    let mut salt = [0u8; SALT_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    let params = KdfParams::default();

    let key = derive_passphrase_key(passphrase, &salt, &params)?;
    let cipher = ChaCha20Poly1305::new(&key);

    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), payload.as_bytes())
        .map_err(|e| CryptoError::Encryption(format!("envelope seal failed: {e}")))?;

    Ok(PassphraseEnvelope {
        salt,
        nonce,
        ciphertext,
        params,
    })
}

/// Opens a passphrase-sealed payload.
pub fn open_with_passphrase(
    envelope: &PassphraseEnvelope,
    passphrase: &str,
) -> CryptoResult<String> {
    let key = derive_passphrase_key(passphrase, &envelope.salt, &envelope.params)?;
    let cipher = ChaCha20Poly1305::new(&key);

    let plain = cipher
        .decrypt(
            Nonce::from_slice(&envelope.nonce),
            envelope.ciphertext.as_ref(),
        )
        .map_err(|_| {
            CryptoError::Decryption("wrong passphrase or tampered data".to_string())
        })?;

    String::from_utf8(plain).map_err(|e| CryptoError::Encoding(e.to_string()))
}
