use eauth_crypto::{
    decrypt_secret, decrypt_secret_or_empty, derive_backup_id, encrypt_secret,
    generate_record_key, open_with_passphrase, seal_with_passphrase, CryptoError,
    PassphraseEnvelope, RECORD_KEY_SIZE,
};
use proptest::prelude::*;

// ── Secret codec ──

#[test]
fn encrypt_decrypt_roundtrip() {
    let stored = encrypt_secret("JBSWY3DPEHPK3PXP").unwrap();
    assert_eq!(decrypt_secret(&stored).unwrap(), "JBSWY3DPEHPK3PXP");
}

#[test]
fn composite_shape_is_key_colon_ciphertext() {
    let stored = encrypt_secret("secret").unwrap();
    let (key, ciphertext) = stored.split_once(':').unwrap();
    assert_eq!(key.len(), RECORD_KEY_SIZE * 2);
    assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    assert!(!ciphertext.is_empty());
}

#[test]
fn each_encryption_uses_a_fresh_key() {
    let a = encrypt_secret("same input").unwrap();
    let b = encrypt_secret("same input").unwrap();
    assert_ne!(a, b);
    let (key_a, _) = a.split_once(':').unwrap();
    let (key_b, _) = b.split_once(':').unwrap();
    assert_ne!(key_a, key_b);
}

#[test]
fn empty_secret_roundtrips() {
    let stored = encrypt_secret("").unwrap();
    assert_eq!(decrypt_secret(&stored).unwrap(), "");
}

#[test]
fn decrypt_rejects_missing_separator() {
    assert!(matches!(
        decrypt_secret("no-separator-here"),
        Err(CryptoError::MalformedSecret)
    ));
}

#[test]
fn decrypt_rejects_empty_parts() {
    assert!(matches!(decrypt_secret(":abc"), Err(CryptoError::MalformedSecret)));
    assert!(matches!(decrypt_secret("abc:"), Err(CryptoError::MalformedSecret)));
}

#[test]
fn decrypt_rejects_bad_base64() {
    let result = decrypt_secret("deadbeef:!!!not-base64!!!");
    assert!(matches!(result, Err(CryptoError::Encoding(_))));
}

#[test]
fn decrypt_rejects_wrong_key() {
    let stored = encrypt_secret("payload").unwrap();
    let (_, ciphertext) = stored.split_once(':').unwrap();
    let forged = format!("{}:{ciphertext}", generate_record_key());
    assert!(matches!(
        decrypt_secret(&forged),
        Err(CryptoError::Decryption(_))
    ));
}

#[test]
fn decrypt_rejects_tampered_ciphertext() {
    let stored = encrypt_secret("payload").unwrap();
    // Flip the final base64 character to corrupt the tag.
    let mut chars: Vec<char> = stored.chars().collect();
    let last = *chars.last().unwrap();
    *chars.last_mut().unwrap() = if last == 'A' { 'B' } else { 'A' };
    let tampered: String = chars.into_iter().collect();
    assert!(decrypt_secret(&tampered).is_err());
}

#[test]
fn or_empty_swallows_failures() {
    assert_eq!(decrypt_secret_or_empty("garbage"), "");
    assert_eq!(decrypt_secret_or_empty(""), "");
    let stored = encrypt_secret("visible").unwrap();
    assert_eq!(decrypt_secret_or_empty(&stored), "visible");
}

proptest! {
    #[test]
    fn roundtrip_holds_for_arbitrary_secrets(plain in ".{0,128}") {
        let stored = encrypt_secret(&plain).unwrap();
        prop_assert_eq!(decrypt_secret(&stored).unwrap(), plain);
    }
}

// ── Backup identifiers ──

#[test]
fn backup_id_is_deterministic() {
    assert_eq!(derive_backup_id("hunter2"), derive_backup_id("hunter2"));
}

#[test]
fn backup_ids_differ_per_passphrase() {
    assert_ne!(derive_backup_id("hunter2"), derive_backup_id("hunter3"));
}

#[test]
fn backup_id_is_lowercase_hex_sha256() {
    let id = derive_backup_id("anything");
    assert_eq!(id.len(), 64);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

// ── Passphrase envelopes ──

#[test]
fn envelope_seal_open_roundtrip() {
    let envelope = seal_with_passphrase("{\"authCodes\":[]}", "correct horse").unwrap();
    let opened = open_with_passphrase(&envelope, "correct horse").unwrap();
    assert_eq!(opened, "{\"authCodes\":[]}");
}

#[test]
fn envelope_rejects_wrong_passphrase() {
    let envelope = seal_with_passphrase("payload", "right").unwrap();
    assert!(matches!(
        open_with_passphrase(&envelope, "wrong"),
        Err(CryptoError::Decryption(_))
    ));
}

#[test]
fn envelope_salts_are_unique() {
    let a = seal_with_passphrase("x", "p").unwrap();
    let b = seal_with_passphrase("x", "p").unwrap();
    assert_ne!(a.salt, b.salt);
    assert_ne!(a.ciphertext, b.ciphertext);
}

#[test]
fn envelope_survives_json_serialization() {
    let envelope = seal_with_passphrase("snapshot body", "pass").unwrap();
    let json = serde_json::to_string(&envelope).unwrap();
    let restored: PassphraseEnvelope = serde_json::from_str(&json).unwrap();
    assert_eq!(open_with_passphrase(&restored, "pass").unwrap(), "snapshot body");
}
