//! AES-256-CBC encryption for stored OAuth credentials.
//!
//! Each payload is encrypted with a fresh random IV and persisted as
//! `"<ivHex>:<cipherHex>"`, the format used by every existing token store.
//! The key is derived from a configured secret string by right-padding with
//! spaces and truncating to 32 bytes. This is intentionally NOT a KDF --
//! changing it would orphan every previously written ciphertext. See
//! DESIGN.md for the hardening path (versioned scheme + real KDF).

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use anyhow::{anyhow, Context, Result};
use rand::RngCore;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Size of the derived encryption key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Size of the CBC initialization vector in bytes
const IV_SIZE: usize = 16;

/// Derives the 32-byte AES key from the configured secret string.
///
/// The secret is right-padded with ASCII spaces and truncated to exactly
/// 32 bytes, matching the derivation used by existing stores.
pub fn derive_key(secret: &str) -> [u8; KEY_SIZE] {
    let mut key = [b' '; KEY_SIZE];
    let bytes = secret.as_bytes();
    let len = bytes.len().min(KEY_SIZE);
    key[..len].copy_from_slice(&bytes[..len]);
    key
}

/// Encrypts plaintext using AES-256-CBC with a random IV.
///
/// # Returns
/// * `Ok(String)` - `"<ivHex>:<cipherHex>"` suitable for persistence
/// * `Err` - If encryption fails
pub fn encrypt(plaintext: &str, key: &[u8; KEY_SIZE]) -> Result<String> {
    // Generate random IV (never reuse!)
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::new_from_slices(key, &iv)
        .map_err(|e| anyhow!("Failed to create cipher: {}", e))?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    Ok(format!("{}:{}", hex::encode(iv), hex::encode(ciphertext)))
}

/// Decrypts a stored `"<ivHex>:<cipherHex>"` string.
///
/// A malformed or truncated input (missing separator, bad hex, wrong IV
/// length, invalid padding) is a decryption failure, never a panic.
///
/// # Returns
/// * `Ok(String)` - Decrypted plaintext
/// * `Err` - If the stored string is malformed or decryption fails
pub fn decrypt(stored: &str, key: &[u8; KEY_SIZE]) -> Result<String> {
    let (iv_hex, cipher_hex) = stored
        .split_once(':')
        .ok_or_else(|| anyhow!("Malformed encrypted data: missing ':' separator"))?;

    let iv = hex::decode(iv_hex).context("Failed to decode IV hex")?;
    let ciphertext = hex::decode(cipher_hex).context("Failed to decode ciphertext hex")?;

    if iv.len() != IV_SIZE {
        return Err(anyhow!(
            "Invalid IV size: expected {}, got {}",
            IV_SIZE,
            iv.len()
        ));
    }

    let plaintext_bytes = Aes256CbcDec::new_from_slices(key, &iv)
        .map_err(|e| anyhow!("Failed to create cipher: {}", e))?
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| anyhow!("Decryption failed (wrong key or corrupted data)"))?;

    String::from_utf8(plaintext_bytes).context("Decrypted data is not valid UTF-8")
}
