//! Record encryption.
//!
//! Keys are derived from the store passphrase with Argon2id and a per-store
//! random salt. Every sealed value carries its own random 24-byte nonce and
//! is authenticated with XChaCha20-Poly1305, so a wrong key or a tampered
//! row fails to open instead of producing garbage.

use crate::error::{Error, Result};
use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::{Aead, KeyInit, OsRng};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

pub const DERIVED_KEY_LEN: usize = 32;
pub const SALT_LEN: usize = 32;
pub const NONCE_LEN: usize = 24;

/// Argon2id cost parameters, persisted alongside the salt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl KdfParams {
    #[must_use]
    pub const fn new(memory_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        Self {
            memory_cost,
            time_cost,
            parallelism,
        }
    }
}

impl Default for KdfParams {
    /// 19 MiB, 2 passes, 1 lane.
    fn default() -> Self {
        Self::new(19 * 1024, 2, 1)
    }
}

/// A derived store key. Wiped from memory on drop.
pub struct StoreKey(Zeroizing<Vec<u8>>);

impl std::fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StoreKey(..)")
    }
}

/// Derive the store key from a passphrase.
///
/// # Errors
///
/// Returns `Crypto` if the parameters are rejected by Argon2.
pub fn derive_key(passphrase: &str, salt: &[u8], params: KdfParams) -> Result<StoreKey> {
    let params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(DERIVED_KEY_LEN),
    )
    .map_err(|e| Error::Crypto(format!("argon2 params: {e}")))?;
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut key = Zeroizing::new(vec![0u8; DERIVED_KEY_LEN]);
    argon
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| Error::Crypto(format!("argon2 derive: {e}")))?;
    Ok(StoreKey(key))
}

/// Encrypt `plaintext`, returning `(nonce, ciphertext)`.
///
/// # Errors
///
/// Returns `Crypto` if encryption fails.
pub fn seal(key: &StoreKey, plaintext: &[u8]) -> Result<([u8; NONCE_LEN], Vec<u8>)> {
    let nonce = generate_nonce();
    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key.0));
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|e| Error::Crypto(format!("encrypt: {e}")))?;
    Ok((nonce, ciphertext))
}

/// Decrypt and authenticate a sealed value.
///
/// # Errors
///
/// Returns `Crypto` if the nonce is malformed, the key is wrong, or the
/// ciphertext was modified.
pub fn open(key: &StoreKey, nonce: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if nonce.len() != NONCE_LEN {
        return Err(Error::Crypto(format!(
            "nonce has {} bytes, expected {NONCE_LEN}",
            nonce.len()
        )));
    }
    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key.0));
    let plaintext = cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|e| Error::Crypto(format!("decrypt: {e}")))?;
    Ok(Zeroizing::new(plaintext))
}

#[must_use]
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

#[must_use]
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: KdfParams = KdfParams::new(256, 1, 1);

    #[test]
    fn test_seal_open() {
        let salt = generate_salt();
        let key = derive_key("hunter2", &salt, FAST).unwrap();
        let (nonce, ciphertext) = seal(&key, b"groceries").unwrap();
        assert_ne!(ciphertext.as_slice(), b"groceries");
        let plaintext = open(&key, &nonce, &ciphertext).unwrap();
        assert_eq!(plaintext.as_slice(), b"groceries");
    }

    #[test]
    fn test_wrong_key_fails() {
        let salt = generate_salt();
        let key = derive_key("hunter2", &salt, FAST).unwrap();
        let other = derive_key("hunter3", &salt, FAST).unwrap();
        let (nonce, ciphertext) = seal(&key, b"groceries").unwrap();
        assert!(open(&other, &nonce, &ciphertext).is_err());
    }

    #[test]
    fn test_derivation_is_salted() {
        let a = derive_key("same", &generate_salt(), FAST).unwrap();
        let b = derive_key("same", &generate_salt(), FAST).unwrap();
        assert_ne!(a.0.as_slice(), b.0.as_slice());
    }

    #[test]
    fn test_short_nonce_rejected() {
        let key = derive_key("k", &generate_salt(), FAST).unwrap();
        assert!(open(&key, &[0u8; 12], b"xx").is_err());
    }
}
