use argon2::Argon2;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

use crate::StorageError;

/// Argon2id parameters the wallet file's key derivation is tuned to, matching the pack's own
/// encrypted-wallet-file precedent.
const ARGON2_MEMORY_KB: u32 = 65536;
const ARGON2_ITERATIONS: u32 = 3;
const ARGON2_PARALLELISM: u32 = 4;

/// The on-disk salt length.
pub const SALT_LEN: usize = 16;
/// The on-disk nonce length, matching ChaCha20-Poly1305's 96-bit nonce.
pub const NONCE_LEN: usize = 12;

/// Generate a fresh random salt.
pub fn random_salt() -> [u8; SALT_LEN] {
  let mut salt = [0; SALT_LEN];
  OsRng.fill_bytes(&mut salt);
  salt
}

/// Generate a fresh random nonce.
pub fn random_nonce() -> [u8; NONCE_LEN] {
  let mut nonce = [0; NONCE_LEN];
  OsRng.fill_bytes(&mut nonce);
  nonce
}

/// Derive a 32-byte encryption key from a password and salt via Argon2id.
pub fn derive_key(password: &str, salt: &[u8; SALT_LEN]) -> Result<Zeroizing<[u8; 32]>, StorageError> {
  let argon2 = Argon2::new(
    argon2::Algorithm::Argon2id,
    argon2::Version::V0x13,
    argon2::Params::new(ARGON2_MEMORY_KB, ARGON2_ITERATIONS, ARGON2_PARALLELISM, Some(32))
      .map_err(|e| StorageError::Kdf(e.to_string()))?,
  );

  let mut key = Zeroizing::new([0u8; 32]);
  argon2
    .hash_password_into(password.as_bytes(), salt, key.as_mut())
    .map_err(|e| StorageError::Kdf(e.to_string()))?;
  Ok(key)
}

/// Seal `plaintext` under `key`/`nonce`, returning ciphertext with its authentication tag
/// appended.
pub fn seal(key: &[u8; 32], nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>, StorageError> {
  let cipher = ChaCha20Poly1305::new_from_slice(key).expect("key is exactly 32 bytes");
  cipher.encrypt(Nonce::from_slice(nonce), plaintext).map_err(|_| StorageError::Crypto)
}

/// Open a blob sealed by [`seal`].
pub fn open(key: &[u8; 32], nonce: &[u8; NONCE_LEN], sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>, StorageError> {
  let cipher = ChaCha20Poly1305::new_from_slice(key).expect("key is exactly 32 bytes");
  cipher
    .decrypt(Nonce::from_slice(nonce), sealed)
    .map(Zeroizing::new)
    .map_err(|_| StorageError::Crypto)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn seal_and_open_round_trip() {
    let salt = random_salt();
    let key = derive_key("hunter2", &salt).unwrap();
    let nonce = random_nonce();
    let sealed = seal(&key, &nonce, b"secret document").unwrap();
    let opened = open(&key, &nonce, &sealed).unwrap();
    assert_eq!(&*opened, b"secret document");
  }

  #[test]
  fn wrong_key_fails_to_open() {
    let nonce = random_nonce();
    let right_key = derive_key("right", &random_salt()).unwrap();
    let wrong_key = derive_key("wrong", &random_salt()).unwrap();
    let sealed = seal(&right_key, &nonce, b"payload").unwrap();
    assert!(matches!(open(&wrong_key, &nonce, &sealed), Err(StorageError::Crypto)));
  }
}
