//! Symmetric encryption of secrets at rest.
//!
//! [`TokenCipher`] derives a 256-bit AES-GCM key from a shared secret with
//! SHA-256. Every call to [`TokenCipher::encrypt`] draws a fresh 96-bit nonce,
//! so encrypting the same plaintext twice yields different ciphertexts.
//!
//! Ciphertext format: URL-safe base64 (no padding) of `nonce || ciphertext || tag`.
//!
//! Rotating the shared secret makes every previously stored ciphertext
//! undecryptable; callers treat that as "credentials invalid" and send the
//! user back through login.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::store::Secret;

const NONCE_LEN: usize = 12;

/// Error type for encryption and decryption.
///
/// Messages never include plaintext or ciphertext.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// The ciphertext is not valid base64 or is too short to hold a nonce.
    #[error("malformed ciphertext")]
    Malformed,

    /// Authentication failed: wrong key or tampered ciphertext.
    #[error("decryption failed")]
    DecryptFailed,

    /// Encryption failed.
    #[error("encryption failed")]
    EncryptFailed,
}

/// AES-256-GCM cipher keyed from a shared secret.
#[derive(Clone)]
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    /// Derive the cipher key from a shared secret.
    pub fn from_secret(shared_secret: &Secret) -> Self {
        let key = Sha256::digest(shared_secret.expose().as_bytes());
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    /// Encrypt a plaintext value.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::EncryptFailed)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(out))
    }

    /// Decrypt a value produced by [`encrypt`](Self::encrypt).
    pub fn decrypt(&self, ciphertext: &str) -> Result<Secret, CryptoError> {
        let raw = URL_SAFE_NO_PAD
            .decode(ciphertext.trim().as_bytes())
            .map_err(|_| CryptoError::Malformed)?;
        if raw.len() <= NONCE_LEN {
            return Err(CryptoError::Malformed);
        }

        let (nonce_bytes, body) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), body)
            .map_err(|_| CryptoError::DecryptFailed)?;

        String::from_utf8(plaintext)
            .map(Secret::new)
            .map_err(|_| CryptoError::DecryptFailed)
    }
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TokenCipher([REDACTED])")
    }
}

/// Generate a URL-safe random token carrying `num_bytes` bytes of entropy.
pub fn random_url_token(num_bytes: usize) -> String {
    let mut bytes = vec![0u8; num_bytes];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher(secret: &str) -> TokenCipher {
        TokenCipher::from_secret(&Secret::new(secret))
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let c = cipher("shared-secret");
        for value in ["ya29.a0AfH6SM", "x", "ünïcødé token with spaces"] {
            let encrypted = c.encrypt(value).unwrap();
            assert_ne!(encrypted, value);
            assert_eq!(c.decrypt(&encrypted).unwrap().expose(), value);
        }
    }

    #[test]
    fn test_encrypt_uses_fresh_nonce() {
        let c = cipher("shared-secret");
        let a = c.encrypt("same").unwrap();
        let b = c.encrypt("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_same_secret_derives_same_key() {
        let encrypted = cipher("shared-secret").encrypt("token").unwrap();
        let decrypted = cipher("shared-secret").decrypt(&encrypted).unwrap();
        assert_eq!(decrypted.expose(), "token");
    }

    #[test]
    fn test_rotated_secret_fails() {
        let encrypted = cipher("old-secret").encrypt("token").unwrap();
        let result = cipher("new-secret").decrypt(&encrypted);
        assert_eq!(result.unwrap_err(), CryptoError::DecryptFailed);
    }

    #[test]
    fn test_malformed_ciphertext() {
        let c = cipher("shared-secret");
        assert_eq!(c.decrypt("not base64 !!").unwrap_err(), CryptoError::Malformed);
        assert_eq!(c.decrypt("AAAA").unwrap_err(), CryptoError::Malformed);
    }

    #[test]
    fn test_tampered_ciphertext() {
        let c = cipher("shared-secret");
        let encrypted = c.encrypt("token").unwrap();
        let mut raw = URL_SAFE_NO_PAD.decode(&encrypted).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;

        let result = c.decrypt(&URL_SAFE_NO_PAD.encode(raw));
        assert_eq!(result.unwrap_err(), CryptoError::DecryptFailed);
    }

    #[test]
    fn test_random_url_token() {
        let a = random_url_token(32);
        let b = random_url_token(32);

        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
