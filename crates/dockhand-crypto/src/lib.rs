//! # dockhand-crypto
//!
//! AES-256-GCM sealing of stored network credentials.
//!
//! The 32-byte key is derived from the configured secret via SHA-256. Each
//! message uses a fresh random 12-byte nonce prepended to the ciphertext;
//! the whole blob is base64-encoded for column storage. Empty plaintext
//! round-trips to an empty string so optional credentials stay optional.

pub mod error;

pub use error::{CryptoError, CryptoResult};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Nonce length for AES-GCM.
const NONCE_LEN: usize = 12;

/// Credential encryption keyed by a process-lifetime secret.
#[derive(Clone)]
pub struct CredentialCrypto {
    key: [u8; 32],
}

impl CredentialCrypto {
    /// Create a crypto instance, deriving the key from `secret` via SHA-256.
    pub fn new(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self { key }
    }

    /// Encrypt plaintext, returning base64(nonce ‖ ciphertext ‖ tag).
    ///
    /// Empty input returns an empty string.
    pub fn encrypt(&self, plaintext: &str) -> CryptoResult<String> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::Encryption("AES-GCM encryption failed".into()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(blob))
    }

    /// Decrypt a value produced by [`encrypt`](Self::encrypt).
    ///
    /// Empty input returns an empty string.
    pub fn decrypt(&self, encrypted: &str) -> CryptoResult<String> {
        if encrypted.is_empty() {
            return Ok(String::new());
        }

        let blob = BASE64
            .decode(encrypted)
            .map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;

        if blob.len() < NONCE_LEN {
            return Err(CryptoError::CiphertextTooShort);
        }

        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|_| CryptoError::Decryption("invalid key".into()))?;

        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CryptoError::Decryption("AES-GCM decryption failed".into()))?;

        String::from_utf8(plaintext)
            .map_err(|_| CryptoError::Decryption("plaintext is not valid UTF-8".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let crypto = CredentialCrypto::new("test-secret");
        let encrypted = crypto.encrypt("hunter2").unwrap();
        assert_ne!(encrypted, "hunter2");
        assert_eq!(crypto.decrypt(&encrypted).unwrap(), "hunter2");
    }

    #[test]
    fn test_empty_roundtrip() {
        let crypto = CredentialCrypto::new("test-secret");
        assert_eq!(crypto.encrypt("").unwrap(), "");
        assert_eq!(crypto.decrypt("").unwrap(), "");
    }

    #[test]
    fn test_unicode_roundtrip() {
        let crypto = CredentialCrypto::new("test-secret");
        let input = "pässwörd-日本語";
        let encrypted = crypto.encrypt(input).unwrap();
        assert_eq!(crypto.decrypt(&encrypted).unwrap(), input);
    }

    #[test]
    fn test_nonces_are_unique() {
        let crypto = CredentialCrypto::new("test-secret");
        let a = crypto.encrypt("same input").unwrap();
        let b = crypto.encrypt("same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_decrypt_wrong_key_fails() {
        let crypto = CredentialCrypto::new("secret-a");
        let other = CredentialCrypto::new("secret-b");

        let encrypted = crypto.encrypt("payload").unwrap();
        assert!(matches!(
            other.decrypt(&encrypted),
            Err(CryptoError::Decryption(_))
        ));
    }

    #[test]
    fn test_decrypt_bad_base64() {
        let crypto = CredentialCrypto::new("test-secret");
        assert!(matches!(
            crypto.decrypt("not!!base64"),
            Err(CryptoError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_decrypt_too_short() {
        let crypto = CredentialCrypto::new("test-secret");
        let short = BASE64.encode([1u8, 2, 3]);
        assert!(matches!(
            crypto.decrypt(&short),
            Err(CryptoError::CiphertextTooShort)
        ));
    }

    #[test]
    fn test_decrypt_tampered_ciphertext() {
        let crypto = CredentialCrypto::new("test-secret");
        let encrypted = crypto.encrypt("payload").unwrap();

        let mut blob = BASE64.decode(&encrypted).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xff;
        let tampered = BASE64.encode(blob);

        assert!(matches!(
            crypto.decrypt(&tampered),
            Err(CryptoError::Decryption(_))
        ));
    }

    #[test]
    fn test_same_secret_decrypts_across_instances() {
        let a = CredentialCrypto::new("shared");
        let b = CredentialCrypto::new("shared");
        let encrypted = a.encrypt("portable").unwrap();
        assert_eq!(b.decrypt(&encrypted).unwrap(), "portable");
    }
}
