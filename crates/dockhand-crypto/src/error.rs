//! Error types for credential crypto operations.

use thiserror::Error;

/// Result type alias for crypto operations.
pub type CryptoResult<T> = std::result::Result<T, CryptoError>;

/// Errors raised by credential encryption/decryption.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Stored value is not valid base64.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Decoded blob is shorter than a nonce.
    #[error("ciphertext too short")]
    CiphertextTooShort,

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption or authentication failed.
    #[error("decryption failed: {0}")]
    Decryption(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            CryptoError::CiphertextTooShort.to_string(),
            "ciphertext too short"
        );
        assert_eq!(
            CryptoError::Decryption("bad tag".into()).to_string(),
            "decryption failed: bad tag"
        );
    }
}
