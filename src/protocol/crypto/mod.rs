//! Crypto for the RAOP audio path: AES-128-CBC payload encryption and
//! RSA wrapping of the session key

mod aes;
mod rsa;

pub use aes::{AudioCipher, AES_BLOCK_SIZE, AES_IV_SIZE, AES_KEY_SIZE};
pub use rsa::{AirportRsaKey, ThrowawayRsaKey};

use thiserror::Error;

/// Errors from the crypto layer
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key or IV had the wrong length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Required length in bytes
        expected: usize,
        /// Provided length in bytes
        actual: usize,
    },

    /// The pinned RSA public key failed to parse
    #[error("invalid RSA public key")]
    InvalidPublicKey,

    /// RSA encryption failed
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// RSA decryption failed (test keys only)
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
}
