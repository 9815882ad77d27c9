//! Per-stream AES key material and its SDP forms

use base64::engine::general_purpose::STANDARD_NO_PAD as BASE64;
use base64::Engine as _;
use rand::RngCore;

use crate::protocol::crypto::{AirportRsaKey, CryptoError, AES_IV_SIZE, AES_KEY_SIZE};

/// AES key and IV for one stream, plus the RSA-wrapped key for ANNOUNCE.
///
/// A fresh random key and IV are generated per stream; the key is
/// wrapped with the pinned receiver public key.
#[derive(Debug)]
pub struct StreamKeys {
    aes_key: [u8; AES_KEY_SIZE],
    aes_iv: [u8; AES_IV_SIZE],
    wrapped_key: Vec<u8>,
}

impl StreamKeys {
    /// Generate fresh key material
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError`] when the pinned RSA key cannot be loaded
    /// or the wrap fails.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut aes_key = [0u8; AES_KEY_SIZE];
        let mut aes_iv = [0u8; AES_IV_SIZE];
        rand::thread_rng().fill_bytes(&mut aes_key);
        rand::thread_rng().fill_bytes(&mut aes_iv);

        let wrapped_key = AirportRsaKey::load()?.encrypt_oaep(&aes_key)?;

        Ok(Self {
            aes_key,
            aes_iv,
            wrapped_key,
        })
    }

    /// Build from raw parts, for tests and receiver emulation
    #[must_use]
    pub fn from_parts(
        aes_key: [u8; AES_KEY_SIZE],
        aes_iv: [u8; AES_IV_SIZE],
        wrapped_key: Vec<u8>,
    ) -> Self {
        Self {
            aes_key,
            aes_iv,
            wrapped_key,
        }
    }

    /// The AES key
    #[must_use]
    pub fn aes_key(&self) -> &[u8; AES_KEY_SIZE] {
        &self.aes_key
    }

    /// The AES IV
    #[must_use]
    pub fn aes_iv(&self) -> &[u8; AES_IV_SIZE] {
        &self.aes_iv
    }

    /// Base64 (no padding) of the RSA-wrapped key, for `a=rsaaeskey:`
    #[must_use]
    pub fn rsaaeskey(&self) -> String {
        BASE64.encode(&self.wrapped_key)
    }

    /// Base64 (no padding) of the IV, for `a=aesiv:`
    #[must_use]
    pub fn aesiv(&self) -> String {
        BASE64.encode(self.aes_iv)
    }
}

impl Drop for StreamKeys {
    fn drop(&mut self) {
        self.aes_key.iter_mut().for_each(|b| *b = 0);
        self.aes_iv.iter_mut().for_each(|b| *b = 0);
        self.wrapped_key.iter_mut().for_each(|b| *b = 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sdp_attributes_are_unpadded_base64() {
        let keys = StreamKeys::from_parts([1; 16], [2; 16], vec![3; 256]);

        let iv = keys.aesiv();
        assert!(!iv.ends_with('='));
        assert_eq!(BASE64.decode(&iv).unwrap(), vec![2u8; 16]);

        let wrapped = keys.rsaaeskey();
        assert!(!wrapped.ends_with('='));
        assert_eq!(BASE64.decode(&wrapped).unwrap().len(), 256);
    }
}
