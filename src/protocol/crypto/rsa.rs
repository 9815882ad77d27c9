//! RSA key wrapping for the ANNOUNCE handshake.
//!
//! The session AES key is encrypted to the historical AirPort Express
//! public key before it is base64-encoded into the SDP `rsaaeskey`
//! attribute. Pinning this key is a known deviation from ideal hygiene;
//! it is treated as an implementation configuration constant.

use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;

use super::CryptoError;

/// The well-known AirPort/AppleTV RAOP public key (2048-bit, e=65537)
const AIRPORT_PUBLIC_KEY_PEM: &str = "-----BEGIN PUBLIC KEY-----
MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEA59dE8qLieItsH1WgjrcF
RKj6eUWqi+bGLOX1HL3U3GhC/j0Qg90u3sG/1CUtwC5vOYvfDmFI6oSFXi5ELabW
JmT2dKHzBJKa3k9ok+8t9ucRqMd6DZHJ2YCCLlDRKSKv6kDqnw4UwPdpOMXziC/A
Mj3Z/lUVX1G7WSHCAWKf1zNS1eLvqr+boEjXuBOitnZ/bDzPHrTOZz0Dew0uowxf
/+sG+NCK3eQJVxqcaJ/vEHKIVd2M+5qL71yJQ+87X6oV3eaYvt3zWZYD6z5vYTcr
tij2VZ9Zmni/UAaHqn9JdsBWLUEpVviYnhimNVvYFZeCXg/Id2Z2bRRsvDvezMbx
vQIDAQAB
-----END PUBLIC KEY-----";

/// The pinned receiver public key used to wrap session AES keys
pub struct AirportRsaKey {
    inner: RsaPublicKey,
}

impl AirportRsaKey {
    /// Load the pinned key
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidPublicKey`] if the embedded constant
    /// fails to parse.
    pub fn load() -> Result<Self, CryptoError> {
        let inner = RsaPublicKey::from_public_key_pem(AIRPORT_PUBLIC_KEY_PEM)
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { inner })
    }

    /// Wrap a public key loaded from elsewhere (receiver emulation)
    #[must_use]
    pub fn from_public_key(inner: RsaPublicKey) -> Self {
        Self { inner }
    }

    /// RSA-OAEP(SHA-1) encrypt, as the AirTunes key exchange requires
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::EncryptionFailed`] when the plaintext is
    /// too long for the key.
    pub fn encrypt_oaep(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.inner
            .encrypt(&mut rand::rngs::OsRng, Oaep::new::<Sha1>(), plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
    }
}

/// A generated keypair standing in for a receiver in tests
pub struct ThrowawayRsaKey {
    inner: RsaPrivateKey,
}

impl ThrowawayRsaKey {
    /// Generate a fresh 2048-bit keypair
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::EncryptionFailed`] if key generation fails.
    pub fn generate() -> Result<Self, CryptoError> {
        let inner = RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        Ok(Self { inner })
    }

    /// The matching public key
    #[must_use]
    pub fn public_key(&self) -> RsaPublicKey {
        self.inner.to_public_key()
    }

    /// RSA-OAEP(SHA-1) decrypt, the receiver side of the key exchange
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::DecryptionFailed`] on a bad ciphertext.
    pub fn decrypt_oaep(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.inner
            .decrypt(Oaep::new::<Sha1>(), ciphertext)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
    }
}
