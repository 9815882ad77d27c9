//! AES-128-CBC encryption of audio payloads.
//!
//! AirTunes v2 encrypts only the whole 16-byte blocks of each packet's
//! payload and leaves the trailing remainder as plaintext; the chain
//! restarts from the session IV on every packet, so packets decrypt
//! independently of delivery order.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes128;

/// AES key size in bytes
pub const AES_KEY_SIZE: usize = 16;
/// AES IV size in bytes
pub const AES_IV_SIZE: usize = 16;
/// AES block size in bytes
pub const AES_BLOCK_SIZE: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Per-session AES-128-CBC packet cipher
#[derive(Debug)]
pub struct AudioCipher {
    key: [u8; AES_KEY_SIZE],
    iv: [u8; AES_IV_SIZE],
}

impl AudioCipher {
    /// Create a cipher from the session key and IV
    #[must_use]
    pub fn new(key: [u8; AES_KEY_SIZE], iv: [u8; AES_IV_SIZE]) -> Self {
        Self { key, iv }
    }

    /// Encrypt one packet's payload in place.
    ///
    /// Whole 16-byte blocks are CBC-chained from the session IV; the
    /// final `len % 16` bytes stay plaintext.
    pub fn encrypt_packet(&self, payload: &mut [u8]) {
        let whole = payload.len() - payload.len() % AES_BLOCK_SIZE;
        let mut cbc = Aes128CbcEnc::new(&self.key.into(), &self.iv.into());
        for block in payload[..whole].chunks_exact_mut(AES_BLOCK_SIZE) {
            cbc.encrypt_block_mut(GenericArray::from_mut_slice(block));
        }
    }

    /// Decrypt one packet's payload in place (receiver-side inverse,
    /// used by tests)
    pub fn decrypt_packet(&self, payload: &mut [u8]) {
        let whole = payload.len() - payload.len() % AES_BLOCK_SIZE;
        let mut cbc = Aes128CbcDec::new(&self.key.into(), &self.iv.into());
        for block in payload[..whole].chunks_exact_mut(AES_BLOCK_SIZE) {
            cbc.decrypt_block_mut(GenericArray::from_mut_slice(block));
        }
    }
}

impl Drop for AudioCipher {
    fn drop(&mut self) {
        self.key.iter_mut().for_each(|b| *b = 0);
        self.iv.iter_mut().for_each(|b| *b = 0);
    }
}
