//! Block cipher behind the encryption service
//!
//! The gateway only needs "encrypt one 16-byte block with the device key".
//! [`BlockCipher`] is that seam; AES-128 from the RustCrypto `aes` crate is
//! the production implementation.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;

/// Cipher block size in bytes
pub const BLOCK_LEN: usize = 16;

/// Device secret
///
/// Deliberately neither `Clone` nor `Debug`. Consumed when the gateway is
/// built; the bytes are wiped on drop.
pub struct DeviceKey([u8; BLOCK_LEN]);

impl DeviceKey {
    pub const fn from_bytes(bytes: [u8; BLOCK_LEN]) -> Self {
        Self(bytes)
    }

    pub(crate) fn expose(&self) -> &[u8; BLOCK_LEN] {
        &self.0
    }
}

impl Drop for DeviceKey {
    fn drop(&mut self) {
        for byte in self.0.iter_mut() {
            // volatile so the wipe is not elided as a dead store
            unsafe { core::ptr::write_volatile(byte, 0) };
        }
    }
}

/// One-block encryption primitive
pub trait BlockCipher {
    /// Expand `key` into the cipher's internal schedule
    fn from_key(key: &[u8; BLOCK_LEN]) -> Self;

    /// Encrypt `block` in place
    fn encrypt_block(&self, block: &mut [u8; BLOCK_LEN]);
}

impl BlockCipher for Aes128 {
    fn from_key(key: &[u8; BLOCK_LEN]) -> Self {
        Aes128::new(GenericArray::from_slice(key))
    }

    fn encrypt_block(&self, block: &mut [u8; BLOCK_LEN]) {
        BlockEncrypt::encrypt_block(self, GenericArray::from_mut_slice(block));
    }
}
