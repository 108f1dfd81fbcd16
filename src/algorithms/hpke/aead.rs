//! HPKE AEAD algorithms.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead as _, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use chacha20poly1305::ChaCha20Poly1305;

use crate::error::*;

/// AEAD identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aead {
    Aes128Gcm,
    Aes256Gcm,
    ChaCha20Poly1305,
}

impl Aead {
    pub const AES_128_GCM_ID: u16 = 0x0001;
    pub const AES_256_GCM_ID: u16 = 0x0002;
    pub const CHACHA20_POLY1305_ID: u16 = 0x0003;

    pub fn from_id(id: u16) -> Result<Self, Error> {
        match id {
            Self::AES_128_GCM_ID => Ok(Aead::Aes128Gcm),
            Self::AES_256_GCM_ID => Ok(Aead::Aes256Gcm),
            Self::CHACHA20_POLY1305_ID => Ok(Aead::ChaCha20Poly1305),
            _ => bail!(JWEError::UnsupportedAead(id)),
        }
    }

    pub fn id(&self) -> u16 {
        match self {
            Aead::Aes128Gcm => Self::AES_128_GCM_ID,
            Aead::Aes256Gcm => Self::AES_256_GCM_ID,
            Aead::ChaCha20Poly1305 => Self::CHACHA20_POLY1305_ID,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Aead::Aes128Gcm => "AES-128-GCM",
            Aead::Aes256Gcm => "AES-256-GCM",
            Aead::ChaCha20Poly1305 => "ChaCha20Poly1305",
        }
    }

    /// Key size (`Nk`).
    pub fn nk(&self) -> usize {
        match self {
            Aead::Aes128Gcm => 16,
            Aead::Aes256Gcm | Aead::ChaCha20Poly1305 => 32,
        }
    }

    /// Nonce size (`Nn`).
    pub fn nn(&self) -> usize {
        12
    }

    /// Tag size (`Nt`).
    pub fn nt(&self) -> usize {
        16
    }

    /// Encrypt `msg`; the tag is appended to the returned ciphertext.
    pub(crate) fn seal(
        &self,
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        msg: &[u8],
    ) -> Result<Vec<u8>, Error> {
        ensure!(key.len() == self.nk(), JWEError::InvalidLength);
        ensure!(nonce.len() == self.nn(), JWEError::InvalidLength);
        let nonce = GenericArray::from_slice(nonce);
        let payload = Payload { msg, aad };
        let ciphertext = match self {
            Aead::Aes128Gcm => Aes128Gcm::new_from_slice(key)
                .map_err(|_| JWEError::InvalidLength)?
                .encrypt(nonce, payload),
            Aead::Aes256Gcm => Aes256Gcm::new_from_slice(key)
                .map_err(|_| JWEError::InvalidLength)?
                .encrypt(nonce, payload),
            Aead::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(key)
                .map_err(|_| JWEError::InvalidLength)?
                .encrypt(nonce, payload),
        };
        Ok(ciphertext.map_err(|_| JWEError::InternalError("AEAD encryption failed".into()))?)
    }

    /// Verify and decrypt `ciphertext` (which includes the tag).
    pub(crate) fn open(
        &self,
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, Error> {
        ensure!(key.len() == self.nk(), JWEError::InvalidLength);
        ensure!(nonce.len() == self.nn(), JWEError::InvalidLength);
        ensure!(
            ciphertext.len() >= self.nt(),
            JWEError::AuthenticationFailure
        );
        let nonce = GenericArray::from_slice(nonce);
        let payload = Payload {
            msg: ciphertext,
            aad,
        };
        let plaintext = match self {
            Aead::Aes128Gcm => Aes128Gcm::new_from_slice(key)
                .map_err(|_| JWEError::InvalidLength)?
                .decrypt(nonce, payload),
            Aead::Aes256Gcm => Aes256Gcm::new_from_slice(key)
                .map_err(|_| JWEError::InvalidLength)?
                .decrypt(nonce, payload),
            Aead::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(key)
                .map_err(|_| JWEError::InvalidLength)?
                .decrypt(nonce, payload),
        };
        Ok(plaintext.map_err(|_| JWEError::AuthenticationFailure)?)
    }
}
