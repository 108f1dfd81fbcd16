//! Content encryption algorithms for Key Encryption mode.
//!
//! The CEK sealed with HPKE encrypts the content with AES-GCM.
//! Currently supported: A256GCM, A128GCM.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use rand::RngCore;
use zeroize::Zeroize;

use super::hpke::Aead;
use crate::error::*;

/// Content encryption algorithm identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentEncryption {
    /// AES-256-GCM
    #[default]
    A256GCM,
    /// AES-128-GCM
    A128GCM,
}

impl ContentEncryption {
    /// Get the JWE "enc" header value for this algorithm.
    pub fn alg_name(&self) -> &'static str {
        match self {
            ContentEncryption::A256GCM => "A256GCM",
            ContentEncryption::A128GCM => "A128GCM",
        }
    }

    /// Parse a content encryption algorithm from its JWE name.
    pub fn from_alg_name(name: &str) -> Result<Self, Error> {
        match name {
            "A256GCM" => Ok(ContentEncryption::A256GCM),
            "A128GCM" => Ok(ContentEncryption::A128GCM),
            _ => bail!(JWEError::UnsupportedContentEncryption(name.to_string())),
        }
    }

    /// Map the HPKE AEAD of a suite to the content encryption algorithm.
    ///
    /// ChaCha20Poly1305 has no JWE "enc" counterpart and maps to A256GCM.
    pub fn for_hpke_aead(aead_id: u16) -> Result<Self, Error> {
        match aead_id {
            Aead::AES_128_GCM_ID => Ok(ContentEncryption::A128GCM),
            Aead::AES_256_GCM_ID | Aead::CHACHA20_POLY1305_ID => Ok(ContentEncryption::A256GCM),
            _ => bail!(JWEError::UnsupportedAead(aead_id)),
        }
    }

    /// Get the required key size in bytes.
    pub fn key_size(&self) -> usize {
        match self {
            ContentEncryption::A256GCM => 32,
            ContentEncryption::A128GCM => 16,
        }
    }

    /// Get the IV size in bytes.
    pub fn iv_size(&self) -> usize {
        12 // GCM uses 96-bit IV
    }

    /// Get the authentication tag size in bytes.
    pub fn tag_size(&self) -> usize {
        16 // GCM uses 128-bit tag
    }

    /// Generate a random Content Encryption Key (CEK) for this algorithm.
    pub fn generate_cek(&self) -> CEK {
        let mut cek = vec![0u8; self.key_size()];
        rand::thread_rng().fill_bytes(&mut cek);
        CEK::new(cek)
    }

    /// Generate a random IV for this algorithm.
    pub fn generate_iv(&self) -> Vec<u8> {
        let mut iv = vec![0u8; self.iv_size()];
        rand::thread_rng().fill_bytes(&mut iv);
        iv
    }

    /// Encrypt plaintext using the content encryption algorithm.
    ///
    /// Returns (ciphertext, authentication_tag).
    pub fn encrypt(
        &self,
        cek: &[u8],
        iv: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>), Error> {
        ensure!(cek.len() == self.key_size(), JWEError::InvalidLength);
        ensure!(iv.len() == self.iv_size(), JWEError::InvalidLength);

        let nonce = GenericArray::from_slice(iv);
        let mut ciphertext = plaintext.to_vec();
        let tag = match self {
            ContentEncryption::A256GCM => Aes256Gcm::new_from_slice(cek)
                .map_err(|_| JWEError::InvalidLength)?
                .encrypt_in_place_detached(nonce, aad, &mut ciphertext),
            ContentEncryption::A128GCM => Aes128Gcm::new_from_slice(cek)
                .map_err(|_| JWEError::InvalidLength)?
                .encrypt_in_place_detached(nonce, aad, &mut ciphertext),
        }
        .map_err(|_| JWEError::InternalError("content encryption failed".into()))?;

        Ok((ciphertext, tag.to_vec()))
    }

    /// Decrypt ciphertext using the content encryption algorithm.
    ///
    /// Returns the plaintext.
    pub fn decrypt(
        &self,
        cek: &[u8],
        iv: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
    ) -> Result<Vec<u8>, Error> {
        ensure!(cek.len() == self.key_size(), JWEError::MalformedMessage);
        ensure!(iv.len() == self.iv_size(), JWEError::MalformedMessage);
        ensure!(tag.len() == self.tag_size(), JWEError::AuthenticationFailure);

        let nonce = GenericArray::from_slice(iv);
        let tag = GenericArray::from_slice(tag);
        let mut plaintext = ciphertext.to_vec();
        let res = match self {
            ContentEncryption::A256GCM => Aes256Gcm::new_from_slice(cek)
                .map_err(|_| JWEError::MalformedMessage)?
                .decrypt_in_place_detached(nonce, aad, &mut plaintext, tag),
            ContentEncryption::A128GCM => Aes128Gcm::new_from_slice(cek)
                .map_err(|_| JWEError::MalformedMessage)?
                .decrypt_in_place_detached(nonce, aad, &mut plaintext, tag),
        };
        if res.is_err() {
            plaintext.zeroize();
            bail!(JWEError::AuthenticationFailure);
        }

        Ok(plaintext)
    }
}

/// A Content Encryption Key (CEK) that is zeroized on drop.
#[derive(Clone)]
pub struct CEK {
    key: Vec<u8>,
}

impl CEK {
    /// Create a new CEK from bytes.
    pub fn new(key: Vec<u8>) -> Self {
        CEK { key }
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }
}

impl Drop for CEK {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}
