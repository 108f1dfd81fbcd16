//! HPKE ciphersuites.
//!
//! A [`CipherSuite`] binds a KEM, a KDF and an AEAD and exposes the
//! single-shot base-mode operations JOSE needs:
//!
//! ```rust
//! use jose_hpke::algorithms::hpke::CipherSuite;
//!
//! let suite = CipherSuite::from_ids(0x0050, 0x0011, 0x0002).unwrap();
//! let key_pair = suite.derive_key_pair(&[0x42; 32]).unwrap();
//! let sealed = suite
//!     .seal(key_pair.public_key(), b"secret", b"info", b"aad")
//!     .unwrap();
//! let opened = suite
//!     .open(key_pair.private_key(), &sealed.encapsulated_key, &sealed.ciphertext, b"info", b"aad")
//!     .unwrap();
//! assert_eq!(opened, b"secret");
//! ```

pub mod aead;
pub mod kdf;
pub mod kem;

use zeroize::Zeroize;

pub use self::aead::Aead;
pub use self::kdf::Kdf;
pub use self::kem::{Curve, Kem};
use crate::error::*;

/// The numeric identifiers of a ciphersuite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SuiteIds {
    pub kem_id: u16,
    pub kdf_id: u16,
    pub aead_id: u16,
}

impl SuiteIds {
    /// `kem_id || kdf_id || aead_id`, each as a big-endian 16-bit value.
    pub fn to_bytes(&self) -> [u8; 6] {
        let mut out = [0u8; 6];
        out[0..2].copy_from_slice(&self.kem_id.to_be_bytes());
        out[2..4].copy_from_slice(&self.kdf_id.to_be_bytes());
        out[4..6].copy_from_slice(&self.aead_id.to_be_bytes());
        out
    }
}

/// A serialized key pair. The private key is zeroized on drop.
#[derive(Clone)]
pub struct KeyPair {
    public_key: Vec<u8>,
    private_key: Vec<u8>,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key_len", &self.public_key.len())
            .finish_non_exhaustive()
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}

impl KeyPair {
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }
}

/// Output of a single-shot `Seal`.
#[derive(Debug, Clone)]
pub struct Sealed {
    pub encapsulated_key: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

/// An HPKE ciphersuite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CipherSuite {
    kem: Kem,
    kdf: Kdf,
    aead: Aead,
}

impl CipherSuite {
    pub fn new(kem: Kem, kdf: Kdf, aead: Aead) -> Self {
        CipherSuite { kem, kdf, aead }
    }

    pub fn from_ids(kem_id: u16, kdf_id: u16, aead_id: u16) -> Result<Self, Error> {
        Ok(CipherSuite {
            kem: Kem::from_id(kem_id)?,
            kdf: Kdf::from_id(kdf_id)?,
            aead: Aead::from_id(aead_id)?,
        })
    }

    pub fn kem(&self) -> Kem {
        self.kem
    }

    pub fn kdf(&self) -> Kdf {
        self.kdf
    }

    pub fn aead(&self) -> Aead {
        self.aead
    }

    pub fn ids(&self) -> SuiteIds {
        SuiteIds {
            kem_id: self.kem.id(),
            kdf_id: self.kdf.id(),
            aead_id: self.aead.id(),
        }
    }

    fn suite_id(&self) -> Vec<u8> {
        let mut suite_id = b"HPKE".to_vec();
        suite_id.extend_from_slice(&self.ids().to_bytes());
        suite_id
    }

    /// Derive a key pair from input keying material of at least `Nsk` bytes.
    pub fn derive_key_pair(&self, ikm: &[u8]) -> Result<KeyPair, Error> {
        let (public_key, private_key) = self.kem.derive_key_pair(ikm)?;
        Ok(KeyPair {
            public_key,
            private_key,
        })
    }

    pub fn serialize_public_key(&self, key_pair: &KeyPair) -> Vec<u8> {
        key_pair.public_key.clone()
    }

    pub fn serialize_private_key(&self, key_pair: &KeyPair) -> Vec<u8> {
        key_pair.private_key.clone()
    }

    /// Validate a serialized public key.
    pub fn deserialize_public_key(&self, raw: &[u8]) -> Result<Vec<u8>, Error> {
        self.kem.validate_public_key(raw)?;
        Ok(raw.to_vec())
    }

    /// Rebuild a key pair from a serialized private key.
    pub fn deserialize_private_key(&self, raw: &[u8]) -> Result<KeyPair, Error> {
        let public_key = self.kem.public_key(raw)?;
        Ok(KeyPair {
            public_key,
            private_key: raw.to_vec(),
        })
    }

    /// Single-shot base-mode `Seal`.
    pub fn seal(
        &self,
        public_key: &[u8],
        plaintext: &[u8],
        info: &[u8],
        aad: &[u8],
    ) -> Result<Sealed, Error> {
        let (mut shared_secret, encapsulated_key) = self.kem.encap(public_key)?;
        let schedule = self.kdf.key_schedule(
            &self.suite_id(),
            &shared_secret,
            info,
            self.aead.nk(),
            self.aead.nn(),
        );
        shared_secret.zeroize();
        let (mut key, nonce) = schedule?;
        let ciphertext = self.aead.seal(&key, &nonce, aad, plaintext);
        key.zeroize();
        tracing::trace!(
            kem = self.kem.name(),
            aead = self.aead.name(),
            plaintext_len = plaintext.len(),
            "HPKE seal"
        );
        Ok(Sealed {
            encapsulated_key,
            ciphertext: ciphertext?,
        })
    }

    /// Single-shot base-mode `Open`.
    pub fn open(
        &self,
        private_key: &[u8],
        encapsulated_key: &[u8],
        ciphertext: &[u8],
        info: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let mut shared_secret = self.kem.decap(encapsulated_key, private_key)?;
        let schedule = self.kdf.key_schedule(
            &self.suite_id(),
            &shared_secret,
            info,
            self.aead.nk(),
            self.aead.nn(),
        );
        shared_secret.zeroize();
        let (mut key, nonce) = schedule?;
        let plaintext = self.aead.open(&key, &nonce, aad, ciphertext);
        key.zeroize();
        tracing::trace!(
            kem = self.kem.name(),
            aead = self.aead.name(),
            ok = plaintext.is_ok(),
            "HPKE open"
        );
        plaintext
    }
}
