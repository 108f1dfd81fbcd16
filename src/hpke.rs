//! HPKE recipient keys for JWE.
//!
//! ```rust
//! use jose_hpke::prelude::*;
//!
//! let recipient = HPKEDecryptionKey::derive("HPKE-8").unwrap();
//! let encrypted = recipient
//!     .encryption_key()
//!     .encrypt(b"payload", Some(&b"aad"[..]))
//!     .unwrap();
//! assert_eq!(recipient.decrypt_compact(&encrypted.compact, None).unwrap(), b"payload");
//! assert_eq!(
//!     recipient.decrypt_flattened(&encrypted.flattened, None).unwrap(),
//!     b"payload"
//! );
//! ```

use ct_codecs::{Base64UrlSafeNoPadding, Encoder};
use rand::RngCore;
use zeroize::Zeroize;

use crate::algorithms::hpke::{CipherSuite, SuiteIds};
use crate::error::*;
use crate::jwe_token::{
    DecryptionOptions, EncryptedJWE, EncryptionOptions, FlattenedJWE, JWEMessage, JWEToken,
    SerializedJWE,
};
use crate::jwk::{self, Jwk};
use crate::registry::{self, AlgorithmEntry};

const SUITE_IDS_LEN: usize = 6;

/// Deterministic key derivation input for `alg`.
///
/// `kem_id || kdf_id || aead_id || alg`, right-aligned in a zeroed buffer of
/// `secret_key_length` bytes.
pub fn derive_seed(ids: SuiteIds, alg: &str, secret_key_length: usize) -> Result<Vec<u8>, Error> {
    let alg = alg.as_bytes();
    let block_len = SUITE_IDS_LEN + alg.len();
    ensure!(block_len <= secret_key_length, JWEError::InvalidLength);
    let mut seed = vec![0u8; secret_key_length];
    let offset = secret_key_length - block_len;
    seed[offset..offset + SUITE_IDS_LEN].copy_from_slice(&ids.to_bytes());
    seed[offset + SUITE_IDS_LEN..].copy_from_slice(alg);
    Ok(seed)
}

/// A recipient public key, bound to one algorithm.
#[derive(Debug, Clone)]
pub struct HPKEEncryptionKey {
    entry: AlgorithmEntry,
    suite: CipherSuite,
    pk: Vec<u8>,
    key_id: Option<String>,
}

impl HPKEEncryptionKey {
    /// Load a serialized public key for an algorithm of the default registry.
    pub fn from_bytes(alg: &str, raw: &[u8]) -> Result<Self, Error> {
        Self::from_entry(registry::resolve(alg)?, raw)
    }

    /// Load a serialized public key for a registry entry.
    pub fn from_entry(entry: &AlgorithmEntry, raw: &[u8]) -> Result<Self, Error> {
        let suite = entry.cipher_suite()?;
        let pk = suite
            .deserialize_public_key(raw)
            .map_err(|_| JWEError::InvalidPublicKey)?;
        Ok(HPKEEncryptionKey {
            entry: entry.clone(),
            suite,
            pk,
            key_id: None,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.pk.clone()
    }

    pub fn alg(&self) -> &str {
        &self.entry.alg
    }

    pub fn entry(&self) -> &AlgorithmEntry {
        &self.entry
    }

    pub fn cipher_suite(&self) -> &CipherSuite {
        &self.suite
    }

    /// Set the key ID.
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    /// Get the key ID.
    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    /// Set the key ID to the JWK thumbprint of this key.
    pub fn create_key_id(&mut self) -> Result<&str, Error> {
        let thumbprint = self.to_jwk()?.thumbprint()?;
        Ok(self.key_id.insert(thumbprint).as_str())
    }

    pub fn to_jwk(&self) -> Result<Jwk, Error> {
        Ok(Jwk::new(&self.entry.alg, &self.pk, None)?.with_key_id(self.key_id.clone()))
    }

    pub fn from_jwk(jwk: &Jwk) -> Result<Self, Error> {
        let mut key = Self::from_bytes(&jwk.alg, &jwk.decoded_public_key()?)?;
        key.key_id = jwk.kid.clone();
        Ok(key)
    }

    /// Encrypt into both serializations.
    ///
    /// The compact form has no JWE AAD member, so `aad` only applies to the
    /// flattened form.
    pub fn encrypt(&self, plaintext: &[u8], aad: Option<&[u8]>) -> Result<EncryptedJWE, Error> {
        self.encrypt_with_options(plaintext, aad, &EncryptionOptions::default())
    }

    pub fn encrypt_with_options(
        &self,
        plaintext: &[u8],
        aad: Option<&[u8]>,
        options: &EncryptionOptions,
    ) -> Result<EncryptedJWE, Error> {
        let compact = self.encrypt_message(plaintext, None, options)?.to_compact()?;
        let flattened = self.encrypt_message(plaintext, aad, options)?.to_flattened()?;
        Ok(EncryptedJWE { compact, flattened })
    }

    /// Encrypt into the compact serialization.
    pub fn encrypt_compact(&self, plaintext: &[u8]) -> Result<String, Error> {
        self.encrypt_message(plaintext, None, &EncryptionOptions::default())?
            .to_compact()
    }

    /// Encrypt into the flattened JSON serialization.
    pub fn encrypt_flattened(
        &self,
        plaintext: &[u8],
        aad: Option<&[u8]>,
    ) -> Result<FlattenedJWE, Error> {
        self.encrypt_message(plaintext, aad, &EncryptionOptions::default())?
            .to_flattened()
    }

    /// Encrypt into a message that can be serialized either way.
    pub fn encrypt_message(
        &self,
        plaintext: &[u8],
        aad: Option<&[u8]>,
        options: &EncryptionOptions,
    ) -> Result<JWEMessage, Error> {
        let key_id = options.key_id.clone().or_else(|| self.key_id.clone());
        JWEToken::encrypt(&self.entry, &self.suite, &self.pk, key_id, plaintext, aad)
    }
}

/// A recipient key pair, bound to one algorithm.
#[derive(Clone)]
pub struct HPKEDecryptionKey {
    encryption_key: HPKEEncryptionKey,
    sk: Vec<u8>,
}

impl std::fmt::Debug for HPKEDecryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HPKEDecryptionKey")
            .field("alg", &self.encryption_key.entry.alg)
            .field("key_id", &self.encryption_key.key_id)
            .finish_non_exhaustive()
    }
}

impl Drop for HPKEDecryptionKey {
    fn drop(&mut self) {
        self.sk.zeroize();
    }
}

impl HPKEDecryptionKey {
    /// Deterministically derive the key pair of `alg`.
    ///
    /// The key ID is set to the JWK thumbprint.
    pub fn derive(alg: &str) -> Result<Self, Error> {
        let entry = registry::resolve(alg)?;
        let suite = entry.cipher_suite()?;
        let mut seed = derive_seed(entry.suite_ids(), &entry.alg, suite.kem().nsk())?;
        let key = Self::derive_from_entry(entry, &seed);
        seed.zeroize();
        let mut key = key?;
        key.create_key_id()?;
        tracing::debug!(alg = %entry.alg, "derived deterministic HPKE key pair");
        Ok(key)
    }

    /// Derive a key pair from input keying material of at least `Nsk` bytes.
    pub fn derive_from_ikm(alg: &str, ikm: &[u8]) -> Result<Self, Error> {
        Self::derive_from_entry(registry::resolve(alg)?, ikm)
    }

    pub fn derive_from_entry(entry: &AlgorithmEntry, ikm: &[u8]) -> Result<Self, Error> {
        let suite = entry.cipher_suite()?;
        let key_pair = suite.derive_key_pair(ikm)?;
        Ok(HPKEDecryptionKey {
            encryption_key: HPKEEncryptionKey {
                entry: entry.clone(),
                suite,
                pk: suite.serialize_public_key(&key_pair),
                key_id: None,
            },
            sk: suite.serialize_private_key(&key_pair),
        })
    }

    /// Generate a random key pair.
    pub fn generate(alg: &str) -> Result<Self, Error> {
        let entry = registry::resolve(alg)?;
        let mut ikm = vec![0u8; entry.cipher_suite()?.kem().nsk()];
        rand::thread_rng().fill_bytes(&mut ikm);
        let key = Self::derive_from_entry(entry, &ikm);
        ikm.zeroize();
        key
    }

    /// Load a serialized private key for an algorithm of the default registry.
    pub fn from_bytes(alg: &str, raw: &[u8]) -> Result<Self, Error> {
        Self::from_entry(registry::resolve(alg)?, raw)
    }

    pub fn from_entry(entry: &AlgorithmEntry, raw: &[u8]) -> Result<Self, Error> {
        let suite = entry.cipher_suite()?;
        let key_pair = suite
            .deserialize_private_key(raw)
            .map_err(|_| JWEError::InvalidKeyPair)?;
        Ok(HPKEDecryptionKey {
            encryption_key: HPKEEncryptionKey {
                entry: entry.clone(),
                suite,
                pk: suite.serialize_public_key(&key_pair),
                key_id: None,
            },
            sk: suite.serialize_private_key(&key_pair),
        })
    }

    /// Export the private key.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.sk.clone()
    }

    pub fn alg(&self) -> &str {
        self.encryption_key.alg()
    }

    /// Get the public encryption key.
    pub fn encryption_key(&self) -> HPKEEncryptionKey {
        self.encryption_key.clone()
    }

    pub fn public_key(&self) -> &HPKEEncryptionKey {
        &self.encryption_key
    }

    /// Set the key ID.
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.encryption_key.key_id = Some(key_id.into());
        self
    }

    /// Get the key ID.
    pub fn key_id(&self) -> Option<&str> {
        self.encryption_key.key_id()
    }

    pub fn create_key_id(&mut self) -> Result<&str, Error> {
        self.encryption_key.create_key_id()
    }

    /// Export as a private JWK.
    pub fn to_jwk(&self) -> Result<Jwk, Error> {
        Ok(Jwk::new(
            &self.encryption_key.entry.alg,
            &self.encryption_key.pk,
            Some(&self.sk),
        )?
        .with_key_id(self.encryption_key.key_id.clone()))
    }

    /// Load a private JWK. The public key must match the private key.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, Error> {
        let mut sk = jwk.decoded_private_key()?.ok_or(JWEError::InvalidKeyPair)?;
        let key = Self::from_bytes(&jwk.alg, &sk);
        sk.zeroize();
        let mut key = key?;
        ensure!(
            key.encryption_key.pk == jwk.decoded_public_key()?,
            JWEError::InvalidKeyPair
        );
        key.encryption_key.key_id = jwk.kid.clone();
        Ok(key)
    }

    /// Decrypt a compact JWE.
    pub fn decrypt_compact(
        &self,
        token: &str,
        options: Option<DecryptionOptions>,
    ) -> Result<Vec<u8>, Error> {
        let options = options.unwrap_or_default();
        let message = JWEMessage::parse_compact(&self.encryption_key.entry, token, &options)?;
        self.decrypt_message(&message)
    }

    /// Decrypt a flattened JWE.
    pub fn decrypt_flattened(
        &self,
        jwe: &FlattenedJWE,
        options: Option<DecryptionOptions>,
    ) -> Result<Vec<u8>, Error> {
        let options = options.unwrap_or_default();
        let message = JWEMessage::parse_flattened(&self.encryption_key.entry, jwe, &options)?;
        self.decrypt_message(&message)
    }

    /// Decrypt a flattened JWE given as JSON.
    pub fn decrypt_flattened_json(
        &self,
        json: &str,
        options: Option<DecryptionOptions>,
    ) -> Result<Vec<u8>, Error> {
        self.decrypt_flattened(&FlattenedJWE::from_json(json)?, options)
    }

    /// Decrypt a JWE in either serialization.
    pub fn decrypt(
        &self,
        jwe: &SerializedJWE,
        options: Option<DecryptionOptions>,
    ) -> Result<Vec<u8>, Error> {
        match jwe {
            SerializedJWE::Compact(token) => self.decrypt_compact(token, options),
            SerializedJWE::Flattened(flattened) => self.decrypt_flattened(flattened, options),
        }
    }

    /// Decrypt an already parsed message.
    pub fn decrypt_message(&self, message: &JWEMessage) -> Result<Vec<u8>, Error> {
        ensure!(
            message.header().algorithm == self.encryption_key.entry.alg,
            JWEError::AlgorithmMismatch
        );
        JWEToken::decrypt(&self.encryption_key.suite, &self.sk, message)
    }
}

/// Encrypt `plaintext` for a serialized recipient public key.
pub fn build_jwe(
    alg: &str,
    recipient_public_key: &[u8],
    plaintext: &[u8],
    aad: Option<&[u8]>,
) -> Result<EncryptedJWE, Error> {
    let mut key = HPKEEncryptionKey::from_bytes(alg, recipient_public_key)?;
    key.create_key_id()?;
    key.encrypt(plaintext, aad)
}

/// Decrypt a JWE with a serialized recipient private key.
pub fn open_jwe(
    alg: &str,
    recipient_private_key: &[u8],
    jwe: &SerializedJWE,
) -> Result<Vec<u8>, Error> {
    HPKEDecryptionKey::from_bytes(alg, recipient_private_key)?.decrypt(jwe, None)
}

/// The JWK thumbprint of a serialized public key.
pub fn key_thumbprint(alg: &str, public_key: &[u8]) -> Result<String, Error> {
    jwk::thumbprint(alg, &Base64UrlSafeNoPadding::encode_to_string(public_key)?)
}
