//! JOSE "alg" registry for HPKE ciphersuites.
//!
//! Each suite definition produces an integrated encryption algorithm named
//! `HPKE-<n>` and, unless disabled, a `HPKE-<n>-KE` key encryption sibling
//! sharing the same KEM, KDF and AEAD. Numbering starts at
//! [`DEFAULT_START_INDEX`], continuing after `HPKE-1` .. `HPKE-7` which are
//! registered elsewhere.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::algorithms::hpke::{Aead, CipherSuite, Kdf, Kem, SuiteIds};
use crate::error::*;

pub const DEFAULT_START_INDEX: u16 = 8;
pub const KEY_ENCRYPTION_SUFFIX: &str = "-KE";

static DEFAULT_REGISTRY: Lazy<Result<AlgorithmRegistry, JWEError>> =
    Lazy::new(|| AlgorithmRegistry::try_build(&RegistryOptions::default()));

/// One KEM/KDF/AEAD combination to register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuiteDefinition {
    pub kem: Kem,
    pub kdf: Kdf,
    pub aead: Aead,
    /// Also register a `-KE` key encryption variant.
    pub key_encryption: bool,
}

impl SuiteDefinition {
    pub const fn new(kem: Kem, kdf: Kdf, aead: Aead) -> Self {
        SuiteDefinition {
            kem,
            kdf,
            aead,
            key_encryption: true,
        }
    }

    /// Do not register a `-KE` variant for this suite.
    pub const fn without_key_encryption(mut self) -> Self {
        self.key_encryption = false;
        self
    }
}

/// The suites registered by default, PQ/T hybrids first.
pub const DEFAULT_SUITES: [SuiteDefinition; 10] = [
    SuiteDefinition::new(Kem::MlKem768P256, Kdf::Shake256, Aead::Aes256Gcm),
    SuiteDefinition::new(Kem::MlKem768P256, Kdf::Shake256, Aead::ChaCha20Poly1305),
    SuiteDefinition::new(Kem::MlKem768X25519, Kdf::Shake256, Aead::Aes256Gcm),
    SuiteDefinition::new(Kem::MlKem768X25519, Kdf::Shake256, Aead::ChaCha20Poly1305),
    SuiteDefinition::new(Kem::MlKem1024P384, Kdf::Shake256, Aead::Aes256Gcm),
    SuiteDefinition::new(Kem::MlKem1024P384, Kdf::Shake256, Aead::ChaCha20Poly1305),
    SuiteDefinition::new(Kem::MlKem768, Kdf::Shake256, Aead::Aes256Gcm),
    SuiteDefinition::new(Kem::MlKem768, Kdf::Shake256, Aead::ChaCha20Poly1305),
    SuiteDefinition::new(Kem::MlKem1024, Kdf::Shake256, Aead::Aes256Gcm),
    SuiteDefinition::new(Kem::MlKem1024, Kdf::Shake256, Aead::ChaCha20Poly1305),
];

/// Registry construction options.
#[derive(Clone, Debug)]
pub struct RegistryOptions {
    /// Number of the first algorithm (`HPKE-<start_index>`)
    pub start_index: u16,
    /// Suites to register, in order
    pub suites: Vec<SuiteDefinition>,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        RegistryOptions {
            start_index: DEFAULT_START_INDEX,
            suites: DEFAULT_SUITES.to_vec(),
        }
    }
}

/// A registered JOSE algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmEntry {
    pub alg: String,
    pub kem_id: u16,
    pub kdf_id: u16,
    pub aead_id: u16,
    pub is_key_encryption: bool,
    pub is_pqt_hybrid: bool,
}

impl AlgorithmEntry {
    /// The integrated encryption algorithm this entry belongs to.
    pub fn base_alg(&self) -> &str {
        if self.is_key_encryption {
            self.alg
                .strip_suffix(KEY_ENCRYPTION_SUFFIX)
                .unwrap_or(&self.alg)
        } else {
            &self.alg
        }
    }

    pub fn suite_ids(&self) -> SuiteIds {
        SuiteIds {
            kem_id: self.kem_id,
            kdf_id: self.kdf_id,
            aead_id: self.aead_id,
        }
    }

    /// Resolve the HPKE ciphersuite for this algorithm.
    pub fn cipher_suite(&self) -> Result<CipherSuite, Error> {
        CipherSuite::from_ids(self.kem_id, self.kdf_id, self.aead_id)
    }
}

/// Immutable `alg` -> ciphersuite table.
#[derive(Debug, Clone)]
pub struct AlgorithmRegistry {
    entries: Vec<AlgorithmEntry>,
    by_alg: HashMap<String, usize>,
}

impl AlgorithmRegistry {
    /// The process-wide registry built from [`RegistryOptions::default()`].
    pub fn global() -> Result<&'static AlgorithmRegistry, Error> {
        DEFAULT_REGISTRY.as_ref().map_err(|e| e.clone().into())
    }

    pub fn build(options: &RegistryOptions) -> Result<Self, Error> {
        Ok(Self::try_build(options)?)
    }

    fn try_build(options: &RegistryOptions) -> Result<Self, JWEError> {
        let mut registry = AlgorithmRegistry {
            entries: Vec::with_capacity(options.suites.len() * 2),
            by_alg: HashMap::with_capacity(options.suites.len() * 2),
        };
        for (i, suite) in options.suites.iter().enumerate() {
            let number = u32::from(options.start_index) + i as u32;
            let alg = format!("HPKE-{}", number);
            let is_pqt_hybrid = suite.kem.curve().is_some();
            registry.insert(AlgorithmEntry {
                alg: alg.clone(),
                kem_id: suite.kem.id(),
                kdf_id: suite.kdf.id(),
                aead_id: suite.aead.id(),
                is_key_encryption: false,
                is_pqt_hybrid,
            })?;
            if suite.key_encryption {
                registry.insert(AlgorithmEntry {
                    alg: format!("{}{}", alg, KEY_ENCRYPTION_SUFFIX),
                    kem_id: suite.kem.id(),
                    kdf_id: suite.kdf.id(),
                    aead_id: suite.aead.id(),
                    is_key_encryption: true,
                    is_pqt_hybrid,
                })?;
            }
        }
        tracing::debug!(
            entries = registry.entries.len(),
            start_index = options.start_index,
            "built HPKE algorithm registry"
        );
        Ok(registry)
    }

    fn insert(&mut self, entry: AlgorithmEntry) -> Result<(), JWEError> {
        if self.by_alg.contains_key(&entry.alg) {
            return Err(JWEError::DuplicateAlgorithm(entry.alg));
        }
        self.by_alg.insert(entry.alg.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    pub fn resolve(&self, alg: &str) -> Result<&AlgorithmEntry, Error> {
        match self.by_alg.get(alg) {
            Some(&i) => Ok(&self.entries[i]),
            None => bail!(JWEError::UnknownAlgorithm(alg.to_string())),
        }
    }

    /// All entries, in registration order.
    pub fn entries(&self) -> &[AlgorithmEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &AlgorithmEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Look up `alg` in the process-wide registry.
pub fn resolve(alg: &str) -> Result<&'static AlgorithmEntry, Error> {
    AlgorithmRegistry::global()?.resolve(alg)
}
