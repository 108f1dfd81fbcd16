//! Test vector generation for every registered algorithm.

use serde::Serialize;

use crate::error::*;
use crate::hpke::HPKEDecryptionKey;
use crate::jwe_token::FlattenedJWE;
use crate::jwk::Jwk;
use crate::registry::AlgorithmRegistry;

/// One encrypted example, with the private key needed to decrypt it.
#[derive(Debug, Clone, Serialize)]
pub struct TestVector {
    pub alg: String,
    pub jwk: Jwk,
    pub compact: String,
    pub flattened: FlattenedJWE,
}

/// Encrypt `plaintext` with the deterministic key of each registered
/// algorithm, in registration order.
pub fn generate_test_vectors(plaintext: &[u8], aad: Option<&[u8]>) -> Result<Vec<TestVector>, Error> {
    AlgorithmRegistry::global()?
        .iter()
        .map(|entry| {
            let key = HPKEDecryptionKey::derive(&entry.alg)?;
            let encrypted = key.encryption_key().encrypt(plaintext, aad)?;
            Ok(TestVector {
                alg: entry.alg.clone(),
                jwk: key.to_jwk()?,
                compact: encrypted.compact,
                flattened: encrypted.flattened,
            })
        })
        .collect()
}
