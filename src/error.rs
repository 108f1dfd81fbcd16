#[allow(unused)]
pub use anyhow::{anyhow, bail, ensure, Error};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum JWEError {
    #[error("Internal error: [{0}]")]
    InternalError(String),
    #[error("Unknown algorithm: [{0}]")]
    UnknownAlgorithm(String),
    #[error("Algorithm registered more than once: [{0}]")]
    DuplicateAlgorithm(String),
    #[error("Unsupported KEM identifier: {0:#06x}")]
    UnsupportedKem(u16),
    #[error("Unsupported KDF identifier: {0:#06x}")]
    UnsupportedKdf(u16),
    #[error("Unsupported AEAD identifier: {0:#06x}")]
    UnsupportedAead(u16),
    #[error("Unsupported content encryption algorithm: [{0}]")]
    UnsupportedContentEncryption(String),
    #[error("Invalid length")]
    InvalidLength,
    #[error("Authentication failure")]
    AuthenticationFailure,
    #[error("Malformed JWE")]
    MalformedMessage,
    #[error("JWE algorithm mismatch")]
    AlgorithmMismatch,
    #[error("JWE key identifier mismatch")]
    KeyIdentifierMismatch,
    #[error("Missing JWE key identifier")]
    MissingJWEKeyIdentifier,
    #[error("JWE header too large")]
    HeaderTooLarge,
    #[error("Token is too long")]
    TokenTooLong,
    #[error("Unknown critical header extension")]
    UnknownCriticalExtension,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid key pair")]
    InvalidKeyPair,
}

impl From<&str> for JWEError {
    fn from(e: &str) -> JWEError {
        JWEError::InternalError(e.into())
    }
}
