use ct_codecs::{Base64UrlSafeNoPadding, Decoder, Encoder};
use serde::{Deserialize, Serialize};

use crate::error::*;

/// JWE protected header.
///
/// Integrated encryption only carries `alg` and `kid`. Key encryption adds the
/// content encryption algorithm (`enc`) and the HPKE encapsulated key (`ek`).
/// Members are serialized in declaration order, which is the canonical order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JWEHeader {
    /// Key management algorithm (e.g. "HPKE-8", "HPKE-8-KE")
    #[serde(rename = "alg")]
    pub algorithm: String,

    /// Key ID - identifies the recipient key
    #[serde(rename = "kid", default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,

    /// Content encryption algorithm (key encryption only)
    #[serde(rename = "enc", default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<String>,

    /// Base64url-encoded HPKE encapsulated key (key encryption only)
    #[serde(rename = "ek", default, skip_serializing_if = "Option::is_none")]
    pub encapsulated_key: Option<String>,

    /// Critical headers that must be understood
    #[serde(rename = "crit", default, skip_serializing_if = "Option::is_none")]
    pub critical: Option<Vec<String>>,
}

impl JWEHeader {
    /// Create a new JWE header for the given algorithm.
    pub fn new(algorithm: impl Into<String>) -> Self {
        JWEHeader {
            algorithm: algorithm.into(),
            key_id: None,
            encryption: None,
            encapsulated_key: None,
            critical: None,
        }
    }

    /// Set the key ID.
    pub fn with_key_id(mut self, key_id: Option<String>) -> Self {
        self.key_id = key_id;
        self
    }

    /// Set the key encryption members.
    pub fn with_key_encryption(mut self, encryption: &str, encapsulated_key: &[u8]) -> Result<Self, Error> {
        self.encryption = Some(encryption.to_string());
        self.encapsulated_key = Some(Base64UrlSafeNoPadding::encode_to_string(encapsulated_key)?);
        Ok(self)
    }

    /// Serialize to JSON and base64url-encode.
    pub fn encode(&self) -> Result<String, Error> {
        let header_json = serde_json::to_string(self)?;
        Ok(Base64UrlSafeNoPadding::encode_to_string(header_json)?)
    }

    /// Decode a base64url-encoded header.
    pub fn decode(header_b64: &str) -> Result<Self, Error> {
        let header_bytes = Base64UrlSafeNoPadding::decode_to_vec(header_b64, None)
            .map_err(|_| JWEError::MalformedMessage)?;
        let header: JWEHeader =
            serde_json::from_slice(&header_bytes).map_err(|_| JWEError::MalformedMessage)?;
        Ok(header)
    }

    /// The decoded encapsulated key, if present.
    pub fn decoded_encapsulated_key(&self) -> Result<Option<Vec<u8>>, Error> {
        match &self.encapsulated_key {
            None => Ok(None),
            Some(ek) => Ok(Some(
                Base64UrlSafeNoPadding::decode_to_vec(ek, None)
                    .map_err(|_| JWEError::MalformedMessage)?,
            )),
        }
    }
}
