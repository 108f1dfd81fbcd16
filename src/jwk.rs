//! "AKP" JSON Web Keys for HPKE recipients.

use ct_codecs::{Base64UrlSafeNoPadding, Decoder, Encoder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use zeroize::Zeroize;

use crate::error::*;

pub const KEY_TYPE: &str = "AKP";

/// A JWK holding a serialized HPKE public key and, optionally, the private key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(rename = "pub")]
    pub public_key: String,
    #[serde(rename = "priv", default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

impl std::fmt::Debug for Jwk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Jwk")
            .field("kty", &self.kty)
            .field("alg", &self.alg)
            .field("kid", &self.kid)
            .field("pub", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl Drop for Jwk {
    fn drop(&mut self) {
        if let Some(private_key) = self.private_key.as_mut() {
            private_key.zeroize();
        }
    }
}

impl Jwk {
    pub fn new(alg: &str, public_key: &[u8], private_key: Option<&[u8]>) -> Result<Self, Error> {
        Ok(Jwk {
            kty: KEY_TYPE.to_string(),
            alg: alg.to_string(),
            kid: None,
            public_key: Base64UrlSafeNoPadding::encode_to_string(public_key)?,
            private_key: private_key
                .map(Base64UrlSafeNoPadding::encode_to_string)
                .transpose()?,
        })
    }

    pub fn with_key_id(mut self, key_id: Option<String>) -> Self {
        self.kid = key_id;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        let jwk: Jwk = serde_json::from_str(json).map_err(|_| JWEError::InvalidKeyPair)?;
        ensure!(jwk.kty == KEY_TYPE, JWEError::InvalidKeyPair);
        Ok(jwk)
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decoded_public_key(&self) -> Result<Vec<u8>, Error> {
        Ok(Base64UrlSafeNoPadding::decode_to_vec(&self.public_key, None)
            .map_err(|_| JWEError::InvalidPublicKey)?)
    }

    pub fn decoded_private_key(&self) -> Result<Option<Vec<u8>>, Error> {
        match &self.private_key {
            None => Ok(None),
            Some(private_key) => Ok(Some(
                Base64UrlSafeNoPadding::decode_to_vec(private_key, None)
                    .map_err(|_| JWEError::InvalidKeyPair)?,
            )),
        }
    }

    /// A copy of this key without the private part.
    pub fn public_jwk(&self) -> Jwk {
        Jwk {
            kty: self.kty.clone(),
            alg: self.alg.clone(),
            kid: self.kid.clone(),
            public_key: self.public_key.clone(),
            private_key: None,
        }
    }

    /// The base64url SHA-256 thumbprint of the required members.
    pub fn thumbprint(&self) -> Result<String, Error> {
        thumbprint(&self.alg, &self.public_key)
    }
}

/// Thumbprint of an AKP key: SHA-256 over `{"alg":..,"kty":"AKP","pub":..}`.
pub(crate) fn thumbprint(alg: &str, public_key_b64: &str) -> Result<String, Error> {
    // serde_json maps keep their members sorted, which is the order required here
    let members = serde_json::to_string(&json!({
        "alg": alg,
        "kty": KEY_TYPE,
        "pub": public_key_b64,
    }))?;
    let digest = hmac_sha256::Hash::hash(members.as_bytes());
    Ok(Base64UrlSafeNoPadding::encode_to_string(digest)?)
}
