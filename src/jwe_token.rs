//! JWE building and parsing for HPKE integrated and key encryption.

use ct_codecs::{Base64UrlSafeNoPadding, Decoder, Encoder};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::algorithms::content::{ContentEncryption, CEK};
use crate::algorithms::hpke::CipherSuite;
use crate::error::*;
use crate::jwe_header::JWEHeader;
use crate::registry::AlgorithmEntry;

pub const MAX_JWE_HEADER_LENGTH: usize = 8192;

const RECIPIENT_STRUCTURE_LABEL: &[u8] = b"JOSE-HPKE rcpt";
const RECIPIENT_STRUCTURE_SEPARATOR: u8 = 0xff;

/// Options for JWE encryption.
#[derive(Clone, Debug, Default)]
pub struct EncryptionOptions {
    /// Key ID, overriding the one attached to the key
    pub key_id: Option<String>,
}

/// Options for JWE decryption.
#[derive(Clone, Debug, Default)]
pub struct DecryptionOptions {
    /// Maximum token length to accept
    pub max_token_length: Option<usize>,
    /// Maximum header length to accept
    pub max_header_length: Option<usize>,
    /// Required key ID
    pub required_key_id: Option<String>,
}

/// HPKE `info` for key encryption:
/// `"JOSE-HPKE rcpt" || 0xFF || ASCII(enc) || 0xFF`.
pub fn recipient_structure(content_encryption: ContentEncryption) -> Vec<u8> {
    let enc = content_encryption.alg_name().as_bytes();
    let mut info = Vec::with_capacity(RECIPIENT_STRUCTURE_LABEL.len() + enc.len() + 2);
    info.extend_from_slice(RECIPIENT_STRUCTURE_LABEL);
    info.push(RECIPIENT_STRUCTURE_SEPARATOR);
    info.extend_from_slice(enc);
    info.push(RECIPIENT_STRUCTURE_SEPARATOR);
    info
}

/// Additional authenticated data: `ASCII(protected)` or
/// `ASCII(protected || '.' || aad)` when a JWE AAD is present.
fn authenticated_data(protected_b64: &str, aad_b64: Option<&str>) -> Vec<u8> {
    match aad_b64 {
        None => protected_b64.as_bytes().to_vec(),
        Some(aad_b64) => format!("{}.{}", protected_b64, aad_b64).into_bytes(),
    }
}

fn b64_encode(bin: &[u8]) -> Result<String, Error> {
    Ok(Base64UrlSafeNoPadding::encode_to_string(bin)?)
}

fn b64_decode(b64: &str) -> Result<Vec<u8>, Error> {
    Ok(Base64UrlSafeNoPadding::decode_to_vec(b64, None).map_err(|_| JWEError::MalformedMessage)?)
}

/// Flattened JWE JSON serialization.
///
/// Members are emitted as `protected, aad, encrypted_key, ciphertext` for
/// integrated encryption and `protected, aad, iv, ciphertext, tag,
/// encrypted_key` for key encryption.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FlattenedJWE {
    pub protected: String,
    #[serde(default)]
    pub aad: Option<String>,
    #[serde(default)]
    pub iv: Option<String>,
    pub ciphertext: String,
    #[serde(default)]
    pub tag: Option<String>,
    pub encrypted_key: String,
}

impl Serialize for FlattenedJWE {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("protected", &self.protected)?;
        if let Some(aad) = &self.aad {
            map.serialize_entry("aad", aad)?;
        }
        match (&self.iv, &self.tag) {
            (None, None) => {
                map.serialize_entry("encrypted_key", &self.encrypted_key)?;
                map.serialize_entry("ciphertext", &self.ciphertext)?;
            }
            (iv, tag) => {
                if let Some(iv) = iv {
                    map.serialize_entry("iv", iv)?;
                }
                map.serialize_entry("ciphertext", &self.ciphertext)?;
                if let Some(tag) = tag {
                    map.serialize_entry("tag", tag)?;
                }
                map.serialize_entry("encrypted_key", &self.encrypted_key)?;
            }
        }
        map.end()
    }
}

impl FlattenedJWE {
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json).map_err(|_| JWEError::MalformedMessage)?)
    }
}

/// Both serializations of an encrypted payload.
///
/// Each one comes from an independent encryption: they do not share an
/// encapsulated key, a CEK or an IV.
#[derive(Debug, Clone)]
pub struct EncryptedJWE {
    pub compact: String,
    pub flattened: FlattenedJWE,
}

/// A JWE in either serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerializedJWE {
    Compact(String),
    Flattened(FlattenedJWE),
}

impl SerializedJWE {
    /// Parse a compact token or a flattened JSON object.
    pub fn parse(jwe: &str) -> Result<Self, Error> {
        let jwe = jwe.trim();
        if jwe.starts_with('{') {
            Ok(SerializedJWE::Flattened(FlattenedJWE::from_json(jwe)?))
        } else {
            Ok(SerializedJWE::Compact(jwe.to_string()))
        }
    }
}

impl From<String> for SerializedJWE {
    fn from(compact: String) -> Self {
        SerializedJWE::Compact(compact)
    }
}

impl From<FlattenedJWE> for SerializedJWE {
    fn from(flattened: FlattenedJWE) -> Self {
        SerializedJWE::Flattened(flattened)
    }
}

/// Integrated encryption: HPKE seals the plaintext directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegratedJWE {
    protected: String,
    header: JWEHeader,
    aad: Option<String>,
    encapsulated_key: Vec<u8>,
    ciphertext: Vec<u8>,
}

/// Key encryption: HPKE seals a CEK, the CEK encrypts the plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEncryptionJWE {
    protected: String,
    header: JWEHeader,
    aad: Option<String>,
    content_encryption: ContentEncryption,
    encapsulated_key: Vec<u8>,
    encrypted_key: Vec<u8>,
    iv: Vec<u8>,
    ciphertext: Vec<u8>,
    tag: Vec<u8>,
}

/// A parsed JWE. The protected header's `alg` decides the shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JWEMessage {
    Integrated(IntegratedJWE),
    KeyEncryption(KeyEncryptionJWE),
}

impl JWEMessage {
    /// The decoded protected header.
    pub fn header(&self) -> &JWEHeader {
        match self {
            JWEMessage::Integrated(m) => &m.header,
            JWEMessage::KeyEncryption(m) => &m.header,
        }
    }

    /// The encoded protected header, as authenticated.
    pub fn protected(&self) -> &str {
        match self {
            JWEMessage::Integrated(m) => &m.protected,
            JWEMessage::KeyEncryption(m) => &m.protected,
        }
    }

    /// The encoded JWE AAD, if any.
    pub fn aad(&self) -> Option<&str> {
        match self {
            JWEMessage::Integrated(m) => m.aad.as_deref(),
            JWEMessage::KeyEncryption(m) => m.aad.as_deref(),
        }
    }

    pub fn is_key_encryption(&self) -> bool {
        matches!(self, JWEMessage::KeyEncryption(_))
    }

    /// The HPKE encapsulated key.
    pub fn encapsulated_key(&self) -> &[u8] {
        match self {
            JWEMessage::Integrated(m) => &m.encapsulated_key,
            JWEMessage::KeyEncryption(m) => &m.encapsulated_key,
        }
    }

    /// The `encrypted_key` member: the encapsulated key for integrated
    /// encryption, the sealed CEK for key encryption.
    pub fn encrypted_key(&self) -> &[u8] {
        match self {
            JWEMessage::Integrated(m) => &m.encapsulated_key,
            JWEMessage::KeyEncryption(m) => &m.encrypted_key,
        }
    }

    pub fn ciphertext(&self) -> &[u8] {
        match self {
            JWEMessage::Integrated(m) => &m.ciphertext,
            JWEMessage::KeyEncryption(m) => &m.ciphertext,
        }
    }

    pub fn iv(&self) -> Option<&[u8]> {
        match self {
            JWEMessage::Integrated(_) => None,
            JWEMessage::KeyEncryption(m) => Some(&m.iv),
        }
    }

    pub fn tag(&self) -> Option<&[u8]> {
        match self {
            JWEMessage::Integrated(_) => None,
            JWEMessage::KeyEncryption(m) => Some(&m.tag),
        }
    }

    /// Compact serialization: `protected.encrypted_key.iv.ciphertext.tag`.
    ///
    /// IV and tag are empty for integrated encryption. The compact form has no
    /// room for a JWE AAD.
    pub fn to_compact(&self) -> Result<String, Error> {
        ensure!(self.aad().is_none(), JWEError::MalformedMessage);
        let (iv_b64, tag_b64) = match self {
            JWEMessage::Integrated(_) => (String::new(), String::new()),
            JWEMessage::KeyEncryption(m) => (b64_encode(&m.iv)?, b64_encode(&m.tag)?),
        };
        Ok(format!(
            "{}.{}.{}.{}.{}",
            self.protected(),
            b64_encode(self.encrypted_key())?,
            iv_b64,
            b64_encode(self.ciphertext())?,
            tag_b64
        ))
    }

    /// Flattened JSON serialization.
    pub fn to_flattened(&self) -> Result<FlattenedJWE, Error> {
        let (iv, tag) = match self {
            JWEMessage::Integrated(_) => (None, None),
            JWEMessage::KeyEncryption(m) => (Some(b64_encode(&m.iv)?), Some(b64_encode(&m.tag)?)),
        };
        Ok(FlattenedJWE {
            protected: self.protected().to_string(),
            aad: self.aad().map(str::to_string),
            iv,
            ciphertext: b64_encode(self.ciphertext())?,
            tag,
            encrypted_key: b64_encode(self.encrypted_key())?,
        })
    }

    /// Parse a compact JWE for the expected algorithm.
    pub fn parse_compact(
        entry: &AlgorithmEntry,
        token: &str,
        options: &DecryptionOptions,
    ) -> Result<Self, Error> {
        if let Some(max_len) = options.max_token_length {
            ensure!(token.len() <= max_len, JWEError::TokenTooLong);
        }
        let parts: Vec<&str> = token.split('.').collect();
        ensure!(parts.len() == 5, JWEError::MalformedMessage);
        let iv = (!parts[2].is_empty()).then(|| parts[2]);
        let tag = (!parts[4].is_empty()).then(|| parts[4]);
        Self::parse_parts(
            entry, parts[0], None, parts[1], iv, parts[3], tag, options,
        )
    }

    /// Parse a flattened JWE for the expected algorithm.
    pub fn parse_flattened(
        entry: &AlgorithmEntry,
        jwe: &FlattenedJWE,
        options: &DecryptionOptions,
    ) -> Result<Self, Error> {
        Self::parse_parts(
            entry,
            &jwe.protected,
            jwe.aad.as_deref(),
            &jwe.encrypted_key,
            jwe.iv.as_deref(),
            &jwe.ciphertext,
            jwe.tag.as_deref(),
            options,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn parse_parts(
        entry: &AlgorithmEntry,
        protected: &str,
        aad: Option<&str>,
        encrypted_key: &str,
        iv: Option<&str>,
        ciphertext: &str,
        tag: Option<&str>,
        options: &DecryptionOptions,
    ) -> Result<Self, Error> {
        let max_header_len = options.max_header_length.unwrap_or(MAX_JWE_HEADER_LENGTH);
        ensure!(protected.len() <= max_header_len, JWEError::HeaderTooLarge);

        let header = JWEHeader::decode(protected)?;
        if let Some(crit) = &header.critical {
            ensure!(crit.is_empty(), JWEError::UnknownCriticalExtension);
        }
        ensure!(header.algorithm == entry.alg, JWEError::AlgorithmMismatch);
        if let Some(required_key_id) = &options.required_key_id {
            match &header.key_id {
                Some(key_id) => ensure!(key_id == required_key_id, JWEError::KeyIdentifierMismatch),
                None => bail!(JWEError::MissingJWEKeyIdentifier),
            }
        }
        if let Some(aad) = aad {
            b64_decode(aad)?;
        }
        let encrypted_key = b64_decode(encrypted_key)?;
        let ciphertext = b64_decode(ciphertext)?;

        if !entry.is_key_encryption {
            ensure!(
                iv.is_none() && tag.is_none(),
                JWEError::MalformedMessage
            );
            ensure!(
                header.encryption.is_none() && header.encapsulated_key.is_none(),
                JWEError::MalformedMessage
            );
            return Ok(JWEMessage::Integrated(IntegratedJWE {
                protected: protected.to_string(),
                header,
                aad: aad.map(str::to_string),
                encapsulated_key: encrypted_key,
                ciphertext,
            }));
        }

        let iv = b64_decode(iv.ok_or(JWEError::MalformedMessage)?)?;
        let tag = b64_decode(tag.ok_or(JWEError::MalformedMessage)?)?;
        let content_encryption = ContentEncryption::from_alg_name(
            header
                .encryption
                .as_deref()
                .ok_or(JWEError::MalformedMessage)?,
        )?;
        ensure!(
            content_encryption == ContentEncryption::for_hpke_aead(entry.aead_id)?,
            JWEError::MalformedMessage
        );
        let encapsulated_key = header
            .decoded_encapsulated_key()?
            .ok_or(JWEError::MalformedMessage)?;
        Ok(JWEMessage::KeyEncryption(KeyEncryptionJWE {
            protected: protected.to_string(),
            header,
            aad: aad.map(str::to_string),
            content_encryption,
            encapsulated_key,
            encrypted_key,
            iv,
            ciphertext,
            tag,
        }))
    }
}

/// Encrypts and decrypts JWE messages for one algorithm.
pub struct JWEToken;

impl JWEToken {
    /// Encrypt `plaintext` for `public_key`, following the mode of `entry`.
    pub fn encrypt(
        entry: &AlgorithmEntry,
        suite: &CipherSuite,
        public_key: &[u8],
        key_id: Option<String>,
        plaintext: &[u8],
        aad: Option<&[u8]>,
    ) -> Result<JWEMessage, Error> {
        let aad_b64 = aad.map(b64_encode).transpose()?;
        let message = if entry.is_key_encryption {
            let content_encryption = ContentEncryption::for_hpke_aead(entry.aead_id)?;
            let cek = content_encryption.generate_cek();
            Self::encrypt_key_encryption(
                entry,
                suite,
                public_key,
                key_id,
                plaintext,
                aad_b64,
                content_encryption,
                &cek,
            )?
        } else {
            Self::encrypt_integrated(entry, suite, public_key, key_id, plaintext, aad_b64)?
        };
        tracing::debug!(
            alg = %entry.alg,
            key_encryption = entry.is_key_encryption,
            plaintext_len = plaintext.len(),
            "JWE encrypted"
        );
        Ok(message)
    }

    fn encrypt_integrated(
        entry: &AlgorithmEntry,
        suite: &CipherSuite,
        public_key: &[u8],
        key_id: Option<String>,
        plaintext: &[u8],
        aad_b64: Option<String>,
    ) -> Result<JWEMessage, Error> {
        let header = JWEHeader::new(entry.alg.clone()).with_key_id(key_id);
        let protected = header.encode()?;
        let hpke_aad = authenticated_data(&protected, aad_b64.as_deref());
        let sealed = suite.seal(public_key, plaintext, b"", &hpke_aad)?;
        Ok(JWEMessage::Integrated(IntegratedJWE {
            protected,
            header,
            aad: aad_b64,
            encapsulated_key: sealed.encapsulated_key,
            ciphertext: sealed.ciphertext,
        }))
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn encrypt_key_encryption(
        entry: &AlgorithmEntry,
        suite: &CipherSuite,
        public_key: &[u8],
        key_id: Option<String>,
        plaintext: &[u8],
        aad_b64: Option<String>,
        content_encryption: ContentEncryption,
        cek: &CEK,
    ) -> Result<JWEMessage, Error> {
        let info = recipient_structure(content_encryption);
        let sealed = suite.seal(public_key, cek.as_bytes(), &info, b"")?;

        let header = JWEHeader::new(entry.alg.clone())
            .with_key_id(key_id)
            .with_key_encryption(content_encryption.alg_name(), &sealed.encapsulated_key)?;
        let protected = header.encode()?;
        let content_aad = authenticated_data(&protected, aad_b64.as_deref());

        let iv = content_encryption.generate_iv();
        let (ciphertext, tag) =
            content_encryption.encrypt(cek.as_bytes(), &iv, &content_aad, plaintext)?;

        Ok(JWEMessage::KeyEncryption(KeyEncryptionJWE {
            protected,
            header,
            aad: aad_b64,
            content_encryption,
            encapsulated_key: sealed.encapsulated_key,
            encrypted_key: sealed.ciphertext,
            iv,
            ciphertext,
            tag,
        }))
    }

    /// Decrypt a parsed message with the recipient's private key.
    pub fn decrypt(
        suite: &CipherSuite,
        private_key: &[u8],
        message: &JWEMessage,
    ) -> Result<Vec<u8>, Error> {
        let aad = authenticated_data(message.protected(), message.aad());
        let plaintext = match message {
            JWEMessage::Integrated(m) => {
                suite.open(private_key, &m.encapsulated_key, &m.ciphertext, b"", &aad)?
            }
            JWEMessage::KeyEncryption(m) => {
                let info = recipient_structure(m.content_encryption);
                let cek = CEK::new(suite.open(
                    private_key,
                    &m.encapsulated_key,
                    &m.encrypted_key,
                    &info,
                    b"",
                )?);
                ensure!(
                    cek.as_bytes().len() == m.content_encryption.key_size(),
                    JWEError::MalformedMessage
                );
                m.content_encryption
                    .decrypt(cek.as_bytes(), &m.iv, &aad, &m.ciphertext, &m.tag)?
            }
        };
        tracing::debug!(
            alg = %message.header().algorithm,
            key_encryption = message.is_key_encryption(),
            "JWE decrypted"
        );
        Ok(plaintext)
    }
}
