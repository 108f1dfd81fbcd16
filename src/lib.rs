#![forbid(unsafe_code)]

//! JWE encryption with post-quantum and PQ/T hybrid HPKE ciphersuites.
//!
//! Algorithms `HPKE-8` .. `HPKE-17` encrypt the content directly with HPKE
//! (integrated encryption). Their `-KE` variants use HPKE to encrypt a
//! content encryption key instead (key encryption).

pub mod algorithms;
pub mod error;
pub mod hpke;
pub mod jwe_header;
pub mod jwe_token;
pub mod jwk;
pub mod registry;
pub mod vectors;

pub use serde;

pub mod prelude {
    pub use crate::algorithms::content::ContentEncryption;
    pub use crate::algorithms::hpke::{Aead, CipherSuite, Kdf, Kem, KeyPair, SuiteIds};
    pub use crate::error::{Error, JWEError};
    pub use crate::hpke::*;
    pub use crate::jwe_header::JWEHeader;
    pub use crate::jwe_token::{
        DecryptionOptions, EncryptedJWE, EncryptionOptions, FlattenedJWE, JWEMessage,
        SerializedJWE,
    };
    pub use crate::jwk::Jwk;
    pub use crate::registry::{
        resolve, AlgorithmEntry, AlgorithmRegistry, RegistryOptions, SuiteDefinition,
    };
    pub use crate::vectors::{generate_test_vectors, TestVector};
    pub use serde::{Deserialize, Serialize};
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;
    use ct_codecs::{Base64UrlSafeNoPadding, Decoder, Encoder};

    const PLAINTEXT: &str = "You can trust us to stick with you through thick and thin\u{2013}to the bitter end. And you can trust us to keep any secret of yours\u{2013}closer than you keep it yourself. But you cannot trust us to let you face trouble alone, and go off without a word. We are your friends, Frodo.";
    const AAD: &str = "The Fellowship of the Ring";

    fn err_kind(err: Error) -> JWEError {
        err.downcast_ref::<JWEError>().cloned().unwrap()
    }

    fn b64(bin: &[u8]) -> String {
        Base64UrlSafeNoPadding::encode_to_string(bin).unwrap()
    }

    fn unb64(s: &str) -> Vec<u8> {
        Base64UrlSafeNoPadding::decode_to_vec(s, None).unwrap()
    }

    fn flip_first(s: &str) -> String {
        let mut bin = unb64(s);
        bin[0] ^= 0x01;
        b64(&bin)
    }

    #[test]
    fn plaintext_length() {
        // two en dashes, three bytes each
        assert_eq!(PLAINTEXT.len(), 273);
    }

    #[test]
    fn roundtrip_all_algorithms() {
        for entry in AlgorithmRegistry::global().unwrap().iter() {
            let sk = HPKEDecryptionKey::derive(&entry.alg).unwrap();
            let pk = sk.encryption_key();
            let jwe = pk
                .encrypt(PLAINTEXT.as_bytes(), Some(AAD.as_bytes()))
                .unwrap();
            assert_eq!(
                sk.decrypt_compact(&jwe.compact, None).unwrap(),
                PLAINTEXT.as_bytes()
            );
            assert_eq!(
                sk.decrypt_flattened(&jwe.flattened, None).unwrap(),
                PLAINTEXT.as_bytes()
            );
            let json = jwe.flattened.to_json().unwrap();
            assert_eq!(
                sk.decrypt_flattened_json(&json, None).unwrap(),
                PLAINTEXT.as_bytes()
            );

            let empty = pk.encrypt(b"", None).unwrap();
            assert!(sk.decrypt_compact(&empty.compact, None).unwrap().is_empty());
        }
    }

    #[test]
    fn hpke_8_integrated() {
        let sk = HPKEDecryptionKey::derive("HPKE-8").unwrap();
        let jwe = sk
            .encryption_key()
            .encrypt(PLAINTEXT.as_bytes(), Some(AAD.as_bytes()))
            .unwrap();

        let parts: Vec<&str> = jwe.compact.split('.').collect();
        assert_eq!(parts.len(), 5);
        assert!(parts[2].is_empty());
        assert!(parts[4].is_empty());
        let header = JWEHeader::decode(parts[0]).unwrap();
        assert_eq!(header.algorithm, "HPKE-8");
        assert_eq!(header.key_id.as_deref(), sk.key_id());
        assert!(header.encryption.is_none());
        // MLKEM768-P256 encapsulation: ML-KEM ciphertext followed by a P-256 point
        assert_eq!(unb64(parts[1]).len(), 1088 + 65);

        assert_eq!(jwe.flattened.aad.as_deref(), Some(b64(AAD.as_bytes()).as_str()));
        assert!(jwe.flattened.iv.is_none());
        assert!(jwe.flattened.tag.is_none());
        assert_eq!(
            sk.decrypt_flattened(&jwe.flattened, None).unwrap(),
            PLAINTEXT.as_bytes()
        );
    }

    #[test]
    fn hpke_8_key_encryption() {
        let sk = HPKEDecryptionKey::derive("HPKE-8-KE").unwrap();
        let jwe = sk
            .encryption_key()
            .encrypt(PLAINTEXT.as_bytes(), Some(AAD.as_bytes()))
            .unwrap();

        let parts: Vec<&str> = jwe.compact.split('.').collect();
        assert_eq!(parts.len(), 5);
        assert!(parts.iter().all(|p| !p.is_empty()));
        let header = JWEHeader::decode(parts[0]).unwrap();
        assert_eq!(header.algorithm, "HPKE-8-KE");
        assert_eq!(header.encryption.as_deref(), Some("A256GCM"));
        assert!(header.encapsulated_key.is_some());
        assert_eq!(unb64(parts[2]).len(), 12);
        assert_eq!(unb64(parts[4]).len(), 16);
        // sealed 32-byte CEK plus the AEAD tag
        assert_eq!(unb64(parts[1]).len(), 32 + 16);

        assert_eq!(
            sk.decrypt_compact(&jwe.compact, None).unwrap(),
            PLAINTEXT.as_bytes()
        );
        assert_eq!(
            sk.decrypt_flattened(&jwe.flattened, None).unwrap(),
            PLAINTEXT.as_bytes()
        );
    }

    #[test]
    fn compact_and_flattened_are_independent() {
        let sk = HPKEDecryptionKey::derive("HPKE-11-KE").unwrap();
        let jwe = sk.encryption_key().encrypt(b"payload", None).unwrap();
        let parts: Vec<&str> = jwe.compact.split('.').collect();
        assert_ne!(parts[0], jwe.flattened.protected);
        assert_ne!(parts[1], jwe.flattened.encrypted_key);
    }

    #[test]
    fn key_encryption_is_fresh() {
        let pk = HPKEDecryptionKey::derive("HPKE-13-KE")
            .unwrap()
            .encryption_key();
        let a = pk.encrypt_flattened(b"payload", None).unwrap();
        let b = pk.encrypt_flattened(b"payload", None).unwrap();
        assert_ne!(
            JWEHeader::decode(&a.protected).unwrap().encapsulated_key,
            JWEHeader::decode(&b.protected).unwrap().encapsulated_key
        );
        assert_ne!(a.encrypted_key, b.encrypted_key);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn integrated_is_fresh() {
        let pk = HPKEDecryptionKey::derive("HPKE-17").unwrap().encryption_key();
        let a = pk.encrypt_compact(b"payload").unwrap();
        let b = pk.encrypt_compact(b"payload").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tampering_fails_authentication() {
        for alg in ["HPKE-8", "HPKE-8-KE", "HPKE-11", "HPKE-16-KE"] {
            let sk = HPKEDecryptionKey::derive(alg).unwrap();
            let good = sk
                .encryption_key()
                .encrypt_flattened(PLAINTEXT.as_bytes(), Some(AAD.as_bytes()))
                .unwrap();

            let mut header = JWEHeader::decode(&good.protected).unwrap();
            header.key_id = Some("mallory".to_string());
            let mut jwe = good.clone();
            jwe.protected = header.encode().unwrap();
            assert_eq!(
                err_kind(sk.decrypt_flattened(&jwe, None).unwrap_err()),
                JWEError::AuthenticationFailure
            );

            let mut jwe = good.clone();
            jwe.aad = Some(b64(b"The Two Towers"));
            assert_eq!(
                err_kind(sk.decrypt_flattened(&jwe, None).unwrap_err()),
                JWEError::AuthenticationFailure
            );

            let mut jwe = good.clone();
            jwe.aad = None;
            assert_eq!(
                err_kind(sk.decrypt_flattened(&jwe, None).unwrap_err()),
                JWEError::AuthenticationFailure
            );

            let mut jwe = good.clone();
            jwe.ciphertext = flip_first(&jwe.ciphertext);
            assert_eq!(
                err_kind(sk.decrypt_flattened(&jwe, None).unwrap_err()),
                JWEError::AuthenticationFailure
            );

            let mut jwe = good.clone();
            jwe.encrypted_key = flip_first(&jwe.encrypted_key);
            assert_eq!(
                err_kind(sk.decrypt_flattened(&jwe, None).unwrap_err()),
                JWEError::AuthenticationFailure
            );

            if let Some(tag) = &good.tag {
                let mut jwe = good.clone();
                jwe.tag = Some(flip_first(tag));
                assert_eq!(
                    err_kind(sk.decrypt_flattened(&jwe, None).unwrap_err()),
                    JWEError::AuthenticationFailure
                );
            }

            assert_eq!(
                sk.decrypt_flattened(&good, None).unwrap(),
                PLAINTEXT.as_bytes()
            );
        }
    }

    #[test]
    fn tampered_compact_fails_authentication() {
        let sk = HPKEDecryptionKey::derive("HPKE-14-KE").unwrap();
        let token = sk.encryption_key().encrypt_compact(b"payload").unwrap();
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        parts[3] = flip_first(&parts[3]);
        let err = sk.decrypt_compact(&parts.join("."), None).unwrap_err();
        assert_eq!(err_kind(err), JWEError::AuthenticationFailure);
    }

    #[test]
    fn wrong_recipient() {
        let alice = HPKEDecryptionKey::derive("HPKE-15").unwrap();
        let bob = HPKEDecryptionKey::generate("HPKE-15").unwrap();
        let token = alice.encryption_key().encrypt_compact(b"payload").unwrap();
        let err = bob.decrypt_compact(&token, None).unwrap_err();
        assert_eq!(err_kind(err), JWEError::AuthenticationFailure);
    }

    #[test]
    fn algorithm_mismatch() {
        let sk8 = HPKEDecryptionKey::derive("HPKE-8").unwrap();
        let sk9 = HPKEDecryptionKey::derive("HPKE-9").unwrap();
        let token = sk8.encryption_key().encrypt_compact(b"payload").unwrap();
        let err = sk9.decrypt_compact(&token, None).unwrap_err();
        assert_eq!(err_kind(err), JWEError::AlgorithmMismatch);
    }

    #[test]
    fn unknown_algorithm() {
        let err = HPKEDecryptionKey::derive("HPKE-1").unwrap_err();
        assert_eq!(err_kind(err), JWEError::UnknownAlgorithm("HPKE-1".to_string()));
    }

    #[test]
    fn malformed_inputs() {
        let sk = HPKEDecryptionKey::derive("HPKE-10").unwrap();
        for token in ["", "a.b.c", "!!!.AAAA..AAAA.", "e30.AAAA..AAAA."] {
            let err = sk.decrypt_compact(token, None).unwrap_err();
            assert_eq!(err_kind(err), JWEError::MalformedMessage, "{:?}", token);
        }
        let err = sk.decrypt_flattened_json("{\"protected\":1}", None).unwrap_err();
        assert_eq!(err_kind(err), JWEError::MalformedMessage);
    }

    #[test]
    fn custom_registry() {
        let options = RegistryOptions {
            start_index: 30,
            suites: vec![SuiteDefinition::new(
                Kem::MlKem768X25519,
                Kdf::Shake256,
                Aead::Aes128Gcm,
            )],
        };
        let registry = AlgorithmRegistry::build(&options).unwrap();
        let entry = registry.resolve("HPKE-30-KE").unwrap();
        let sk = HPKEDecryptionKey::derive_from_entry(entry, &[7u8; 32]).unwrap();
        let msg = sk
            .encryption_key()
            .encrypt_message(b"payload", None, &EncryptionOptions::default())
            .unwrap();
        assert_eq!(msg.header().encryption.as_deref(), Some("A128GCM"));
        assert_eq!(sk.decrypt_message(&msg).unwrap(), b"payload");
    }
}
