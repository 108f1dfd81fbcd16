//! ML-KEM and PQ/T hybrid KEMs.
//!
//! Pure ML-KEM private keys are the 64-byte `d || z` seed. Hybrid private keys
//! are a 32-byte seed expanded with SHAKE256 into the ML-KEM seed followed by
//! the traditional scalar.
//!
//! Hybrid encapsulations are `ct_pq || ct_t`, hybrid public keys are
//! `ek_pq || pk_t`, and the shared secret is
//! `SHA3-256(ss_pq || ss_t || ct_t || pk_t || label)`.

use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::thread_rng;
use sha3::digest::XofReader;
use sha3::{Digest, Sha3_256};
use zeroize::Zeroize;

use super::kdf::{shake256, shake256_reader};
use crate::error::*;

const ML_KEM_SEED_SIZE: usize = 64;
const HYBRID_SEED_SIZE: usize = 32;
const MAX_SCALAR_ATTEMPTS: usize = 256;

macro_rules! ml_kem_impl {
    ($name:ident, $params:ident) => {
        mod $name {
            use fips203::traits::{Decaps, Encaps, KeyGen, SerDes};
            use fips203::$params;

            use crate::error::*;

            pub(super) const EK_LEN: usize = $params::EK_LEN;
            pub(super) const CT_LEN: usize = $params::CT_LEN;

            pub(super) fn public_key(d: [u8; 32], z: [u8; 32]) -> Vec<u8> {
                let (ek, _dk) = $params::KG::keygen_from_seed(d, z);
                ek.into_bytes().to_vec()
            }

            pub(super) fn validate_public_key(ek: &[u8]) -> Result<(), Error> {
                let ek: [u8; EK_LEN] = ek.try_into().map_err(|_| JWEError::InvalidPublicKey)?;
                $params::EncapsKey::try_from_bytes(ek).map_err(|_| JWEError::InvalidPublicKey)?;
                Ok(())
            }

            pub(super) fn encaps(ek: &[u8]) -> Result<([u8; 32], Vec<u8>), Error> {
                let ek: [u8; EK_LEN] = ek.try_into().map_err(|_| JWEError::InvalidPublicKey)?;
                let ek = $params::EncapsKey::try_from_bytes(ek)
                    .map_err(|_| JWEError::InvalidPublicKey)?;
                let (ss, ct) = ek
                    .try_encaps_with_rng(&mut rand::thread_rng())
                    .map_err(JWEError::from)?;
                Ok((ss.into_bytes(), ct.into_bytes().to_vec()))
            }

            pub(super) fn decaps(d: [u8; 32], z: [u8; 32], ct: &[u8]) -> Result<[u8; 32], Error> {
                let ct: [u8; CT_LEN] = ct.try_into().map_err(|_| JWEError::MalformedMessage)?;
                let ct = $params::CipherText::try_from_bytes(ct)
                    .map_err(|_| JWEError::MalformedMessage)?;
                let (_ek, dk) = $params::KG::keygen_from_seed(d, z);
                let ss = dk
                    .try_decaps(&ct)
                    .map_err(|_| JWEError::AuthenticationFailure)?;
                Ok(ss.into_bytes())
            }
        }
    };
}

ml_kem_impl!(ml_kem_768_ops, ml_kem_768);
ml_kem_impl!(ml_kem_1024_ops, ml_kem_1024);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MlKemLevel {
    L768,
    L1024,
}

impl MlKemLevel {
    fn ek_len(&self) -> usize {
        match self {
            MlKemLevel::L768 => ml_kem_768_ops::EK_LEN,
            MlKemLevel::L1024 => ml_kem_1024_ops::EK_LEN,
        }
    }

    fn ct_len(&self) -> usize {
        match self {
            MlKemLevel::L768 => ml_kem_768_ops::CT_LEN,
            MlKemLevel::L1024 => ml_kem_1024_ops::CT_LEN,
        }
    }

    fn public_key(&self, d: [u8; 32], z: [u8; 32]) -> Vec<u8> {
        match self {
            MlKemLevel::L768 => ml_kem_768_ops::public_key(d, z),
            MlKemLevel::L1024 => ml_kem_1024_ops::public_key(d, z),
        }
    }

    fn validate_public_key(&self, ek: &[u8]) -> Result<(), Error> {
        match self {
            MlKemLevel::L768 => ml_kem_768_ops::validate_public_key(ek),
            MlKemLevel::L1024 => ml_kem_1024_ops::validate_public_key(ek),
        }
    }

    fn encaps(&self, ek: &[u8]) -> Result<([u8; 32], Vec<u8>), Error> {
        match self {
            MlKemLevel::L768 => ml_kem_768_ops::encaps(ek),
            MlKemLevel::L1024 => ml_kem_1024_ops::encaps(ek),
        }
    }

    fn decaps(&self, d: [u8; 32], z: [u8; 32], ct: &[u8]) -> Result<[u8; 32], Error> {
        match self {
            MlKemLevel::L768 => ml_kem_768_ops::decaps(d, z, ct),
            MlKemLevel::L1024 => ml_kem_1024_ops::decaps(d, z, ct),
        }
    }
}

/// Traditional (elliptic curve) half of a hybrid KEM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    P256,
    P384,
    X25519,
}

impl Curve {
    pub fn name(&self) -> &'static str {
        match self {
            Curve::P256 => "P256",
            Curve::P384 => "P384",
            Curve::X25519 => "X25519",
        }
    }

    fn scalar_len(&self) -> usize {
        match self {
            Curve::P256 | Curve::X25519 => 32,
            Curve::P384 => 48,
        }
    }

    /// Length of a serialized public key, which is also the length of the
    /// traditional encapsulation.
    fn point_len(&self) -> usize {
        match self {
            Curve::P256 => 65,
            Curve::P384 => 97,
            Curve::X25519 => 32,
        }
    }

    fn derive_secret(&self, reader: &mut impl XofReader) -> Result<CurveSecret, Error> {
        let mut candidate = vec![0u8; self.scalar_len()];
        let mut secret = None;
        for _ in 0..MAX_SCALAR_ATTEMPTS {
            reader.read(&mut candidate);
            secret = match self {
                Curve::P256 => p256::SecretKey::from_slice(&candidate)
                    .ok()
                    .map(CurveSecret::P256),
                Curve::P384 => p384::SecretKey::from_slice(&candidate)
                    .ok()
                    .map(CurveSecret::P384),
                Curve::X25519 => {
                    let mut bytes = [0u8; 32];
                    bytes.copy_from_slice(&candidate);
                    let sk = x25519_dalek::StaticSecret::from(bytes);
                    bytes.zeroize();
                    Some(CurveSecret::X25519(sk))
                }
            };
            if secret.is_some() {
                break;
            }
        }
        candidate.zeroize();
        Ok(secret.ok_or(JWEError::InvalidKeyPair)?)
    }

    fn validate_public_key(&self, pk: &[u8]) -> Result<(), Error> {
        ensure!(pk.len() == self.point_len(), JWEError::InvalidPublicKey);
        match self {
            Curve::P256 => {
                p256::PublicKey::from_sec1_bytes(pk).map_err(|_| JWEError::InvalidPublicKey)?;
            }
            Curve::P384 => {
                p384::PublicKey::from_sec1_bytes(pk).map_err(|_| JWEError::InvalidPublicKey)?;
            }
            Curve::X25519 => {}
        }
        Ok(())
    }

    /// Ephemeral-static key agreement. Returns `(ss_t, ct_t)`.
    fn encaps(&self, pk: &[u8]) -> Result<(Vec<u8>, Vec<u8>), Error> {
        match self {
            Curve::P256 => {
                let pk =
                    p256::PublicKey::from_sec1_bytes(pk).map_err(|_| JWEError::InvalidPublicKey)?;
                let ephemeral = p256::ecdh::EphemeralSecret::random(&mut thread_rng());
                let ct = ephemeral.public_key().to_encoded_point(false);
                let ss = ephemeral.diffie_hellman(&pk);
                Ok((ss.raw_secret_bytes().to_vec(), ct.as_bytes().to_vec()))
            }
            Curve::P384 => {
                let pk =
                    p384::PublicKey::from_sec1_bytes(pk).map_err(|_| JWEError::InvalidPublicKey)?;
                let ephemeral = p384::ecdh::EphemeralSecret::random(&mut thread_rng());
                let ct = ephemeral.public_key().to_encoded_point(false);
                let ss = ephemeral.diffie_hellman(&pk);
                Ok((ss.raw_secret_bytes().to_vec(), ct.as_bytes().to_vec()))
            }
            Curve::X25519 => {
                let pk: [u8; 32] = pk.try_into().map_err(|_| JWEError::InvalidPublicKey)?;
                let pk = x25519_dalek::PublicKey::from(pk);
                let ephemeral = x25519_dalek::EphemeralSecret::random_from_rng(thread_rng());
                let ct = x25519_dalek::PublicKey::from(&ephemeral);
                let ss = ephemeral.diffie_hellman(&pk);
                ensure!(ss.was_contributory(), JWEError::InvalidPublicKey);
                Ok((ss.as_bytes().to_vec(), ct.as_bytes().to_vec()))
            }
        }
    }
}

enum CurveSecret {
    P256(p256::SecretKey),
    P384(p384::SecretKey),
    X25519(x25519_dalek::StaticSecret),
}

impl CurveSecret {
    fn public_key(&self) -> Vec<u8> {
        match self {
            CurveSecret::P256(sk) => sk.public_key().to_encoded_point(false).as_bytes().to_vec(),
            CurveSecret::P384(sk) => sk.public_key().to_encoded_point(false).as_bytes().to_vec(),
            CurveSecret::X25519(sk) => x25519_dalek::PublicKey::from(sk).as_bytes().to_vec(),
        }
    }

    fn decaps(&self, ct: &[u8]) -> Result<Vec<u8>, Error> {
        match self {
            CurveSecret::P256(sk) => {
                let ephemeral = p256::PublicKey::from_sec1_bytes(ct)
                    .map_err(|_| JWEError::AuthenticationFailure)?;
                let ss = p256::ecdh::diffie_hellman(sk.to_nonzero_scalar(), ephemeral.as_affine());
                Ok(ss.raw_secret_bytes().to_vec())
            }
            CurveSecret::P384(sk) => {
                let ephemeral = p384::PublicKey::from_sec1_bytes(ct)
                    .map_err(|_| JWEError::AuthenticationFailure)?;
                let ss = p384::ecdh::diffie_hellman(sk.to_nonzero_scalar(), ephemeral.as_affine());
                Ok(ss.raw_secret_bytes().to_vec())
            }
            CurveSecret::X25519(sk) => {
                let ct: [u8; 32] = ct.try_into().map_err(|_| JWEError::MalformedMessage)?;
                let ss = sk.diffie_hellman(&x25519_dalek::PublicKey::from(ct));
                ensure!(ss.was_contributory(), JWEError::AuthenticationFailure);
                Ok(ss.as_bytes().to_vec())
            }
        }
    }
}

/// A private key expanded from its serialized seed.
struct ExpandedPrivateKey {
    d: [u8; 32],
    z: [u8; 32],
    traditional: Option<CurveSecret>,
}

impl Drop for ExpandedPrivateKey {
    fn drop(&mut self) {
        self.d.zeroize();
        self.z.zeroize();
    }
}

/// Key encapsulation mechanism identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kem {
    MlKem768,
    MlKem1024,
    MlKem768P256,
    MlKem768X25519,
    MlKem1024P384,
}

impl Kem {
    pub const ML_KEM_768_ID: u16 = 0x0041;
    pub const ML_KEM_1024_ID: u16 = 0x0042;
    pub const MLKEM768_P256_ID: u16 = 0x0050;
    pub const MLKEM1024_P384_ID: u16 = 0x0051;
    pub const MLKEM768_X25519_ID: u16 = 0x647a;

    pub fn from_id(id: u16) -> Result<Self, Error> {
        match id {
            Self::ML_KEM_768_ID => Ok(Kem::MlKem768),
            Self::ML_KEM_1024_ID => Ok(Kem::MlKem1024),
            Self::MLKEM768_P256_ID => Ok(Kem::MlKem768P256),
            Self::MLKEM1024_P384_ID => Ok(Kem::MlKem1024P384),
            Self::MLKEM768_X25519_ID => Ok(Kem::MlKem768X25519),
            _ => bail!(JWEError::UnsupportedKem(id)),
        }
    }

    pub fn id(&self) -> u16 {
        match self {
            Kem::MlKem768 => Self::ML_KEM_768_ID,
            Kem::MlKem1024 => Self::ML_KEM_1024_ID,
            Kem::MlKem768P256 => Self::MLKEM768_P256_ID,
            Kem::MlKem768X25519 => Self::MLKEM768_X25519_ID,
            Kem::MlKem1024P384 => Self::MLKEM1024_P384_ID,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Kem::MlKem768 => "ML-KEM-768",
            Kem::MlKem1024 => "ML-KEM-1024",
            Kem::MlKem768P256 => "MLKEM768-P256",
            Kem::MlKem768X25519 => "MLKEM768-X25519",
            Kem::MlKem1024P384 => "MLKEM1024-P384",
        }
    }

    fn level(&self) -> MlKemLevel {
        match self {
            Kem::MlKem768 | Kem::MlKem768P256 | Kem::MlKem768X25519 => MlKemLevel::L768,
            Kem::MlKem1024 | Kem::MlKem1024P384 => MlKemLevel::L1024,
        }
    }

    /// The traditional component, for PQ/T hybrid KEMs.
    pub fn curve(&self) -> Option<Curve> {
        match self {
            Kem::MlKem768 | Kem::MlKem1024 => None,
            Kem::MlKem768P256 => Some(Curve::P256),
            Kem::MlKem768X25519 => Some(Curve::X25519),
            Kem::MlKem1024P384 => Some(Curve::P384),
        }
    }

    fn combiner_label(&self) -> &'static [u8] {
        match self {
            Kem::MlKem768X25519 => b"\\.//^\\",
            Kem::MlKem768P256 => b"QSF-P256-MLKEM768-SHAKE256-SHA3256",
            Kem::MlKem1024P384 => b"QSF-P384-MLKEM1024-SHAKE256-SHA3256",
            Kem::MlKem768 | Kem::MlKem1024 => b"",
        }
    }

    /// Size of a serialized private key (`Nsk`).
    pub fn nsk(&self) -> usize {
        match self.curve() {
            None => ML_KEM_SEED_SIZE,
            Some(_) => HYBRID_SEED_SIZE,
        }
    }

    /// Size of a serialized public key (`Npk`).
    pub fn npk(&self) -> usize {
        self.level().ek_len() + self.curve().map_or(0, |c| c.point_len())
    }

    /// Size of an encapsulated key (`Nenc`).
    pub fn nenc(&self) -> usize {
        self.level().ct_len() + self.curve().map_or(0, |c| c.point_len())
    }

    fn expand_private_key(&self, sk: &[u8]) -> Result<ExpandedPrivateKey, Error> {
        ensure!(sk.len() == self.nsk(), JWEError::InvalidKeyPair);
        let mut d = [0u8; 32];
        let mut z = [0u8; 32];
        match self.curve() {
            None => {
                d.copy_from_slice(&sk[..32]);
                z.copy_from_slice(&sk[32..]);
                Ok(ExpandedPrivateKey {
                    d,
                    z,
                    traditional: None,
                })
            }
            Some(curve) => {
                let mut reader = shake256_reader(&[sk]);
                reader.read(&mut d);
                reader.read(&mut z);
                let traditional = curve.derive_secret(&mut reader)?;
                Ok(ExpandedPrivateKey {
                    d,
                    z,
                    traditional: Some(traditional),
                })
            }
        }
    }

    /// `DeriveKeyPair(ikm)`. Returns `(public_key, private_key)`.
    pub(crate) fn derive_key_pair(&self, ikm: &[u8]) -> Result<(Vec<u8>, Vec<u8>), Error> {
        ensure!(ikm.len() >= self.nsk(), JWEError::InvalidLength);
        let sk = shake256(&[ikm], self.nsk());
        let pk = self.public_key(&sk)?;
        Ok((pk, sk))
    }

    /// Compute the public key matching a serialized private key.
    pub(crate) fn public_key(&self, sk: &[u8]) -> Result<Vec<u8>, Error> {
        let expanded = self.expand_private_key(sk)?;
        let mut pk = self.level().public_key(expanded.d, expanded.z);
        if let Some(traditional) = &expanded.traditional {
            pk.extend_from_slice(&traditional.public_key());
        }
        Ok(pk)
    }

    /// Check that `pk` is a well-formed public key for this KEM.
    pub(crate) fn validate_public_key(&self, pk: &[u8]) -> Result<(), Error> {
        ensure!(pk.len() == self.npk(), JWEError::InvalidPublicKey);
        let (pk_pq, pk_t) = pk.split_at(self.level().ek_len());
        self.level().validate_public_key(pk_pq)?;
        if let Some(curve) = self.curve() {
            curve.validate_public_key(pk_t)?;
        }
        Ok(())
    }

    fn combine(&self, ss_pq: &[u8], ss_t: &[u8], ct_t: &[u8], pk_t: &[u8]) -> Vec<u8> {
        let mut hasher = Sha3_256::new();
        hasher.update(ss_pq);
        hasher.update(ss_t);
        hasher.update(ct_t);
        hasher.update(pk_t);
        hasher.update(self.combiner_label());
        hasher.finalize().to_vec()
    }

    /// `Encap(pkR)`. Returns `(shared_secret, enc)`.
    pub(crate) fn encap(&self, pk: &[u8]) -> Result<(Vec<u8>, Vec<u8>), Error> {
        ensure!(pk.len() == self.npk(), JWEError::InvalidPublicKey);
        let (pk_pq, pk_t) = pk.split_at(self.level().ek_len());
        let (mut ss_pq, mut enc) = self.level().encaps(pk_pq)?;
        let shared_secret = match self.curve() {
            None => ss_pq.to_vec(),
            Some(curve) => {
                let (mut ss_t, ct_t) = curve.encaps(pk_t)?;
                let ss = self.combine(&ss_pq, &ss_t, &ct_t, pk_t);
                ss_t.zeroize();
                enc.extend_from_slice(&ct_t);
                ss
            }
        };
        ss_pq.zeroize();
        Ok((shared_secret, enc))
    }

    /// `Decap(enc, skR)`.
    pub(crate) fn decap(&self, enc: &[u8], sk: &[u8]) -> Result<Vec<u8>, Error> {
        ensure!(enc.len() == self.nenc(), JWEError::MalformedMessage);
        let expanded = self.expand_private_key(sk)?;
        let (ct_pq, ct_t) = enc.split_at(self.level().ct_len());
        let mut ss_pq = self.level().decaps(expanded.d, expanded.z, ct_pq)?;
        let shared_secret = match &expanded.traditional {
            None => ss_pq.to_vec(),
            Some(traditional) => {
                let mut ss_t = traditional.decaps(ct_t)?;
                let pk_t = traditional.public_key();
                let ss = self.combine(&ss_pq, &ss_t, ct_t, &pk_t);
                ss_t.zeroize();
                ss
            }
        };
        ss_pq.zeroize();
        Ok(shared_secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ct_codecs::{Encoder, Hex};

    const ALL: [Kem; 5] = [
        Kem::MlKem768,
        Kem::MlKem1024,
        Kem::MlKem768P256,
        Kem::MlKem768X25519,
        Kem::MlKem1024P384,
    ];

    #[test]
    fn sizes() {
        assert_eq!(Kem::MlKem768.npk(), 1184);
        assert_eq!(Kem::MlKem768.nenc(), 1088);
        assert_eq!(Kem::MlKem1024.npk(), 1568);
        assert_eq!(Kem::MlKem768P256.npk(), 1184 + 65);
        assert_eq!(Kem::MlKem768X25519.nenc(), 1088 + 32);
        assert_eq!(Kem::MlKem1024P384.nenc(), 1568 + 97);
        assert_eq!(Kem::MlKem768.nsk(), 64);
        assert_eq!(Kem::MlKem768X25519.nsk(), 32);
    }

    #[test]
    fn encap_decap() {
        for kem in ALL {
            let ikm = vec![0x5au8; kem.nsk()];
            let (pk, sk) = kem.derive_key_pair(&ikm).unwrap();
            assert_eq!(pk.len(), kem.npk());
            assert_eq!(sk.len(), kem.nsk());
            kem.validate_public_key(&pk).unwrap();
            let (ss, enc) = kem.encap(&pk).unwrap();
            assert_eq!(enc.len(), kem.nenc());
            assert_eq!(ss.len(), 32);
            assert_eq!(kem.decap(&enc, &sk).unwrap(), ss);
        }
    }

    #[test]
    fn derive_key_pair_is_deterministic() {
        for kem in ALL {
            let ikm = vec![0x11u8; kem.nsk()];
            let a = kem.derive_key_pair(&ikm).unwrap();
            let b = kem.derive_key_pair(&ikm).unwrap();
            assert_eq!(a, b);
            assert_eq!(kem.public_key(&a.1).unwrap(), a.0);
        }
    }

    #[test]
    fn short_ikm_is_rejected() {
        let err = Kem::MlKem768.derive_key_pair(&[0u8; 63]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<JWEError>(),
            Some(&JWEError::InvalidLength)
        );
    }

    #[test]
    fn tampered_encapsulation_changes_secret() {
        let kem = Kem::MlKem768X25519;
        let (pk, sk) = kem.derive_key_pair(&[3u8; 32]).unwrap();
        let (ss, mut enc) = kem.encap(&pk).unwrap();
        enc[0] ^= 1;
        assert_ne!(kem.decap(&enc, &sk).unwrap(), ss);
    }

    #[test]
    fn combiner_known_answer() {
        let ss = Kem::MlKem768X25519.combine(&[1; 32], &[2; 32], &[3; 32], &[4; 32]);
        assert_eq!(
            Hex::encode_to_string(ss).unwrap(),
            "5c6bfaf8c3ec48ab3cee7c12129b39913b8a7fa1234115da7e1c55608ad19fb6"
        );
        let ss = Kem::MlKem768P256.combine(&[1; 32], &[2; 32], &[3; 65], &[4; 65]);
        assert_eq!(
            Hex::encode_to_string(ss).unwrap(),
            "77df395b96d24f4bcf5a0cd020e829ce40d8ec2f6be28c72ca95f3bf4999589b"
        );
    }

    #[test]
    fn hybrid_classification() {
        assert!(Kem::MlKem768.curve().is_none());
        assert_eq!(Kem::MlKem1024P384.curve(), Some(Curve::P384));
        assert!(Kem::from_id(0x0020).is_err());
    }
}
