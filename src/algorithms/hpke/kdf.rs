//! One-stage HPKE key derivation.

use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::Shake256;
use zeroize::Zeroize;

use crate::error::*;

const HPKE_VERSION_LABEL: &[u8] = b"HPKE-v1";
const MODE_BASE: u8 = 0x00;

/// Absorb all `parts` into SHAKE256 and squeeze `out_len` bytes.
pub(crate) fn shake256(parts: &[&[u8]], out_len: usize) -> Vec<u8> {
    let mut reader = shake256_reader(parts);
    let mut out = vec![0u8; out_len];
    reader.read(&mut out);
    out
}

/// Absorb all `parts` into SHAKE256 and return the squeezing end.
pub(crate) fn shake256_reader(parts: &[&[u8]]) -> impl XofReader {
    let mut hasher = Shake256::default();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize_xof()
}

fn length_prefix(len: usize) -> Result<[u8; 2], Error> {
    ensure!(len <= u16::MAX as usize, JWEError::InvalidLength);
    Ok((len as u16).to_be_bytes())
}

/// Key derivation function identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kdf {
    Shake256,
}

impl Kdf {
    pub const SHAKE256_ID: u16 = 0x0011;

    pub fn from_id(id: u16) -> Result<Self, Error> {
        match id {
            Self::SHAKE256_ID => Ok(Kdf::Shake256),
            _ => bail!(JWEError::UnsupportedKdf(id)),
        }
    }

    pub fn id(&self) -> u16 {
        match self {
            Kdf::Shake256 => Self::SHAKE256_ID,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Kdf::Shake256 => "SHAKE256",
        }
    }

    /// Size of the exporter secret (`Nh`).
    pub fn nh(&self) -> usize {
        match self {
            Kdf::Shake256 => 64,
        }
    }

    /// `LabeledDerive(ikm, label, context, L)`
    pub(crate) fn labeled_derive(
        &self,
        suite_id: &[u8],
        ikm: &[u8],
        label: &[u8],
        context: &[u8],
        out_len: usize,
    ) -> Result<Vec<u8>, Error> {
        let label_len = length_prefix(label.len())?;
        let out_len_be = length_prefix(out_len)?;
        match self {
            Kdf::Shake256 => Ok(shake256(
                &[
                    ikm,
                    HPKE_VERSION_LABEL,
                    suite_id,
                    &label_len,
                    label,
                    &out_len_be,
                    context,
                ],
                out_len,
            )),
        }
    }

    /// Base-mode key schedule. Returns `(key, base_nonce)`.
    pub(crate) fn key_schedule(
        &self,
        suite_id: &[u8],
        shared_secret: &[u8],
        info: &[u8],
        nk: usize,
        nn: usize,
    ) -> Result<(Vec<u8>, Vec<u8>), Error> {
        // Empty PSK and PSK ID in base mode.
        let mut secrets = Vec::with_capacity(4 + shared_secret.len());
        secrets.extend_from_slice(&length_prefix(0)?);
        secrets.extend_from_slice(&length_prefix(shared_secret.len())?);
        secrets.extend_from_slice(shared_secret);

        let mut context = Vec::with_capacity(5 + info.len());
        context.push(MODE_BASE);
        context.extend_from_slice(&length_prefix(0)?);
        context.extend_from_slice(&length_prefix(info.len())?);
        context.extend_from_slice(info);

        let secret =
            self.labeled_derive(suite_id, &secrets, b"secret", &context, nk + nn + self.nh());
        secrets.zeroize();
        let mut secret = secret?;
        let key = secret[..nk].to_vec();
        let base_nonce = secret[nk..nk + nn].to_vec();
        secret.zeroize();
        Ok((key, base_nonce))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ct_codecs::{Encoder, Hex};

    const SUITE_ID: &[u8] = b"HPKE\x00\x50\x00\x11\x00\x02";

    #[test]
    fn labeled_derive_binds_label_and_context() {
        let kdf = Kdf::Shake256;
        let a = kdf.labeled_derive(SUITE_ID, b"ikm", b"a", b"ctx", 32).unwrap();
        let b = kdf.labeled_derive(SUITE_ID, b"ikm", b"b", b"ctx", 32).unwrap();
        let c = kdf.labeled_derive(SUITE_ID, b"ikm", b"a", b"xtc", 32).unwrap();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(
            a,
            kdf.labeled_derive(SUITE_ID, b"ikm", b"a", b"ctx", 32).unwrap()
        );
    }

    #[test]
    fn key_schedule_sizes() {
        let (key, nonce) = Kdf::Shake256
            .key_schedule(SUITE_ID, &[7u8; 32], b"info", 32, 12)
            .unwrap();
        assert_eq!(key.len(), 32);
        assert_eq!(nonce.len(), 12);
    }

    #[test]
    fn key_schedule_binds_info() {
        let kdf = Kdf::Shake256;
        let a = kdf.key_schedule(SUITE_ID, &[7u8; 32], b"one", 16, 12).unwrap();
        let b = kdf.key_schedule(SUITE_ID, &[7u8; 32], b"two", 16, 12).unwrap();
        assert_ne!(a.0, b.0);
        assert_ne!(a.1, b.1);
    }

    #[test]
    fn key_schedule_known_answer() {
        let shared_secret: Vec<u8> = (0u8..32).collect();
        let (key, nonce) = Kdf::Shake256
            .key_schedule(SUITE_ID, &shared_secret, b"JOSE-HPKE rcpt\xffA256GCM\xff", 32, 12)
            .unwrap();
        assert_eq!(
            Hex::encode_to_string(key).unwrap(),
            "c061556c80c28b1250e070fcaef65b636a42474b0166d5e7c680ff94d0613e9f"
        );
        assert_eq!(Hex::encode_to_string(nonce).unwrap(), "c4c0ed89250cd27dc9509ace");

        let (key, nonce) = Kdf::Shake256
            .key_schedule(b"HPKE\x00\x41\x00\x11\x00\x03", &shared_secret, b"", 32, 12)
            .unwrap();
        assert_eq!(
            Hex::encode_to_string(key).unwrap(),
            "b5a6c55d20a756f3dfbd4e566641f2bb5d4bcd79f91423ae9779a70af2597a15"
        );
        assert_eq!(Hex::encode_to_string(nonce).unwrap(), "9ce40fe297ce3cac5412466b");
    }

    #[test]
    fn unknown_kdf() {
        let err = Kdf::from_id(0x0001).unwrap_err();
        assert_eq!(
            err.downcast_ref::<JWEError>(),
            Some(&JWEError::UnsupportedKdf(0x0001))
        );
    }
}
