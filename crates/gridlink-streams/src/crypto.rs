//! AES-128-CBC decryption of stream files.
//!
//! The distributor encrypts every drop with one of a small set of
//! rotating key pairs; decryption tries the configured pairs in
//! order.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, KeyIvInit};

use gridlink_core::config::DecryptionKey;

use crate::error::StreamError;

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// One decoded `(iv, key)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    iv: [u8; 16],
    key: [u8; 16],
}

impl KeyPair {
    pub fn from_hex(iv: &str, key: &str) -> Result<Self, StreamError> {
        Ok(KeyPair {
            iv: decode16(iv)?,
            key: decode16(key)?,
        })
    }

    pub fn from_config(config: &DecryptionKey) -> Result<Self, StreamError> {
        KeyPair::from_hex(&config.iv, &config.key)
    }
}

fn decode16(hex_str: &str) -> Result<[u8; 16], StreamError> {
    let bytes = hex::decode(hex_str)
        .map_err(|e| StreamError::corrupted(format!("bad key material: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| StreamError::corrupted("key material must be 16 bytes"))
}

/// Decrypt one ciphertext blob. A wrong key surfaces as a padding
/// failure and is reported as a corrupted file so the caller can try
/// the next key.
pub fn decrypt(ciphertext: &[u8], key_pair: &KeyPair) -> Result<Vec<u8>, StreamError> {
    Aes128CbcDec::new(&key_pair.key.into(), &key_pair.iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|e| StreamError::corrupted(format!("decryption failed: {e}")))
}

#[cfg(test)]
pub(crate) fn encrypt(plaintext: &[u8], key_pair: &KeyPair) -> Vec<u8> {
    use aes::cipher::BlockEncryptMut;
    type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
    Aes128CbcEnc::new(&key_pair.key.into(), &key_pair.iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_a() -> KeyPair {
        KeyPair::from_hex(
            "000102030405060708090a0b0c0d0e0f",
            "f0e0d0c0b0a090807060504030201000",
        )
        .unwrap()
    }

    fn key_b() -> KeyPair {
        KeyPair::from_hex(
            "0f0e0d0c0b0a09080706050403020100",
            "00102030405060708090a0b0c0d0e0f0",
        )
        .unwrap()
    }

    #[test]
    fn round_trips() {
        let plaintext = b"<PRM><Id_PRM>09111642617347</Id_PRM></PRM>";
        let ciphertext = encrypt(plaintext, &key_a());
        assert_ne!(&ciphertext[..], &plaintext[..]);
        assert_eq!(decrypt(&ciphertext, &key_a()).unwrap(), plaintext);
    }

    #[test]
    fn wrong_key_is_detected() {
        let ciphertext = encrypt(b"payload bytes of some length", &key_a());
        assert!(decrypt(&ciphertext, &key_b()).is_err());
    }

    #[test]
    fn rejects_truncated_key_material() {
        assert!(KeyPair::from_hex("0001", "f0e0").is_err());
        assert!(KeyPair::from_hex("zz", "yy").is_err());
    }
}
