//! Utilities for cryptographic algorithms

use cbc::cipher::{
    block_padding::{NoPadding, Pkcs7},
    BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit,
};
use error_stack::{report, ResultExt};

use crate::{
    consts::BASE64_ENGINE,
    errors::{self, CustomResult},
};
use base64::Engine;

/// Trait for generating a digest for SHA and related algorithms
pub trait GenerateDigest {
    /// Takes a message and creates a digest for it
    fn generate_digest(&self, message: &[u8]) -> CustomResult<Vec<u8>, errors::CryptoError>;
}

/// Secure Hash Algorithm 1, as mandated by the legacy acquirer protocols
#[derive(Debug)]
pub struct Sha1;

impl GenerateDigest for Sha1 {
    fn generate_digest(&self, message: &[u8]) -> CustomResult<Vec<u8>, errors::CryptoError> {
        let digest = ring::digest::digest(&ring::digest::SHA1_FOR_LEGACY_USE_ONLY, message);
        Ok(digest.as_ref().to_vec())
    }
}

/// Secure Hash Algorithm 256
#[derive(Debug)]
pub struct Sha256;

impl GenerateDigest for Sha256 {
    fn generate_digest(&self, message: &[u8]) -> CustomResult<Vec<u8>, errors::CryptoError> {
        let digest = ring::digest::digest(&ring::digest::SHA256, message);
        Ok(digest.as_ref().to_vec())
    }
}

/// Secure Hash Algorithm 512
#[derive(Debug)]
pub struct Sha512;

impl GenerateDigest for Sha512 {
    fn generate_digest(&self, message: &[u8]) -> CustomResult<Vec<u8>, errors::CryptoError> {
        let digest = ring::digest::digest(&ring::digest::SHA512, message);
        Ok(digest.as_ref().to_vec())
    }
}

/// MD5, kept for the POSNET packet-key derivation
#[derive(Debug)]
pub struct Md5;

impl GenerateDigest for Md5 {
    fn generate_digest(&self, message: &[u8]) -> CustomResult<Vec<u8>, errors::CryptoError> {
        Ok(md5::compute(message).0.to_vec())
    }
}

/// Uppercase hex SHA-1 digest.
pub fn sha1_hex_upper(message: &[u8]) -> CustomResult<String, errors::CryptoError> {
    Ok(hex::encode_upper(Sha1.generate_digest(message)?))
}

/// SHA-1 digest packed to base64 (digest bytes -> hex -> bytes -> base64,
/// which collapses to base64 over the raw digest).
pub fn sha1_pack_base64(message: &[u8]) -> CustomResult<String, errors::CryptoError> {
    Ok(BASE64_ENGINE.encode(Sha1.generate_digest(message)?))
}

/// Base64 over the raw SHA-256 digest.
pub fn sha256_base64(message: &[u8]) -> CustomResult<String, errors::CryptoError> {
    Ok(BASE64_ENGINE.encode(Sha256.generate_digest(message)?))
}

/// Uppercase hex SHA-512 digest.
pub fn sha512_hex_upper(message: &[u8]) -> CustomResult<String, errors::CryptoError> {
    Ok(hex::encode_upper(Sha512.generate_digest(message)?))
}

/// SHA-512 digest packed to base64, the NestPay "hash version 3" coding.
pub fn sha512_pack_base64(message: &[u8]) -> CustomResult<String, errors::CryptoError> {
    Ok(BASE64_ENGINE.encode(Sha512.generate_digest(message)?))
}

/// Uppercase hex MD5 digest.
pub fn md5_hex_upper(message: &[u8]) -> CustomResult<String, errors::CryptoError> {
    Ok(hex::encode_upper(Md5.generate_digest(message)?))
}

type TdesCbcDec = cbc::Decryptor<des::TdesEde3>;
type TdesEcbDec = ecb::Decryptor<des::TdesEde3>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Triple-DES-EDE3 CBC decryption with padding handling disabled. The
/// input must be block aligned; trailing pad bytes are the caller's to
/// strip because legacy packets pad with raw 0x00..=0x08 bytes.
pub fn tdes_cbc_decrypt(
    data: &[u8],
    key: &[u8],
    iv: &[u8],
) -> CustomResult<Vec<u8>, errors::CryptoError> {
    let cipher = TdesCbcDec::new_from_slices(key, iv)
        .change_context(errors::CryptoError::DecodingFailed)?;
    let mut buffer = data.to_vec();
    let decrypted = cipher
        .decrypt_padded_mut::<NoPadding>(&mut buffer)
        .map_err(|_| report!(errors::CryptoError::DecodingFailed))?
        .to_vec();
    Ok(decrypted)
}

/// Triple-DES-EDE3 ECB decryption with padding handling disabled.
pub fn tdes_ecb_decrypt(data: &[u8], key: &[u8]) -> CustomResult<Vec<u8>, errors::CryptoError> {
    let cipher =
        TdesEcbDec::new_from_slice(key).change_context(errors::CryptoError::DecodingFailed)?;
    let mut buffer = data.to_vec();
    let decrypted = cipher
        .decrypt_padded_mut::<NoPadding>(&mut buffer)
        .map_err(|_| report!(errors::CryptoError::DecodingFailed))?
        .to_vec();
    Ok(decrypted)
}

/// AES-256-CBC with PKCS#7 padding, used by the field-level cipher.
pub(crate) fn aes256_cbc_encrypt(
    data: &[u8],
    key: &[u8; 32],
    iv: &[u8; 16],
) -> CustomResult<Vec<u8>, errors::CryptoError> {
    let cipher = Aes256CbcEnc::new_from_slices(key, iv)
        .change_context(errors::CryptoError::EncodingFailed)?;
    let mut buffer = vec![0u8; data.len() + 16];
    buffer[..data.len()].copy_from_slice(data);
    let encrypted = cipher
        .encrypt_padded_mut::<Pkcs7>(&mut buffer, data.len())
        .map_err(|_| report!(errors::CryptoError::EncodingFailed))?
        .to_vec();
    Ok(encrypted)
}

/// AES-256-CBC decryption, PKCS#7 unpadding.
pub(crate) fn aes256_cbc_decrypt(
    data: &[u8],
    key: &[u8; 32],
    iv: &[u8; 16],
) -> CustomResult<Vec<u8>, errors::CryptoError> {
    let cipher = Aes256CbcDec::new_from_slices(key, iv)
        .change_context(errors::CryptoError::DecodingFailed)?;
    let mut buffer = data.to_vec();
    let decrypted = cipher
        .decrypt_padded_mut::<Pkcs7>(&mut buffer)
        .map_err(|_| report!(errors::CryptoError::DecodingFailed))?
        .to_vec();
    Ok(decrypted)
}

#[cfg(test)]
mod crypto_tests {
    #![allow(clippy::expect_used)]

    use base64::Engine;

    use super::*;

    const SHA1_ABC: &str = "a9993e364706816aba3e25717850c26c9cd0d89d";
    const SHA256_ABC: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
    const SHA512_ABC: &str = "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
                              2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f";
    const MD5_ABC: &str = "900150983cd24fb0d6963f7d28e17f72";

    #[test]
    fn test_sha1_hex_upper() {
        let digest = sha1_hex_upper(b"abc").expect("digest");
        assert_eq!(digest, SHA1_ABC.to_uppercase());
    }

    #[test]
    fn test_sha256_digest() {
        let digest = Sha256.generate_digest(b"abc").expect("digest");
        assert_eq!(hex::encode(digest), SHA256_ABC);
    }

    #[test]
    fn test_sha512_hex_upper() {
        let digest = sha512_hex_upper(b"abc").expect("digest");
        assert_eq!(digest, SHA512_ABC.to_uppercase());
    }

    #[test]
    fn test_md5_hex_upper() {
        let digest = md5_hex_upper(b"abc").expect("digest");
        assert_eq!(digest, MD5_ABC.to_uppercase());
    }

    #[test]
    fn test_sha1_pack_base64_equals_hex_repack() {
        let packed = sha1_pack_base64(b"abc").expect("digest");
        let repacked = BASE64_ENGINE.encode(hex::decode(SHA1_ABC).expect("hex"));
        assert_eq!(packed, repacked);
    }

    #[test]
    fn test_sha512_pack_base64_equals_hex_repack() {
        let packed = sha512_pack_base64(b"abc").expect("digest");
        let repacked = BASE64_ENGINE.encode(hex::decode(SHA512_ABC).expect("hex"));
        assert_eq!(packed, repacked);
    }

    #[test]
    fn test_tdes_cbc_round_trip() {
        use cbc::cipher::{block_padding::NoPadding, BlockEncryptMut, KeyIvInit};

        let key = b"0123456789abcdef01234567";
        let iv = b"\x01\x02\x03\x04\x05\x06\x07\x08";
        let plaintext = b"exactly 16 bytes";

        let encryptor =
            cbc::Encryptor::<des::TdesEde3>::new_from_slices(key, iv).expect("cipher init");
        let mut buffer = plaintext.to_vec();
        let ciphertext = encryptor
            .encrypt_padded_mut::<NoPadding>(&mut buffer, plaintext.len())
            .expect("encrypt")
            .to_vec();

        let decrypted = tdes_cbc_decrypt(&ciphertext, key, iv).expect("decrypt");
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_tdes_cbc_rejects_misaligned_input() {
        let key = b"0123456789abcdef01234567";
        let iv = b"\x01\x02\x03\x04\x05\x06\x07\x08";
        assert!(tdes_cbc_decrypt(b"not a block", key, iv).is_err());
    }

    #[test]
    fn test_tdes_ecb_round_trip() {
        use cbc::cipher::{block_padding::NoPadding, BlockEncryptMut, KeyInit};

        let key = b"0123456789abcdef01234567";
        let plaintext = b"block-aligned-16";

        let encryptor = ecb::Encryptor::<des::TdesEde3>::new_from_slice(key).expect("cipher init");
        let mut buffer = plaintext.to_vec();
        let ciphertext = encryptor
            .encrypt_padded_mut::<NoPadding>(&mut buffer, plaintext.len())
            .expect("encrypt")
            .to_vec();

        let decrypted = tdes_ecb_decrypt(&ciphertext, key).expect("decrypt");
        assert_eq!(decrypted, plaintext);
    }
}
