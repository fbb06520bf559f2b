//! Field-level encryption for card data and terminal credentials at rest.
//!
//! Ciphertexts are rendered as `"<iv-hex>:<cipher-hex>"`; the `:`
//! separator doubles as the sentinel that tells encrypted values apart
//! from plaintext, which makes re-encryption idempotent.

use error_stack::report;

use crate::{
    crypto,
    errors::{CryptoError, CustomResult},
};

const IV_HEX_LENGTH: usize = 32;

/// AES-256-CBC cipher over individual string fields, keyed from the
/// service master secret.
#[derive(Clone)]
pub struct FieldCipher {
    key: [u8; 32],
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FieldCipher")
    }
}

impl FieldCipher {
    /// Derive the field key from the configured master secret.
    pub fn new(master_secret: &str) -> Self {
        let digest = ring::digest::digest(&ring::digest::SHA256, master_secret.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(digest.as_ref());
        Self { key }
    }

    /// Whether the value already carries the iv-ciphertext framing.
    pub fn is_encrypted(value: &str) -> bool {
        match value.split_once(':') {
            Some((iv, cipher)) => {
                iv.len() == IV_HEX_LENGTH
                    && !cipher.is_empty()
                    && iv.chars().all(|c| c.is_ascii_hexdigit())
                    && cipher.chars().all(|c| c.is_ascii_hexdigit())
            }
            None => false,
        }
    }

    /// Encrypt a field. Values that already carry the sentinel are
    /// returned unchanged, so double-encryption is a no-op.
    ///
    /// The IV is derived from the key and the plaintext, which keeps the
    /// ciphertext stable for a given field across restarts.
    pub fn encrypt(&self, clear: &str) -> CustomResult<String, CryptoError> {
        if Self::is_encrypted(clear) {
            return Ok(clear.to_string());
        }
        let iv = self.derive_iv(clear);
        let ciphertext = crypto::aes256_cbc_encrypt(clear.as_bytes(), &self.key, &iv)?;
        Ok(format!("{}:{}", hex::encode(iv), hex::encode(ciphertext)))
    }

    /// Decrypt a field. Values without the sentinel are passed through
    /// unchanged; framed values that fail to decode are a
    /// [`CryptoError`].
    pub fn decrypt(&self, value: &str) -> CustomResult<String, CryptoError> {
        if !Self::is_encrypted(value) {
            return Ok(value.to_string());
        }
        let (iv_hex, cipher_hex) = value
            .split_once(':')
            .ok_or_else(|| report!(CryptoError::MalformedCiphertext))?;
        let iv_bytes =
            hex::decode(iv_hex).map_err(|_| report!(CryptoError::MalformedCiphertext))?;
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&iv_bytes);
        let ciphertext =
            hex::decode(cipher_hex).map_err(|_| report!(CryptoError::MalformedCiphertext))?;
        let clear = crypto::aes256_cbc_decrypt(&ciphertext, &self.key, &iv)?;
        String::from_utf8(clear).map_err(|_| report!(CryptoError::DecodingFailed))
    }

    fn derive_iv(&self, clear: &str) -> [u8; 16] {
        let mut context = ring::digest::Context::new(&ring::digest::SHA256);
        context.update(&self.key);
        context.update(clear.as_bytes());
        let digest = context.finish();
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&digest.as_ref()[..16]);
        iv
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    fn cipher() -> FieldCipher {
        FieldCipher::new("test-master-secret")
    }

    #[test]
    fn round_trip() {
        let cipher = cipher();
        let encrypted = cipher.encrypt("4282209004348016").expect("encrypt");
        assert!(FieldCipher::is_encrypted(&encrypted));
        let decrypted = cipher.decrypt(&encrypted).expect("decrypt");
        assert_eq!(decrypted, "4282209004348016");
    }

    #[test]
    fn encrypt_is_idempotent() {
        let cipher = cipher();
        let once = cipher.encrypt("123qweASD/").expect("encrypt");
        let twice = cipher.encrypt(&once).expect("encrypt again");
        assert_eq!(once, twice);
    }

    #[test]
    fn encrypt_is_deterministic() {
        let cipher = cipher();
        let first = cipher.encrypt("12345678").expect("encrypt");
        let second = cipher.encrypt("12345678").expect("encrypt");
        assert_eq!(first, second);
    }

    #[test]
    fn decrypt_passes_plaintext_through() {
        let cipher = cipher();
        assert_eq!(cipher.decrypt("not encrypted").expect("decrypt"), "not encrypted");
        // Values with a colon but no hex framing are plaintext too.
        assert_eq!(
            cipher.decrypt(r#"{"key":"value"}"#).expect("decrypt"),
            r#"{"key":"value"}"#
        );
    }

    #[test]
    fn malformed_ciphertext_is_an_error() {
        let cipher = cipher();
        let framed_garbage = format!("{}:{}", "ab".repeat(16), "0123");
        assert!(cipher.decrypt(&framed_garbage).is_err());
    }

    #[test]
    fn different_plaintexts_get_different_ivs() {
        let cipher = cipher();
        let first = cipher.encrypt("aaaa").expect("encrypt");
        let second = cipher.encrypt("bbbb").expect("encrypt");
        let (iv_a, _) = first.split_once(':').expect("framing");
        let (iv_b, _) = second.split_once(':').expect("framing");
        assert_ne!(iv_a, iv_b);
    }
}
