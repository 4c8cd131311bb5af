//! Encryption boundary and payload framing.
//!
//! The pipeline treats encryption as an external byte transform behind the
//! [`Encryption`] trait. The payload convention is a two-part document: a
//! first line naming the method (`aes`) followed by the cipher text; a
//! payload without that marker line is plaintext.
//!
//! An AES-256-GCM implementation of the trait ships behind the `encryption`
//! cargo feature; the key is derived from the passphrase with SHA-256.

use async_trait::async_trait;

use crate::Result;

/// The only encryption method the payload convention currently names.
pub const AES_METHOD: &str = "aes";

/// External encryption collaborator.
#[async_trait]
pub trait Encryption: Send + Sync {
    /// Encrypts `data` with the given passphrase and method, returning the
    /// cipher text without the method marker line.
    async fn encrypt(&self, data: &str, passphrase: &str, method: &str) -> Result<String>;

    /// Decrypts cipher text produced by [`Encryption::encrypt`].
    async fn decrypt(&self, data: &str, passphrase: &str, method: &str) -> Result<String>;
}

/// Frames cipher text with the method marker line.
#[must_use]
pub fn seal(cipher_text: &str) -> String {
    format!("{AES_METHOD}\n{cipher_text}")
}

/// Returns the body of a sealed payload, or `None` when the content has no
/// method marker line (plaintext).
#[must_use]
pub fn sealed_body(content: &str) -> Option<&str> {
    let (header, body) = content.split_once('\n')?;
    (header.trim() == AES_METHOD).then_some(body)
}

#[cfg(feature = "encryption")]
mod aes_impl {
    use aes_gcm::{
        Aes256Gcm, Key, Nonce,
        aead::{Aead, KeyInit},
    };
    use async_trait::async_trait;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use rand::RngCore;
    use sha2::{Digest, Sha256};

    use super::{AES_METHOD, Encryption};
    use crate::{Error, Result};

    /// Nonce size for AES-256-GCM (12 bytes / 96 bits).
    const NONCE_SIZE: usize = 12;

    /// AES-256-GCM implementation of the [`Encryption`] collaborator.
    ///
    /// The 256-bit key is the SHA-256 digest of the passphrase. Output is
    /// base64 of nonce + ciphertext (the auth tag is part of the
    /// ciphertext).
    #[derive(Debug, Default, Clone, Copy)]
    pub struct AesEncryption;

    impl AesEncryption {
        /// Creates the collaborator.
        #[must_use]
        pub const fn new() -> Self {
            Self
        }

        fn cipher_for(passphrase: &str) -> Aes256Gcm {
            let digest = Sha256::digest(passphrase.as_bytes());
            let key = Key::<Aes256Gcm>::from_slice(&digest);
            Aes256Gcm::new(key)
        }

        fn check_method(method: &str) -> Result<()> {
            if method == AES_METHOD {
                Ok(())
            } else {
                Err(Error::InvalidInput(format!(
                    "unsupported encryption method: {method}"
                )))
            }
        }
    }

    #[async_trait]
    impl Encryption for AesEncryption {
        async fn encrypt(&self, data: &str, passphrase: &str, method: &str) -> Result<String> {
            Self::check_method(method)?;
            let cipher = Self::cipher_for(passphrase);

            let mut nonce_bytes = [0u8; NONCE_SIZE];
            rand::rng().fill_bytes(&mut nonce_bytes);
            let nonce = Nonce::from(nonce_bytes);

            let ciphertext =
                cipher
                    .encrypt(&nonce, data.as_bytes())
                    .map_err(|e| Error::OperationFailed {
                        operation: "encrypt".to_string(),
                        cause: format!("AES-256-GCM encryption failed: {e}"),
                    })?;

            let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
            output.extend_from_slice(&nonce_bytes);
            output.extend_from_slice(&ciphertext);

            tracing::debug!(
                plaintext_len = data.len(),
                encrypted_len = output.len(),
                "encrypted payload"
            );

            Ok(BASE64.encode(output))
        }

        async fn decrypt(&self, data: &str, passphrase: &str, method: &str) -> Result<String> {
            Self::check_method(method)?;
            let raw = BASE64
                .decode(data.trim())
                .map_err(|e| Error::InvalidInput(format!("invalid base64 payload: {e}")))?;

            let min_size = NONCE_SIZE + 16; // 16 = auth tag
            if raw.len() < min_size {
                return Err(Error::InvalidInput(format!(
                    "encrypted payload too short: {} bytes, minimum {min_size}",
                    raw.len()
                )));
            }

            let nonce_array: [u8; NONCE_SIZE] = raw[..NONCE_SIZE]
                .try_into()
                .map_err(|_| Error::InvalidInput("invalid nonce length".to_string()))?;
            let nonce = Nonce::from(nonce_array);

            let cipher = Self::cipher_for(passphrase);
            let plaintext =
                cipher
                    .decrypt(&nonce, &raw[NONCE_SIZE..])
                    .map_err(|e| Error::OperationFailed {
                        operation: "decrypt".to_string(),
                        cause: format!(
                            "AES-256-GCM decryption failed (wrong passphrase or corrupted data): {e}"
                        ),
                    })?;

            String::from_utf8(plaintext)
                .map_err(|e| Error::InvalidInput(format!("decrypted payload is not UTF-8: {e}")))
        }
    }
}

#[cfg(feature = "encryption")]
pub use aes_impl::AesEncryption;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_adds_marker_line() {
        assert_eq!(seal("cipher"), "aes\ncipher");
    }

    #[test]
    fn test_sealed_body_detection() {
        assert_eq!(sealed_body("aes\ncipher"), Some("cipher"));
        assert_eq!(sealed_body("aes \ncipher"), Some("cipher"));
        assert_eq!(sealed_body("{\"kind\":\"x\"}"), None);
        assert_eq!(sealed_body("plain\ntext"), None);
        assert_eq!(sealed_body(""), None);
    }

    #[test]
    fn test_sealed_body_keeps_embedded_newlines() {
        assert_eq!(sealed_body("aes\nline1\nline2"), Some("line1\nline2"));
    }

    #[cfg(feature = "encryption")]
    mod aes {
        use super::super::*;

        #[tokio::test]
        async fn test_encrypt_decrypt_round_trip() {
            let enc = AesEncryption::new();
            let cipher = enc
                .encrypt("{\"kind\":\"test\"}", "secret", AES_METHOD)
                .await
                .unwrap();
            assert_ne!(cipher, "{\"kind\":\"test\"}");

            let plain = enc.decrypt(&cipher, "secret", AES_METHOD).await.unwrap();
            assert_eq!(plain, "{\"kind\":\"test\"}");
        }

        #[tokio::test]
        async fn test_wrong_passphrase_fails() {
            let enc = AesEncryption::new();
            let cipher = enc.encrypt("data", "secret", AES_METHOD).await.unwrap();
            assert!(enc.decrypt(&cipher, "other", AES_METHOD).await.is_err());
        }

        #[tokio::test]
        async fn test_unknown_method_rejected() {
            let enc = AesEncryption::new();
            assert!(enc.encrypt("data", "secret", "rot13").await.is_err());
        }
    }
}
