//! Key encryption at rest using ChaCha20-Poly1305
//!
//! Every stored secret is sealed with a fresh random 96-bit nonce and carries
//! a 128-bit authentication tag. The stored token is
//! `base64(nonce || ciphertext || tag)`.
//!
//! Decryption never falls back to returning its input: a token that fails
//! verification is a [`DecryptError`], and callers must fail closed.

use std::fmt;

use anyhow::Result;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    ChaCha20Poly1305, Key, Nonce,
};
use thiserror::Error;

/// Cipher key length in bytes (256 bits)
pub const KEY_LENGTH: usize = 32;
/// Nonce length in bytes (96 bits)
pub const NONCE_LENGTH: usize = 12;
/// Authentication tag length in bytes (128 bits)
pub const TAG_LENGTH: usize = 16;

/// Pad byte used when the configured secret is shorter than the key
const KEY_PAD_BYTE: u8 = b'0';

/// Failure to open a stored token
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecryptError {
    #[error("stored token is not valid base64")]
    Encoding,

    #[error("stored token is too short ({0} bytes)")]
    Truncated(usize),

    #[error("authentication tag verification failed")]
    Authentication,

    #[error("decrypted secret is not valid UTF-8")]
    Utf8,
}

/// Process-wide cipher, derived once from the configured secret
#[derive(Clone)]
pub struct KeyCipher {
    cipher: ChaCha20Poly1305,
}

impl KeyCipher {
    /// Build the cipher from the configured encryption secret
    pub fn from_secret(secret: &str) -> Self {
        let key = derive_key(secret);
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(&key)),
        }
    }

    /// Seal a plaintext secret into a transport-safe token
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);

        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| anyhow::anyhow!("Encryption failed: {}", e))?;

        let mut sealed = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(sealed))
    }

    /// Open a token produced by [`KeyCipher::encrypt`]
    pub fn decrypt(&self, token: &str) -> Result<String, DecryptError> {
        let sealed = BASE64
            .decode(token.trim())
            .map_err(|_| DecryptError::Encoding)?;

        if sealed.len() < NONCE_LENGTH + TAG_LENGTH {
            return Err(DecryptError::Truncated(sealed.len()));
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LENGTH);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| DecryptError::Authentication)?;

        String::from_utf8(plaintext).map_err(|_| DecryptError::Utf8)
    }
}

impl fmt::Debug for KeyCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCipher")
            .field("algorithm", &"chacha20-poly1305")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Derive the 256-bit key from the configured secret
///
/// Secrets longer than the key are truncated; shorter ones are left-padded
/// with ASCII `'0'`.
fn derive_key(secret: &str) -> [u8; KEY_LENGTH] {
    let bytes = secret.as_bytes();
    let mut key = [KEY_PAD_BYTE; KEY_LENGTH];

    if bytes.len() >= KEY_LENGTH {
        key.copy_from_slice(&bytes[..KEY_LENGTH]);
    } else {
        key[KEY_LENGTH - bytes.len()..].copy_from_slice(bytes);
    }

    key
}
