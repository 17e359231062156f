//! Body pipeline: gzip, then AES-256-GCM.
//!
//! Encrypted blobs are laid out as `nonce (12 bytes) || ciphertext || tag`.

use std::io::{Read, Write};

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use super::layout::BodyFormat;
use crate::{Error, Result};

/// Nonce size for AES-GCM (96 bits / 12 bytes).
const NONCE_SIZE: usize = 12;

/// Archive-wide body cipher.
#[derive(Clone)]
pub struct Cipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Cipher(..)")
    }
}

impl Cipher {
    /// Generates a fresh key. Returns the cipher and the key in base64.
    #[must_use]
    pub fn generate() -> (Self, String) {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        let encoded = BASE64.encode(key);
        (
            Self {
                cipher: Aes256Gcm::new(&key),
            },
            encoded,
        )
    }

    /// Loads a base64 key.
    ///
    /// # Errors
    ///
    /// Returns a crypto error if the key is not 32 bytes of valid base64.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let key = BASE64
            .decode(encoded.trim())
            .map_err(|e| Error::Crypto(format!("storage key is not base64: {e}")))?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|_| Error::Crypto(format!("storage key has {} bytes, expected 32", key.len())))?;
        Ok(Self { cipher })
    }

    /// Encrypts with a random nonce.
    ///
    /// # Errors
    ///
    /// Returns a crypto error if encryption fails.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| Error::Crypto(format!("AES-GCM encryption failed: {e}")))?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);
        Ok(combined)
    }

    /// Decrypts a `nonce || ciphertext` blob.
    ///
    /// # Errors
    ///
    /// Returns a crypto error for short input or a failed tag check.
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>> {
        if blob.len() < NONCE_SIZE {
            return Err(Error::Crypto(format!(
                "encrypted body too short ({} bytes)",
                blob.len()
            )));
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| Error::Crypto(format!("AES-GCM decryption failed: {e}")))
    }
}

/// Gzips `data`.
///
/// # Errors
///
/// Returns an I/O error if the encoder fails.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Gunzips `data`.
///
/// # Errors
///
/// Returns [`Error::CorruptBody`] for input that is not a gzip stream.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| Error::CorruptBody(e.to_string()))?;
    Ok(out)
}

/// Applies `format` to a raw body.
///
/// # Errors
///
/// Fails when encryption is requested without a cipher.
pub fn encode(body: &[u8], format: BodyFormat, cipher: Option<&Cipher>) -> Result<Vec<u8>> {
    let data = if format.compressed {
        compress(body)?
    } else {
        body.to_vec()
    };
    if format.encrypted {
        let cipher = cipher.ok_or_else(|| Error::Crypto("no storage key loaded".to_string()))?;
        cipher.encrypt(&data)
    } else {
        Ok(data)
    }
}

/// Reverses `format`.
///
/// # Errors
///
/// Fails for undecryptable or corrupt data, or an encrypted body without a key.
pub fn decode(stored: &[u8], format: BodyFormat, cipher: Option<&Cipher>) -> Result<Vec<u8>> {
    let data = if format.encrypted {
        let cipher = cipher.ok_or_else(|| {
            Error::Crypto("body is encrypted but the archive has no storage key".to_string())
        })?;
        cipher.decrypt(stored)?
    } else {
        stored.to_vec()
    };
    if format.compressed {
        decompress(&data)
    } else {
        Ok(data)
    }
}
