// ABOUTME: AEAD envelope codec for OAuth secrets stored as text
// ABOUTME: AES-256-GCM with per-call random IV, detached tag, base64 wire format
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Envelope Codec
//!
//! Encrypts opaque secret strings for storage as text. Each call produces
//! `base64(iv):base64(tag):base64(ciphertext)`, base64-encoded once more so
//! a single TEXT column can hold the whole envelope. Packing IV and tag
//! alongside the ciphertext keeps the vault schema stable as the scheme
//! evolves.
//!
//! Decryption never panics on hostile input: a malformed or tampered
//! envelope yields the [`EnvelopeFailure`] sentinel so callers can treat
//! corruption as "force re-authentication" rather than crash.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;
use base64::{engine::general_purpose, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::{AppError, AppResult};

/// AES-256-GCM with a 16-byte nonce, matching the stored envelope layout
type EnvelopeAead = AesGcm<Aes256, U16>;

/// Initialization vector length in bytes
pub const IV_LEN: usize = 16;

/// Authentication tag length in bytes
pub const TAG_LEN: usize = 16;

const ENVELOPE_PARTS: usize = 3;
const KEY_LEN: usize = 32;

/// 256-bit symmetric key, fixed at process start and zeroized on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    /// Decode a key from its 64-hex-character configuration form.
    ///
    /// Anything that does not decode to exactly 32 bytes is a
    /// configuration error; the process must refuse to start rather than
    /// fail during first use.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigInvalid` error if the input is not valid hex or
    /// does not decode to 32 bytes.
    pub fn from_hex(hex_key: &str) -> AppResult<Self> {
        let mut bytes = hex::decode(hex_key)
            .map_err(|e| AppError::config_invalid(format!("encryption key is not valid hex: {e}")))?;

        if bytes.len() != KEY_LEN {
            bytes.zeroize();
            return Err(AppError::config_invalid(format!(
                "encryption key must decode to {KEY_LEN} bytes, got {} (expected 64 hex characters)",
                hex_key.len() / 2
            )));
        }

        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        bytes.zeroize();
        Ok(Self(key))
    }

    /// Build a key from raw bytes, primarily for testing
    #[must_use]
    pub const fn from_bytes(key: [u8; KEY_LEN]) -> Self {
        Self(key)
    }
}

// Key bytes must never reach logs, so Debug stays opaque.
impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Sentinel for a malformed or tampered envelope.
///
/// Returned instead of propagating cipher internals so the refresh engine
/// can surface a distinct corrupted-credential error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("stored envelope is malformed or failed its integrity check")]
pub struct EnvelopeFailure;

/// Encrypts and decrypts secret strings with a process-wide key
#[derive(Clone)]
pub struct EnvelopeCipher {
    aead: EnvelopeAead,
}

impl EnvelopeCipher {
    /// Create a cipher bound to the given key
    #[must_use]
    pub fn new(key: &EncryptionKey) -> Self {
        Self {
            aead: EnvelopeAead::new(GenericArray::from_slice(&key.0)),
        }
    }

    /// Encrypt a secret, producing a fresh envelope with a random IV.
    ///
    /// `None` passes through as `None`, distinguishing "nothing to
    /// encrypt" from a failure.
    ///
    /// # Errors
    ///
    /// Returns an internal error only on cipher failure, which indicates
    /// catastrophic key corruption; callers cannot meaningfully proceed.
    pub fn encrypt(&self, plaintext: Option<&str>) -> AppResult<Option<String>> {
        let Some(plaintext) = plaintext else {
            return Ok(None);
        };

        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);
        let nonce = GenericArray::from_slice(&iv);

        let mut sealed = self
            .aead
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| AppError::internal("envelope encryption failed"))?;

        // The AEAD appends the tag; the wire format stores it detached.
        let tag = sealed.split_off(sealed.len() - TAG_LEN);

        let combined = format!(
            "{}:{}:{}",
            general_purpose::STANDARD.encode(iv),
            general_purpose::STANDARD.encode(&tag),
            general_purpose::STANDARD.encode(&sealed)
        );
        Ok(Some(general_purpose::STANDARD.encode(combined)))
    }

    /// Decrypt an envelope produced by [`EnvelopeCipher::encrypt`].
    ///
    /// `None` passes through as `None`. A wrong part count, an IV or tag
    /// of the wrong length, undecodable base64, or a failed authentication
    /// check all yield [`EnvelopeFailure`].
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeFailure`] when the envelope is malformed or was
    /// produced under a different key.
    pub fn decrypt(&self, envelope: Option<&str>) -> Result<Option<String>, EnvelopeFailure> {
        let Some(envelope) = envelope else {
            return Ok(None);
        };

        let combined = general_purpose::STANDARD
            .decode(envelope)
            .map_err(|_| EnvelopeFailure)?;
        let combined = String::from_utf8(combined).map_err(|_| EnvelopeFailure)?;

        let parts: Vec<&str> = combined.split(':').collect();
        if parts.len() != ENVELOPE_PARTS {
            return Err(EnvelopeFailure);
        }

        let iv = general_purpose::STANDARD
            .decode(parts[0])
            .map_err(|_| EnvelopeFailure)?;
        let tag = general_purpose::STANDARD
            .decode(parts[1])
            .map_err(|_| EnvelopeFailure)?;
        let mut sealed = general_purpose::STANDARD
            .decode(parts[2])
            .map_err(|_| EnvelopeFailure)?;

        if iv.len() != IV_LEN || tag.len() != TAG_LEN {
            return Err(EnvelopeFailure);
        }

        sealed.extend_from_slice(&tag);
        let nonce = GenericArray::from_slice(&iv);

        let plaintext = self
            .aead
            .decrypt(nonce, sealed.as_slice())
            .map_err(|_| EnvelopeFailure)?;

        String::from_utf8(plaintext)
            .map(Some)
            .map_err(|_| EnvelopeFailure)
    }
}
