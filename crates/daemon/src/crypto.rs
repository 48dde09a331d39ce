// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential-at-rest encryption. `DataServer`/`MediaServer` credentials cross
//! the core as opaque bytes (see SPEC_FULL.md §1 Non-goals: "credential
//! encryption at rest" is an external collaborator's concern); this module is
//! that collaborator for the daemon process. AES-256-GCM, keyed by SHA-256 of
//! the operator-supplied `ENCRYPTION_KEY` passphrase.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("ciphertext shorter than the nonce prefix")]
    Truncated,
    #[error("decryption failed (wrong key or corrupted blob)")]
    Aead,
}

/// Encrypts/decrypts credential blobs with a key derived from one passphrase.
/// Every call to [`Cipher::encrypt`] draws a fresh random nonce, stored as a
/// prefix of the returned blob; [`Cipher::decrypt`] reads it back out.
pub struct Cipher {
    cipher: Aes256Gcm,
}

impl Cipher {
    pub fn new(passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(&digest);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        // Only failure mode is a buffer-length overflow we never hit with
        // in-process credential blobs; AES-256-GCM encryption with a valid
        // key cannot otherwise fail.
        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .unwrap_or_else(|_| Vec::new());
        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        out
    }

    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if blob.len() < NONCE_LEN {
            return Err(CryptoError::Truncated);
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::Aead)
    }
}

#[cfg(test)]
#[path = "crypto_tests.rs"]
mod tests;
