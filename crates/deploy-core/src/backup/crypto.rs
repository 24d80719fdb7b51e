//! AES-256-GCM sealing for backup artifacts
//!
//! The cipher key is the SHA-256 digest of the caller's passphrase. Sealed
//! data is the 12-byte nonce followed by the ciphertext and tag.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

const NONCE_LEN: usize = 12;

fn cipher(passphrase: &str) -> Result<Aes256Gcm> {
    let key = Sha256::digest(passphrase.as_bytes());
    Aes256Gcm::new_from_slice(&key).map_err(|e| Error::Crypto {
        message: e.to_string(),
    })
}

pub fn encrypt(passphrase: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher(passphrase)?
        .encrypt(&nonce, plaintext)
        .map_err(|e| Error::Crypto {
            message: format!("encryption failed: {e}"),
        })?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

pub fn decrypt(passphrase: &str, sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
        return Err(Error::Crypto {
            message: "decryption failed: data too short".into(),
        });
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    cipher(passphrase)?
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| Error::Crypto {
            message: "decryption failed: wrong key or corrupted data".into(),
        })
}
