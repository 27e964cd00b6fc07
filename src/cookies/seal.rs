//! Cookie sealing.
//!
//! # Format
//! ```text
//! sealed.<base64url(nonce[12] || ciphertext || tag[16])>
//! ```
//!
//! # Security
//! - AES-256-GCM, key = SHA-256 of the 32-character secret
//! - Fresh random nonce per seal
//! - Authentication failure is a hard error: a wrong secret or a tampered
//!   value never decodes to partial plaintext

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Marker that makes sealed values self-identifying.
pub const SEAL_PREFIX: &str = "sealed.";

/// Required secret length, in characters.
pub const SECRET_LEN: usize = 32;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SealError {
    #[error("cookie secret must be exactly 32 characters, got {0}")]
    InvalidSecretLength(usize),

    #[error("encrypted cookies require a secret")]
    MissingSecret,

    #[error("value is not a sealed cookie")]
    NotSealed,

    #[error("sealed cookie is malformed")]
    Malformed,

    #[error("failed to seal cookie")]
    Encrypt,

    #[error("sealed cookie failed authentication")]
    Decrypt,

    #[error("sealed cookie does not contain UTF-8 text")]
    InvalidUtf8,
}

/// Check a secret without sealing anything.
pub fn check_secret(secret: &str) -> Result<(), SealError> {
    let len = secret.chars().count();
    if len == SECRET_LEN {
        Ok(())
    } else {
        Err(SealError::InvalidSecretLength(len))
    }
}

fn cipher(secret: &str) -> Result<Aes256Gcm, SealError> {
    check_secret(secret)?;
    let key = Sha256::digest(secret.as_bytes());
    Aes256Gcm::new_from_slice(&key).map_err(|_| SealError::InvalidSecretLength(key.len()))
}

/// Encrypt `value` under `secret`.
pub fn seal(value: &str, secret: &str) -> Result<String, SealError> {
    let cipher = cipher(secret)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, value.as_bytes())
        .map_err(|_| SealError::Encrypt)?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);

    Ok(format!("{}{}", SEAL_PREFIX, URL_SAFE_NO_PAD.encode(sealed)))
}

/// Decrypt a value produced by [`seal`].
pub fn unseal(sealed: &str, secret: &str) -> Result<String, SealError> {
    let cipher = cipher(secret)?;
    let bytes = decode(sealed)?;

    let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LEN);
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| SealError::Decrypt)?;

    String::from_utf8(plaintext).map_err(|_| SealError::InvalidUtf8)
}

/// Classify a raw cookie value by format alone; no secret needed.
pub fn is_sealed(value: &str) -> bool {
    decode(value).is_ok()
}

fn decode(sealed: &str) -> Result<Vec<u8>, SealError> {
    let encoded = sealed.strip_prefix(SEAL_PREFIX).ok_or(SealError::NotSealed)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| SealError::Malformed)?;
    if bytes.len() < NONCE_LEN + TAG_LEN {
        return Err(SealError::Malformed);
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";
    const OTHER: &str = "fedcba9876543210fedcba9876543210";

    #[test]
    fn test_round_trip() {
        for value in ["", "session-42", "ünïcödé ✓", "a=b; c"] {
            let sealed = seal(value, SECRET).unwrap();
            assert!(is_sealed(&sealed));
            assert_eq!(unseal(&sealed, SECRET).unwrap(), value);
        }
    }

    #[test]
    fn test_nonce_is_fresh() {
        assert_ne!(seal("same", SECRET).unwrap(), seal("same", SECRET).unwrap());
    }

    #[test]
    fn test_wrong_secret_fails_closed() {
        let sealed = seal("session-42", SECRET).unwrap();
        assert_eq!(unseal(&sealed, OTHER), Err(SealError::Decrypt));
    }

    #[test]
    fn test_tampering_is_detected() {
        let sealed = seal("session-42", SECRET).unwrap();
        let mut chars: Vec<char> = sealed.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();
        assert!(unseal(&tampered, SECRET).is_err());
    }

    #[test]
    fn test_secret_length_is_enforced() {
        assert_eq!(seal("v", "short"), Err(SealError::InvalidSecretLength(5)));
        assert_eq!(
            unseal("sealed.AAAA", &"x".repeat(33)),
            Err(SealError::InvalidSecretLength(33))
        );
        // Characters, not bytes.
        assert!(check_secret(&"é".repeat(32)).is_ok());
    }

    #[test]
    fn test_is_sealed_classification() {
        assert!(!is_sealed("plain-value"));
        assert!(!is_sealed("sealed."));
        assert!(!is_sealed("sealed.not base64!"));
        assert!(!is_sealed("sealed.AAAA"));
        assert_eq!(unseal("plain", SECRET), Err(SealError::NotSealed));
    }
}
