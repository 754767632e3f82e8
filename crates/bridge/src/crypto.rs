//! Authenticated encryption for stored refresh credentials.
//!
//! Wire format: `base64url(12-byte nonce || 16-byte tag || ciphertext)`
//! under AES-256-GCM, keyed by SHA-256 of the operator secret. The tag is
//! verified before any plaintext is returned; a mismatch is an auth error,
//! never silently ignored.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

fn cipher_for(secret: &str) -> Aes256Gcm {
    let key: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key))
}

/// Encrypt a credential for storage in the registry.
pub fn seal(plain: &str, secret: &str) -> Result<String> {
    let cipher = cipher_for(secret);
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let sealed = cipher
        .encrypt(&nonce, plain.as_bytes())
        .map_err(|_| Error::auth("credential encryption failed"))?;

    // The AEAD output is ciphertext || tag; the stored layout puts the tag
    // between the nonce and the ciphertext.
    let (body, tag) = sealed.split_at(sealed.len() - TAG_LEN);
    let mut raw = Vec::with_capacity(NONCE_LEN + TAG_LEN + body.len());
    raw.extend_from_slice(&nonce);
    raw.extend_from_slice(tag);
    raw.extend_from_slice(body);
    Ok(URL_SAFE_NO_PAD.encode(raw))
}

/// Decrypt a stored credential. Fails with an auth error on a wrong secret,
/// truncated input, or any ciphertext tampering.
pub fn unseal(encoded: &str, secret: &str) -> Result<String> {
    let raw = URL_SAFE_NO_PAD
        .decode(encoded.trim())
        .map_err(|_| Error::auth("stored credential is not valid base64url"))?;
    if raw.len() < NONCE_LEN + TAG_LEN {
        return Err(Error::auth("stored credential is truncated"));
    }

    let (nonce, rest) = raw.split_at(NONCE_LEN);
    let (tag, body) = rest.split_at(TAG_LEN);
    let mut sealed = Vec::with_capacity(body.len() + TAG_LEN);
    sealed.extend_from_slice(body);
    sealed.extend_from_slice(tag);

    let plain = cipher_for(secret)
        .decrypt(Nonce::from_slice(nonce), sealed.as_ref())
        .map_err(|_| Error::auth("credential decryption failed (wrong secret or corrupted data)"))?;
    String::from_utf8(plain).map_err(|_| Error::auth("decrypted credential is not UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let sealed = seal("1//refresh-token-value", "operator secret").unwrap();
        let plain = unseal(&sealed, "operator secret").unwrap();
        assert_eq!(plain, "1//refresh-token-value");
    }

    #[test]
    fn test_nonce_randomization() {
        let a = seal("same input", "s").unwrap();
        let b = seal("same input", "s").unwrap();
        assert_ne!(a, b);
        assert_eq!(unseal(&a, "s").unwrap(), unseal(&b, "s").unwrap());
    }

    #[test]
    fn test_wrong_secret_fails() {
        let sealed = seal("token", "right").unwrap();
        let err = unseal(&sealed, "wrong").unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let sealed = seal("token", "secret").unwrap();
        let truncated = &sealed[..sealed.len() / 2];
        assert!(matches!(unseal(truncated, "secret"), Err(Error::Auth(_))));
        assert!(matches!(unseal("", "secret"), Err(Error::Auth(_))));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let sealed = seal("token", "secret").unwrap();
        let mut raw = URL_SAFE_NO_PAD.decode(&sealed).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = URL_SAFE_NO_PAD.encode(raw);
        assert!(matches!(unseal(&tampered, "secret"), Err(Error::Auth(_))));
    }

    #[test]
    fn test_not_base64_fails() {
        assert!(matches!(unseal("!!!", "secret"), Err(Error::Auth(_))));
    }
}
