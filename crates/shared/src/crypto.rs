//! Payload hashing and signing helpers.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Error type for signing operations.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),
}

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Signs a payload with HMAC-SHA256 and returns the signature as a
/// `sha256=<hex>` header value.
pub fn sign_payload(secret: &str, payload: &str) -> Result<String, SigningError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
    mac.update(payload.as_bytes());
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        let hash = sha256_hex("test");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn test_sha256_hex_deterministic() {
        assert_eq!(sha256_hex("same_input"), sha256_hex("same_input"));
        assert_ne!(sha256_hex("input1"), sha256_hex("input2"));
    }

    #[test]
    fn test_sign_payload_format() {
        let signature = sign_payload("secret", r#"{"deviceId":"nrf-1"}"#).unwrap();
        assert!(signature.starts_with("sha256="));
        assert_eq!(signature.len(), "sha256=".len() + 64);
    }

    #[test]
    fn test_sign_payload_known_vector() {
        let signature =
            sign_payload("key", "The quick brown fox jumps over the lazy dog").unwrap();
        assert_eq!(
            signature,
            "sha256=f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn test_sign_payload_depends_on_secret() {
        let payload = r#"{"eventType":"ZONE_EXIT"}"#;
        assert_ne!(
            sign_payload("a", payload).unwrap(),
            sign_payload("b", payload).unwrap()
        );
    }
}
