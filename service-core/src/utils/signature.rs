//! HMAC-SHA256 helpers shared by webhook verification.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Hex encoded `HMAC-SHA256(payload, secret)`.
pub fn hmac_sha256_hex(secret: &str, payload: &[u8]) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Compare two signatures in constant time.
pub fn signatures_match(expected: &str, provided: &str) -> bool {
    let expected_bytes = expected.as_bytes();
    let provided_bytes = provided.trim().as_bytes();

    if expected_bytes.len() != provided_bytes.len() {
        return false;
    }

    expected_bytes.ct_eq(provided_bytes).into()
}

/// Verify a hex `HMAC-SHA256(payload, secret)` signature.
pub fn verify_hmac_sha256_hex(
    secret: &str,
    payload: &[u8],
    signature: &str,
) -> Result<bool, anyhow::Error> {
    let expected = hmac_sha256_hex(secret, payload)?;
    Ok(signatures_match(&expected, signature))
}

/// Hex encoded SHA-256 digest.
pub fn sha256_hex(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_generation_and_verification() {
        let secret = "webhook_secret";
        let body = br#"{"event":"payment.captured"}"#;

        let signature = hmac_sha256_hex(secret, body).unwrap();
        assert_eq!(signature.len(), 64);
        assert!(verify_hmac_sha256_hex(secret, body, &signature).unwrap());
    }

    #[test]
    fn test_invalid_signature() {
        let secret = "webhook_secret";
        let body = br#"{"event":"payment.captured"}"#;

        let signature = hmac_sha256_hex(secret, body).unwrap();
        let invalid_signature = format!("{}{}", if signature.starts_with('a') { "b" } else { "a" }, &signature[1..]);

        assert!(!verify_hmac_sha256_hex(secret, body, &invalid_signature).unwrap());
        assert!(!verify_hmac_sha256_hex(secret, body, "short").unwrap());
    }

    #[test]
    fn test_tampered_body() {
        let secret = "webhook_secret";
        let signature = hmac_sha256_hex(secret, br#"{"amount":100}"#).unwrap();

        assert!(!verify_hmac_sha256_hex(secret, br#"{"amount":1000}"#, &signature).unwrap());
    }

    #[test]
    fn test_whitespace_changes_signature() {
        // Re-serialising a payload changes its bytes, and so its signature.
        let secret = "webhook_secret";
        let signature = hmac_sha256_hex(secret, br#"{"a":1}"#).unwrap();
        assert!(!verify_hmac_sha256_hex(secret, br#"{"a": 1}"#, &signature).unwrap());
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
