//! Webhook signature verification, shared by every inbound messaging
//! platform adapter. Verification happens before the payload is parsed as
//! JSON — an unverified body is never deserialized.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verify a `sha256=<hex>` HMAC signature (the Messenger/WhatsApp convention)
/// over the raw request body.
pub fn verify_hmac_sha256(signature_header: &str, body: &[u8], secret: &str) -> bool {
    let Some(sig_hex) = signature_header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(sig_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn verifies_correct_signature() {
        let body = br#"{"hello":"world"}"#;
        let header = sign("top-secret", body);
        assert!(verify_hmac_sha256(&header, body, "top-secret"));
    }

    #[test]
    fn rejects_tampered_body() {
        let body = br#"{"hello":"world"}"#;
        let header = sign("top-secret", body);
        assert!(!verify_hmac_sha256(&header, b"{\"hello\":\"mallory\"}", "top-secret"));
    }

    #[test]
    fn rejects_malformed_header() {
        assert!(!verify_hmac_sha256("not-a-signature", b"body", "secret"));
    }
}
