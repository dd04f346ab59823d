use anyhow::Result;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// 32 random bytes, hex encoded.
pub fn generate_webhook_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hex HMAC-SHA256 of the exact body bytes.
pub fn sign_payload(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature. Malformed hex never matches.
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(provided) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&provided).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_known_vector() {
        // RFC 4231 test case 2
        let signature = sign_payload("Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            signature,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn verification_rejects_tampered_body_and_bad_hex() {
        let body = br#"{"event":"invoice.paid"}"#;
        let signature = sign_payload("whsec", body).unwrap();

        assert!(verify_signature("whsec", body, &signature));
        assert!(verify_signature("whsec", body, &signature.to_uppercase()));
        assert!(!verify_signature("whsec", br#"{"event":"invoice.paid" }"#, &signature));
        assert!(!verify_signature("other", body, &signature));
        assert!(!verify_signature("whsec", body, "not-hex"));
        assert!(!verify_signature("whsec", body, ""));
    }

    #[test]
    fn secrets_are_64_hex_chars_and_unique() {
        let a = generate_webhook_secret();
        let b = generate_webhook_secret();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
