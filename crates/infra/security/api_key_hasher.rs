use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::domain::value_objects::api_keys::{API_KEY_PREFIX, KEY_PREFIX_LENGTH};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedApiKey {
    pub raw_key: String,
    pub key_prefix: String,
    pub key_hash: String,
}

pub fn generate_api_key() -> GeneratedApiKey {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let raw_key = format!("{API_KEY_PREFIX}{}", URL_SAFE_NO_PAD.encode(bytes));

    GeneratedApiKey {
        key_prefix: raw_key.chars().take(KEY_PREFIX_LENGTH).collect(),
        key_hash: hash_api_key(&raw_key),
        raw_key,
    }
}

/// SHA-256 hex digest. Keys carry 256 bits of entropy, so no salt is needed.
pub fn hash_api_key(raw_key: &str) -> String {
    hex::encode(Sha256::digest(raw_key.as_bytes()))
}

pub fn looks_like_api_key(raw_key: &str) -> bool {
    raw_key.starts_with(API_KEY_PREFIX) && raw_key.len() > KEY_PREFIX_LENGTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_has_prefix_and_matching_hash() {
        let key = generate_api_key();
        assert!(key.raw_key.starts_with("sk_"));
        // 32 bytes -> 43 base64url chars without padding
        assert_eq!(key.raw_key.len(), 3 + 43);
        assert_eq!(key.key_prefix.len(), KEY_PREFIX_LENGTH);
        assert!(key.raw_key.starts_with(&key.key_prefix));
        assert_eq!(key.key_hash, hash_api_key(&key.raw_key));
        assert!(looks_like_api_key(&key.raw_key));
    }

    #[test]
    fn shape_check_rejects_other_tokens() {
        assert!(!looks_like_api_key("eyJhbGciOiJIUzI1NiJ9.e30.sig"));
        assert!(!looks_like_api_key("sk_short"));
    }
}
