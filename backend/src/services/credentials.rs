use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const API_KEY_PREFIX: &str = "rk_live_";

/// A fresh router API key. Only its hash is ever stored.
pub fn generate_router_api_key() -> String {
    let bytes: [u8; 24] = rand::random();
    format!("{API_KEY_PREFIX}{}", hex::encode(bytes))
}

/// Lowercase hex SHA-256 of an API key, as stored on the router row.
pub fn hash_api_key(api_key: &str) -> String {
    hex::encode(Sha256::digest(api_key.as_bytes()))
}

pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

/// Whether `presented` hashes to `stored_hash`.
pub fn verify_api_key(presented: &str, stored_hash: &str) -> bool {
    constant_time_eq(&hash_api_key(presented), stored_hash)
}
