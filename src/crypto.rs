use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 of `message` under `key`, hex encoded.
pub fn sign_hex(key: &[u8], message: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time equality over two hex strings.
pub fn hex_eq(expected: &str, submitted: &str) -> bool {
    expected.as_bytes().ct_eq(submitted.as_bytes()).into()
}

/// Recompute the signature of `message` and compare it to `submitted`.
pub fn verify_hex(key: &[u8], message: &str, submitted: &str) -> bool {
    hex_eq(&sign_hex(key, message), submitted)
}

/// SHA-256 of `"<challenge>:<nonce>"`, hex encoded.
pub fn work_hash_hex(challenge: &str, nonce: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(challenge.as_bytes());
    hasher.update(b":");
    hasher.update(nonce.as_bytes());
    hex::encode(hasher.finalize())
}
