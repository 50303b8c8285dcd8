//! Webhook payload signing.
//!
//! The provider signs the raw request body with HMAC-SHA256 and sends the base64 digest in a header. The server
//! recomputes the digest over the exact bytes it received and compares in constant time. Verification happens
//! before the body is parsed, so a tampered payload is rejected without ever being interpreted.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signs `payload` with `secret`, returning the base64-encoded HMAC-SHA256 digest.
pub fn sign_payload(secret: &str, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(payload);
    base64::encode(mac.finalize().into_bytes())
}

/// Verifies the base64 `signature` against `payload` using `secret`. Comparison is constant time.
pub fn verify_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    let Ok(expected) = base64::decode(signature) else {
        return false;
    };
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}
