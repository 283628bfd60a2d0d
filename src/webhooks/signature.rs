//! GitHub webhook signature verification using HMAC-SHA256.
//!
//! GitHub signs each delivery with a shared secret and puts the result in
//! the `X-Hub-Signature-256` header as `sha256=<hex>`. Verification happens
//! before the payload is parsed; anything unsignable is rejected outright.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Parses a signature header (e.g. `sha256=abcd1234`) into raw bytes.
///
/// Returns `None` for malformed headers: missing prefix, wrong algorithm,
/// invalid hex.
fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.strip_prefix("sha256=")?;
    hex::decode(hex_sig).ok()
}

/// Computes the HMAC-SHA256 of a payload. Used in tests to build valid
/// deliveries.
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Formats a signature as a GitHub-style header value, `sha256=<hex>`.
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("sha256={}", hex::encode(signature))
}

/// Verifies a delivery against the shared secret.
///
/// Comparison is constant time via the HMAC library. Malformed headers
/// return `false`, never panic.
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let expected = match parse_signature_header(signature_header) {
        Some(sig) => sig,
        None => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload);

    mac.verify_slice(&expected).is_ok()
}
