//! Callback signature scheme shared by the provider adapters.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Header carrying the provider's callback signature.
pub const SIGNATURE_HEADER: &str = "x-swiftpay-signature";

type HmacSha256 = Hmac<Sha256>;

/// Computes the hex HMAC-SHA256 signature the provider sends with callbacks.
pub fn sign_callback_body(body: &[u8], secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a callback signature using constant-time comparison.
///
/// Accepts the bare hex digest or the `sha256=<hex>` form.
pub fn verify_callback_signature(body: &[u8], signature: &str, secret: &str) -> bool {
    let signature = signature.strip_prefix("sha256=").unwrap_or(signature);
    let expected = sign_callback_body(body, secret);
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

/// Case-insensitive header lookup over a plain header map.
pub(crate) fn header_value<'a>(
    headers: &'a std::collections::HashMap<String, String>,
    name: &str,
) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
