//! Room-entry authorization tokens.
//!
//! Time-limited shared-secret credentials in the coturn style: the external
//! room service holds the same secret and verifies independently, so no
//! callback to this server is needed at the room door.
//!
//! token = "{expiry}:{b64url(meeting_id)}:{b64url(guest_id)}:{b64url(HMAC-SHA256(secret, payload))}"
//!
//! Both ids are opaque caller-supplied strings, so they are base64url-encoded
//! inside the payload; a `:` in an id never shifts the delimited fields.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Issue an entry token for an admitted guest.
pub fn issue_entry_token(secret: &[u8], meeting_id: &str, guest_id: &str, ttl_secs: u64) -> String {
    let expiry = chrono::Utc::now().timestamp() as u64 + ttl_secs;
    let payload = format!(
        "{}:{}:{}",
        expiry,
        URL_SAFE_NO_PAD.encode(meeting_id),
        URL_SAFE_NO_PAD.encode(guest_id)
    );

    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    format!("{}:{}", payload, signature)
}

/// Verify an entry token and return (meeting_id, guest_id).
/// This mirror of the room service's check exists for tests and tooling.
pub fn verify_entry_token(secret: &[u8], token: &str) -> Option<(String, String)> {
    let mut parts = token.splitn(4, ':');
    let expiry = parts.next()?;
    let meeting_b64 = parts.next()?;
    let guest_b64 = parts.next()?;
    let signature = parts.next()?;

    let expiry_secs: u64 = expiry.parse().ok()?;
    if chrono::Utc::now().timestamp() as u64 > expiry_secs {
        return None;
    }

    let payload = format!("{}:{}:{}", expiry, meeting_b64, guest_b64);
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    let sig_bytes = URL_SAFE_NO_PAD.decode(signature).ok()?;
    mac.verify_slice(&sig_bytes).ok()?;

    let meeting_id = String::from_utf8(URL_SAFE_NO_PAD.decode(meeting_b64).ok()?).ok()?;
    let guest_id = String::from_utf8(URL_SAFE_NO_PAD.decode(guest_b64).ok()?).ok()?;
    Some((meeting_id, guest_id))
}
