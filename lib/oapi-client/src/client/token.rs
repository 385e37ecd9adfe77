//! Access token claims inspection.
//!
//! Tokens are JWTs. Only the payload segment is decoded; the signature is
//! never verified since the server remains the authority on validity.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// The claims read from an access token.
#[derive(Debug, Default, Deserialize)]
struct Claims {
    #[serde(default)]
    exp: Option<Value>,
    #[serde(default)]
    role: Option<Role>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Role {
    Single(String),
    Many(Vec<Value>),
    Other(Value),
}

fn decode_claims(token: &str) -> Option<Claims> {
    let payload = token.split('.').nth(1)?;
    // Some issuers keep the padding, others use the standard alphabet
    let payload = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .inspect_err(|err| debug!(%err, "failed to decode token payload"))
        .ok()?;
    serde_json::from_slice(&bytes)
        .inspect_err(|err| debug!(%err, "failed to parse token claims"))
        .ok()
}

/// Checks if an access token has expired.
///
/// A token that cannot be decoded, or whose `exp` claim is not a number, is
/// considered expired.
pub(crate) fn is_token_expired(token: &str) -> bool {
    let Some(exp) = decode_claims(token).and_then(|claims| claims.exp?.as_f64()) else {
        return true;
    };
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default();
    exp < now
}

/// Checks if the token's `role` claim equals or contains `admin_role`.
pub(crate) fn has_role(token: &str, admin_role: &str) -> bool {
    match decode_claims(token).and_then(|claims| claims.role) {
        Some(Role::Single(role)) => role == admin_role,
        Some(Role::Many(roles)) => roles.iter().any(|role| role.as_str() == Some(admin_role)),
        Some(Role::Other(_)) | None => false,
    }
}
