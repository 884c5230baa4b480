//! Session token handling.
//!
//! The gateway hands out its session token as a `TOKEN=` cookie whose
//! value is a JWT. We never verify the signature — the gateway is
//! trusted transport-locally — but we do decode the claims to learn the
//! expiry and the embedded CSRF token, and to smoke-check that we
//! sliced the right thing out of the `Set-Cookie` header.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

use crate::error::{GatewayError, GatewayResult};

/// Header the anti-forgery token travels in, both directions.
pub(crate) const CSRF_HEADER: &str = "x-csrf-token";

/// Claims carried in the gateway's session token.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    /// Expiry, seconds since the epoch.
    pub exp: u64,
    /// Issued-at, seconds since the epoch.
    pub iat: u64,
    /// Unique token id.
    pub jti: String,
    /// Gateway-side user id.
    #[serde(rename = "userId")]
    pub user_id: String,
    /// Anti-forgery token for state-changing requests.
    ///
    /// The gateway UI rotates its CSRF token per request, but this one
    /// lives in the session token payload, so it lasts as long as the
    /// session does.
    #[serde(rename = "csrfToken")]
    pub csrf_token: String,
}

/// Pull the session token value out of a `Set-Cookie` header.
///
/// The token is the substring between the `TOKEN=` prefix and the first
/// `;`. Returns `None` if the header is not the session cookie.
pub fn session_cookie_value(set_cookie: &str) -> Option<&str> {
    let rest = set_cookie.strip_prefix("TOKEN=")?;
    match rest.find(';') {
        Some(end) => Some(&rest[..end]),
        None => Some(rest),
    }
}

/// Decode a session token's claims without verifying the signature.
///
/// Fails if the token is not three dot-separated segments, the payload
/// segment is not base64url, or the claims are missing required fields.
pub fn decode_claims(token: &str) -> GatewayResult<TokenClaims> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => {
            return Err(GatewayError::Authentication(
                "session token is not a three-segment JWT".into(),
            ))
        }
    };

    let bytes = URL_SAFE_NO_PAD.decode(payload).map_err(|e| {
        GatewayError::Authentication(format!("session token payload is not base64url: {e}"))
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        GatewayError::Authentication(format!("session token claims have unexpected shape: {e}"))
    })
}
