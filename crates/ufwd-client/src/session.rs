//! Gateway session management.
//!
//! The gateway wants an interactive-style login: GET the login page to
//! harvest a fresh CSRF header, then POST credentials echoing it back.
//! The resulting session token (a JWT in a `TOKEN=` cookie) and its
//! embedded CSRF token are cached here until the token's own `exp`
//! claim says otherwise.
//!
//! Concurrency: the whole check-validity-else-handshake sequence runs
//! under one `tokio::sync::Mutex`. Concurrent callers with an invalid
//! session queue on the lock; the first performs the one handshake and
//! the rest observe the freshly cached pair. Duplicate concurrent
//! logins can invalidate each other's sessions on the gateway, so this
//! is a correctness requirement, not an optimization.

use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::header;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::client::GatewayCredentials;
use crate::error::{GatewayError, GatewayResult};
use crate::token::{self, CSRF_HEADER};

const LOGIN_PAGE_PATH: &str = "/login?redirect=/";
const LOGIN_API_PATH: &str = "/api/auth/login";

/// The credentials handed out for use in a single request: the session
/// cookie value and the anti-forgery token for state-changing calls.
/// Always set together, never separately.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub session_token: String,
    pub csrf_token: String,
}

/// Cached session state. Replaced whole on every successful handshake;
/// never mutated field-by-field, so a torn token/CSRF combination is
/// unobservable.
#[derive(Debug, Default)]
struct SessionState {
    token_pair: Option<TokenPair>,
    /// Epoch milliseconds; 0 means never obtained.
    expires_at_ms: u64,
    /// Username the session was minted for. A credential change must
    /// not be served another user's cached session.
    username: String,
}

impl SessionState {
    /// Strictly not-expired: a session whose expiry equals the current
    /// time is already stale.
    fn valid_for(&self, username: &str, now_ms: u64) -> bool {
        self.token_pair.is_some() && self.username == username && now_ms < self.expires_at_ms
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    /// One-time code; always empty for this tool.
    token: &'a str,
    #[serde(rename = "rememberMe")]
    remember_me: bool,
}

/// Owns the cached session. One per `GatewayClient`.
#[derive(Debug, Default)]
pub(crate) struct SessionManager {
    state: Mutex<SessionState>,
}

impl SessionManager {
    /// Return a valid token pair, performing the login handshake if the
    /// cached session is absent, expired, or minted for someone else.
    pub(crate) async fn get(
        &self,
        http: &reqwest::Client,
        base: &str,
        credentials: &GatewayCredentials,
    ) -> GatewayResult<TokenPair> {
        let mut state = self.state.lock().await;

        if state.valid_for(&credentials.username, now_ms()) {
            if let Some(pair) = &state.token_pair {
                tracing::debug!("session cache hit");
                return Ok(pair.clone());
            }
        }

        let (pair, expires_at_ms) = handshake(http, base, credentials).await?;

        // Replace the whole state only after full success; a failed or
        // cancelled handshake leaves the previous state untouched.
        *state = SessionState {
            token_pair: Some(pair.clone()),
            expires_at_ms,
            username: credentials.username.clone(),
        };

        Ok(pair)
    }

    /// Drop the cached session, forcing a handshake on the next call.
    pub(crate) async fn invalidate(&self) {
        *self.state.lock().await = SessionState::default();
    }
}

/// The two-step handshake. Returns the new token pair and its expiry in
/// epoch milliseconds.
async fn handshake(
    http: &reqwest::Client,
    base: &str,
    credentials: &GatewayCredentials,
) -> GatewayResult<(TokenPair, u64)> {
    // Step 1: load the login page purely to harvest a CSRF header —
    // the gateway issues a fresh one per unauthenticated request.
    let bootstrap = http
        .get(format!("{base}{LOGIN_PAGE_PATH}"))
        .header(header::ACCEPT, "text/html")
        .send()
        .await?;

    let bootstrap_csrf = bootstrap
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .ok_or_else(|| {
            GatewayError::Authentication("login page response carried no x-csrf-token header".into())
        })?;

    tracing::debug!("harvested bootstrap CSRF token");

    // Step 2: POST credentials, echoing the harvested CSRF header.
    let login = http
        .post(format!("{base}{LOGIN_API_PATH}"))
        .header(header::ACCEPT, "application/json")
        .header(CSRF_HEADER, bootstrap_csrf)
        .json(&LoginRequest {
            username: &credentials.username,
            password: &credentials.password,
            token: "",
            remember_me: false,
        })
        .send()
        .await?;

    let status = login.status();
    if status.as_u16() != 200 {
        return Err(GatewayError::Authentication(format!(
            "login rejected with status {status}"
        )));
    }

    let session_token = login
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(token::session_cookie_value)
        .map(str::to_owned)
        .ok_or_else(|| {
            GatewayError::Authentication("login response set no TOKEN cookie".into())
        })?;

    // Decode the claims to learn the expiry and the embedded CSRF
    // token, and to smoke-check we sliced the right cookie.
    let claims = token::decode_claims(&session_token)?;
    let expires_at_ms = claims.exp * 1000;

    tracing::info!(
        user_id = %claims.user_id,
        expires_at_ms,
        "gateway session established"
    );

    Ok((
        TokenPair {
            session_token,
            csrf_token: claims.csrf_token,
        },
        expires_at_ms,
    ))
}
