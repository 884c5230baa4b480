//! In-process mock gateway for integration tests.
//!
//! Speaks just enough HTTP/1.1 over a `tokio` TCP listener to stand in
//! for a UniFi gateway: the login-page bootstrap (with its CSRF
//! header), the login endpoint (minting an unsigned JWT session
//! cookie), and the port-forward collection with cookie + CSRF
//! enforcement. Counters and failure knobs let tests assert on exactly
//! how many handshakes happened and how errors surface.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub struct MockGateway {
    addr: SocketAddr,
    state: Arc<State>,
}

struct State {
    bootstrap_hits: AtomicUsize,
    login_hits: AtomicUsize,
    list_hits: AtomicUsize,
    /// Status returned by the login endpoint (200 = normal minting).
    login_status: AtomicU16,
    /// Replace the session cookie with an unrelated one.
    omit_token_cookie: AtomicBool,
    /// `exp` claim for minted tokens, seconds since the epoch.
    token_exp: AtomicU64,
    /// Forced status for the list endpoint (0 = none).
    list_status: AtomicU16,
    /// Raw body override for the list endpoint.
    list_body: Mutex<Option<String>>,
    /// Rule entries in wire shape, as the list endpoint returns them.
    rules: Mutex<Vec<serde_json::Value>>,
    /// Currently valid session: (token, csrf). None before first login.
    session: Mutex<Option<(String, String)>>,
    next_id: AtomicUsize,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

impl MockGateway {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let state = Arc::new(State {
            bootstrap_hits: AtomicUsize::new(0),
            login_hits: AtomicUsize::new(0),
            list_hits: AtomicUsize::new(0),
            login_status: AtomicU16::new(200),
            omit_token_cookie: AtomicBool::new(false),
            token_exp: AtomicU64::new(now_secs() + 3600),
            list_status: AtomicU16::new(0),
            list_body: Mutex::new(None),
            rules: Mutex::new(Vec::new()),
            session: Mutex::new(None),
            next_id: AtomicUsize::new(1),
        });

        let accept_state = state.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let state = accept_state.clone();
                tokio::spawn(async move {
                    handle_connection(stream, state).await;
                });
            }
        });

        Self { addr, state }
    }

    /// Plain-HTTP base URL for `GatewayConfig.gateway_address`.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn bootstrap_hits(&self) -> usize {
        self.state.bootstrap_hits.load(Ordering::SeqCst)
    }

    pub fn login_hits(&self) -> usize {
        self.state.login_hits.load(Ordering::SeqCst)
    }

    pub fn list_hits(&self) -> usize {
        self.state.list_hits.load(Ordering::SeqCst)
    }

    pub fn set_login_status(&self, status: u16) {
        self.state.login_status.store(status, Ordering::SeqCst);
    }

    pub fn set_omit_token_cookie(&self, omit: bool) {
        self.state.omit_token_cookie.store(omit, Ordering::SeqCst);
    }

    /// Set the `exp` claim (seconds since epoch) for tokens minted from
    /// now on.
    pub fn set_token_exp(&self, exp: u64) {
        self.state.token_exp.store(exp, Ordering::SeqCst);
    }

    pub fn set_list_status(&self, status: u16) {
        self.state.list_status.store(status, Ordering::SeqCst);
    }

    pub fn set_list_body(&self, body: impl Into<String>) {
        *self.state.list_body.lock().unwrap() = Some(body.into());
    }

    /// Append a rule entry exactly as given, bypassing the create
    /// endpoint. Lets tests inject shapes the client must reject.
    pub fn push_raw_rule(&self, rule: serde_json::Value) {
        self.state.rules.lock().unwrap().push(rule);
    }

    pub fn rules(&self) -> Vec<serde_json::Value> {
        self.state.rules.lock().unwrap().clone()
    }
}

// ── HTTP plumbing ────────────────────────────────────────────────

struct Request {
    method: String,
    target: String,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

async fn handle_connection(mut stream: TcpStream, state: Arc<State>) {
    let mut buf: Vec<u8> = Vec::new();

    loop {
        // Read until the request head is complete.
        let head_end = loop {
            if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
                break pos;
            }
            let mut chunk = [0u8; 4096];
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        };

        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        let body_start = head_end + 4;

        let mut lines = head.lines();
        let request_line = lines.next().unwrap_or_default().to_string();
        let mut headers = HashMap::new();
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }

        let content_length: usize = headers
            .get("content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        while buf.len() < body_start + content_length {
            let mut chunk = [0u8; 4096];
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }

        let body = buf[body_start..body_start + content_length].to_vec();
        buf.drain(..body_start + content_length);

        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or_default().to_string();
        let target = parts.next().unwrap_or_default().to_string();

        let request = Request {
            method,
            target,
            headers,
            body,
        };

        let response = route(&state, &request);
        if stream.write_all(&response).await.is_err() {
            return;
        }
    }
}

fn response(status: u16, extra_headers: &[(&str, &str)], body: &str) -> Vec<u8> {
    let reason = match status {
        200 => "OK",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        _ => "Error",
    };
    let mut out = format!("HTTP/1.1 {status} {reason}\r\ncontent-length: {}\r\n", body.len());
    for (name, value) in extra_headers {
        out.push_str(&format!("{name}: {value}\r\n"));
    }
    out.push_str("\r\n");
    out.push_str(body);
    out.into_bytes()
}

fn json_response(status: u16, extra_headers: &[(&str, &str)], body: &str) -> Vec<u8> {
    let mut headers = vec![("content-type", "application/json")];
    headers.extend_from_slice(extra_headers);
    response(status, &headers, body)
}

/// Mint an unsigned JWT the way the gateway does: the client only ever
/// reads the payload segment.
fn mint_token(state: &State, csrf: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = serde_json::json!({
        "exp": state.token_exp.load(Ordering::SeqCst),
        "iat": now_secs(),
        "jti": format!("jti-{}", state.login_hits.load(Ordering::SeqCst)),
        "userId": "mock-user",
        "csrfToken": csrf,
    });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.bW9jay1zaWduYXR1cmU")
}

/// Does the request carry the current session cookie?
fn cookie_ok(state: &State, request: &Request) -> bool {
    let session = state.session.lock().unwrap();
    let Some((token, _)) = session.as_ref() else {
        return false;
    };
    request
        .headers
        .get("cookie")
        .is_some_and(|cookie| cookie.contains(&format!("TOKEN={token}")))
}

/// Does the request carry the current session's CSRF header?
fn csrf_ok(state: &State, request: &Request) -> bool {
    let session = state.session.lock().unwrap();
    let Some((_, csrf)) = session.as_ref() else {
        return false;
    };
    request.headers.get("x-csrf-token") == Some(csrf)
}

const PORT_FORWARD_PATH: &str = "/proxy/network/api/s/default/rest/portforward";

fn route(state: &State, request: &Request) -> Vec<u8> {
    match (request.method.as_str(), request.target.as_str()) {
        ("GET", "/login?redirect=/") => {
            state.bootstrap_hits.fetch_add(1, Ordering::SeqCst);
            let n = state.bootstrap_hits.load(Ordering::SeqCst);
            response(
                200,
                &[
                    ("content-type", "text/html"),
                    ("x-csrf-token", &format!("bootstrap-csrf-{n}")),
                ],
                "<html></html>",
            )
        }

        ("POST", "/api/auth/login") => {
            let n = state.login_hits.fetch_add(1, Ordering::SeqCst) + 1;

            let status = state.login_status.load(Ordering::SeqCst);
            if status != 200 {
                return json_response(status, &[], r#"{"meta":{"rc":"error"}}"#);
            }

            // The gateway rejects logins without the bootstrap header.
            if !request.headers.contains_key("x-csrf-token") {
                return json_response(403, &[], r#"{"meta":{"rc":"error"}}"#);
            }

            let csrf = format!("session-csrf-{n}");
            let token = mint_token(state, &csrf);
            *state.session.lock().unwrap() = Some((token.clone(), csrf));

            let cookie = if state.omit_token_cookie.load(Ordering::SeqCst) {
                "UNRELATED=1; path=/".to_string()
            } else {
                format!("TOKEN={token}; path=/; samesite=strict; secure; httponly")
            };

            json_response(200, &[("set-cookie", &cookie)], "{}")
        }

        ("GET", PORT_FORWARD_PATH) => {
            state.list_hits.fetch_add(1, Ordering::SeqCst);

            if !cookie_ok(state, request) {
                return json_response(401, &[], r#"{"meta":{"rc":"error"}}"#);
            }

            let forced = state.list_status.load(Ordering::SeqCst);
            if forced != 0 && forced != 200 {
                return json_response(forced, &[], r#"{"meta":{"rc":"error"}}"#);
            }

            if let Some(body) = state.list_body.lock().unwrap().clone() {
                return json_response(200, &[], &body);
            }

            let body = serde_json::json!({
                "meta": { "rc": "ok" },
                "data": *state.rules.lock().unwrap(),
            });
            json_response(200, &[], &body.to_string())
        }

        ("POST", PORT_FORWARD_PATH) => {
            if !cookie_ok(state, request) || !csrf_ok(state, request) {
                return json_response(401, &[], r#"{"meta":{"rc":"error"}}"#);
            }

            let Ok(mut rule) = serde_json::from_slice::<serde_json::Value>(&request.body) else {
                return json_response(400, &[], r#"{"meta":{"rc":"error"}}"#);
            };

            let id = state.next_id.fetch_add(1, Ordering::SeqCst);
            rule["_id"] = serde_json::json!(format!("mock-id-{id}"));
            rule["site_id"] = serde_json::json!("mock-site");
            state.rules.lock().unwrap().push(rule);

            json_response(200, &[], r#"{"meta":{"rc":"ok"},"data":[]}"#)
        }

        ("DELETE", target) if target.starts_with(&format!("{PORT_FORWARD_PATH}/")) => {
            if !cookie_ok(state, request) || !csrf_ok(state, request) {
                return json_response(401, &[], r#"{"meta":{"rc":"error"}}"#);
            }

            let id = &target[PORT_FORWARD_PATH.len() + 1..];
            let mut rules = state.rules.lock().unwrap();
            let before = rules.len();
            rules.retain(|rule| rule["_id"] != serde_json::json!(id));

            if rules.len() == before {
                return json_response(404, &[], r#"{"meta":{"rc":"error"}}"#);
            }
            json_response(200, &[], r#"{"meta":{"rc":"ok"},"data":[]}"#)
        }

        _ => json_response(404, &[], r#"{"meta":{"rc":"error"}}"#),
    }
}
