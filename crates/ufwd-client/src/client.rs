//! The gateway API client.
//!
//! `GatewayClient` owns its own HTTP connector (with the relaxed trust
//! policy the gateway's self-issued certificate requires) and a session
//! manager, and exposes the port-forward operations. Credentials are
//! supplied per call and never stored.

use std::time::Duration;

use reqwest::header;

use crate::error::{GatewayError, GatewayResult};
use crate::rule::{CreatePayload, ListResponse, NewPortForward, PortForward};
use crate::session::{SessionManager, TokenPair};
use crate::token::CSRF_HEADER;

const PORT_FORWARD_PATH: &str = "/proxy/network/api/s/default/rest/portforward";

/// Username and password for the gateway's local account. Supplied per
/// call; the client caches the resulting session, not the credentials.
#[derive(Debug, Clone)]
pub struct GatewayCredentials {
    pub username: String,
    pub password: String,
}

/// Construction-time configuration for a [`GatewayClient`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway address, e.g. `"192.168.1.1"`. Without a scheme,
    /// `https://` is assumed; an explicit scheme is honored as-is.
    pub gateway_address: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Skip certificate-authority validation for this client.
    ///
    /// Ubiquiti products issue themselves a TLS certificate from a
    /// per-device certificate authority no standard trust store knows,
    /// so talking to a real gateway requires this. The policy is scoped
    /// to this client's connector and never affects other connections
    /// the hosting process makes.
    pub accept_invalid_certs: bool,
}

impl GatewayConfig {
    pub fn new(gateway_address: impl Into<String>) -> Self {
        Self {
            gateway_address: gateway_address.into(),
            timeout_secs: 15,
            accept_invalid_certs: true,
        }
    }
}

/// Client for one gateway. Multiple instances with different addresses
/// can coexist; nothing here is process-global.
pub struct GatewayClient {
    http: reqwest::Client,
    /// Base URL, scheme included, no trailing slash.
    base: String,
    session: SessionManager,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let base = if config.gateway_address.contains("://") {
            config.gateway_address.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", config.gateway_address)
        };

        Ok(Self {
            http,
            base,
            session: SessionManager::default(),
        })
    }

    /// List all port-forward rules on the gateway.
    ///
    /// Validation is all-or-nothing: one malformed entry fails the
    /// whole call rather than returning partial results.
    pub async fn list_port_forwards(
        &self,
        credentials: &GatewayCredentials,
    ) -> GatewayResult<Vec<PortForward>> {
        let pair = self.token_pair(credentials).await?;

        let response = self
            .http
            .get(format!("{}{PORT_FORWARD_PATH}", self.base))
            .header(header::ACCEPT, "application/json")
            .header(header::COOKIE, session_cookie(&pair))
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(GatewayError::RequestFailed { status });
        }

        // The gateway does not stream this response: read the body to
        // the end and parse it as one JSON document.
        let body = response.bytes().await?;
        let parsed: ListResponse = serde_json::from_slice(&body)
            .map_err(|e| GatewayError::UnexpectedShape(format!("port-forward list: {e}")))?;

        if parsed.meta.rc != "ok" {
            return Err(GatewayError::UnexpectedShape(format!(
                "meta.rc is {:?}, expected \"ok\"",
                parsed.meta.rc
            )));
        }

        let rules: Vec<PortForward> = parsed
            .data
            .into_iter()
            .map(PortForward::try_from)
            .collect::<GatewayResult<_>>()?;

        tracing::debug!(count = rules.len(), "listed port forwards");
        Ok(rules)
    }

    /// Create an enabled tcp+udp rule forwarding `public_port` on the
    /// WAN interface to `target_address:target_port`.
    ///
    /// The rule name is generated with a random suffix; on a name
    /// collision the gateway rejects the call and the caller may simply
    /// try again. The client itself never retries.
    pub async fn create_port_forward(
        &self,
        credentials: &GatewayCredentials,
        rule: &NewPortForward,
    ) -> GatewayResult<()> {
        let pair = self.token_pair(credentials).await?;
        let payload = CreatePayload::new(rule);

        let response = self
            .http
            .post(format!("{}{PORT_FORWARD_PATH}", self.base))
            .header(header::ACCEPT, "application/json")
            .header(header::COOKIE, session_cookie(&pair))
            .header(CSRF_HEADER, &pair.csrf_token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(GatewayError::RequestFailed { status });
        }

        tracing::info!(
            public_port = rule.public_port,
            target_port = rule.target_port,
            target_address = %rule.target_address,
            "created port forward"
        );
        Ok(())
    }

    /// Delete the rule with the given gateway-assigned id.
    pub async fn delete_port_forward(
        &self,
        credentials: &GatewayCredentials,
        id: &str,
    ) -> GatewayResult<()> {
        let pair = self.token_pair(credentials).await?;

        let response = self
            .http
            .delete(format!("{}{PORT_FORWARD_PATH}/{id}", self.base))
            .header(header::ACCEPT, "application/json")
            .header(header::COOKIE, session_cookie(&pair))
            .header(CSRF_HEADER, &pair.csrf_token)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(GatewayError::RequestFailed { status });
        }

        tracing::info!(id, "deleted port forward");
        Ok(())
    }

    /// Drop the cached session, forcing a fresh handshake on the next
    /// operation. Useful after a 401 from a data call.
    pub async fn invalidate_session(&self) {
        self.session.invalidate().await;
    }

    async fn token_pair(&self, credentials: &GatewayCredentials) -> GatewayResult<TokenPair> {
        self.session.get(&self.http, &self.base, credentials).await
    }
}

fn session_cookie(pair: &TokenPair) -> String {
    format!("TOKEN={}", pair.session_token)
}
