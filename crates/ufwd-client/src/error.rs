use thiserror::Error;

/// Errors produced by the gateway client.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The login handshake could not produce a usable session.
    ///
    /// Covers a rejected login, a missing session cookie, and a token
    /// whose claims cannot be decoded. Never retried automatically.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A data operation returned a non-200 status with a valid session.
    ///
    /// The status is surfaced so callers can decide what to do (a 401
    /// may be worth one retry after `invalidate_session`; other codes
    /// are not).
    #[error("gateway request failed with status {status}")]
    RequestFailed { status: u16 },

    /// A response body did not match the expected schema.
    ///
    /// Fatal for the whole call: an unexpected shape may indicate an
    /// API change that must not be silently tolerated.
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type GatewayResult<T> = Result<T, GatewayError>;
