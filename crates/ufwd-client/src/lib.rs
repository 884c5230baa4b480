//! ufwd-client: Rust client library for UniFi gateway port forwarding.
//!
//! Authenticates against the gateway's cookie-and-CSRF-protected JSON
//! API with the interactive-style login flow, caches the resulting
//! session until its token expires, and performs validated list /
//! create / delete operations on the port-forward resource.
//!
//! # Quick Start
//!
//! ```no_run
//! use ufwd_client::{GatewayClient, GatewayConfig, GatewayCredentials, NewPortForward};
//!
//! # async fn example() -> ufwd_client::GatewayResult<()> {
//! let client = GatewayClient::new(GatewayConfig::new("192.168.1.1"))?;
//! let credentials = GatewayCredentials {
//!     username: "admin".into(),
//!     password: "hunter2".into(),
//! };
//!
//! client
//!     .create_port_forward(&credentials, &NewPortForward {
//!         public_port: 20000,
//!         target_port: 22,
//!         target_address: "192.168.1.50".into(),
//!     })
//!     .await?;
//!
//! for rule in client.list_port_forwards(&credentials).await? {
//!     println!("{} -> {}:{}", rule.rule().public_port, rule.rule().target_address, rule.rule().target_port);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod rule;
pub mod session;
pub mod token;

// Re-export primary public types.
pub use client::{GatewayClient, GatewayConfig, GatewayCredentials};
pub use error::{GatewayError, GatewayResult};
pub use rule::{NewPortForward, PortForward, PortForwardRule, Protocol, SourceInterface};
pub use session::TokenPair;
pub use token::TokenClaims;
