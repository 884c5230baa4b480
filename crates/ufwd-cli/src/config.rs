//! Gateway settings from the environment.
//!
//! The same three variables the original deployment used:
//! `ROUTER_IP_ADDRESS`, `ROUTER_USERNAME`, `ROUTER_PASSWORD`.
//! CLI flags always override environment values, and everything is
//! validated non-empty before the client library sees it.

use anyhow::{bail, Context, Result};
use ufwd_client::GatewayCredentials;

pub const ENV_ADDRESS: &str = "ROUTER_IP_ADDRESS";
pub const ENV_USERNAME: &str = "ROUTER_USERNAME";
pub const ENV_PASSWORD: &str = "ROUTER_PASSWORD";

/// Resolved gateway settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub gateway_address: String,
    pub username: String,
    pub password: String,
}

impl Settings {
    /// Resolve settings from flags and environment, flags winning.
    pub fn resolve(gateway_flag: Option<&str>, username_flag: Option<&str>) -> Result<Self> {
        let gateway_address = match gateway_flag {
            Some(addr) => addr.to_string(),
            None => env_var(ENV_ADDRESS)?,
        };
        let username = match username_flag {
            Some(user) => user.to_string(),
            None => env_var(ENV_USERNAME)?,
        };
        // The password never comes from a flag; process listings leak.
        let password = env_var(ENV_PASSWORD)?;

        validate_non_empty("gateway address", &gateway_address)?;
        validate_non_empty("username", &username)?;
        validate_non_empty("password", &password)?;

        Ok(Self {
            gateway_address,
            username,
            password,
        })
    }

    pub fn credentials(&self) -> GatewayCredentials {
        GatewayCredentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{name} is not set"))
}

fn validate_non_empty(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{what} is empty");
    }
    Ok(())
}
