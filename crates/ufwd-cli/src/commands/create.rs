//! `ufwd create` — add an enabled tcp+udp port-forward rule.

use anyhow::{Context, Result};
use ufwd_client::{GatewayClient, NewPortForward};

use crate::config::Settings;

pub async fn run(
    client: &GatewayClient,
    settings: &Settings,
    public_port: u16,
    target_port: u16,
    target_address: &str,
) -> Result<()> {
    client
        .create_port_forward(
            &settings.credentials(),
            &NewPortForward {
                public_port,
                target_port,
                target_address: target_address.to_string(),
            },
        )
        .await
        .context("could not create port forward")?;

    println!("created: {public_port} -> {target_address}:{target_port}");
    Ok(())
}
