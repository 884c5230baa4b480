//! `ufwd delete` — remove a rule by its gateway-assigned id.

use anyhow::{Context, Result};
use ufwd_client::GatewayClient;

use crate::config::Settings;

pub async fn run(client: &GatewayClient, settings: &Settings, id: &str) -> Result<()> {
    client
        .delete_port_forward(&settings.credentials(), id)
        .await
        .with_context(|| format!("could not delete port forward '{id}'"))?;

    println!("deleted: {id}");
    Ok(())
}
