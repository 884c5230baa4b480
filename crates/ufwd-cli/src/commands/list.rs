//! `ufwd list` — print the gateway's port-forward rules.

use anyhow::{Context, Result};
use ufwd_client::GatewayClient;

use crate::config::Settings;

pub async fn run(client: &GatewayClient, settings: &Settings) -> Result<()> {
    let rules = client
        .list_port_forwards(&settings.credentials())
        .await
        .context("could not list port forwards")?;

    println!(
        "{:<26} {:<20} {:>7}   {:<21} {:<8} {:<8}",
        "ID", "NAME", "PUBLIC", "TARGET", "PROTO", "ENABLED"
    );
    for rule in &rules {
        let r = rule.rule();
        println!(
            "{:<26} {:<20} {:>7}   {:<21} {:<8} {:<8}",
            r.id,
            r.name,
            r.public_port,
            format!("{}:{}", r.target_address, r.target_port),
            r.protocol.as_str(),
            if rule.is_enabled() { "yes" } else { "no" },
        );
    }
    if rules.is_empty() {
        println!("(no rules)");
    }

    Ok(())
}
