//! ufwd — UniFi gateway port-forward CLI.
//!
//! Thin glue over `ufwd-client`: resolves gateway settings from flags
//! and environment, then lists, creates, or deletes port-forward rules.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use tracing::error;
use ufwd_client::{GatewayClient, GatewayConfig};

/// ufwd — manage port-forward rules on a UniFi gateway
#[derive(Parser)]
#[command(name = "ufwd", version = "0.1.0", about = "Manage port-forward rules on a UniFi gateway")]
struct Cli {
    /// Gateway address (defaults to $ROUTER_IP_ADDRESS)
    #[arg(short, long, global = true)]
    gateway: Option<String>,

    /// Gateway username (defaults to $ROUTER_USERNAME; password comes
    /// from $ROUTER_PASSWORD)
    #[arg(short, long, global = true)]
    username: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, default_value_t = 15)]
    timeout: u64,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List port-forward rules
    List,

    /// Create an enabled tcp+udp rule forwarding a WAN port to a host
    Create {
        /// Externally visible port
        #[arg(long)]
        public_port: u16,
        /// Port on the target host
        #[arg(long)]
        target_port: u16,
        /// IPv4 address of the target host
        #[arg(long)]
        target_address: String,
    },

    /// Delete a rule by its gateway-assigned id
    Delete {
        /// Rule id as shown by `ufwd list`
        id: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing.
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("ufwd=debug,ufwd_cli=debug,ufwd_client=debug")
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("ufwd=warn,ufwd_cli=warn,ufwd_client=warn")
            .with_target(false)
            .init();
    }

    let result = run(cli).await;

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("ufwd: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = config::Settings::resolve(cli.gateway.as_deref(), cli.username.as_deref())?;

    let mut gateway_config = GatewayConfig::new(settings.gateway_address.clone());
    gateway_config.timeout_secs = cli.timeout;
    let client = GatewayClient::new(gateway_config)?;

    match cli.command {
        Command::List => commands::list::run(&client, &settings).await,
        Command::Create {
            public_port,
            target_port,
            target_address,
        } => {
            commands::create::run(&client, &settings, public_port, target_port, &target_address)
                .await
        }
        Command::Delete { id } => commands::delete::run(&client, &settings, &id).await,
    }
}
