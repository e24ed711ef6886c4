//! Atoll server binary.
//!
//! # Usage
//!
//! ```bash
//! # Open room on the default port
//! atoll-server --bind 127.0.0.1:38281
//!
//! # Password-protected room with a custom seed name
//! atoll-server --bind 0.0.0.0:38281 --password hunter2 --seed-name winter-async
//! ```

use atoll_server::{RoomConfig, Server, ServerRuntimeConfig};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Atoll multiworld coordination server
#[derive(Parser, Debug)]
#[command(name = "atoll-server")]
#[command(about = "Multiworld randomizer coordination server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "127.0.0.1:38281")]
    bind: String,

    /// Room password required from connecting clients
    #[arg(short, long)]
    password: Option<String>,

    /// Seed identifier announced in RoomInfo
    #[arg(long, default_value = "seed")]
    seed_name: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Atoll server starting");
    tracing::info!("Binding to {}", args.bind);

    if args.password.is_none() {
        tracing::warn!("No room password set - any client may authenticate");
    }

    let room = RoomConfig {
        seed_name: args.seed_name,
        password: args.password,
        ..RoomConfig::default()
    };
    let config = ServerRuntimeConfig { bind_address: args.bind, room };

    let server = Server::bind(config).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
