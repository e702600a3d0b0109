//! scry broker — entry point.
//!
//! ```text
//! scry-broker                    Serve with defaults (TCP 5555, UDP 5556)
//! scry-broker --config <path>    Use custom config TOML
//! scry-broker --gen-config       Dump default config and exit
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use scry_broker::broker::Broker;
use scry_broker::config::BrokerConfig;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "scry-broker", about = "scry session broker")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "scry-broker.toml")]
    config: PathBuf,

    /// TCP control port (overrides config).
    #[arg(long)]
    tcp_port: Option<u16>,

    /// UDP frame/registration port (overrides config).
    #[arg(long)]
    udp_port: Option<u16>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&BrokerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = BrokerConfig::load(&cli.config);
    if let Some(port) = cli.tcp_port {
        config.network.tcp_port = port;
    }
    if let Some(port) = cli.udp_port {
        config.network.udp_port = port;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("scry-broker v{}", env!("CARGO_PKG_VERSION"));

    let broker = match Broker::bind(&config).await {
        Ok(broker) => broker,
        Err(e) => {
            eprintln!("failed to bind listeners: {e}");
            std::process::exit(1);
        }
    };

    broker.run().await?;
    Ok(())
}
