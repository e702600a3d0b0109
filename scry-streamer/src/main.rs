//! scry streamer — entry point.
//!
//! ```text
//! scry-streamer [broker]          Connect to a broker host/IP
//! scry-streamer --config <path>   Use custom config TOML
//! scry-streamer --gen-config      Dump default config and exit
//! ```
//!
//! With no positional broker argument, prompts interactively.

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use scry_core::stream::LogInjector;
use scry_streamer::config::StreamerConfig;
use scry_streamer::streamer::Streamer;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "scry-streamer", about = "scry screen streamer")]
struct Cli {
    /// Broker host or IP (prompted for when omitted).
    broker: Option<String>,

    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "scry-streamer.toml")]
    config: PathBuf,

    /// Broker TCP control port (overrides config).
    #[arg(long)]
    tcp_port: Option<u16>,

    /// Broker UDP frame port (overrides config).
    #[arg(long)]
    udp_port: Option<u16>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

fn prompt_for_broker(default: &str) -> String {
    print!("Broker address [{default}]: ");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        return default.to_string();
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&StreamerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = StreamerConfig::load(&cli.config);
    config.network.broker_addr = match cli.broker {
        Some(broker) => broker,
        None => prompt_for_broker(&config.network.broker_addr),
    };
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

    info!("scry-streamer v{}", env!("CARGO_PKG_VERSION"));

    let streamer = Streamer::new(config);
    println!("Session ID: {}", streamer.credentials().session_id);
    println!("Password:   {}", streamer.credentials().password);

    let mut injector = LogInjector;
    if let Err(e) = streamer.run(&mut injector).await {
        eprintln!("streamer failed: {e}");
        std::process::exit(1);
    }
    Ok(())
}
