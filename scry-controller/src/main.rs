//! scry controller — entry point.
//!
//! ```text
//! scry-controller [broker] --session-id <id> --password <pw>
//! scry-controller --config <path>   Use custom config TOML
//! scry-controller --gen-config      Dump default config and exit
//! ```
//!
//! Missing broker/credentials are prompted for interactively. Once
//! authenticated, an interactive prompt drives the remote side:
//!
//! ```text
//! click <x> <y> [left|right]   Click at a viewport position
//! move <x> <y>                 Move the pointer
//! key <name>                   Press a key
//! pause | continue             Suspend / resume the stream
//! ping                         Latency probe
//! quit                         Disconnect and exit
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use scry_controller::config::ControllerConfig;
use scry_controller::controller::{CliCommand, Controller, parse_line};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "scry-controller", about = "scry remote screen controller")]
struct Cli {
    /// Broker host or IP (prompted for when omitted).
    broker: Option<String>,

    /// Session ID shown by the streamer (prompted for when omitted).
    #[arg(short, long)]
    session_id: Option<String>,

    /// Password shown by the streamer (prompted for when omitted).
    #[arg(short, long)]
    password: Option<String>,

    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "scry-controller.toml")]
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

fn prompt(label: &str, default: Option<&str>) -> String {
    match default {
        Some(d) => print!("{label} [{d}]: "),
        None => print!("{label}: "),
    }
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        return default.unwrap_or("").to_string();
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
        default.unwrap_or("").to_string()
    } else {
        trimmed.to_string()
    }
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ControllerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ControllerConfig::load(&cli.config);
    config.network.broker_addr = match cli.broker {
        Some(broker) => broker,
        None => prompt("Broker address", Some(&config.network.broker_addr)),
    };
    if let Some(port) = cli.tcp_port {
        config.network.tcp_port = port;
    }
    if let Some(port) = cli.udp_port {
        config.network.udp_port = port;
    }

    let session_id = cli
        .session_id
        .unwrap_or_else(|| prompt("Session ID", None));
    let password = cli.password.unwrap_or_else(|| prompt("Password", None));

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("scry-controller v{}", env!("CARGO_PKG_VERSION"));

    let (controller, mut receiver) =
        match Controller::connect(&config, &session_id, &password).await {
            Ok(pair) => pair,
            Err(e) => {
                eprintln!("connection failed: {e}");
                std::process::exit(1);
            }
        };

    let receiver_stop = receiver.stop_handle();
    let receiver_handle = tokio::spawn(async move {
        if let Err(e) = receiver.run().await {
            error!("frame receiver error: {e}");
        }
    });

    println!("Connected. Commands: click <x> <y> [button] | move <x> <y> | key <k> | pause | continue | ping | quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            let stats = controller.stats();
            println!(
                "{} frames ({:.1} fps), {} direct / {} relayed",
                stats.total_frames, stats.fps, stats.p2p_frames, stats.relay_frames
            );
            continue;
        }

        let command = match parse_line(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("error: {e}");
                continue;
            }
        };

        let result = match command {
            CliCommand::Click { x, y, button } => {
                controller.mouse_click(x, y, button).await.map(|sent| {
                    if !sent {
                        println!("click outside the image area; not sent");
                    }
                })
            }
            CliCommand::Move { x, y } => controller.mouse_move(x, y).await.map(|sent| {
                if !sent {
                    println!("position outside the image area; not sent");
                }
            }),
            CliCommand::Key(key) => controller.key_press(&key).await,
            CliCommand::Pause => controller.pause().await,
            CliCommand::Continue => controller.resume().await,
            CliCommand::Ping => controller.ping().await.map(|latency| {
                println!("ping queued in {:.2} ms", latency.as_secs_f64() * 1000.0);
            }),
            CliCommand::Quit => {
                let _ = controller.disconnect().await;
                break;
            }
        };
        if let Err(e) = result {
            error!("command failed: {e}");
            break;
        }
    }

    receiver_stop.store(false, Ordering::SeqCst);
    let _ = tokio::time::timeout(Duration::from_secs(2), receiver_handle).await;
    println!("disconnected");
    Ok(())
}
