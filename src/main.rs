//! packet-relay - stream live packet captures to WebSocket clients
//!
//! # Usage
//!
//! ```bash
//! # capture on loopback, serve on 0.0.0.0:3001
//! packet-relay
//!
//! # another interface, rooms persisted to disk
//! packet-relay --interface eth0 --data-file rooms.json
//!
//! # any program that writes newline-delimited JSON objects
//! packet-relay --capture-program ./replay.sh --capture-arg capture.ndjson
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use packet_relay::capture::{CaptureConfig, OutputFormat, OverflowPolicy};
use packet_relay::hub::HubConfig;
use packet_relay::server::config::DEFAULT_PORT;
use packet_relay::signal::wait_for_shutdown_signal;
use packet_relay::{RelayServer, ServerConfig};

/// Stream live packet captures to WebSocket clients, with room chat
#[derive(Parser, Debug)]
#[command(name = "packet-relay")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Interface passed to the capture tool
    #[arg(short, long, default_value = "lo")]
    interface: String,

    /// Capture output format (ek or json)
    #[arg(long, default_value = "ek")]
    format: OutputFormat,

    /// Capture program
    #[arg(long, default_value = "tshark")]
    capture_program: String,

    /// Replace the capture tool's default arguments (repeatable)
    #[arg(long = "capture-arg", allow_hyphen_values = true)]
    capture_args: Vec<String>,

    /// Serve chat only, without starting the capture tool
    #[arg(long)]
    no_capture: bool,

    /// Persist rooms and chat history to this JSON file
    #[arg(long)]
    data_file: Option<PathBuf>,

    /// Longest capture line accepted, in bytes
    #[arg(long, default_value_t = 1024 * 1024)]
    max_line_bytes: usize,

    /// What to do with lines longer than --max-line-bytes
    #[arg(long, value_enum, default_value_t = Overflow::Discard)]
    on_overflow: Overflow,

    /// Seconds the capture tool gets to exit after SIGTERM
    #[arg(long, default_value_t = 2)]
    shutdown_grace: u64,

    /// Events buffered per client before new ones are dropped
    #[arg(long, default_value_t = 256)]
    subscriber_capacity: usize,

    /// Maximum concurrent socket clients (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_connections: usize,

    /// Disable permissive CORS headers
    #[arg(long)]
    no_cors: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Overflow {
    /// Drop the oversized line and continue
    Discard,
    /// Stop the capture tool
    Fail,
}

impl From<Overflow> for OverflowPolicy {
    fn from(o: Overflow) -> Self {
        match o {
            Overflow::Discard => OverflowPolicy::DiscardAndResync,
            Overflow::Fail => OverflowPolicy::Fail,
        }
    }
}

impl Cli {
    fn into_config(self) -> ServerConfig {
        let capture = if self.no_capture {
            CaptureConfig::disabled()
        } else {
            let mut capture = CaptureConfig::default();
            capture.program = self.capture_program;
            if !self.capture_args.is_empty() {
                capture.args = Some(self.capture_args);
            }
            capture
                .interface(self.interface)
                .format(self.format)
                .max_line_len(self.max_line_bytes)
                .overflow_policy(self.on_overflow.into())
                .shutdown_grace(Duration::from_secs(self.shutdown_grace))
        };

        let hub = HubConfig::default()
            .subscriber_capacity(self.subscriber_capacity)
            .max_subscribers(self.max_connections);

        let mut config = ServerConfig::with_addr(SocketAddr::new(self.host, self.port))
            .cors(!self.no_cors)
            .capture(capture)
            .hub(hub);
        if let Some(path) = self.data_file {
            config = config.data_file(path);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("packet_relay=info,tower_http=info")),
        )
        .init();

    let server = RelayServer::open(cli.into_config()).await?;

    server
        .run_until(async {
            if let Err(e) = wait_for_shutdown_signal().await {
                tracing::error!(error = %e, "Failed to install signal handlers, using ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        })
        .await?;

    Ok(())
}
