//! srarq Sender - Selective-Repeat file sender
//!
//! Transfers a file over UDP to a receiver that acknowledges each segment.

use anyhow::Context;
use clap::{CommandFactory, Parser};
use srarq::ArqSender;
use srarq_cli::{display_transfer_stats, format_bytes, Config, SenderConfig, SenderSettings};
use srarq_io::UdpTransport;
use srarq_protocol::Segmenter;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "srarq-sender")]
#[command(about = "Selective-Repeat ARQ file sender over UDP", long_about = None)]
struct Args {
    /// File to transfer
    source: Option<PathBuf>,

    /// Receiver UDP port
    receiver_port: Option<u16>,

    /// Maximum number of segments in flight
    window_size: Option<u32>,

    /// Retransmission timeout in milliseconds
    timeout_ms: Option<u64>,

    /// Receiver host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Local bind address (defaults to the receiver's address family)
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Double the retransmission interval after each attempt, up to this many milliseconds
    #[arg(long)]
    max_backoff_ms: Option<u64>,

    /// Kernel send and receive buffer size in bytes
    #[arg(long, value_name = "BYTES")]
    socket_buffer: Option<usize>,

    /// TOML configuration file with a [sender] table
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print an example configuration file and exit
    #[arg(long)]
    print_example_config: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn resolve_receiver(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("Cannot resolve receiver host '{}'", host))?
        .next()
        .ok_or_else(|| anyhow::anyhow!("No address found for receiver host '{}'", host))
}

fn resolve_config(args: &Args) -> anyhow::Result<SenderConfig> {
    let from_file = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config '{}'", path.display()))?
            .sender
            .unwrap_or_default(),
        None => SenderSettings::default(),
    };

    let receiver = match args.receiver_port {
        Some(port) => Some(resolve_receiver(&args.host, port)?),
        None => None,
    };

    let from_cli = SenderSettings {
        source: args.source.clone(),
        receiver,
        bind: args.bind,
        window_size: args.window_size,
        retransmission_timeout_ms: args.timeout_ms,
        max_backoff_ms: args.max_backoff_ms,
        socket_buffer_bytes: args.socket_buffer,
    };

    Ok(from_file.merge(from_cli).build()?)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.print_example_config {
        print!("{}", Config::example().to_toml()?);
        return Ok(());
    }

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    // Bad arguments are reported, never half-acted on.
    let config = match resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid program arguments: {:#}", e);
            eprintln!();
            Args::command().print_help()?;
            return Ok(());
        }
    };

    let segmenter = Segmenter::default();
    let segments = segmenter
        .read_file(&config.source)
        .with_context(|| format!("Failed to read '{}'", config.source.display()))?;
    tracing::info!(
        "Read {} from {} into {} segments",
        format_bytes(segments.iter().map(|s| s.payload.len() as u64).sum()),
        config.source.display(),
        segments.len()
    );

    let transport = UdpTransport::new(config.bind, config.receiver, config.retransmission_timeout)
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    if let Some(bytes) = config.socket_buffer {
        transport
            .set_buffer_sizes(bytes)
            .with_context(|| format!("Failed to set socket buffers to {} bytes", bytes))?;
    }
    tracing::info!(
        "Sender bound to {} for receiver {}",
        transport.local_addr()?,
        transport.peer()
    );

    println!("Starting transmission...");
    let stats = ArqSender::new(Arc::new(transport), config.sender_options()).run(segments)?;
    println!("Transmission completed.");

    display_transfer_stats(&stats);
    Ok(())
}
