//! Entry point for `file-over-udp`.
//!
//! Parses the single CLI argument and runs the session listener. All
//! protocol work is delegated to library modules; `main.rs` owns only
//! process setup (logging, argument parsing).

use std::net::{Ipv4Addr, SocketAddr};

use anyhow::Context;
use clap::Parser;

use file_over_udp::listener::Listener;

/// Reliable sliding-window file transfer served over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Well-known UDP port to listen on.
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, cli.port));

    let listener = Listener::bind(addr)
        .await
        .with_context(|| format!("binding UDP port {}", cli.port))?;
    listener.run().await.context("listener failed")?;
    Ok(())
}
