// CLI entry point for the Masternein relay.
//
// Starts a standalone relay server that participants connect to. The relay
// groups connections into rooms and forwards messages between them; it never
// scores a guess. See `server.rs` for the networking architecture and
// `room.rs` for the routing rules.
//
// Usage:
//   relay [OPTIONS]
//     --bind <ADDR>                  Listen address (default: 127.0.0.1)
//     --port <PORT>                  Listen port (default: 39373)
//     --handshake-timeout-secs <N>   Seconds a new connection has to say hello
//     --debug                        Verbose logging
//
// Every option can also be set through a `MASTERNEIN_*` environment variable.
// `RUST_LOG` overrides the log filter entirely.

use std::net::IpAddr;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use masternein_relay::server::{DEFAULT_PORT, RelayConfig, start_relay};
use tracing::{error, info};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "Room relay for Masternein")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "MASTERNEIN_BIND", default_value = "127.0.0.1")]
    bind: IpAddr,

    /// Port to listen on (0 picks a free port)
    #[arg(long, env = "MASTERNEIN_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Seconds a new connection has to send its hello
    #[arg(long, env = "MASTERNEIN_HANDSHAKE_TIMEOUT_SECS", default_value_t = 5)]
    handshake_timeout_secs: u64,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_directive = if args.debug {
        "masternein_relay=debug,info"
    } else {
        "masternein_relay=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let config = RelayConfig {
        bind_address: args.bind,
        port: args.port,
        handshake_timeout: Duration::from_secs(args.handshake_timeout_secs.max(1)),
    };

    let (handle, addr) = match start_relay(config) {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "failed to start relay");
            return ExitCode::FAILURE;
        }
    };

    info!(%addr, "relay listening");

    // The relay runs until the process is killed; SIGINT/SIGTERM tear down
    // the threads with it.
    handle.wait();
    ExitCode::SUCCESS
}
