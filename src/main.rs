use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use status_relay::client::{DEFAULT_UPSTREAM_ADDRESS, UPSTREAM_ADDRESS_ENV};
use status_relay::server::{relay_port_for, STATUS_PORT};
use status_relay::simulator::{self, GameSession, StatRecorder};
use status_relay::{
    logging, shutdown, BroadcastRegistry, RelayServer, Result, ServerConfig, UpstreamClient,
    UpstreamConfig, WsConnector,
};

#[derive(Debug, Parser)]
#[command(name = "status-relay", version, about = "Fan out a game's status socket to many clients")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Relay the upstream status socket to any number of subscribers
    Relay {
        /// Upstream host:port
        #[arg(long, env = UPSTREAM_ADDRESS_ENV, default_value = DEFAULT_UPSTREAM_ADDRESS)]
        upstream: String,

        /// Listen port (defaults to 48998, or 48999 for a local upstream)
        #[arg(long)]
        port: Option<u16>,

        /// Listen address
        #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
        bind: IpAddr,
    },

    /// Serve a simulated game session
    Simulate {
        /// Listen port
        #[arg(long, default_value_t = STATUS_PORT)]
        port: u16,

        /// Listen address
        #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
        bind: IpAddr,

        /// Seed for reproducible scores
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print status records from the upstream as JSON lines
    Record {
        /// Upstream host:port
        #[arg(long, env = UPSTREAM_ADDRESS_ENV, default_value = DEFAULT_UPSTREAM_ADDRESS)]
        upstream: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match cli.command {
        Command::Relay {
            upstream,
            port,
            bind,
        } => relay(&upstream, port, bind).await,
        Command::Simulate { port, bind, seed } => simulate(SocketAddr::new(bind, port), seed).await,
        Command::Record { upstream } => record(&upstream).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn relay(upstream: &str, port: Option<u16>, bind: IpAddr) -> Result<()> {
    let upstream = upstream.trim();
    let upstream_config = UpstreamConfig::from_address(upstream)?;

    let port = port.unwrap_or_else(|| {
        let (port, moved) = relay_port_for(upstream);
        if moved {
            tracing::warn!(
                upstream = %upstream,
                port,
                "Upstream is the local game socket, listening on fallback port"
            );
        }
        port
    });

    let registry = Arc::new(BroadcastRegistry::new());
    let server_config = ServerConfig::default().bind(SocketAddr::new(bind, port));
    let server = RelayServer::bind(server_config, Arc::clone(&registry)).await?;

    tracing::info!(url = %upstream_config.url, "Relaying upstream");
    let handle = UpstreamClient::new(upstream_config, WsConnector, Arc::clone(&registry)).spawn();

    let stop = CancellationToken::new();
    let server_task = tokio::spawn(server.run_until(stop.clone().cancelled_owned()));

    shutdown::drive_shutdown(&handle, shutdown::interrupt).await;
    let summary = handle.stopped().await;
    tracing::info!(
        attempts = summary.attempts,
        messages = summary.messages,
        "Relay stopped"
    );

    stop.cancel();
    match server_task.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "Server task failed");
            Ok(())
        }
    }
}

async fn simulate(addr: SocketAddr, seed: Option<u64>) -> Result<()> {
    let registry = simulator::simulator_registry();
    let server_config = ServerConfig::default().bind(addr).without_handshake();
    let server = RelayServer::bind(server_config, Arc::clone(&registry)).await?;

    let session = match seed {
        Some(seed) => GameSession::seeded(Instant::now() + simulator::session::IDLE_LEAD, seed),
        None => GameSession::new(),
    };
    let ticker = simulator::spawn_ticker(Arc::clone(&registry), session);

    let stop = CancellationToken::new();
    let server_task = tokio::spawn(server.run_until(stop.clone().cancelled_owned()));

    shutdown::interrupt().await;
    tracing::info!("Stopping simulator");
    ticker.abort();
    stop.cancel();

    match server_task.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "Server task failed");
            Ok(())
        }
    }
}

async fn record(upstream: &str) -> Result<()> {
    let upstream_config = UpstreamConfig::from_address(upstream)?;

    let registry = Arc::new(BroadcastRegistry::new());
    registry
        .register(StatRecorder::new(Instant::now()).into_subscriber())
        .await?;

    let handle = UpstreamClient::new(upstream_config, WsConnector, registry).spawn();
    shutdown::drive_shutdown(&handle, shutdown::interrupt).await;

    let summary = handle.stopped().await;
    tracing::info!(messages = summary.messages, "Recorder stopped");
    Ok(())
}
