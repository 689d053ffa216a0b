//! ProtoMUD - Prototype multiplayer game server and client
//!
//! Clients stream WASD movements to a server that keeps one persistent
//! position record per client.

mod config;
mod network;
mod protocol;
mod state;

use std::io::BufRead;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::Config;
use network::{Client, NetworkConfig, Server, ServerEvent, SessionEnd};
use protocol::ClientId;
use state::PlayerStore;

/// ProtoMUD - move a player around a shared world
#[derive(Parser)]
#[command(name = "protomud")]
#[command(author = "ProtoMUD Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Prototype multiplayer game server and client", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the game server
    Server {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory for player records
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },

    /// Run an interactive client
    Client {
        /// Server host to connect to
        #[arg(short, long)]
        server: Option<String>,

        /// Server port
        #[arg(short, long)]
        port: Option<u16>,

        /// Use a fixed client id instead of generating one
        #[arg(long)]
        id: Option<String>,

        /// Directory for the local player record
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_default()
    };

    match cli.command {
        Commands::Server { port, data_dir } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(dir) = data_dir {
                config.server.data_dir = dir;
            }
            run_server(config).await?;
        }
        Commands::Client {
            server,
            port,
            id,
            data_dir,
        } => {
            if let Some(server) = server {
                config.client.server_host = server;
            }
            if let Some(port) = port {
                config.client.port = port;
            }
            if id.is_some() {
                config.client.client_id = id;
            }
            if let Some(dir) = data_dir {
                config.client.data_dir = dir;
            }
            run_client(config).await?;
        }
        Commands::Config { generate, output } => {
            if generate {
                if let Some(path) = output {
                    config::sample_config().save(&path)?;
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("{}", config::generate_sample_config()?);
                }
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

/// Run the game server
async fn run_server(config: Config) -> anyhow::Result<()> {
    let store = PlayerStore::open(&config.server.data_dir)?;
    tracing::info!("Player records stored in {}", store.dir().display());

    let mut server = Server::new(NetworkConfig::for_server(&config), store);
    let mut event_rx = server
        .take_event_receiver()
        .ok_or_else(|| anyhow::anyhow!("server event receiver already taken"))?;

    let bind_addr = server.start().await?;

    println!("Server listening on port {}...", bind_addr.port());
    println!("Press Ctrl+C to stop.\n");

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                match event {
                    ServerEvent::Started { bind_addr } => {
                        tracing::debug!("Accepting connections on {}", bind_addr);
                    }
                    ServerEvent::ClientSeen {
                        client_id,
                        host,
                        registered,
                    } => {
                        tracing::debug!(
                            "[{}] seen from {} ({} known)",
                            client_id,
                            host,
                            registered
                        );
                    }
                    ServerEvent::PlayerMoved { client_id, player } => {
                        tracing::trace!("[{}] now at {:?}", client_id, player);
                    }
                    ServerEvent::HandlerFailed { peer, error } => {
                        tracing::debug!("Dropped connection from {}: {}", peer, error);
                    }
                    ServerEvent::Stopped => {
                        tracing::warn!("Server stopped accepting connections");
                        return Ok(());
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
        }
    }

    server.stop().await?;
    tracing::info!(
        "Server stopped after seeing {} clients",
        server.registry().len().await
    );

    Ok(())
}

/// Run an interactive client
async fn run_client(config: Config) -> anyhow::Result<()> {
    let client_id = match &config.client.client_id {
        Some(id) => ClientId::new(id.as_str())?,
        None => ClientId::generate(),
    };

    let client = Client::new(NetworkConfig::for_client(&config), client_id).interactive();

    let mut conn = match client
        .connect_hostname(&config.client.server_host, config.client.port)
        .await
    {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!("Error connecting: {}", e);
            return Err(e.into());
        }
    };
    println!(
        "Connected to server with Client ID: [{}]",
        client.client_id()
    );

    let store = PlayerStore::open(&config.client.data_dir)?;
    client.initialize_local_player(&store).await?;

    // Ctrl+C watcher
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(()).await;
        }
    });

    let mut input = spawn_stdin_reader();

    match client
        .run_session(&mut conn, &mut input, &mut shutdown_rx)
        .await?
    {
        SessionEnd::Cancelled => tracing::info!("Session cancelled"),
        SessionEnd::InputClosed => tracing::info!("Input closed, ending session"),
        SessionEnd::Disconnected => tracing::warn!("Lost connection to server"),
    }

    let stats = conn.stats();
    tracing::debug!(
        "Sent {} movements ({} bytes)",
        stats.messages_sent,
        stats.bytes_sent
    );

    Ok(())
}

/// Read stdin lines on a dedicated thread so a pending read never holds up
/// shutdown
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);

    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    rx
}
