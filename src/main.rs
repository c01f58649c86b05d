use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use chatrelay::{Config, RelayServer};

/// Group chat relay server.
#[derive(Parser, Debug)]
#[command(name = "chatrelay", version, about)]
struct Cli {
    /// Configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Address to bind (overrides the configuration file).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides the configuration file).
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", cli.config.display());
            eprintln!("Using default configuration.");
            Config::default()
        }
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    // Initialize logging
    if let Err(e) = chatrelay::logging::init(&config.logging, None) {
        eprintln!("Failed to initialize logging: {e}");
        chatrelay::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let server = match RelayServer::bind(&config.server).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to bind relay server: {}", e);
            std::process::exit(1);
        }
    };

    info!("chatrelay - group chat relay");
    info!(
        "Accepting up to {} participants ({:?} framing)",
        server.max_connections(),
        config.server.inbound_framing
    );

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for interrupt: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;
}
