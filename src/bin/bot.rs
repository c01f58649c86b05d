use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use chatrelay::bot::{connect, load_persona, BotSession};
use chatrelay::{Config, Provider, ProviderKind};

/// LLM bot participant for a chatrelay server.
#[derive(Parser, Debug)]
#[command(name = "chatrelay-bot", version, about)]
struct Cli {
    /// Display name of the bot in the chat.
    bot_name: String,

    /// File containing the bot's persona.
    #[arg(long)]
    context: Option<PathBuf>,

    /// Completion provider (overrides the configuration file).
    #[arg(long, value_enum)]
    provider: Option<ProviderKind>,

    /// Configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Relay host (overrides the configuration file).
    #[arg(long)]
    host: Option<String>,

    /// Relay port (overrides the configuration file).
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", cli.config.display());
            eprintln!("Using default configuration.");
            Config::default()
        }
    };
    if let Some(provider) = cli.provider {
        config.bot.provider = provider;
    }
    if let Some(host) = cli.host {
        config.bot.host = host;
    }
    if let Some(port) = cli.port {
        config.bot.port = port;
    }

    let component = format!("bot-{}", cli.bot_name);
    if let Err(e) = chatrelay::logging::init(&config.logging, Some(&component)) {
        eprintln!("Failed to initialize logging: {e}");
        chatrelay::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let kind = config.bot.provider;
    let provider = match Provider::from_config(kind, &config.bot) {
        Ok(provider) => provider,
        Err(e) => {
            error!("Cannot start {} bot: {}", kind, e);
            std::process::exit(1);
        }
    };

    let persona = load_persona(cli.context.as_deref());
    let stream = match connect(&config.bot).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("Failed to connect to relay: {}", e);
            std::process::exit(1);
        }
    };

    let session = BotSession::new(cli.bot_name, persona, provider, config.bot);
    info!("Starting bot {}", session.name());

    tokio::select! {
        result = session.run(stream) => {
            if let Err(e) = result {
                error!("Connection error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("{} is disconnecting", session.name());
        }
    }
}
