use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

use guild_cogs::application::errors::{BotError, ConfigError};
use guild_cogs::application::messaging::{Interactions, LoggingMiddleware, MiddlewareChain, RateLimitMiddleware};
use guild_cogs::application::services::{CommandService, EventService};
use guild_cogs::domain::entities::UserId;
use guild_cogs::domain::traits::{Bot, Store};
use guild_cogs::infrastructure::adapters::console::CONSOLE_USER;
use guild_cogs::infrastructure::adapters::{ConsoleAdapter, DiscordAdapter};
use guild_cogs::infrastructure::config::{Config, StorageBackend};
use guild_cogs::infrastructure::database::SqliteStore;
use guild_cogs::infrastructure::storage::JsonStore;
use guild_cogs::plugins::{self, rlstats};

#[derive(Parser)]
#[command(name = "guild-cogs")]
#[command(about = "Community plugins for a Discord bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Discord token (overrides config)
    #[arg(short, long)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
    /// Download the Rocket League tier breakdown table
    UpdateBreakdown,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run => load_config(&cli.config, cli.token).and_then(|config| block_on(run_bot(config))),
        Commands::Version => {
            println!("guild-cogs v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::InitConfig => init_config(),
        Commands::UpdateBreakdown => {
            load_config(&cli.config, cli.token).and_then(|config| block_on(update_breakdown(config)))
        }
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn block_on<F: std::future::Future<Output = Result<(), BotError>>>(future: F) -> Result<(), BotError> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| BotError::Internal(format!("Failed to start runtime: {}", e)))?;
    rt.block_on(future)
}

fn load_config(path: &str, token_override: Option<String>) -> Result<Config, BotError> {
    let mut config = if Path::new(path).exists() {
        let mut config = Config::load(path)?;
        config.apply_env();
        config
    } else {
        tracing::info!("No config at {}, using defaults and environment", path);
        Config::load_env()
    };

    if let Some(token) = token_override {
        config.set_discord_token(token);
    }
    config.validate()?;
    Ok(config)
}

async fn open_store(config: &Config) -> Result<Arc<dyn Store>, BotError> {
    let path = config.storage_path();
    let store: Arc<dyn Store> = match config.storage.backend {
        StorageBackend::Sqlite => Arc::new(SqliteStore::new(&path)?),
        StorageBackend::Json => Arc::new(JsonStore::open(&path).await?),
    };
    tracing::info!("Settings stored in {}", path.display());
    Ok(store)
}

async fn run_bot(config: Config) -> Result<(), BotError> {
    tracing::info!("Starting {}", config.bot.name);

    let store = open_store(&config).await?;
    let (events_tx, events_rx) = mpsc::channel(256);
    let mut owners: Vec<UserId> = config.bot.owners.iter().copied().map(UserId).collect();

    let bot: Arc<dyn Bot> = if config.discord_enabled() {
        let discord = config
            .adapters
            .discord
            .as_ref()
            .ok_or_else(|| BotError::Auth("Discord adapter not configured".to_string()))?;
        let adapter = DiscordAdapter::new(discord, events_tx)?;
        adapter.fetch_bot_info().await?;
        Arc::new(adapter)
    } else if config.adapters.console.as_ref().is_some_and(|c| c.enabled) {
        // the console user runs the bot locally
        owners.push(CONSOLE_USER);
        Arc::new(ConsoleAdapter::new(events_tx).with_echo())
    } else {
        return Err(ConfigError::MissingField("adapters".to_string()).into());
    };

    let mut plugin_manager = plugins::from_config(&config, store)?;
    plugin_manager.initialize_all(bot.clone()).await;

    let mut middleware = MiddlewareChain::new().add(LoggingMiddleware);
    let rate_limit = &config.security.rate_limit;
    if rate_limit.enabled {
        middleware = middleware.add(RateLimitMiddleware::new(rate_limit.max_requests, rate_limit.window_seconds));
    }

    let mut commands = CommandService::new(&config.bot.prefix)
        .with_middleware(middleware)
        .with_owners(owners)
        .with_bot_name(&config.bot.name);
    commands.register_defaults();
    for plugin in plugin_manager.plugins() {
        for command in plugin.commands() {
            commands.register(plugin.name(), command);
        }
    }
    tracing::info!(
        "Plugins ready: {}",
        plugin_manager
            .list_plugins()
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let plugin_manager = Arc::new(plugin_manager);
    let service = Arc::new(EventService::new(
        bot.clone(),
        Arc::new(commands),
        plugin_manager.clone(),
        Arc::new(Interactions::new()),
    ));
    let event_loop = tokio::spawn(service.run(events_rx));

    let result = bot.start().await;
    plugin_manager.cleanup_all().await;
    event_loop.abort();
    result
}

async fn update_breakdown(config: Config) -> Result<(), BotError> {
    let client = rlstats::StatsClient::new(&config.plugins.rlstats);
    let path = rlstats::breakdown_path(&config.bot.data_dir);
    rlstats::download_breakdown(&client, &path)
        .await
        .map_err(|e| BotError::Plugin(e.to_string()))?;
    println!("Tier breakdown saved to {}", path.display());
    Ok(())
}

fn init_config() -> Result<(), BotError> {
    let yaml = Config::default().to_yaml()?;
    println!("{}", yaml);
    println!("\nSave this to config.yaml and adjust as needed.");
    Ok(())
}
