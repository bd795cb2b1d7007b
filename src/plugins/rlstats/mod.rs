//! Rocket League stats cards
//!
//! `rlstats` looks a player up by name (or by the account linked with
//! `rlconnect`), renders a card with ranks, tier estimates and season
//! rewards, and posts it as an image.

pub mod api;
pub mod player;
pub mod render;
pub mod tiers;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::application::errors::{BotError, CommandError, StorageError};
use crate::application::messaging::context::KEYCAPS;
use crate::application::messaging::converters;
use crate::application::messaging::CommandContext;
use crate::application::services::Settings;
use crate::domain::entities::{Command, FileUpload, OutgoingMessage, Permission, UserId};
use crate::domain::traits::{Bot, Store};
use crate::infrastructure::config::RlStatsConfig;
use crate::plugins::trait_def::Plugin;

pub use api::{StatsClient, StatsError};
pub use player::{Platform, Player, PlaylistKey};
pub use render::{CardRenderer, RenderError, CARD_PLAYLISTS};
pub use tiers::{TierBreakdown, TierEstimates};

pub const NAME: &str = "rlstats";

const TOKEN: &str = "token";
const ACCOUNT: &str = "account";

const MENU_TIMEOUT: Duration = Duration::from_secs(15);

const API_TROUBLE: &str = "Rocket League API experiences some issues right now. Try again later.";
const NOT_FOUND: &str = "The specified profile could not be found.";
const CHECK_FAILED: &str = "An error occured while checking Rocket League Stats. \
    If this will happen again, please inform bot owner about the issue.";
const STEAM_FAILED: &str = "An error occured while searching for Steam profile. \
    If this will happen again, please inform bot owner about the issue.";

/// Game account linked to a Discord user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedAccount {
    pub platform: Platform,
    pub id: String,
}

enum Lookup {
    Found(Player),
    NotFound,
    NoChoice,
}

impl From<StatsError> for CommandError {
    fn from(e: StatsError) -> Self {
        match e {
            StatsError::Storage(e) => CommandError::Storage(e),
            StatsError::Bot(e) => CommandError::Bot(e),
            other => CommandError::ExecutionFailed(other.to_string()),
        }
    }
}

/// Where the breakdown table is cached
pub fn breakdown_path(data_dir: &Path) -> PathBuf {
    data_dir.join(NAME).join("tier_breakdown.json")
}

/// Downloads the breakdown table and caches it on disk
pub async fn download_breakdown(client: &StatsClient, path: &Path) -> Result<TierBreakdown, StatsError> {
    let breakdown = client.tier_breakdown().await?;
    breakdown.save(path).await?;
    info!("Tier breakdown saved to {}", path.display());
    Ok(breakdown)
}

pub struct RlStats {
    settings: Settings,
    client: StatsClient,
    renderer: CardRenderer,
    breakdown_path: PathBuf,
    breakdown: Arc<RwLock<Arc<TierBreakdown>>>,
    default_token: Option<String>,
}

impl RlStats {
    pub fn new(store: Arc<dyn Store>, data_dir: &Path, config: &RlStatsConfig) -> Self {
        Self {
            settings: Settings::new(store, NAME),
            client: StatsClient::new(config),
            renderer: CardRenderer::new(&config.assets_dir, config.tracker_dir.clone()),
            breakdown_path: breakdown_path(data_dir),
            breakdown: Arc::new(RwLock::new(Arc::new(TierBreakdown::new()))),
            default_token: config.token.clone().filter(|t| !t.is_empty()),
        }
    }

    /// Token set with `rlset token`, else the configured one
    pub async fn token(&self) -> Result<Option<String>, StorageError> {
        let stored: Option<String> = self.settings.global().get(TOKEN).await?;
        Ok(stored
            .filter(|t| !t.is_empty())
            .or_else(|| self.default_token.clone()))
    }

    pub async fn account(&self, user: UserId) -> Result<Option<ConnectedAccount>, StorageError> {
        self.settings.user(user).get(ACCOUNT).await
    }

    pub async fn breakdown(&self) -> Arc<TierBreakdown> {
        self.breakdown.read().await.clone()
    }

    pub async fn update_breakdown(&self) -> Result<(), StatsError> {
        let breakdown = download_breakdown(&self.client, &self.breakdown_path).await?;
        *self.breakdown.write().await = Arc::new(breakdown);
        Ok(())
    }

    async fn find_player(&self, ctx: &CommandContext, name: &str, token: &str) -> Result<Lookup, StatsError> {
        let mut players = self.client.search(name, token).await?;
        match players.len() {
            0 => Ok(Lookup::NotFound),
            1 => Ok(Lookup::Found(players.remove(0))),
            _ => {
                if players.len() > KEYCAPS.len() {
                    debug!("{} accounts named {}, offering the first {}", players.len(), name, KEYCAPS.len());
                    players.truncate(KEYCAPS.len());
                }
                let prompt = OutgoingMessage::embed(
                    "There are multiple accounts with provided name:",
                    menu_description(&players),
                );
                match ctx.reaction_menu(prompt, players.len(), MENU_TIMEOUT).await? {
                    Some(choice) if choice < players.len() => Ok(Lookup::Found(players.swap_remove(choice))),
                    _ => Ok(Lookup::NoChoice),
                }
            }
        }
    }

    /// Replies for lookup failures; storage and chat errors propagate
    async fn report(&self, ctx: &CommandContext, e: StatsError) -> Result<(), CommandError> {
        let reply = match &e {
            StatsError::Server { .. } => {
                error!("{}", e);
                API_TROUBLE
            }
            StatsError::PlayerNotFound => {
                debug!("{}", e);
                NOT_FOUND
            }
            StatsError::Steam(_) => {
                warn!("{}", e);
                STEAM_FAILED
            }
            StatsError::Client { .. } | StatsError::Network(_) | StatsError::Parse(_) => {
                error!("{}", e);
                CHECK_FAILED
            }
            StatsError::Storage(_) | StatsError::Bot(_) => return Err(e.into()),
        };
        ctx.send(reply).await?;
        Ok(())
    }

    async fn not_configured(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        ctx.send(format!(
            "`This cog wasn't configured properly. If you're the owner, setup the cog using {}rlset`",
            ctx.prefix
        ))
        .await?;
        Ok(())
    }

    async fn rlset(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let sub = ctx.subcommand().map(str::to_lowercase);
        match sub.as_deref() {
            Some("token") => {
                if !ctx.message.is_private() {
                    if let Err(e) = ctx.bot.delete_message(ctx.channel_id(), ctx.message.id).await {
                        warn!("Could not delete token message {}: {}", ctx.message.id, e);
                    }
                    ctx.send("You can't set token from server channel! Use this command in PM instead.").await?;
                    return Ok(());
                }
                let token = ctx.rest(1);
                if token.is_empty() {
                    return Err(CommandError::InvalidArgs(String::new()));
                }
                self.settings.global().set(TOKEN, token).await?;
                ctx.send("User token set successfully! You should probably remove your message with token for safety.")
                    .await?;
                Ok(())
            }
            Some("updatebreakdown") => {
                ctx.send("Updating tier breakdown...").await?;
                if let Err(e) = self.update_breakdown().await {
                    error!("Downloading tier breakdown did not succeed: {}", e);
                    ctx.send("Downloading tier breakdown did not succeed.").await?;
                    return Ok(());
                }
                ctx.send("Tier breakdown updated.").await?;
                Ok(())
            }
            _ => Err(CommandError::InvalidArgs(String::new())),
        }
    }

    async fn rlstats(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let Some(token) = self.token().await? else {
            return self.not_configured(ctx).await;
        };

        let arg = ctx.rest(0);
        let lookup = if arg.is_empty() {
            let Some(account) = self.account(ctx.author().id).await? else {
                ctx.send(format!(
                    "Your game account is not connected with Discord. \
                     If you want to get stats, either give your ID after a command: `{0}rlstats <ID>` \
                     or connect your account using command: `{0}rlconnect <ID>`",
                    ctx.prefix
                ))
                .await?;
                return Ok(());
            };
            self.client
                .player(account.platform, &account.id, &token)
                .await
                .map(Lookup::Found)
        } else if let Some(user) = converters::user_mention(arg) {
            let Some(account) = self.account(user).await? else {
                ctx.send(format!(
                    "This user hasn't connected his game account with Discord. \
                     You need to search for his stats using his ID: `{}rlstats <ID>`",
                    ctx.prefix
                ))
                .await?;
                return Ok(());
            };
            self.client
                .player(account.platform, &account.id, &token)
                .await
                .map(Lookup::Found)
        } else {
            self.find_player(ctx, arg, &token).await
        };

        let mut player = match lookup {
            Ok(Lookup::Found(player)) => player,
            Ok(Lookup::NotFound) => {
                ctx.send(NOT_FOUND).await?;
                return Ok(());
            }
            Ok(Lookup::NoChoice) => {
                ctx.send("You didn't choose profile you want to check.").await?;
                return Ok(());
            }
            Err(e) => return self.report(ctx, e).await,
        };

        player.ensure_playlists(&CARD_PLAYLISTS);
        let caption = format!(
            "Rocket League Stats for **{}** _(arrows show amount of points for division down/up)_",
            player.user_name
        );
        let filename = format!("{}_profile.png", player.user_id);
        let data = self
            .renderer
            .render(player, self.breakdown().await)
            .await
            .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;

        ctx.send_message(OutgoingMessage::text(caption).with_file(Some(FileUpload { filename, data })))
            .await?;
        Ok(())
    }

    async fn rlconnect(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let name = ctx.rest(0);
        if name.is_empty() {
            return Err(CommandError::InvalidArgs(String::new()));
        }
        let Some(token) = self.token().await? else {
            return self.not_configured(ctx).await;
        };

        let player = match self.find_player(ctx, name, &token).await {
            Ok(Lookup::Found(player)) => player,
            Ok(Lookup::NotFound) => {
                ctx.send(NOT_FOUND).await?;
                return Ok(());
            }
            Ok(Lookup::NoChoice) => {
                ctx.send("You didn't choose profile you want to connect.").await?;
                return Ok(());
            }
            Err(e) => return self.report(ctx, e).await,
        };

        let account = ConnectedAccount {
            platform: player.platform,
            id: player.user_id,
        };
        self.settings.user(ctx.author().id).set(ACCOUNT, &account).await?;
        ctx.send(format!(
            "You successfully connected your {} account with Discord!",
            account.platform
        ))
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Plugin for RlStats {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Get your Rocket League stats with a single command!"
    }

    fn commands(&self) -> Vec<Command> {
        vec![
            Command::new("rlset")
                .with_description("Commands for setting Rocket League API settings.")
                .with_usage("<subcommand>")
                .with_permission(Permission::Owner)
                .with_subcommand(Command::new("token")
                    .with_usage("<token>")
                    .with_description("Sets the user token. USE THIS COMMAND IN PM"))
                .with_subcommand(Command::new("updatebreakdown")
                    .with_description("Update tier breakdown")),
            Command::new("rlstats")
                .with_usage("[ID or @user]")
                .with_description("Checks for your or given player's Rocket League stats"),
            Command::new("rlconnect")
                .with_usage("<ID>")
                .with_description("Connects game profile with Discord."),
        ]
    }

    async fn initialize(&self, _bot: Arc<dyn Bot>) -> Result<(), BotError> {
        if let Some(breakdown) = TierBreakdown::load(&self.breakdown_path).await? {
            *self.breakdown.write().await = Arc::new(breakdown);
            return Ok(());
        }

        info!("No tier breakdown at {}, downloading", self.breakdown_path.display());
        let client = self.client.clone();
        let path = self.breakdown_path.clone();
        let slot = self.breakdown.clone();
        tokio::spawn(async move {
            match download_breakdown(&client, &path).await {
                Ok(breakdown) => *slot.write().await = Arc::new(breakdown),
                Err(e) => error!("Downloading tier breakdown did not succeed: {}", e),
            }
        });
        Ok(())
    }

    async fn handle_command(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        match ctx.command.name.as_str() {
            "rlset" => self.rlset(ctx).await,
            "rlstats" => self.rlstats(ctx).await,
            "rlconnect" => self.rlconnect(ctx).await,
            other => Err(CommandError::NotFound(other.to_string())),
        }
    }

    async fn user_data(&self, user: UserId) -> Result<Option<serde_json::Value>, BotError> {
        let account = self.account(user).await?;
        account
            .map(|a| serde_json::to_value(a).map_err(|e| BotError::Parse(e.to_string())))
            .transpose()
    }

    async fn delete_user_data(&self, user: UserId) -> Result<(), BotError> {
        self.settings.user(user).clear_all().await?;
        Ok(())
    }
}

fn menu_description(players: &[Player]) -> String {
    players
        .iter()
        .enumerate()
        .map(|(idx, p)| format!("\n{}. {} account with username: {}", idx + 1, p.platform, p.user_name))
        .collect()
}
