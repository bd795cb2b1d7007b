//! In-memory host used by the integration tests
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use guild_cogs::application::messaging::{Interactions, MiddlewareChain};
use guild_cogs::application::services::{CommandService, EventService};
use guild_cogs::domain::entities::{
    Channel, ChannelId, Event, Guild, Message, Role, RoleId, User,
};
use guild_cogs::domain::traits::{Bot, Store};
use guild_cogs::infrastructure::adapters::console::{
    ConsoleAdapter, CONSOLE_CHANNEL, CONSOLE_GUILD, CONSOLE_USER,
};
use guild_cogs::infrastructure::database::SqliteStore;
use guild_cogs::plugins::{Plugin, PluginManager};

pub const PREFIX: &str = "!";
pub const BANS: ChannelId = ChannelId(11);
pub const BOOSTERS: ChannelId = ChannelId(12);
pub const NITRO_ROLE: RoleId = RoleId(30);
/// Above the bot's own role
pub const MOD_ROLE: RoleId = RoleId(31);

/// Console guild with extra channels and roles
pub fn guild() -> Guild {
    ConsoleAdapter::default_guild()
        .with_channel(Channel::new(BANS, "bans"))
        .with_channel(Channel::new(BOOSTERS, "boosters"))
        .with_role(Role {
            id: NITRO_ROLE,
            name: "Nitro Booster".to_string(),
            position: 5,
            permissions: 0,
        })
        .with_role(Role {
            id: MOD_ROLE,
            name: "Mods".to_string(),
            position: 15,
            permissions: 0,
        })
}

pub fn console_user() -> User {
    User::new(CONSOLE_USER, "console").with_discriminator("0001")
}

pub struct Harness {
    pub console: Arc<ConsoleAdapter>,
    pub bot: Arc<dyn Bot>,
    pub store: Arc<dyn Store>,
    pub interactions: Arc<Interactions>,
    pub service: Arc<EventService>,
    pub data: TempDir,
}

impl Harness {
    /// Builds a host around the plugins returned by `build`; the console
    /// user owns both the guild and the bot.
    pub async fn new<F>(build: F) -> Self
    where
        F: FnOnce(Arc<dyn Store>, &Path) -> Vec<Arc<dyn Plugin>>,
    {
        let data = tempfile::tempdir().unwrap();
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        Self::with_store(store, data, build).await
    }

    pub async fn with_store<F>(store: Arc<dyn Store>, data: TempDir, build: F) -> Self
    where
        F: FnOnce(Arc<dyn Store>, &Path) -> Vec<Arc<dyn Plugin>>,
    {
        let (tx, _rx) = mpsc::channel(64);
        let console = Arc::new(ConsoleAdapter::new(tx).with_guild(guild()));
        let bot: Arc<dyn Bot> = console.clone();

        let mut manager = PluginManager::new();
        for plugin in build(store.clone(), data.path()) {
            manager.register_arc(plugin).unwrap();
        }
        manager.initialize_all(bot.clone()).await;

        let mut commands = CommandService::new(PREFIX)
            .with_middleware(MiddlewareChain::new())
            .with_owners(vec![CONSOLE_USER]);
        commands.register_defaults();
        for plugin in manager.plugins() {
            for command in plugin.commands() {
                commands.register(plugin.name(), command);
            }
        }

        let interactions = Arc::new(Interactions::new());
        let service = Arc::new(EventService::new(
            bot.clone(),
            Arc::new(commands),
            Arc::new(manager),
            interactions.clone(),
        ));

        Self {
            console,
            bot,
            store,
            interactions,
            service,
            data,
        }
    }

    /// A guild message from the console user
    pub fn message(&self, content: &str) -> Message {
        Message::new(CONSOLE_CHANNEL, console_user(), content).in_guild(CONSOLE_GUILD)
    }

    /// A direct message from the console user
    pub fn direct_message(&self, content: &str) -> Message {
        Message::new(ChannelId(99), console_user(), content)
    }

    pub async fn say(&self, content: &str) {
        self.send(self.message(content)).await;
    }

    pub async fn send(&self, message: Message) {
        self.service.handle(Event::Message(message)).await;
    }

    pub async fn emit(&self, event: Event) {
        self.service.handle(event).await;
    }

    /// Runs a command in the background, for commands that prompt
    pub fn spawn(&self, content: &str) -> JoinHandle<()> {
        let service = self.service.clone();
        let message = self.message(content);
        tokio::spawn(async move { service.handle(Event::Message(message)).await })
    }

    /// Waits until a command is blocked on a prompt
    pub async fn wait_for_prompt(&self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.interactions.pending() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("command never prompted");
    }

    /// Text of every message sent to the console channel
    pub fn replies(&self) -> Vec<String> {
        self.replies_in(CONSOLE_CHANNEL)
    }

    pub fn replies_in(&self, channel: ChannelId) -> Vec<String> {
        self.console
            .sent_to(channel)
            .into_iter()
            .map(|m| m.message.content)
            .collect()
    }
}
