//! Discord adapter: REST for actions, gateway for events

pub mod cache;
pub mod gateway;
pub mod models;
pub mod rest;

use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

use crate::application::errors::BotError;
use crate::domain::entities::{
    Attachment, ChannelId, Event, Guild, GuildId, MessageId, OutgoingMessage, RoleId, UserId,
};
use crate::domain::traits::{Bot, BotInfo};
use crate::infrastructure::config::DiscordConfig;
use cache::Cache;
use gateway::Gateway;
use rest::RestClient;

/// Discord bot adapter
pub struct DiscordAdapter {
    token: String,
    gateway_url: Option<String>,
    rest: RestClient,
    cache: Arc<Cache>,
    events: mpsc::Sender<Event>,
    info: RwLock<BotInfo>,
}

impl DiscordAdapter {
    pub fn new(config: &DiscordConfig, events: mpsc::Sender<Event>) -> Result<Self, BotError> {
        let token = config
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| BotError::Auth("Discord token not configured".to_string()))?;

        Ok(Self {
            rest: RestClient::new(&config.api_base, &token),
            token,
            gateway_url: config.gateway_url.clone(),
            cache: Arc::new(Cache::new()),
            events,
            info: RwLock::new(BotInfo {
                id: UserId(0),
                name: "guild-cogs".to_string(),
            }),
        })
    }

    /// Fetch bot info from the API
    pub async fn fetch_bot_info(&self) -> Result<(), BotError> {
        let me = self.rest.current_user().await?;
        self.cache.set_bot_user(me.id);
        if let Ok(mut info) = self.info.write() {
            *info = BotInfo {
                id: me.id,
                name: me.username,
            };
        }
        Ok(())
    }
}

#[async_trait]
impl Bot for DiscordAdapter {
    async fn start(&self) -> Result<(), BotError> {
        tracing::info!("Starting Discord bot (token: {}...)", &self.token[..8.min(self.token.len())]);
        self.fetch_bot_info().await?;

        let url = match &self.gateway_url {
            Some(url) => url.clone(),
            None => self.rest.gateway_url().await?,
        };
        let gateway = Gateway::new(
            url,
            self.token.clone(),
            models::intents::DEFAULT,
            self.cache.clone(),
            self.events.clone(),
        );
        gateway.run().await
    }

    async fn send_message(&self, channel: ChannelId, message: OutgoingMessage) -> Result<MessageId, BotError> {
        tracing::debug!("Sending to {}: {}", channel, message.content);
        self.rest.create_message(channel, &message).await
    }

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> Result<(), BotError> {
        self.rest.delete_message(channel, message).await
    }

    async fn add_reaction(&self, channel: ChannelId, message: MessageId, emoji: &str) -> Result<(), BotError> {
        self.rest.add_reaction(channel, message, emoji).await
    }

    async fn add_role(&self, guild: GuildId, user: UserId, role: RoleId, reason: &str) -> Result<(), BotError> {
        self.rest.add_member_role(guild, user, role, reason).await
    }

    async fn download(&self, attachment: &Attachment) -> Result<Vec<u8>, BotError> {
        self.rest.download(&attachment.url).await
    }

    fn guild(&self, id: GuildId) -> Option<Guild> {
        self.cache.guild(id)
    }

    fn guilds(&self) -> Vec<Guild> {
        self.cache.guilds()
    }

    fn bot_info(&self) -> BotInfo {
        match self.info.read() {
            Ok(info) => info.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
