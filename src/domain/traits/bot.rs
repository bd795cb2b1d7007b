use async_trait::async_trait;
use crate::domain::entities::{
    Attachment, ChannelId, Guild, GuildId, MessageId, OutgoingMessage, RoleId, UserId,
};
use crate::application::errors::BotError;

/// Bot trait - abstraction for messaging platform adapters
#[async_trait]
pub trait Bot: Send + Sync {
    /// Start the bot and begin listening for events
    async fn start(&self) -> Result<(), BotError>;

    /// Send a message to a channel
    async fn send_message(&self, channel: ChannelId, message: OutgoingMessage) -> Result<MessageId, BotError>;

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> Result<(), BotError>;

    /// React to a message with a unicode emoji
    async fn add_reaction(&self, channel: ChannelId, message: MessageId, emoji: &str) -> Result<(), BotError>;

    async fn add_role(&self, guild: GuildId, user: UserId, role: RoleId, reason: &str) -> Result<(), BotError>;

    /// Download the content of an incoming attachment
    async fn download(&self, attachment: &Attachment) -> Result<Vec<u8>, BotError>;

    /// Cached guild snapshot
    fn guild(&self, id: GuildId) -> Option<Guild>;

    fn guilds(&self) -> Vec<Guild>;

    /// Get bot info
    fn bot_info(&self) -> BotInfo;
}

/// Bot information
#[derive(Debug, Clone)]
pub struct BotInfo {
    pub id: UserId,
    pub name: String,
}
