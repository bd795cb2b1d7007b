//! Discord API payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::entities::{
    Attachment, AttachmentId, Channel, ChannelId, Embed, GuildId, Member, Message, MessageId,
    Role, RoleId, User, UserId,
};

/// Gateway opcodes
pub mod op {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// Gateway intents
pub mod intents {
    pub const GUILDS: u64 = 1 << 0;
    pub const GUILD_MEMBERS: u64 = 1 << 1;
    pub const GUILD_MODERATION: u64 = 1 << 2;
    pub const GUILD_MESSAGES: u64 = 1 << 9;
    pub const GUILD_MESSAGE_REACTIONS: u64 = 1 << 10;
    pub const DIRECT_MESSAGES: u64 = 1 << 12;
    pub const DIRECT_MESSAGE_REACTIONS: u64 = 1 << 13;
    pub const MESSAGE_CONTENT: u64 = 1 << 15;

    pub const DEFAULT: u64 = GUILDS
        | GUILD_MEMBERS
        | GUILD_MODERATION
        | GUILD_MESSAGES
        | GUILD_MESSAGE_REACTIONS
        | DIRECT_MESSAGES
        | DIRECT_MESSAGE_REACTIONS
        | MESSAGE_CONTENT;
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayPayload {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayPayload {
    pub fn new(op: u8, d: Value) -> Self {
        Self { op, d, s: None, t: None }
    }
}

#[derive(Debug, Deserialize)]
pub struct Hello {
    pub heartbeat_interval: u64,
}

#[derive(Debug, Deserialize)]
pub struct GatewayBot {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordUser {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl From<DiscordUser> for User {
    fn from(u: DiscordUser) -> Self {
        User {
            id: u.id,
            name: u.username,
            discriminator: u.discriminator,
            global_name: u.global_name,
            is_bot: u.bot,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Ready {
    pub user: DiscordUser,
    #[serde(default)]
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordRole {
    pub id: RoleId,
    pub name: String,
    #[serde(default)]
    pub position: i64,
    /// Bit set serialized as a decimal string
    #[serde(default)]
    pub permissions: String,
}

impl From<DiscordRole> for Role {
    fn from(r: DiscordRole) -> Self {
        Role {
            id: r.id,
            name: r.name,
            position: r.position,
            permissions: r.permissions.parse().unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordChannel {
    pub id: ChannelId,
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    #[serde(default)]
    pub name: Option<String>,
}

impl From<DiscordChannel> for Channel {
    fn from(c: DiscordChannel) -> Self {
        Channel::new(c.id, c.name.unwrap_or_default())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordMember {
    #[serde(default)]
    pub user: Option<DiscordUser>,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<RoleId>,
    #[serde(default)]
    pub premium_since: Option<DateTime<Utc>>,
}

impl DiscordMember {
    pub fn into_member(self, guild_id: GuildId) -> Option<Member> {
        let user = self.user?;
        Some(Member {
            guild_id,
            user: user.into(),
            nick: self.nick,
            roles: self.roles,
            premium_since: self.premium_since,
        })
    }
}

/// GUILD_CREATE / GUILD_UPDATE
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordGuild {
    pub id: GuildId,
    #[serde(default)]
    pub name: String,
    pub owner_id: UserId,
    #[serde(default)]
    pub premium_subscription_count: Option<u64>,
    #[serde(default)]
    pub roles: Vec<DiscordRole>,
    #[serde(default)]
    pub channels: Vec<DiscordChannel>,
    #[serde(default)]
    pub members: Vec<DiscordMember>,
    #[serde(default)]
    pub unavailable: bool,
}

#[derive(Debug, Deserialize)]
pub struct DiscordAttachment {
    pub id: AttachmentId,
    pub filename: String,
    pub url: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

impl From<DiscordAttachment> for Attachment {
    fn from(a: DiscordAttachment) -> Self {
        Attachment {
            id: a.id,
            filename: a.filename,
            url: a.url,
            size: a.size,
            width: a.width,
            height: a.height,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PartialMember {
    #[serde(default)]
    pub roles: Vec<RoleId>,
}

#[derive(Debug, Deserialize)]
pub struct MessageCreate {
    pub id: MessageId,
    pub channel_id: ChannelId,
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    pub author: DiscordUser,
    #[serde(default)]
    pub member: Option<PartialMember>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<DiscordAttachment>,
    pub timestamp: DateTime<Utc>,
}

impl From<MessageCreate> for Message {
    fn from(m: MessageCreate) -> Self {
        Message {
            id: m.id,
            channel_id: m.channel_id,
            guild_id: m.guild_id,
            author: m.author.into(),
            member_roles: m.member.map(|member| member.roles).unwrap_or_default(),
            content: m.content,
            attachments: m.attachments.into_iter().map(Attachment::from).collect(),
            timestamp: m.timestamp,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PartialEmoji {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReactionAdd {
    pub user_id: UserId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub emoji: PartialEmoji,
}

#[derive(Debug, Deserialize)]
pub struct GuildBanAdd {
    pub guild_id: GuildId,
    pub user: DiscordUser,
}

#[derive(Debug, Deserialize)]
pub struct GuildMemberUpdate {
    pub guild_id: GuildId,
    pub user: DiscordUser,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<RoleId>,
    #[serde(default)]
    pub premium_since: Option<DateTime<Utc>>,
}

impl From<GuildMemberUpdate> for Member {
    fn from(u: GuildMemberUpdate) -> Self {
        Member {
            guild_id: u.guild_id,
            user: u.user.into(),
            nick: u.nick,
            roles: u.roles,
            premium_since: u.premium_since,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GuildRoleEvent {
    pub guild_id: GuildId,
    pub role: DiscordRole,
}

#[derive(Debug, Deserialize)]
pub struct GuildRoleDelete {
    pub guild_id: GuildId,
    pub role_id: RoleId,
}

#[derive(Debug, Deserialize)]
pub struct GuildDelete {
    pub id: GuildId,
}

/// Body of `POST /channels/{id}/messages`
#[derive(Debug, Serialize)]
pub struct CreateMessage<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    pub content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<&'a Embed>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentRef<'a>>,
}

#[derive(Debug, Serialize)]
pub struct AttachmentRef<'a> {
    pub id: u64,
    pub filename: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct CreatedMessage {
    pub id: MessageId,
}
