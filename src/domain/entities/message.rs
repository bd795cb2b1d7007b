use super::{AttachmentId, ChannelId, GuildId, MessageId, RoleId, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File attached to an incoming message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub filename: String,
    pub url: String,
    pub size: u64,
    /// Only set for images
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.width.is_some()
    }

    /// Extension taken from the url path, ignoring any query string.
    pub fn extension(&self) -> Option<&str> {
        let path = self.url.split(['?', '#']).next().unwrap_or(self.url.as_str());
        let file = path.rsplit('/').next().unwrap_or(path);
        file.rsplit_once('.')
            .map(|(_, ext)| ext)
            .or_else(|| self.filename.rsplit_once('.').map(|(_, ext)| ext))
            .filter(|ext| !ext.is_empty())
    }
}

/// Represents an incoming message
#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    /// `None` for direct messages
    pub guild_id: Option<GuildId>,
    pub author: User,
    /// Roles of the author in the guild, if sent in one
    pub member_roles: Vec<RoleId>,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(channel_id: impl Into<ChannelId>, author: User, content: impl Into<String>) -> Self {
        Self {
            id: MessageId((uuid::Uuid::new_v4().as_u128() as u64) >> 1),
            channel_id: channel_id.into(),
            guild_id: None,
            author,
            member_roles: Vec::new(),
            content: content.into(),
            attachments: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn in_guild(mut self, guild_id: impl Into<GuildId>) -> Self {
        self.guild_id = Some(guild_id.into());
        self
    }

    pub fn with_roles(mut self, roles: Vec<RoleId>) -> Self {
        self.member_roles = roles;
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn is_private(&self) -> bool {
        self.guild_id.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// File uploaded together with an outgoing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub filename: String,
    pub data: Vec<u8>,
}

/// A message the bot sends
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub content: String,
    pub embed: Option<Embed>,
    pub file: Option<FileUpload>,
}

impl OutgoingMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn embed(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            embed: Some(Embed {
                title: Some(title.into()),
                description: Some(description.into()),
            }),
            ..Default::default()
        }
    }

    pub fn with_file(mut self, file: Option<FileUpload>) -> Self {
        self.file = file;
        self
    }
}

impl From<&str> for OutgoingMessage {
    fn from(s: &str) -> Self {
        Self::text(s)
    }
}

impl From<String> for OutgoingMessage {
    fn from(s: String) -> Self {
        Self::text(s)
    }
}
