use super::{GuildId, RoleId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a user in the system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub discriminator: Option<String>,
    pub global_name: Option<String>,
    pub is_bot: bool,
}

impl User {
    pub fn new(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            discriminator: None,
            global_name: None,
            is_bot: false,
        }
    }

    pub fn with_discriminator(mut self, discriminator: impl Into<String>) -> Self {
        self.discriminator = Some(discriminator.into());
        self
    }

    pub fn with_global_name(mut self, name: impl Into<String>) -> Self {
        self.global_name = Some(name.into());
        self
    }

    /// `name#1234`, or just the name for accounts without a discriminator.
    pub fn tag(&self) -> String {
        match self.discriminator.as_deref() {
            Some(d) if d != "0" => format!("{}#{}", self.name, d),
            _ => self.name.clone(),
        }
    }

    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }

    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.name)
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// A user as seen from inside a guild
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub guild_id: GuildId,
    pub user: User,
    pub nick: Option<String>,
    pub roles: Vec<RoleId>,
    pub premium_since: Option<DateTime<Utc>>,
}

impl Member {
    pub fn new(guild_id: GuildId, user: User) -> Self {
        Self {
            guild_id,
            user,
            nick: None,
            roles: Vec::new(),
            premium_since: None,
        }
    }

    pub fn with_roles(mut self, roles: Vec<RoleId>) -> Self {
        self.roles = roles;
        self
    }

    pub fn with_premium_since(mut self, since: Option<DateTime<Utc>>) -> Self {
        self.premium_since = since;
        self
    }

    pub fn display_name(&self) -> &str {
        self.nick.as_deref().unwrap_or_else(|| self.user.display_name())
    }

    pub fn mention(&self) -> String {
        self.user.mention()
    }

    pub fn has_role(&self, role: RoleId) -> bool {
        self.roles.contains(&role)
    }
}
