use super::{ChannelId, GuildId, RoleId, UserId};
use serde::{Deserialize, Serialize};

/// Permission bits used by command checks
pub mod permissions {
    pub const ADMINISTRATOR: u64 = 1 << 3;
    pub const MANAGE_ROLES: u64 = 1 << 28;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub position: i64,
    pub permissions: u64,
}

impl Role {
    pub fn mention(&self) -> String {
        format!("<@&{}>", self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
}

impl Channel {
    pub fn new(id: impl Into<ChannelId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn mention(&self) -> String {
        format!("<#{}>", self.id)
    }
}

/// Snapshot of a guild held in the host cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: GuildId,
    pub name: String,
    pub owner_id: UserId,
    pub premium_subscription_count: u64,
    pub channels: Vec<Channel>,
    pub roles: Vec<Role>,
    /// Roles held by the bot's own member
    pub bot_roles: Vec<RoleId>,
}

impl Guild {
    pub fn new(id: impl Into<GuildId>, name: impl Into<String>, owner_id: impl Into<UserId>) -> Self {
        let id = id.into();
        Self {
            id,
            name: name.into(),
            owner_id: owner_id.into(),
            premium_subscription_count: 0,
            channels: Vec::new(),
            // @everyone shares the guild's id
            roles: vec![Role {
                id: RoleId(id.0),
                name: "@everyone".to_string(),
                position: 0,
                permissions: 0,
            }],
            bot_roles: Vec::new(),
        }
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.push(role);
        self
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    pub fn role(&self, id: RoleId) -> Option<&Role> {
        self.roles.iter().find(|r| r.id == id)
    }

    /// Position of the highest role the bot holds (0 = @everyone only)
    pub fn bot_top_position(&self) -> i64 {
        self.bot_roles
            .iter()
            .filter_map(|id| self.role(*id))
            .map(|r| r.position)
            .max()
            .unwrap_or(0)
    }

    /// Computes base permissions of a member from their roles.
    pub fn permissions_for(&self, user: UserId, roles: &[RoleId]) -> u64 {
        if user == self.owner_id {
            return u64::MAX;
        }
        let everyone = self.role(RoleId(self.id.0)).map(|r| r.permissions).unwrap_or(0);
        let perms = roles
            .iter()
            .filter_map(|id| self.role(*id))
            .fold(everyone, |acc, r| acc | r.permissions);
        if perms & permissions::ADMINISTRATOR != 0 {
            u64::MAX
        } else {
            perms
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(id: u64, position: i64, permissions: u64) -> Role {
        Role {
            id: RoleId(id),
            name: format!("role-{}", id),
            position,
            permissions,
        }
    }

    #[test]
    fn test_owner_has_everything() {
        let guild = Guild::new(1, "g", 7);
        assert_eq!(guild.permissions_for(UserId(7), &[]), u64::MAX);
        assert_eq!(guild.permissions_for(UserId(8), &[]), 0);
    }

    #[test]
    fn test_administrator_implies_all() {
        let guild = Guild::new(1, "g", 7)
            .with_role(role(10, 1, permissions::ADMINISTRATOR))
            .with_role(role(11, 2, permissions::MANAGE_ROLES));
        assert_eq!(guild.permissions_for(UserId(8), &[RoleId(10)]), u64::MAX);
        let perms = guild.permissions_for(UserId(8), &[RoleId(11)]);
        assert_ne!(perms & permissions::MANAGE_ROLES, 0);
        assert_eq!(perms & permissions::ADMINISTRATOR, 0);
    }

    #[test]
    fn test_bot_top_position() {
        let mut guild = Guild::new(1, "g", 7)
            .with_role(role(10, 3, 0))
            .with_role(role(11, 5, 0));
        assert_eq!(guild.bot_top_position(), 0);
        guild.bot_roles = vec![RoleId(10), RoleId(11)];
        assert_eq!(guild.bot_top_position(), 5);
    }
}
