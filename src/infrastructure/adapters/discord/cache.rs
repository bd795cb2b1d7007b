//! Guild and member cache fed by gateway events

use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::entities::{Channel, ChannelId, Guild, GuildId, Member, Role, RoleId, UserId};
use super::models::DiscordGuild;

#[derive(Default)]
pub struct Cache {
    bot_user: RwLock<Option<UserId>>,
    guilds: RwLock<HashMap<GuildId, Guild>>,
    members: RwLock<HashMap<(GuildId, UserId), Member>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_bot_user(&self, id: UserId) {
        if let Ok(mut user) = self.bot_user.write() {
            *user = Some(id);
        }
    }

    pub fn bot_user(&self) -> Option<UserId> {
        self.bot_user.read().ok().and_then(|u| *u)
    }

    pub fn guild(&self, id: GuildId) -> Option<Guild> {
        self.guilds.read().ok()?.get(&id).cloned()
    }

    pub fn guilds(&self) -> Vec<Guild> {
        self.guilds
            .read()
            .map(|g| g.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn member(&self, guild: GuildId, user: UserId) -> Option<Member> {
        self.members.read().ok()?.get(&(guild, user)).cloned()
    }

    /// GUILD_CREATE: replaces the guild and caches its members
    pub fn insert_guild(&self, raw: DiscordGuild) -> Guild {
        let bot_user = self.bot_user();
        let mut guild = Guild {
            id: raw.id,
            name: raw.name,
            owner_id: raw.owner_id,
            premium_subscription_count: raw.premium_subscription_count.unwrap_or(0),
            channels: raw.channels.into_iter().map(Channel::from).collect(),
            roles: raw.roles.into_iter().map(Role::from).collect(),
            bot_roles: Vec::new(),
        };

        let members: Vec<Member> = raw
            .members
            .into_iter()
            .filter_map(|m| m.into_member(guild.id))
            .collect();
        if let Some(me) = members.iter().find(|m| Some(m.user.id) == bot_user) {
            guild.bot_roles = me.roles.clone();
        }

        if let Ok(mut cache) = self.members.write() {
            cache.retain(|(g, _), _| *g != guild.id);
            for member in members {
                cache.insert((guild.id, member.user.id), member);
            }
        }
        if let Ok(mut guilds) = self.guilds.write() {
            guilds.insert(guild.id, guild.clone());
        }
        guild
    }

    /// GUILD_UPDATE: keeps channels and the bot's roles
    pub fn update_guild(&self, raw: DiscordGuild) {
        self.modify_guild(raw.id, |guild| {
            guild.name = raw.name;
            guild.owner_id = raw.owner_id;
            guild.premium_subscription_count = raw.premium_subscription_count.unwrap_or(0);
            if !raw.roles.is_empty() {
                guild.roles = raw.roles.into_iter().map(Role::from).collect();
            }
        });
    }

    pub fn remove_guild(&self, id: GuildId) {
        if let Ok(mut guilds) = self.guilds.write() {
            guilds.remove(&id);
        }
        if let Ok(mut members) = self.members.write() {
            members.retain(|(g, _), _| *g != id);
        }
    }

    pub fn upsert_role(&self, guild: GuildId, role: Role) {
        self.modify_guild(guild, |g| match g.roles.iter_mut().find(|r| r.id == role.id) {
            Some(existing) => *existing = role,
            None => g.roles.push(role),
        });
    }

    pub fn remove_role(&self, guild: GuildId, role: RoleId) {
        self.modify_guild(guild, |g| {
            g.roles.retain(|r| r.id != role);
            g.bot_roles.retain(|r| *r != role);
        });
    }

    pub fn upsert_channel(&self, guild: GuildId, channel: Channel) {
        self.modify_guild(guild, |g| match g.channels.iter_mut().find(|c| c.id == channel.id) {
            Some(existing) => *existing = channel,
            None => g.channels.push(channel),
        });
    }

    pub fn remove_channel(&self, guild: GuildId, channel: ChannelId) {
        self.modify_guild(guild, |g| g.channels.retain(|c| c.id != channel));
    }

    /// Stores the new member state and returns the previous one
    pub fn update_member(&self, member: Member) -> Option<Member> {
        if Some(member.user.id) == self.bot_user() {
            let roles = member.roles.clone();
            self.modify_guild(member.guild_id, |g| g.bot_roles = roles);
        }
        self.members
            .write()
            .ok()?
            .insert((member.guild_id, member.user.id), member)
    }

    pub fn remove_member(&self, guild: GuildId, user: UserId) {
        if let Ok(mut members) = self.members.write() {
            members.remove(&(guild, user));
        }
    }

    fn modify_guild(&self, id: GuildId, f: impl FnOnce(&mut Guild)) {
        if let Ok(mut guilds) = self.guilds.write() {
            if let Some(guild) = guilds.get_mut(&id) {
                f(guild);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_guild() -> DiscordGuild {
        serde_json::from_value(json!({
            "id": "1",
            "name": "Red",
            "owner_id": "5",
            "premium_subscription_count": 3,
            "roles": [
                {"id": "1", "name": "@everyone", "position": 0, "permissions": "0"},
                {"id": "7", "name": "bot", "position": 4, "permissions": "268435456"}
            ],
            "channels": [{"id": "10", "name": "general"}],
            "members": [
                {"user": {"id": "99", "username": "bot", "bot": true}, "roles": ["7"]},
                {"user": {"id": "42", "username": "jack"}, "roles": []}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_guild_create_tracks_bot_roles() {
        let cache = Cache::new();
        cache.set_bot_user(UserId(99));
        let guild = cache.insert_guild(raw_guild());
        assert_eq!(guild.bot_roles, vec![RoleId(7)]);
        assert_eq!(guild.bot_top_position(), 4);
        assert_eq!(cache.guilds().len(), 1);
        assert!(cache.member(GuildId(1), UserId(42)).is_some());
    }

    #[test]
    fn test_member_update_returns_previous_state() {
        let cache = Cache::new();
        cache.insert_guild(raw_guild());
        let mut updated = cache.member(GuildId(1), UserId(42)).unwrap();
        updated.premium_since = Some(chrono::Utc::now());

        let before = cache.update_member(updated).unwrap();
        assert!(before.premium_since.is_none());
        assert!(cache.member(GuildId(1), UserId(42)).unwrap().premium_since.is_some());
    }

    #[test]
    fn test_role_and_channel_updates() {
        let cache = Cache::new();
        cache.insert_guild(raw_guild());
        cache.upsert_role(GuildId(1), Role { id: RoleId(8), name: "boosters".to_string(), position: 2, permissions: 0 });
        cache.upsert_channel(GuildId(1), Channel::new(11u64, "bans"));
        cache.remove_channel(GuildId(1), ChannelId(10));
        let guild = cache.guild(GuildId(1)).unwrap();
        assert!(guild.role(RoleId(8)).is_some());
        assert_eq!(guild.channels, vec![Channel::new(11u64, "bans")]);
    }
}
