//! Argument converters for mentions, ids and names

use crate::domain::entities::{Channel, Guild, Role, UserId};

fn mention_id(arg: &str, open: &str) -> Option<u64> {
    arg.strip_prefix(open)?.strip_suffix('>')?.parse().ok()
}

/// `<#id>`, a bare id or a channel name (with or without `#`)
pub fn channel<'g>(guild: &'g Guild, arg: &str) -> Option<&'g Channel> {
    let arg = arg.trim();
    if let Some(id) = mention_id(arg, "<#").or_else(|| arg.parse().ok()) {
        return guild.channels.iter().find(|c| c.id.get() == id);
    }
    let name = arg.trim_start_matches('#');
    guild.channels.iter().find(|c| c.name == name)
}

/// `<@&id>`, a bare id or a role name (case-insensitive)
pub fn role<'g>(guild: &'g Guild, arg: &str) -> Option<&'g Role> {
    let arg = arg.trim();
    if let Some(id) = mention_id(arg, "<@&").or_else(|| arg.parse().ok()) {
        return guild.roles.iter().find(|r| r.id.get() == id);
    }
    guild.roles.iter().find(|r| r.name == arg)
        .or_else(|| guild.roles.iter().find(|r| r.name.eq_ignore_ascii_case(arg)))
}

/// `<@id>` or `<@!id>`
pub fn user_mention(arg: &str) -> Option<UserId> {
    let arg = arg.trim();
    mention_id(arg, "<@!")
        .or_else(|| mention_id(arg, "<@"))
        .map(UserId)
}
