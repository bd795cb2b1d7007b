use super::{Guild, GuildId, Member, Message, MessageId, User, UserId};

/// Events emitted by platform adapters
#[derive(Debug, Clone)]
pub enum Event {
    Ready { user: User },
    GuildAvailable(Guild),
    Message(Message),
    ReactionAdd {
        message_id: MessageId,
        user_id: UserId,
        emoji: String,
    },
    MemberBan { guild_id: GuildId, user: User },
    MemberUpdate {
        /// Cached state before the update, if the member was known
        before: Option<Member>,
        after: Member,
    },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Ready { .. } => "ready",
            Event::GuildAvailable(_) => "guild_available",
            Event::Message(_) => "message",
            Event::ReactionAdd { .. } => "reaction_add",
            Event::MemberBan { .. } => "member_ban",
            Event::MemberUpdate { .. } => "member_update",
        }
    }
}
