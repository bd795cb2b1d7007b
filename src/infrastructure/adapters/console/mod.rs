//! Console adapter for development/testing
//!
//! Keeps guilds in memory and records everything the bot does, so it also
//! serves as the host in integration tests. When started, each stdin line
//! becomes a message from the console user; lines starting with `:` simulate
//! events (`:ban <name>`, `:boost <name>`, `:react <message id> <emoji>`).

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::application::errors::BotError;
use crate::domain::entities::{
    Attachment, Channel, ChannelId, Event, Guild, GuildId, Member, Message, MessageId,
    OutgoingMessage, Role, RoleId, User, UserId,
};
use crate::domain::traits::{Bot, BotInfo};

pub const CONSOLE_GUILD: GuildId = GuildId(1);
pub const CONSOLE_CHANNEL: ChannelId = ChannelId(10);
pub const CONSOLE_USER: UserId = UserId(100);
pub const BOT_USER: UserId = UserId(2);
const BOT_ROLE: RoleId = RoleId(20);

/// A message the bot sent
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub id: MessageId,
    pub channel: ChannelId,
    pub message: OutgoingMessage,
}

/// A role the bot assigned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGrant {
    pub guild: GuildId,
    pub user: UserId,
    pub role: RoleId,
    pub reason: String,
}

#[derive(Default)]
struct ConsoleState {
    guilds: HashMap<GuildId, Guild>,
    members: HashMap<(GuildId, UserId), Member>,
    sent: Vec<SentMessage>,
    deleted: Vec<MessageId>,
    reactions: Vec<(MessageId, String)>,
    roles: Vec<RoleGrant>,
    forbidden: HashSet<ChannelId>,
    attachments: HashMap<String, Vec<u8>>,
}

/// Console bot adapter for local development
pub struct ConsoleAdapter {
    info: BotInfo,
    events: mpsc::Sender<Event>,
    state: Mutex<ConsoleState>,
    next_id: AtomicU64,
    echo: bool,
}

impl ConsoleAdapter {
    pub fn new(events: mpsc::Sender<Event>) -> Self {
        Self {
            info: BotInfo {
                id: BOT_USER,
                name: "guild-cogs".to_string(),
            },
            events,
            state: Mutex::new(ConsoleState::default()),
            next_id: AtomicU64::new(1000),
            echo: false,
        }
    }

    /// Prints sent messages to stdout
    pub fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    /// The guild used by the interactive console session
    pub fn default_guild() -> Guild {
        let mut guild = Guild::new(CONSOLE_GUILD, "Console", CONSOLE_USER)
            .with_channel(Channel::new(CONSOLE_CHANNEL, "general"))
            .with_role(Role {
                id: BOT_ROLE,
                name: "guild-cogs".to_string(),
                position: 10,
                permissions: 0,
            });
        guild.bot_roles = vec![BOT_ROLE];
        guild
    }

    pub fn with_guild(self, guild: Guild) -> Self {
        self.add_guild(guild);
        self
    }

    pub fn add_guild(&self, guild: Guild) {
        self.with_state(|s| {
            s.guilds.insert(guild.id, guild);
        });
    }

    pub fn add_member(&self, member: Member) {
        self.with_state(|s| {
            s.members.insert((member.guild_id, member.user.id), member);
        });
    }

    pub fn member(&self, guild: GuildId, user: UserId) -> Option<Member> {
        self.with_state(|s| s.members.get(&(guild, user)).cloned())
    }

    /// Sends to this channel fail with `PermissionDenied`
    pub fn forbid(&self, channel: ChannelId) {
        self.with_state(|s| {
            s.forbidden.insert(channel);
        });
    }

    /// Content served for an attachment url
    pub fn add_attachment(&self, url: impl Into<String>, data: Vec<u8>) {
        self.with_state(|s| {
            s.attachments.insert(url.into(), data);
        });
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.with_state(|s| s.sent.clone())
    }

    pub fn sent_to(&self, channel: ChannelId) -> Vec<SentMessage> {
        self.with_state(|s| s.sent.iter().filter(|m| m.channel == channel).cloned().collect())
    }

    pub fn deleted(&self) -> Vec<MessageId> {
        self.with_state(|s| s.deleted.clone())
    }

    pub fn reactions(&self) -> Vec<(MessageId, String)> {
        self.with_state(|s| s.reactions.clone())
    }

    pub fn roles_added(&self) -> Vec<RoleGrant> {
        self.with_state(|s| s.roles.clone())
    }

    pub fn clear_sent(&self) {
        self.with_state(|s| s.sent.clear());
    }

    /// Queues an event as if it came from the platform
    pub async fn emit(&self, event: Event) -> Result<(), BotError> {
        self.events
            .send(event)
            .await
            .map_err(|_| BotError::Internal("event loop stopped".to_string()))
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut ConsoleState) -> T) -> T {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut state)
    }

    fn next_id(&self) -> MessageId {
        MessageId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn console_user(name: &str) -> User {
        User::new(CONSOLE_USER, name).with_discriminator("0001")
    }

    /// Turns one stdin line into an event
    fn line_to_event(&self, line: &str) -> Option<Event> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(directive) = line.strip_prefix(':') else {
            let message = Message::new(CONSOLE_CHANNEL, Self::console_user("console"), line)
                .in_guild(CONSOLE_GUILD);
            return Some(Event::Message(message));
        };

        let (verb, rest) = directive.split_once(' ').unwrap_or((directive, ""));
        let rest = rest.trim();
        let name = if rest.is_empty() { "someone" } else { rest };
        let user = User::new(UserId(self.next_id().get()), name).with_discriminator("1142");
        match verb {
            "ban" => Some(Event::MemberBan {
                guild_id: CONSOLE_GUILD,
                user,
            }),
            "boost" => {
                let before = Member::new(CONSOLE_GUILD, user.clone());
                let after = before.clone().with_premium_since(Some(chrono::Utc::now()));
                self.with_state(|s| {
                    if let Some(guild) = s.guilds.get_mut(&CONSOLE_GUILD) {
                        guild.premium_subscription_count += 1;
                    }
                });
                Some(Event::MemberUpdate {
                    before: Some(before),
                    after,
                })
            }
            "react" => {
                let (id, emoji) = rest.split_once(' ')?;
                Some(Event::ReactionAdd {
                    message_id: MessageId(id.parse().ok()?),
                    user_id: CONSOLE_USER,
                    emoji: emoji.trim().to_string(),
                })
            }
            _ => {
                println!("Unknown directive :{}", verb);
                None
            }
        }
    }
}

#[async_trait]
impl Bot for ConsoleAdapter {
    async fn start(&self) -> Result<(), BotError> {
        tracing::info!("Starting console bot (dev mode)");
        if self.guild(CONSOLE_GUILD).is_none() {
            self.add_guild(Self::default_guild());
        }
        self.emit(Event::Ready {
            user: User::new(self.info.id, self.info.name.clone()),
        })
        .await?;
        if let Some(guild) = self.guild(CONSOLE_GUILD) {
            self.emit(Event::GuildAvailable(guild)).await?;
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| BotError::Internal(format!("stdin: {}", e)))?
        {
            if line.trim() == ":quit" {
                break;
            }
            if let Some(event) = self.line_to_event(&line) {
                self.emit(event).await?;
            }
        }
        Ok(())
    }

    async fn send_message(&self, channel: ChannelId, message: OutgoingMessage) -> Result<MessageId, BotError> {
        if self.with_state(|s| s.forbidden.contains(&channel)) {
            return Err(BotError::PermissionDenied(format!("cannot send to {}", channel)));
        }
        let id = self.next_id();
        if self.echo {
            if !message.content.is_empty() {
                println!("[BOT #{} {}] {}", channel, id, message.content);
            }
            if let Some(embed) = &message.embed {
                println!(
                    "[BOT #{} {}] [{}] {}",
                    channel,
                    id,
                    embed.title.as_deref().unwrap_or(""),
                    embed.description.as_deref().unwrap_or("")
                );
            }
            if let Some(file) = &message.file {
                println!("[BOT #{} {}] <file {} ({} bytes)>", channel, id, file.filename, file.data.len());
            }
        }
        self.with_state(|s| s.sent.push(SentMessage { id, channel, message }));
        Ok(id)
    }

    async fn delete_message(&self, _channel: ChannelId, message: MessageId) -> Result<(), BotError> {
        self.with_state(|s| s.deleted.push(message));
        Ok(())
    }

    async fn add_reaction(&self, _channel: ChannelId, message: MessageId, emoji: &str) -> Result<(), BotError> {
        self.with_state(|s| s.reactions.push((message, emoji.to_string())));
        Ok(())
    }

    async fn add_role(&self, guild: GuildId, user: UserId, role: RoleId, reason: &str) -> Result<(), BotError> {
        self.with_state(|s| {
            if let Some(member) = s.members.get_mut(&(guild, user)) {
                if !member.roles.contains(&role) {
                    member.roles.push(role);
                }
            }
            s.roles.push(RoleGrant {
                guild,
                user,
                role,
                reason: reason.to_string(),
            });
        });
        Ok(())
    }

    async fn download(&self, attachment: &Attachment) -> Result<Vec<u8>, BotError> {
        self.with_state(|s| s.attachments.get(&attachment.url).cloned())
            .ok_or_else(|| BotError::NotFound(attachment.url.clone()))
    }

    fn guild(&self, id: GuildId) -> Option<Guild> {
        self.with_state(|s| s.guilds.get(&id).cloned())
    }

    fn guilds(&self) -> Vec<Guild> {
        self.with_state(|s| s.guilds.values().cloned().collect())
    }

    fn bot_info(&self) -> BotInfo {
        self.info.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_and_forbids() {
        let (tx, _rx) = mpsc::channel(8);
        let bot = ConsoleAdapter::new(tx).with_guild(ConsoleAdapter::default_guild());

        let id = bot.send_message(CONSOLE_CHANNEL, "hi".into()).await.unwrap();
        assert_eq!(bot.sent().len(), 1);
        assert_eq!(bot.sent()[0].id, id);

        bot.forbid(ChannelId(5));
        let err = bot.send_message(ChannelId(5), "nope".into()).await.unwrap_err();
        assert!(err.is_forbidden());
        assert_eq!(bot.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_directives() {
        let (tx, _rx) = mpsc::channel(8);
        let bot = ConsoleAdapter::new(tx).with_guild(ConsoleAdapter::default_guild());

        match bot.line_to_event(":ban jack") {
            Some(Event::MemberBan { user, .. }) => assert_eq!(user.tag(), "jack#1142"),
            other => panic!("unexpected {:?}", other),
        }
        match bot.line_to_event(":boost jack") {
            Some(Event::MemberUpdate { before: Some(before), after }) => {
                assert!(before.premium_since.is_none());
                assert!(after.premium_since.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(bot.guild(CONSOLE_GUILD).unwrap().premium_subscription_count, 1);
        assert!(matches!(bot.line_to_event("!help"), Some(Event::Message(_))));
        assert!(bot.line_to_event("   ").is_none());
    }
}
