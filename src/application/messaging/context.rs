//! Per-invocation command context handed to plugins

use std::sync::Arc;
use std::time::Duration;

use crate::application::errors::{BotError, CommandError};
use crate::domain::entities::{
    ChannelId, Command, Guild, GuildId, Message, MessageId, OutgoingMessage, User,
};
use crate::domain::traits::Bot;
use super::interaction::Interactions;
use super::parser::Invocation;

/// Keycap emojis used for multiple-choice prompts
pub const KEYCAPS: [&str; 10] = [
    "1\u{fe0f}\u{20e3}",
    "2\u{fe0f}\u{20e3}",
    "3\u{fe0f}\u{20e3}",
    "4\u{fe0f}\u{20e3}",
    "5\u{fe0f}\u{20e3}",
    "6\u{fe0f}\u{20e3}",
    "7\u{fe0f}\u{20e3}",
    "8\u{fe0f}\u{20e3}",
    "9\u{fe0f}\u{20e3}",
    "\u{1f51f}",
];

/// Everything a command handler needs to reply and interact
#[derive(Clone)]
pub struct CommandContext {
    pub message: Message,
    pub invocation: Invocation,
    pub command: Command,
    pub prefix: String,
    pub bot: Arc<dyn Bot>,
    pub interactions: Arc<Interactions>,
}

impl CommandContext {
    pub fn author(&self) -> &User {
        &self.message.author
    }

    pub fn channel_id(&self) -> ChannelId {
        self.message.channel_id
    }

    pub fn guild_id(&self) -> Option<GuildId> {
        self.message.guild_id
    }

    /// Guild the command was invoked in, from the host cache
    pub fn guild(&self) -> Option<Guild> {
        self.guild_id().and_then(|id| self.bot.guild(id))
    }

    /// Like [`CommandContext::guild`], for guild-only commands
    pub fn require_guild(&self) -> Result<Guild, CommandError> {
        self.guild().ok_or(CommandError::GuildOnly)
    }

    /// First argument, used to pick a subcommand
    pub fn subcommand(&self) -> Option<&str> {
        self.invocation.arg(0)
    }

    /// Raw text after the first `skip` arguments
    pub fn rest(&self, skip: usize) -> &str {
        self.invocation.rest_after(skip)
    }

    pub async fn send(&self, text: impl Into<String> + Send) -> Result<MessageId, BotError> {
        self.send_message(OutgoingMessage::text(text)).await
    }

    pub async fn send_message(&self, message: OutgoingMessage) -> Result<MessageId, BotError> {
        self.bot.send_message(self.channel_id(), message).await
    }

    /// Usage line for the command (or one of its subcommands)
    pub fn usage(&self) -> String {
        let sub = self.subcommand().and_then(|s| self.command.subcommand(s));
        match sub {
            Some(sub) => format!(
                "Usage: `{}{} {}{}`",
                self.prefix,
                self.command.name,
                sub.name,
                sub.usage.as_deref().map(|u| format!(" {}", u)).unwrap_or_default()
            ),
            None => {
                let mut usage = format!(
                    "Usage: `{}{}{}`",
                    self.prefix,
                    self.command.name,
                    self.command.usage.as_deref().map(|u| format!(" {}", u)).unwrap_or_default()
                );
                for sub in &self.command.subcommands {
                    usage.push_str(&format!(
                        "\n  {} - {}",
                        sub.name,
                        sub.description.as_deref().unwrap_or("")
                    ));
                }
                usage
            }
        }
    }

    /// Waits for the invoker's next message in this channel that passes `check`.
    pub async fn wait_for_reply<F>(&self, check: F, timeout: Duration) -> Option<Message>
    where
        F: Fn(&Message) -> bool + Send + 'static,
    {
        self.interactions
            .wait_for_reply(self.channel_id(), self.author().id, check, timeout)
            .await
    }

    /// Posts `prompt` (an embed), adds one keycap reaction per option and
    /// waits for the invoker to pick one. The prompt is deleted afterwards.
    ///
    /// Returns the chosen index, or `None` on timeout.
    pub async fn reaction_menu(
        &self,
        prompt: OutgoingMessage,
        options: usize,
        timeout: Duration,
    ) -> Result<Option<usize>, BotError> {
        let emojis: Vec<String> = KEYCAPS
            .iter()
            .take(options)
            .map(|e| e.to_string())
            .collect();

        let menu = self.send_message(prompt).await?;
        let wait = self.interactions.wait_for_reaction(
            menu,
            self.author().id,
            emojis.clone(),
            timeout,
        );
        let react = async {
            for emoji in &emojis {
                if let Err(e) = self.bot.add_reaction(self.channel_id(), menu, emoji).await {
                    tracing::debug!("Could not add reaction {}: {}", emoji, e);
                    break;
                }
            }
        };
        let (choice, _) = tokio::join!(wait, react);

        if let Err(e) = self.bot.delete_message(self.channel_id(), menu).await {
            tracing::debug!("Could not delete menu {}: {}", menu, e);
        }

        Ok(choice.and_then(|emoji| emojis.iter().position(|e| *e == emoji)))
    }
}
