//! Event loop: routes adapter events to prompts, commands and plugins

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::application::errors::CommandError;
use crate::application::messaging::middleware::MiddlewareError;
use crate::application::messaging::{CommandContext, Interactions};
use crate::domain::entities::{Event, Message};
use crate::domain::traits::Bot;
use crate::plugins::PluginManager;
use super::command_service::{CommandService, CORE};

pub struct EventService {
    bot: Arc<dyn Bot>,
    commands: Arc<CommandService>,
    plugins: Arc<PluginManager>,
    interactions: Arc<Interactions>,
}

impl EventService {
    pub fn new(
        bot: Arc<dyn Bot>,
        commands: Arc<CommandService>,
        plugins: Arc<PluginManager>,
        interactions: Arc<Interactions>,
    ) -> Self {
        Self {
            bot,
            commands,
            plugins,
            interactions,
        }
    }

    /// Handles events until the adapter drops its sender. Each event gets
    /// its own task so a handler waiting on a prompt never stalls the loop.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<Event>) {
        while let Some(event) = events.recv().await {
            let service = self.clone();
            tokio::spawn(async move {
                service.handle(event).await;
            });
        }
        info!("Event stream closed");
    }

    pub async fn handle(&self, event: Event) {
        match &event {
            Event::Ready { user } => info!("Connected as {}", user.tag()),
            Event::GuildAvailable(guild) => debug!("Guild available: {} ({})", guild.name, guild.id),
            Event::Message(message) => {
                if message.author.is_bot {
                    return;
                }
                if self.interactions.feed_message(message) {
                    debug!("Message {} answered a prompt", message.id);
                    return;
                }
                self.handle_message(message).await;
            }
            Event::ReactionAdd { message_id, user_id, emoji } => {
                if self.interactions.feed_reaction(*message_id, *user_id, emoji) {
                    return;
                }
            }
            Event::MemberBan { .. } | Event::MemberUpdate { .. } => {}
        }

        self.plugins.dispatch(&event, &self.bot).await;
    }

    async fn handle_message(&self, message: &Message) {
        let Some(invocation) = self.commands.parse(message) else {
            return;
        };
        let Some(registered) = self.commands.resolve(&invocation).cloned() else {
            debug!("Unknown command: {}", invocation.name);
            return;
        };

        match self.commands.admit(message, &registered.command) {
            Ok(()) => {}
            Err(MiddlewareError::RateLimited { .. }) => {
                self.reply(message, "Rate limited. Please try again later.").await;
                return;
            }
            Err(e) => {
                warn!("Command {} blocked: {}", registered.command.name, e);
                return;
            }
        }

        let guild = message.guild_id.and_then(|id| self.bot.guild(id));
        let ctx = CommandContext {
            message: message.clone(),
            invocation,
            command: registered.command.clone(),
            prefix: self.commands.prefix().to_string(),
            bot: self.bot.clone(),
            interactions: self.interactions.clone(),
        };

        let result = match self.commands.check(&registered.command, message, guild.as_ref()) {
            Err(e) => Err(e),
            Ok(()) if registered.plugin == CORE => self.run_builtin(&ctx).await,
            Ok(()) => match self.plugins.get(&registered.plugin) {
                Some(plugin) => plugin.handle_command(&ctx).await,
                None => Err(CommandError::NotFound(registered.command.name.clone())),
            },
        };

        if let Err(e) = result {
            self.report(&ctx, e).await;
        }
    }

    async fn run_builtin(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let text = match ctx.command.name.as_str() {
            "help" => self.commands.get_help(ctx.invocation.arg(0)),
            "mydata" => {
                let data = self.plugins.user_data(ctx.author().id).await?;
                if data.is_empty() {
                    "No data is stored about you.".to_string()
                } else {
                    let json = serde_json::to_string_pretty(&data)
                        .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;
                    format!("```json\n{}\n```", json)
                }
            }
            "forgetme" => {
                self.plugins.delete_user_data(ctx.author().id).await?;
                info!("Deleted stored data of user {}", ctx.author().id);
                "Your data has been removed.".to_string()
            }
            _ => self.commands.version(),
        };
        ctx.send(text).await?;
        Ok(())
    }

    async fn report(&self, ctx: &CommandContext, error: CommandError) {
        let reply = match &error {
            CommandError::InvalidArgs(msg) if msg.is_empty() => Some(ctx.usage()),
            CommandError::InvalidArgs(msg) => Some(msg.clone()),
            CommandError::GuildOnly => Some("That command is not available in DMs.".to_string()),
            CommandError::PermissionDenied => {
                Some("You are not allowed to use that command.".to_string())
            }
            CommandError::Bot(e) if e.is_forbidden() => {
                warn!("Missing permissions for {}: {}", ctx.command.name, e);
                None
            }
            _ => {
                error!("Command {} failed: {}", ctx.command.name, error);
                None
            }
        };
        if let Some(reply) = reply {
            self.reply(&ctx.message, &reply).await;
        }
    }

    async fn reply(&self, message: &Message, text: &str) {
        if let Err(e) = self.bot.send_message(message.channel_id, text.into()).await {
            warn!("Could not reply in {}: {}", message.channel_id, e);
        }
    }
}
