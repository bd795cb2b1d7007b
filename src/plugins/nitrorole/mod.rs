//! Gives boosters a role and announces new boosts

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::application::errors::{BotError, CommandError};
use crate::application::messaging::converters;
use crate::application::messaging::{CommandContext, Template};
use crate::application::services::Settings;
use crate::domain::entities::{ChannelId, Command, Event, Guild, Member, Permission, RoleId};
use crate::domain::traits::{Bot, Store};
use crate::plugins::trait_def::Plugin;

pub const NAME: &str = "nitrorole";

const ROLE_ID: &str = "role_id";
const CHANNEL_ID: &str = "channel_id";
const MESSAGE_TEMPLATE: &str = "message_template";

pub const ROLE_REASON: &str = "Nitro booster - role autoassigned.";

/// How recent `premium_since` must be to count as a boost when the
/// member's previous state is unknown
const FRESH_BOOST_MINUTES: i64 = 5;

pub struct NitroRole {
    settings: Settings,
}

impl NitroRole {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            settings: Settings::new(store, NAME),
        }
    }

    async fn on_boost(&self, bot: &Arc<dyn Bot>, member: &Member) -> Result<(), BotError> {
        let Some(guild) = bot.guild(member.guild_id) else {
            debug!("Guild {} not cached, ignoring boost", member.guild_id);
            return Ok(());
        };
        if let Err(e) = self.maybe_assign_role(bot, &guild, member).await {
            warn!("Could not assign booster role in guild {}: {}", guild.id, e);
        }
        self.maybe_announce(bot, &guild, member).await
    }

    async fn maybe_assign_role(&self, bot: &Arc<dyn Bot>, guild: &Guild, member: &Member) -> Result<(), BotError> {
        let Some(role_id) = self.settings.guild(guild.id).get::<RoleId>(ROLE_ID).await? else {
            return Ok(());
        };
        let Some(role) = guild.role(role_id) else {
            error!("Role with ID {} can't be found in guild with ID {}.", role_id, guild.id);
            return Ok(());
        };
        if role.position >= guild.bot_top_position() {
            error!(
                "Role with ID {} (guild ID: {}) is higher in hierarchy than any bot's role.",
                role_id, guild.id
            );
            return Ok(());
        }
        if member.has_role(role_id) {
            return Ok(());
        }
        bot.add_role(guild.id, member.user.id, role_id, ROLE_REASON).await
    }

    async fn maybe_announce(&self, bot: &Arc<dyn Bot>, guild: &Guild, member: &Member) -> Result<(), BotError> {
        let group = self.settings.guild(guild.id);
        let Some(channel_id) = group.get::<ChannelId>(CHANNEL_ID).await? else {
            return Ok(());
        };
        if guild.channel(channel_id).is_none() {
            error!("Channel with ID {} can't be found in guild with ID {}.", channel_id, guild.id);
            return Ok(());
        }
        let template: String = group.get_or(MESSAGE_TEMPLATE, String::new()).await?;
        if template.is_empty() {
            return Ok(());
        }

        let content = render(
            &template,
            member,
            &guild.name,
            guild.premium_subscription_count,
        );
        match bot.send_message(channel_id, content.into()).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_forbidden() => {
                error!(
                    "Bot can't send messages in channel with ID {} (guild ID: {})",
                    channel_id, guild.id
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn set_role(&self, ctx: &CommandContext, guild: &Guild) -> Result<(), CommandError> {
        let group = self.settings.guild(guild.id);
        let arg = ctx.rest(1);
        if arg.is_empty() {
            group.clear(ROLE_ID).await?;
            ctx.send("Role will not be autoassigned anymore when someone boosts server.").await?;
            return Ok(());
        }

        let role = converters::role(guild, arg)
            .ok_or_else(|| CommandError::InvalidArgs(format!("Role \"{}\" not found.", arg)))?;
        group.set(ROLE_ID, &role.id).await?;
        ctx.send(format!("Nitro boosters will now be assigned {} role.", role.name)).await?;
        Ok(())
    }

    async fn set_channel(&self, ctx: &CommandContext, guild: &Guild) -> Result<(), CommandError> {
        let group = self.settings.guild(guild.id);
        let arg = ctx.rest(1);
        if arg.is_empty() {
            group.clear(CHANNEL_ID).await?;
            ctx.send("New booster messages disabled.").await?;
            return Ok(());
        }

        let channel = converters::channel(guild, arg)
            .ok_or_else(|| CommandError::InvalidArgs(format!("Channel \"{}\" not found.", arg)))?;
        group.set(CHANNEL_ID, &channel.id).await?;
        ctx.send(format!("New booster messages will now be sent in {}", channel.mention())).await?;
        Ok(())
    }

    async fn set_message(&self, ctx: &CommandContext, guild: &Guild) -> Result<(), CommandError> {
        let template = ctx.rest(1);
        if template.is_empty() {
            return Err(CommandError::InvalidArgs(String::new()));
        }
        self.settings.guild(guild.id).set(MESSAGE_TEMPLATE, template).await?;

        let author = Member::new(guild.id, ctx.author().clone());
        let content = render(template, &author, &guild.name, 2);
        ctx.send("New booster message set, sending a test message here...").await?;
        ctx.send(content).await?;
        Ok(())
    }
}

#[async_trait]
impl Plugin for NitroRole {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Assigns a role to server boosters and announces new boosts"
    }

    fn commands(&self) -> Vec<Command> {
        vec![Command::new("nitrorole")
            .with_description("NitroRole settings.")
            .with_usage("<subcommand>")
            .with_permission(Permission::ManageRoles)
            .guild_only()
            .with_subcommand(Command::new("autoassignrole")
                .with_usage("[role]")
                .with_description("Set role that will be autoassigned after someone boosts server. Leave empty to not assign any role."))
            .with_subcommand(Command::new("channel")
                .with_usage("[channel]")
                .with_description("Set channel for new booster messages. Leave empty to disable."))
            .with_subcommand(Command::new("message")
                .with_usage("<message>")
                .with_description("Set new booster message. $mention, $username, $server, $count and $plural get replaced."))]
    }

    async fn handle_command(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let guild = ctx.require_guild()?;
        let sub = ctx.subcommand().map(str::to_lowercase);
        match sub.as_deref() {
            Some("autoassignrole") => self.set_role(ctx, &guild).await,
            Some("channel") => self.set_channel(ctx, &guild).await,
            Some("message") => self.set_message(ctx, &guild).await,
            _ => Err(CommandError::InvalidArgs(String::new())),
        }
    }

    async fn on_event(&self, event: &Event, bot: &Arc<dyn Bot>) -> Result<(), BotError> {
        match event {
            Event::MemberUpdate { before, after } if is_new_boost(before.as_ref(), after, Utc::now()) => {
                self.on_boost(bot, after).await
            }
            _ => Ok(()),
        }
    }
}

/// `premium_since` went from unset to set
fn is_new_boost(before: Option<&Member>, after: &Member, now: DateTime<Utc>) -> bool {
    let Some(since) = after.premium_since else {
        return false;
    };
    match before {
        Some(before) => before.premium_since.is_none(),
        None => now - since < chrono::Duration::minutes(FRESH_BOOST_MINUTES),
    }
}

fn render(template: &str, member: &Member, server: &str, count: u64) -> String {
    let plural = if count == 1 { "" } else { "s" };
    Template::new(template).safe_substitute(&[
        ("mention", member.mention()),
        ("username", member.display_name().to_string()),
        ("server", server.to_string()),
        ("count", count.to_string()),
        ("plural", plural.to_string()),
    ])
}
