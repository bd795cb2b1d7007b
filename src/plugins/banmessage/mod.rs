//! Posts a templated message when someone gets banned
//!
//! Each guild has a channel, a list of templates and an optional image.
//! On ban, one template is picked at random and `$username` / `$server`
//! are filled in.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::application::errors::{BotError, CommandError, StorageError};
use crate::application::messaging::converters;
use crate::application::messaging::formatting::{boxed, pagify, MESSAGE_LIMIT};
use crate::application::messaging::{CommandContext, Template};
use crate::application::services::Settings;
use crate::domain::entities::{
    ChannelId, Command, Event, FileUpload, Guild, GuildId, OutgoingMessage, Permission, User,
};
use crate::domain::traits::{Bot, Store};
use crate::infrastructure::images::GuildImages;
use crate::plugins::trait_def::Plugin;

pub const NAME: &str = "banmessage";

const CHANNEL: &str = "channel";
const TEMPLATES: &str = "message_templates";
/// Single template kept by older versions
const LEGACY_TEMPLATE: &str = "message_template";

const REMOVE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct BanMessage {
    settings: Settings,
    images: GuildImages,
}

impl BanMessage {
    pub fn new(store: Arc<dyn Store>, data_dir: &Path) -> Self {
        Self {
            settings: Settings::new(store, NAME),
            images: GuildImages::new(data_dir.join(NAME).join("message_images")),
        }
    }

    pub fn images(&self) -> &GuildImages {
        &self.images
    }

    pub async fn templates(&self, guild: GuildId) -> Result<Vec<String>, StorageError> {
        self.settings.guild(guild).get_or(TEMPLATES, Vec::new()).await
    }

    /// Moves legacy single templates into the template list.
    /// Returns the number of migrated guilds.
    pub async fn migrate(&self) -> Result<usize, StorageError> {
        let mut migrated = 0;
        for (scope, values) in self.settings.all_scopes().await? {
            let Some(Value::String(template)) = values.get(LEGACY_TEMPLATE) else {
                continue;
            };
            let group = self.settings.scoped(scope);
            group.set(TEMPLATES, &vec![template.clone()]).await?;
            group.clear(LEGACY_TEMPLATE).await?;
            migrated += 1;
        }
        Ok(migrated)
    }

    async fn image(&self, guild: GuildId) -> Result<Option<FileUpload>, StorageError> {
        Ok(self
            .images
            .load(guild)
            .await?
            .map(|(filename, data)| FileUpload { filename, data }))
    }

    /// Sends a random template to the guild's ban channel
    pub async fn announce_ban(&self, bot: &Arc<dyn Bot>, guild_id: GuildId, user: &User) -> Result<(), BotError> {
        let group = self.settings.guild(guild_id);
        let Some(channel_id) = group.get::<ChannelId>(CHANNEL).await? else {
            return Ok(());
        };
        let templates: Vec<String> = group.get_or(TEMPLATES, Vec::new()).await?;
        let Some(template) = templates.choose(&mut rand::thread_rng()).cloned() else {
            return Ok(());
        };
        let Some(guild) = bot.guild(guild_id) else {
            debug!("Guild {} not cached, skipping ban message", guild_id);
            return Ok(());
        };
        if guild.channel(channel_id).is_none() {
            warn!("Ban message channel {} not found in guild {}", channel_id, guild_id);
            return Ok(());
        }

        let message = OutgoingMessage::text(render(&template, user, &guild.name))
            .with_file(self.image(guild_id).await?);
        match bot.send_message(channel_id, message).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_forbidden() => {
                warn!("Can't send ban message in channel {} (guild {}): {}", channel_id, guild_id, e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn set_channel(&self, ctx: &CommandContext, guild: &Guild) -> Result<(), CommandError> {
        let group = self.settings.guild(guild.id);
        let arg = ctx.rest(1);
        if arg.is_empty() {
            group.clear(CHANNEL).await?;
            ctx.send("Ban messages are now disabled.").await?;
            return Ok(());
        }

        let channel = converters::channel(guild, arg)
            .ok_or_else(|| CommandError::InvalidArgs(format!("Channel \"{}\" not found.", arg)))?;
        group.set(CHANNEL, &channel.id).await?;
        ctx.send(format!("Ban messages will now be sent in {}", channel.mention())).await?;
        Ok(())
    }

    async fn add_message(&self, ctx: &CommandContext, guild: &Guild) -> Result<(), CommandError> {
        let template = ctx.rest(1);
        if template.is_empty() {
            return Err(CommandError::InvalidArgs(String::new()));
        }

        let group = self.settings.guild(guild.id);
        let mut templates: Vec<String> = group.get_or(TEMPLATES, Vec::new()).await?;
        templates.push(template.to_string());
        group.set(TEMPLATES, &templates).await?;

        let content = render(template, ctx.author(), &guild.name);
        ctx.send("Ban message set, sending a test message here...").await?;
        let file = self.image(guild.id).await?;
        ctx.send_message(OutgoingMessage::text(content).with_file(file)).await?;
        Ok(())
    }

    async fn remove_message(&self, ctx: &CommandContext, guild: &Guild) -> Result<(), CommandError> {
        let group = self.settings.guild(guild.id);
        let mut templates: Vec<String> = group.get_or(TEMPLATES, Vec::new()).await?;
        if templates.is_empty() {
            ctx.send("This guild doesn't have any ban message set.").await?;
            return Ok(());
        }

        // code block fences take the rest of the limit
        for page in pagify(&listing(&templates), MESSAGE_LIMIT - 10) {
            ctx.send(boxed(&page)).await?;
        }

        let reply = ctx
            .wait_for_reply(|m| parse_index(&m.content).is_some(), REMOVE_TIMEOUT)
            .await;
        let Some(index) = reply.and_then(|m| parse_index(&m.content)) else {
            ctx.send("Okay, no messages will be removed.").await?;
            return Ok(());
        };

        if remove_at(&mut templates, index).is_none() {
            ctx.send("Wow! That's a big number. Too big...").await?;
            return Ok(());
        }
        group.set(TEMPLATES, &templates).await?;
        ctx.send("Message removed.").await?;
        Ok(())
    }

    async fn set_image(&self, ctx: &CommandContext, guild: &Guild) -> Result<(), CommandError> {
        let [attachment] = ctx.message.attachments.as_slice() else {
            ctx.send("You have to send exactly one attachment.").await?;
            return Ok(());
        };
        if !attachment.is_image() {
            ctx.send("The attachment has to be an image.").await?;
            return Ok(());
        }

        let data = ctx.bot.download(attachment).await?;
        let path = self
            .images
            .save(guild.id, attachment.extension().unwrap_or("png"), &data)
            .await?;
        debug!("Saved ban image for guild {} to {}", guild.id, path.display());
        ctx.send("Image set.").await?;
        Ok(())
    }

    async fn unset_image(&self, ctx: &CommandContext, guild: &Guild) -> Result<(), CommandError> {
        self.images.remove(guild.id).await?;
        ctx.send("Image unset.").await?;
        Ok(())
    }
}

#[async_trait]
impl Plugin for BanMessage {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Sends a message when someone gets banned"
    }

    fn commands(&self) -> Vec<Command> {
        vec![Command::new("banmessageset")
            .with_description("BanMessage settings.")
            .with_usage("<subcommand>")
            .with_permission(Permission::Admin)
            .guild_only()
            .with_subcommand(Command::new("channel")
                .with_usage("[channel]")
                .with_description("Set channel for ban messages. Leave empty to disable."))
            .with_subcommand(Command::new("addmessage")
                .with_usage("<message>")
                .with_description("Add ban message. $username and $server get replaced."))
            .with_subcommand(Command::new("removemessage")
                .with_description("Remove ban message."))
            .with_subcommand(Command::new("setimage")
                .with_description("Set image for ban message. Attach it to the command."))
            .with_subcommand(Command::new("unsetimage")
                .with_description("Unset image for ban message."))]
    }

    async fn initialize(&self, _bot: Arc<dyn Bot>) -> Result<(), BotError> {
        let migrated = self.migrate().await?;
        if migrated > 0 {
            info!("Migrated {} legacy ban message templates", migrated);
        }
        Ok(())
    }

    async fn handle_command(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let guild = ctx.require_guild()?;
        let sub = ctx.subcommand().map(str::to_lowercase);
        match sub.as_deref() {
            Some("channel") => self.set_channel(ctx, &guild).await,
            Some("addmessage") => self.add_message(ctx, &guild).await,
            Some("removemessage") => self.remove_message(ctx, &guild).await,
            Some("setimage") => self.set_image(ctx, &guild).await,
            Some("unsetimage") => self.unset_image(ctx, &guild).await,
            _ => Err(CommandError::InvalidArgs(String::new())),
        }
    }

    async fn on_event(&self, event: &Event, bot: &Arc<dyn Bot>) -> Result<(), BotError> {
        match event {
            Event::MemberBan { guild_id, user } => self.announce_ban(bot, *guild_id, user).await,
            _ => Ok(()),
        }
    }
}

fn render(template: &str, user: &User, server: &str) -> String {
    Template::new(template).safe_substitute(&[
        ("username", user.tag()),
        ("server", server.to_string()),
    ])
}

fn listing(templates: &[String]) -> String {
    let mut text = String::from("Choose a ban message to delete:\n\n");
    for (idx, template) in templates.iter().enumerate() {
        text.push_str(&format!("  {}. {}\n", idx, template));
    }
    text
}

/// Non-negative integer reply
fn parse_index(content: &str) -> Option<usize> {
    content.trim().parse::<u64>().ok().and_then(|n| usize::try_from(n).ok())
}

fn remove_at(templates: &mut Vec<String>, index: usize) -> Option<String> {
    (index < templates.len()).then(|| templates.remove(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::traits::Scope;
    use crate::infrastructure::database::SqliteStore;

    fn plugin() -> (BanMessage, Arc<dyn Store>, tempfile::TempDir) {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        let dir = tempfile::tempdir().unwrap();
        (BanMessage::new(store.clone(), dir.path()), store, dir)
    }

    #[test]
    fn test_render_uses_tag() {
        let user = User::new(1, "jack").with_discriminator("1142");
        assert_eq!(
            render("$username was banned from $server. $reason", &user, "Red"),
            "jack#1142 was banned from Red. $reason"
        );
    }

    #[test]
    fn test_listing() {
        let text = listing(&["a".to_string(), "b $server".to_string()]);
        assert_eq!(text, "Choose a ban message to delete:\n\n  0. a\n  1. b $server\n");
    }

    #[test]
    fn test_parse_index() {
        assert_eq!(parse_index(" 3 "), Some(3));
        assert_eq!(parse_index("0"), Some(0));
        assert_eq!(parse_index("-1"), None);
        assert_eq!(parse_index("one"), None);
    }

    #[test]
    fn test_append_then_remove_restores_list() {
        let original = vec!["a".to_string(), "b".to_string()];
        let mut templates = original.clone();
        templates.push("c".to_string());
        assert_eq!(remove_at(&mut templates, 2).as_deref(), Some("c"));
        assert_eq!(templates, original);

        assert!(remove_at(&mut templates, 2).is_none());
        assert_eq!(templates, original);
    }

    #[tokio::test]
    async fn test_migrates_legacy_template() {
        let (plugin, store, _dir) = plugin();
        let guild = GuildId(5);
        store
            .set(NAME, Scope::Guild(guild), LEGACY_TEMPLATE, Value::String("$username left".into()))
            .await
            .unwrap();

        assert_eq!(plugin.migrate().await.unwrap(), 1);
        assert_eq!(plugin.templates(guild).await.unwrap(), vec!["$username left"]);
        assert!(store.get(NAME, Scope::Guild(guild), LEGACY_TEMPLATE).await.unwrap().is_none());
        assert_eq!(plugin.migrate().await.unwrap(), 0);
    }
}
