//! Plugin trait definitions

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::application::errors::{BotError, CommandError};
use crate::application::messaging::CommandContext;
use crate::domain::entities::{Command, Event, UserId};
use crate::domain::traits::Bot;

/// Core plugin trait that all plugins must implement
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique identifier for the plugin, also its settings namespace
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// Text commands owned by this plugin
    fn commands(&self) -> Vec<Command> {
        Vec::new()
    }

    /// Called once before the first event is delivered
    async fn initialize(&self, _bot: Arc<dyn Bot>) -> Result<(), BotError> {
        Ok(())
    }

    /// Runs one of the commands returned by [`Plugin::commands`]
    async fn handle_command(&self, ctx: &CommandContext) -> Result<(), CommandError>;

    /// Host events; the default ignores them
    async fn on_event(&self, _event: &Event, _bot: &Arc<dyn Bot>) -> Result<(), BotError> {
        Ok(())
    }

    /// Optional: Cleanup resources when plugin is unloaded
    async fn cleanup(&self) {}

    /// Personal data kept about a user, if any
    async fn user_data(&self, _user: UserId) -> Result<Option<Value>, BotError> {
        Ok(None)
    }

    /// Forget everything stored about a user
    async fn delete_user_data(&self, _user: UserId) -> Result<(), BotError> {
        Ok(())
    }
}
