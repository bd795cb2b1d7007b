//! Plugin manager - handles plugin lifecycle and event fan-out

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::application::errors::BotError;
use crate::domain::entities::{Event, UserId};
use crate::domain::traits::Bot;
use crate::plugins::trait_def::Plugin;

/// Manages all plugins for the bot
#[derive(Default)]
pub struct PluginManager {
    plugins: HashMap<String, Arc<dyn Plugin>>,
    /// Registration order, used for event delivery
    order: Vec<String>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin
    pub fn register<P: Plugin + 'static>(&mut self, plugin: P) -> Result<(), BotError> {
        self.register_arc(Arc::new(plugin))
    }

    pub fn register_arc(&mut self, plugin: Arc<dyn Plugin>) -> Result<(), BotError> {
        let name = plugin.name().to_string();

        if self.plugins.contains_key(&name) {
            return Err(BotError::Plugin(format!("Plugin '{}' already registered", name)));
        }

        info!("Registering plugin: {}", name);
        self.order.push(name.clone());
        self.plugins.insert(name, plugin);
        Ok(())
    }

    /// Unregister a plugin
    pub async fn unregister(&mut self, name: &str) -> Result<(), BotError> {
        match self.plugins.remove(name) {
            Some(plugin) => {
                self.order.retain(|n| n != name);
                plugin.cleanup().await;
                info!("Unregistered plugin: {}", name);
                Ok(())
            }
            None => Err(BotError::NotFound(format!("Plugin '{}'", name))),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(name).cloned()
    }

    /// Plugins in registration order
    pub fn plugins(&self) -> impl Iterator<Item = &Arc<dyn Plugin>> {
        self.order.iter().filter_map(|name| self.plugins.get(name))
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Initialize every plugin; a failing plugin is unloaded
    pub async fn initialize_all(&mut self, bot: Arc<dyn Bot>) {
        let mut failed = Vec::new();
        for plugin in self.plugins() {
            if let Err(e) = plugin.initialize(bot.clone()).await {
                error!("Plugin '{}' failed to initialize: {}", plugin.name(), e);
                failed.push(plugin.name().to_string());
            }
        }
        for name in failed {
            if let Err(e) = self.unregister(&name).await {
                warn!("{}", e);
            }
        }
    }

    /// Deliver an event to every plugin; errors are logged and swallowed
    pub async fn dispatch(&self, event: &Event, bot: &Arc<dyn Bot>) {
        for plugin in self.plugins() {
            if let Err(e) = plugin.on_event(event, bot).await {
                error!("Plugin '{}' failed on {}: {}", plugin.name(), event.kind(), e);
            }
        }
    }

    /// Stored data about `user`, keyed by plugin name
    pub async fn user_data(&self, user: UserId) -> Result<BTreeMap<String, Value>, BotError> {
        let mut data = BTreeMap::new();
        for plugin in self.plugins() {
            if let Some(value) = plugin.user_data(user).await? {
                data.insert(plugin.name().to_string(), value);
            }
        }
        Ok(data)
    }

    pub async fn delete_user_data(&self, user: UserId) -> Result<(), BotError> {
        for plugin in self.plugins() {
            plugin.delete_user_data(user).await?;
        }
        Ok(())
    }

    pub async fn cleanup_all(&self) {
        for plugin in self.plugins() {
            plugin.cleanup().await;
        }
    }

    /// List all registered plugins
    pub fn list_plugins(&self) -> Vec<PluginInfo> {
        self.plugins()
            .map(|plugin| PluginInfo {
                name: plugin.name().to_string(),
                description: plugin.description().to_string(),
                commands: plugin.commands().into_iter().map(|c| c.name).collect(),
            })
            .collect()
    }
}

/// Plugin information for listing
#[derive(Debug, Clone, serde::Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub description: String,
    pub commands: Vec<String>,
}
