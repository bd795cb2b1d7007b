//! Plugins compiled into the bot
//!
//! Every plugin owns a settings namespace named after it and registers its
//! text commands with the host.

pub mod manager;
pub mod trait_def;

pub mod banmessage;
pub mod kernel;
pub mod nitrorole;
pub mod rlstats;

use std::sync::Arc;
use tracing::info;

use crate::application::errors::BotError;
use crate::domain::traits::Store;
use crate::infrastructure::config::Config;

pub use manager::PluginManager;
pub use trait_def::Plugin;

/// Names accepted in `plugins.enabled`
pub const AVAILABLE: [&str; 4] = [banmessage::NAME, nitrorole::NAME, rlstats::NAME, kernel::NAME];

/// Builds a manager holding the plugins enabled in `config`
pub fn from_config(config: &Config, store: Arc<dyn Store>) -> Result<PluginManager, BotError> {
    let data_dir = &config.bot.data_dir;
    let mut manager = PluginManager::new();

    for name in &config.plugins.enabled {
        match name.as_str() {
            banmessage::NAME => manager.register(banmessage::BanMessage::new(store.clone(), data_dir))?,
            nitrorole::NAME => manager.register(nitrorole::NitroRole::new(store.clone()))?,
            rlstats::NAME => manager.register(rlstats::RlStats::new(
                store.clone(),
                data_dir,
                &config.plugins.rlstats,
            ))?,
            kernel::NAME => manager.register(kernel::Kernel::new(
                store.clone(),
                data_dir,
                &config.plugins.kernel,
            ))?,
            other => {
                return Err(BotError::Plugin(format!(
                    "Unknown plugin '{}', available: {}",
                    other,
                    AVAILABLE.join(", ")
                )))
            }
        }
    }

    info!("Loaded {} plugins", manager.len());
    Ok(manager)
}
