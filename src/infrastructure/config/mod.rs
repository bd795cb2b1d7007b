//! Configuration management

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use crate::application::errors::ConfigError;

/// Bot configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub bot: BotConfig,
    pub security: SecurityConfig,
    pub storage: StorageConfig,
    pub adapters: AdaptersConfig,
    pub plugins: PluginsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BotConfig {
    pub name: String,
    pub prefix: String,
    /// User ids allowed to run owner-only commands
    pub owners: Vec<u64>,
    pub data_dir: PathBuf,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "guild-cogs".to_string(),
            prefix: "!".to_string(),
            owners: Vec::new(),
            data_dir: PathBuf::from("./data"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct SecurityConfig {
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_requests: u32,
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 20,
            window_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Defaults to `settings.db` / `settings.json` inside the data dir
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AdaptersConfig {
    pub discord: Option<DiscordConfig>,
    pub console: Option<ConsoleConfig>,
}

impl Default for AdaptersConfig {
    fn default() -> Self {
        Self {
            discord: Some(DiscordConfig::default()),
            console: Some(ConsoleConfig { enabled: true }),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DiscordConfig {
    pub enabled: bool,
    pub token: Option<String>,
    pub api_base: String,
    /// Overrides the gateway url reported by the API
    pub gateway_url: Option<String>,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            token: None,
            api_base: "https://discord.com/api/v10".to_string(),
            gateway_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct ConsoleConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PluginsConfig {
    pub enabled: Vec<String>,
    pub rlstats: RlStatsConfig,
    pub kernel: KernelConfig,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            enabled: ["banmessage", "nitrorole", "rlstats", "kernel"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rlstats: RlStatsConfig::default(),
            kernel: KernelConfig::default(),
        }
    }
}

impl PluginsConfig {
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.iter().any(|p| p == name)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RlStatsConfig {
    pub api_base: String,
    pub steam_base: String,
    pub breakdown_url: String,
    /// Fonts and images used by the stats card
    pub assets_dir: PathBuf,
    /// Optional directory of skill-change files written by an external tracker
    pub tracker_dir: Option<PathBuf>,
    /// Initial API token; `rlset token` overrides it
    pub token: Option<String>,
}

impl Default for RlStatsConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.rocketleague.com".to_string(),
            steam_base: "https://steamcommunity.com".to_string(),
            breakdown_url: "http://rltracker.pro/tier_breakdown/get_division_stats".to_string(),
            assets_dir: PathBuf::from("./assets/rlstats"),
            tracker_dir: None,
            token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct KernelConfig {
    pub bind: SocketAddr,
    /// Where connection files are written; defaults to the system temp dir
    pub runtime_dir: Option<PathBuf>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
            runtime_dir: None,
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))
    }

    pub fn load_env() -> Self {
        let mut config = Config::default();
        config.apply_env();
        config
    }

    /// Environment variables override file values
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("DISCORD_TOKEN") {
            self.set_discord_token(token);
        }

        if let Ok(prefix) = std::env::var("BOT_PREFIX") {
            self.bot.prefix = prefix;
        }

        if let Ok(token) = std::env::var("RLSTATS_TOKEN") {
            self.plugins.rlstats.token = Some(token);
        }

        if let Ok(dir) = std::env::var("GUILD_COGS_DATA") {
            self.bot.data_dir = PathBuf::from(dir);
        }
    }

    pub fn set_discord_token(&mut self, token: String) {
        let discord = self.adapters.discord.get_or_insert_with(DiscordConfig::default);
        discord.token = Some(token);
        discord.enabled = true;
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.prefix.trim().is_empty() {
            return Err(ConfigError::InvalidValue("bot.prefix must not be empty".to_string()));
        }
        if let Some(discord) = &self.adapters.discord {
            if discord.enabled && discord.token.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::MissingField("adapters.discord.token".to_string()));
            }
        }
        Ok(())
    }

    pub fn storage_path(&self) -> PathBuf {
        match (&self.storage.path, self.storage.backend) {
            (Some(path), _) => path.clone(),
            (None, StorageBackend::Sqlite) => self.bot.data_dir.join("settings.db"),
            (None, StorageBackend::Json) => self.bot.data_dir.join("settings.json"),
        }
    }

    pub fn discord_enabled(&self) -> bool {
        self.adapters.discord.as_ref().is_some_and(|d| d.enabled)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
