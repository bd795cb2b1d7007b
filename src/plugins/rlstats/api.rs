//! Stats API, Steam profile lookup and tier breakdown download

use once_cell::sync::Lazy;
use regex_lite::Regex;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::application::errors::{BotError, StorageError};
use crate::infrastructure::config::RlStatsConfig;
use super::player::{ApiPlayer, Platform, Player};
use super::tiers::TierBreakdown;

/// Highest tier id served by the breakdown endpoint
const BREAKDOWN_TIERS: u32 = 19;

const STEAM_NOT_FOUND: &str = "The specified profile could not be found.";

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Player with provided username could not be found.")]
    PlayerNotFound,

    #[error("RL API threw server error (status code: {status}) during request: {body}")]
    Server { status: u16, body: String },

    #[error("RL API threw client error (status code: {status}) during request: {detail}")]
    Client { status: u16, detail: String },

    #[error("Steam profile lookup failed: {0}")]
    Steam(String),

    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Parse(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Bot(#[from] BotError),
}

static STEAM_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]{2,32}$").expect("valid pattern"));
static PS4_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_-]{2,15}$").expect("valid pattern"));
static XBOX_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z](?:[a-zA-Z0-9_-]+ ?)+$").expect("valid pattern"));

static STEAM_ERROR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<error>\s*(?:<!\[CDATA\[)?(.*?)(?:\]\]>)?\s*</error>").expect("valid pattern")
});
static STEAM_ID64: Lazy<Regex> = Lazy::new(|| Regex::new(r"<steamID64>\s*(\d+)\s*</steamID64>").expect("valid pattern"));

/// Whether `name` can be a username on `platform`
pub fn name_allowed(platform: Platform, name: &str) -> bool {
    match platform {
        Platform::Steam => STEAM_NAME.is_match(name),
        Platform::Ps4 => PS4_NAME.is_match(name),
        Platform::XboxOne => name.chars().count() <= 16 && XBOX_NAME.is_match(name),
    }
}

#[derive(Deserialize)]
struct BreakdownRow {
    playlist_id: u32,
    division: u32,
    from: f64,
    to: f64,
}

#[derive(Clone)]
pub struct StatsClient {
    http: Client,
    api_base: String,
    steam_base: String,
    breakdown_url: String,
}

impl StatsClient {
    pub fn new(config: &RlStatsConfig) -> Self {
        Self::with_urls(&config.api_base, &config.steam_base, &config.breakdown_url)
    }

    pub fn with_urls(api_base: &str, steam_base: &str, breakdown_url: &str) -> Self {
        Self {
            http: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            steam_base: steam_base.trim_end_matches('/').to_string(),
            breakdown_url: breakdown_url.to_string(),
        }
    }

    fn url(base: &str, segments: &[&str]) -> Result<Url, StatsError> {
        let mut url = Url::parse(base).map_err(|e| StatsError::Parse(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| StatsError::Parse(format!("{} cannot be a base", base)))?
            .extend(segments);
        Ok(url)
    }

    /// Stats of one account
    pub async fn player(&self, platform: Platform, id: &str, token: &str) -> Result<Player, StatsError> {
        let url = Self::url(
            &self.api_base,
            &["api", "v1", platform.api_name(), "playerskills", id, ""],
        )?;
        let response = self
            .http
            .get(url)
            .header("Authorization", format!("Token {}", token))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status.is_server_error() {
            return Err(StatsError::Server {
                status: status.as_u16(),
                body,
            });
        }
        if status.is_client_error() {
            let detail = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(body);
            if status == StatusCode::BAD_REQUEST && detail.contains("not found") {
                return Err(StatsError::PlayerNotFound);
            }
            return Err(StatsError::Client {
                status: status.as_u16(),
                detail,
            });
        }

        let players: Vec<ApiPlayer> =
            serde_json::from_str(&body).map_err(|e| StatsError::Parse(e.to_string()))?;
        players
            .into_iter()
            .next()
            .map(|raw| Player::from_api(platform, raw))
            .ok_or(StatsError::PlayerNotFound)
    }

    /// 64-bit ids of the Steam profiles matching a profile id or custom url
    pub async fn steam_ids(&self, name: &str) -> Result<Vec<String>, StatsError> {
        let mut ids = Vec::new();
        for search_type in ["profiles", "id"] {
            let mut url = Self::url(&self.steam_base, &[search_type, name, ""])?;
            url.set_query(Some("xml=1"));
            let xml = self
                .http
                .get(url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| StatsError::Steam(e.to_string()))?
                .text()
                .await
                .map_err(|e| StatsError::Steam(e.to_string()))?;

            if let Some(error) = STEAM_ERROR.captures(&xml) {
                let message = error.get(1).map_or("", |m| m.as_str());
                if message != STEAM_NOT_FOUND {
                    debug!("Steam threw error while searching profile using '{}' method: {}", search_type, message);
                }
                continue;
            }
            if let Some(id) = STEAM_ID64.captures(&xml).and_then(|c| c.get(1)) {
                ids.push(id.as_str().to_string());
            }
        }
        Ok(ids)
    }

    /// Every account named `name` on every platform whose naming rules allow it
    pub async fn search(&self, name: &str, token: &str) -> Result<Vec<Player>, StatsError> {
        let mut players: Vec<Player> = Vec::new();
        for platform in Platform::ALL {
            if !name_allowed(platform, name) {
                debug!("'{}' is not a valid {} name", name, platform);
                continue;
            }
            let ids = match platform {
                Platform::Steam => self.steam_ids(name).await?,
                _ => vec![name.to_string()],
            };
            for id in ids {
                match self.player(platform, &id, token).await {
                    Ok(player) => {
                        if !players.contains(&player) {
                            players.push(player);
                        }
                    }
                    Err(StatsError::PlayerNotFound) => {
                        debug!("No {} player with id {}", platform, id);
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(players)
    }

    /// Downloads the whole breakdown table, one request per tier
    pub async fn tier_breakdown(&self) -> Result<TierBreakdown, StatsError> {
        let mut breakdown = TierBreakdown::new();
        for tier in 1..=BREAKDOWN_TIERS {
            let rows: Vec<BreakdownRow> = self
                .http
                .get(&self.breakdown_url)
                .query(&[("tier_id", tier)])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            for row in rows {
                breakdown.insert(row.playlist_id, tier, row.division, row.from, row.to);
            }
        }
        Ok(breakdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_patterns() {
        assert!(name_allowed(Platform::Steam, "jack_1"));
        assert!(!name_allowed(Platform::Steam, "j"));
        assert!(!name_allowed(Platform::Steam, "jack one"));

        assert!(name_allowed(Platform::Ps4, "Jack-1"));
        assert!(!name_allowed(Platform::Ps4, "1jack"));
        assert!(!name_allowed(Platform::Ps4, "ja"));

        assert!(name_allowed(Platform::XboxOne, "Jack One"));
        assert!(name_allowed(Platform::XboxOne, "Jack One Two"));
        assert!(!name_allowed(Platform::XboxOne, "Jack  One"));
        assert!(!name_allowed(Platform::XboxOne, "1Jack"));
        assert!(!name_allowed(Platform::XboxOne, "Jackjackjackjackj"));
        assert!(name_allowed(Platform::XboxOne, "Jackjackjackjack"));
    }

    #[test]
    fn test_steam_xml() {
        let found = "<?xml version=\"1.0\"?><profile><steamID64>76561198000000000</steamID64></profile>";
        assert!(STEAM_ERROR.captures(found).is_none());
        assert_eq!(&STEAM_ID64.captures(found).unwrap()[1], "76561198000000000");

        let missing = "<response><error><![CDATA[The specified profile could not be found.]]></error></response>";
        assert_eq!(&STEAM_ERROR.captures(missing).unwrap()[1], STEAM_NOT_FOUND);
    }
}
