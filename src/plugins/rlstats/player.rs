//! Player, playlist and rank model as returned by the stats API

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub const RANKS: [&str; 20] = [
    "Unranked",
    "Bronze I",
    "Bronze II",
    "Bronze III",
    "Silver I",
    "Silver II",
    "Silver III",
    "Gold I",
    "Gold II",
    "Gold III",
    "Platinum I",
    "Platinum II",
    "Platinum III",
    "Diamond I",
    "Diamond II",
    "Diamond III",
    "Champion I",
    "Champion II",
    "Champion III",
    "Grand Champion",
];

pub const DIVISIONS: [&str; 4] = ["I", "II", "III", "IV"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Steam,
    Ps4,
    XboxOne,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Steam, Platform::Ps4, Platform::XboxOne];

    /// Path segment used by the stats API
    pub fn api_name(self) -> &'static str {
        match self {
            Platform::Steam => "steam",
            Platform::Ps4 => "ps4",
            Platform::XboxOne => "xboxone",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Platform::Steam => "Steam",
            Platform::Ps4 => "Playstation 4",
            Platform::XboxOne => "Xbox One",
        })
    }
}

/// Ranked playlist; ids the bot doesn't know are kept as `Other`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum PlaylistKey {
    SoloDuel,
    Doubles,
    SoloStandard,
    Standard,
    Hoops,
    Rumble,
    Dropshot,
    SnowDay,
    Other(u32),
}

impl PlaylistKey {
    pub fn id(self) -> u32 {
        match self {
            PlaylistKey::SoloDuel => 10,
            PlaylistKey::Doubles => 11,
            PlaylistKey::SoloStandard => 12,
            PlaylistKey::Standard => 13,
            PlaylistKey::Hoops => 27,
            PlaylistKey::Rumble => 28,
            PlaylistKey::Dropshot => 29,
            PlaylistKey::SnowDay => 30,
            PlaylistKey::Other(id) => id,
        }
    }
}

impl From<u32> for PlaylistKey {
    fn from(id: u32) -> Self {
        match id {
            10 => PlaylistKey::SoloDuel,
            11 => PlaylistKey::Doubles,
            12 => PlaylistKey::SoloStandard,
            13 => PlaylistKey::Standard,
            27 => PlaylistKey::Hoops,
            28 => PlaylistKey::Rumble,
            29 => PlaylistKey::Dropshot,
            30 => PlaylistKey::SnowDay,
            other => PlaylistKey::Other(other),
        }
    }
}

impl From<PlaylistKey> for u32 {
    fn from(key: PlaylistKey) -> Self {
        key.id()
    }
}

impl fmt::Display for PlaylistKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaylistKey::SoloDuel => f.write_str("Solo Duel"),
            PlaylistKey::Doubles => f.write_str("Doubles"),
            PlaylistKey::SoloStandard => f.write_str("Solo Standard"),
            PlaylistKey::Standard => f.write_str("Standard"),
            PlaylistKey::Hoops => f.write_str("Hoops"),
            PlaylistKey::Rumble => f.write_str("Rumble"),
            PlaylistKey::Dropshot => f.write_str("Dropshot"),
            PlaylistKey::SnowDay => f.write_str("Snow Day"),
            PlaylistKey::Other(id) => write!(f, "Playlist {}", id),
        }
    }
}

const DEFAULT_MU: f64 = 25.0;
const DEFAULT_SIGMA: f64 = 8.333;
const DEFAULT_TIER_MAX: u32 = 19;

/// Skill entry of one playlist
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawPlaylist")]
pub struct Playlist {
    pub key: PlaylistKey,
    pub tier: u32,
    pub division: u32,
    pub mu: f64,
    pub skill: f64,
    pub sigma: f64,
    pub win_streak: i64,
    pub matches_played: u64,
    pub tier_max: u32,
}

impl Playlist {
    /// Unranked placeholder for a playlist the player never played
    pub fn new(key: PlaylistKey) -> Self {
        Self {
            key,
            tier: 0,
            division: 0,
            mu: DEFAULT_MU,
            skill: DEFAULT_MU * 20.0 + 100.0,
            sigma: DEFAULT_SIGMA,
            win_streak: 0,
            matches_played: 0,
            tier_max: DEFAULT_TIER_MAX,
        }
    }

    /// e.g. `Diamond II Div III`; bare rank name when unranked or at the top
    pub fn rank_name(&self) -> String {
        let Some(rank) = RANKS.get(self.tier as usize) else {
            return "Unknown".to_string();
        };
        if self.tier == 0 || self.tier == self.tier_max {
            return rank.to_string();
        }
        match DIVISIONS.get(self.division as usize) {
            Some(division) => format!("{} Div {}", rank, division),
            None => "Unknown".to_string(),
        }
    }
}

#[derive(Deserialize)]
struct RawPlaylist {
    playlist: u32,
    tier: Option<u32>,
    division: Option<u32>,
    mu: Option<f64>,
    skill: Option<f64>,
    sigma: Option<f64>,
    win_streak: Option<i64>,
    matches_played: Option<u64>,
    tier_max: Option<u32>,
}

impl From<RawPlaylist> for Playlist {
    fn from(raw: RawPlaylist) -> Self {
        let mu = raw.mu.unwrap_or(DEFAULT_MU);
        Self {
            key: PlaylistKey::from(raw.playlist),
            tier: raw.tier.unwrap_or(0),
            division: raw.division.unwrap_or(0),
            mu,
            skill: raw.skill.unwrap_or(mu * 20.0 + 100.0),
            sigma: raw.sigma.unwrap_or(DEFAULT_SIGMA),
            win_streak: raw.win_streak.unwrap_or(0),
            matches_played: raw.matches_played.unwrap_or(0),
            tier_max: raw.tier_max.unwrap_or(DEFAULT_TIER_MAX),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeasonRewards {
    pub level: u32,
    pub wins: u32,
    /// Next reward level is within reach of the player's highest tier
    pub reward_ready: bool,
}

impl SeasonRewards {
    pub fn new(level: u32, wins: u32, highest_tier: u32) -> Self {
        Self {
            level,
            wins,
            reward_ready: level == 0 || level * 3 < highest_tier,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    pub platform: Platform,
    pub user_name: String,
    pub user_id: String,
    pub playlists: BTreeMap<PlaylistKey, Playlist>,
    pub highest_tier: u32,
    pub season_rewards: SeasonRewards,
}

impl PartialEq for Player {
    fn eq(&self, other: &Self) -> bool {
        self.platform == other.platform && self.user_id == other.user_id
    }
}

impl Player {
    pub fn from_api(platform: Platform, raw: ApiPlayer) -> Self {
        let playlists: BTreeMap<PlaylistKey, Playlist> = raw
            .player_skills
            .into_iter()
            .map(|p| (p.key, p))
            .collect();
        let highest_tier = playlists.values().map(|p| p.tier).max().unwrap_or(0);
        let rewards = raw.season_rewards.unwrap_or_default();
        let user_id = match raw.user_id {
            Some(Value::String(id)) => id,
            Some(Value::Number(id)) => id.to_string(),
            _ => raw.user_name.clone(),
        };

        Self {
            platform,
            user_name: raw.user_name,
            user_id,
            playlists,
            highest_tier,
            season_rewards: SeasonRewards::new(
                rewards.level.unwrap_or(0),
                rewards.wins.unwrap_or(0),
                highest_tier,
            ),
        }
    }

    pub fn playlist(&self, key: PlaylistKey) -> Option<&Playlist> {
        self.playlists.get(&key)
    }

    /// Adds unranked entries for the given playlists if missing
    pub fn ensure_playlists(&mut self, keys: &[PlaylistKey]) {
        for key in keys {
            self.playlists.entry(*key).or_insert_with(|| Playlist::new(*key));
        }
    }
}

/// One element of the `playerskills` response
#[derive(Debug, Clone, Deserialize)]
pub struct ApiPlayer {
    pub user_name: String,
    #[serde(default)]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub player_skills: Vec<Playlist>,
    #[serde(default)]
    pub season_rewards: Option<ApiRewards>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiRewards {
    pub level: Option<u32>,
    pub wins: Option<u32>,
}
