//! Tier breakdown table and division/tier distance estimates

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::application::errors::StorageError;
use super::player::{Playlist, PlaylistKey};

/// Skill bounds `[low, high]` keyed by playlist id → tier → division
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierBreakdown(BTreeMap<u32, BTreeMap<u32, BTreeMap<u32, [f64; 2]>>>);

impl TierBreakdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, playlist: u32, tier: u32, division: u32, low: f64, high: f64) {
        self.0
            .entry(playlist)
            .or_default()
            .entry(tier)
            .or_default()
            .insert(division, [low, high]);
    }

    pub fn has_playlist(&self, key: PlaylistKey) -> bool {
        self.0.contains_key(&key.id())
    }

    pub fn bounds(&self, key: PlaylistKey, tier: u32, division: u32) -> Option<[f64; 2]> {
        self.0.get(&key.id())?.get(&tier)?.get(&division).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Brackets of one playlist in ascending tier/division order
    fn brackets(&self, key: PlaylistKey) -> impl Iterator<Item = (u32, u32, [f64; 2])> + '_ {
        self.0
            .get(&key.id())
            .into_iter()
            .flat_map(|tiers| tiers.iter())
            .flat_map(|(tier, divisions)| {
                divisions.iter().map(move |(division, bounds)| (*tier, *division, *bounds))
            })
    }

    /// `None` if the file doesn't exist yet
    pub async fn load(path: &Path) -> Result<Option<Self>, StorageError> {
        match tokio::fs::read(path).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, data).await?;
        Ok(())
    }
}

/// Current tier/division and the rating needed to move one division or
/// tier down or up. Down distances are ≤ -1, up distances ≥ +1, `None`
/// when unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TierEstimates {
    pub tier: u32,
    pub division: u32,
    pub div_down: Option<i64>,
    pub div_up: Option<i64>,
    pub tier_down: Option<i64>,
    pub tier_up: Option<i64>,
}

impl TierEstimates {
    pub fn new(playlist: &Playlist, breakdown: &TierBreakdown) -> Self {
        let (tier, division) = if playlist.tier == 0 {
            current_tier(playlist, breakdown)
        } else {
            (playlist.tier, playlist.division)
        };

        let key = playlist.key;
        let skill = playlist.skill;
        let ranked = tier != 0;
        let below_top = ranked && tier != playlist.tier_max;
        let distance = |division: u32, edge: usize| {
            let bounds = breakdown.bounds(key, tier, division);
            if bounds.is_none() {
                debug!("No breakdown for {} tier {} division {}", key, tier, division);
            }
            bounds.map(|b| (b[edge] - skill).ceil() as i64)
        };

        Self {
            tier,
            division,
            div_down: (ranked && !(tier == 1 && division == 0))
                .then(|| distance(division, 0))
                .flatten()
                .map(|d| d.min(-1)),
            div_up: below_top
                .then(|| distance(division, 1))
                .flatten()
                .map(|d| d.max(1)),
            tier_down: (ranked && tier != 1)
                .then(|| distance(0, 0))
                .flatten()
                .map(|d| d.min(-1)),
            tier_up: below_top
                .then(|| distance(3, 1))
                .flatten()
                .map(|d| d.max(1)),
        }
    }
}

/// Locates the bracket of an unranked-reported playlist from its skill
fn current_tier(playlist: &Playlist, breakdown: &TierBreakdown) -> (u32, u32) {
    let key = playlist.key;
    let skill = playlist.skill;
    if !breakdown.has_playlist(key) {
        return (playlist.tier, playlist.division);
    }
    if breakdown.bounds(key, 1, 1).is_some_and(|[low, _]| skill < low) {
        return (1, 0);
    }
    if breakdown
        .bounds(key, playlist.tier_max, 0)
        .is_some_and(|[_, high]| skill > high)
    {
        return (playlist.tier_max, 0);
    }
    breakdown
        .brackets(key)
        .find(|(_, _, [low, high])| *low <= skill && skill <= *high)
        .map(|(tier, division, _)| (tier, division))
        .unwrap_or((playlist.tier, playlist.division))
}
