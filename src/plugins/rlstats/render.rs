//! Stats card rendering
//!
//! Assets layout (under the configured assets dir):
//! `rank_bg.png`, `fonts/*.ttf`, `images/ranks/<tier>.png`,
//! `images/rewards/<level>_<ready>.png` and `images/rewards/bars/*.png`.

use ab_glyph::{FontVec, PxScale};
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, ImageEncoder, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use super::player::{Player, Playlist, PlaylistKey};
use super::tiers::{TierBreakdown, TierEstimates};
use crate::application::messaging::formatting::signed_or_na;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Can't load image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Can't load font {path}: {reason}")]
    Font { path: PathBuf, reason: String },

    #[error("Can't encode card: {0}")]
    Encode(image::ImageError),

    #[error("Render task failed: {0}")]
    Task(String),
}

/// Playlists shown on the card, in drawing order
pub const CARD_PLAYLISTS: [PlaylistKey; 4] = [
    PlaylistKey::SoloDuel,
    PlaylistKey::Doubles,
    PlaylistKey::SoloStandard,
    PlaylistKey::Standard,
];

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

const USERNAME: (i32, i32) = (960, 71);
const PLAYLIST_NAME: (i32, i32) = (243, 197);
const RANK_IMAGE: (i32, i32) = (153, 248);
const RANK_TEXT: (i32, i32) = (242, 453);
const MATCHES_PLAYED: (i32, i32) = (822, 160);
const WIN_STREAK: (i32, i32) = (492, 216);
const SKILL: (i32, i32) = (729, 272);
const GAIN: (i32, i32) = (715, 328);
const DIV_DOWN: (i32, i32) = (552, 384);
const DIV_UP: (i32, i32) = (727, 384);
const TIER_DOWN: (i32, i32) = (492, 446);
const TIER_UP: (i32, i32) = (667, 446);
const REWARDS: (i32, i32) = (914, 921);
const REWARD_IMAGE: (i32, i32) = (150, 886);
const REWARD_BAR_STEP: i32 = 83;
const REWARD_BARS: u32 = 10;
/// Last reward level has no bars
const MAX_REWARD_LEVEL: u32 = 7;

const RANK_SIZE: u32 = 179;
const TIER_SIZE: u32 = 49;

fn offset(key: PlaylistKey) -> (i32, i32) {
    match key {
        PlaylistKey::Doubles => (960, 0),
        PlaylistKey::SoloStandard => (0, 383),
        PlaylistKey::Standard => (960, 383),
        _ => (0, 0),
    }
}

fn add((x, y): (i32, i32), (dx, dy): (i32, i32)) -> (i32, i32) {
    (x + dx, y + dy)
}

fn at(key: PlaylistKey, coords: (i32, i32)) -> (i32, i32) {
    add(coords, offset(key))
}

struct Fonts {
    condensed_bold: FontVec,
    bold: FontVec,
    light: FontVec,
    regular: FontVec,
}

impl Fonts {
    fn load(dir: &Path) -> Result<Self, RenderError> {
        Ok(Self {
            condensed_bold: load_font(&dir.join("RobotoCondensedBold.ttf"))?,
            bold: load_font(&dir.join("RobotoBold.ttf"))?,
            light: load_font(&dir.join("RobotoLight.ttf"))?,
            regular: load_font(&dir.join("RobotoRegular.ttf"))?,
        })
    }
}

fn load_font(path: &Path) -> Result<FontVec, RenderError> {
    let data = std::fs::read(path).map_err(|e| RenderError::Font {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    FontVec::try_from_vec(data).map_err(|e| RenderError::Font {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Draws stats cards from the asset directory
#[derive(Debug, Clone)]
pub struct CardRenderer {
    assets: PathBuf,
    tracker: Option<PathBuf>,
}

impl CardRenderer {
    pub fn new(assets: impl Into<PathBuf>, tracker: Option<PathBuf>) -> Self {
        Self {
            assets: assets.into(),
            tracker,
        }
    }

    /// Renders on the blocking pool; returns PNG bytes
    pub async fn render(&self, player: Player, breakdown: Arc<TierBreakdown>) -> Result<Vec<u8>, RenderError> {
        let renderer = self.clone();
        tokio::task::spawn_blocking(move || renderer.render_blocking(&player, &breakdown))
            .await
            .map_err(|e| RenderError::Task(e.to_string()))?
    }

    pub fn render_blocking(&self, player: &Player, breakdown: &TierBreakdown) -> Result<Vec<u8>, RenderError> {
        let fonts = Fonts::load(&self.assets.join("fonts"))?;
        let mut card = Card {
            canvas: self.image("rank_bg.png")?.to_rgba8(),
            fonts: &fonts,
        };

        card.centered(USERNAME, &fonts.condensed_bold, 90.0, &player.user_name);

        for key in CARD_PLAYLISTS {
            let default = Playlist::new(key);
            let playlist = player.playlist(key).unwrap_or(&default);
            let estimates = TierEstimates::new(playlist, breakdown);
            self.draw_playlist(&mut card, player, playlist, &estimates)?;
        }

        let rewards = player.season_rewards;
        card.paste(
            self.image(&format!("images/rewards/{}_{}.png", rewards.level, u8::from(rewards.reward_ready)))?,
            REWARD_IMAGE,
        );
        if rewards.level != MAX_REWARD_LEVEL {
            let won = self.image(&format!("images/rewards/bars/Bar_{}_Win.png", rewards.level))?;
            let not_won = if rewards.reward_ready {
                self.image(&format!("images/rewards/bars/Bar_{}_NoWin.png", rewards.level))?
            } else {
                self.image("images/rewards/bars/BarRed.png")?
            };
            for win in 0..REWARD_BARS {
                let bar = if rewards.wins > win { &won } else { &not_won };
                card.paste_ref(bar, add(REWARDS, (win as i32 * REWARD_BAR_STEP, 0)));
            }
        }

        card.encode()
    }

    fn draw_playlist(
        &self,
        card: &mut Card<'_>,
        player: &Player,
        playlist: &Playlist,
        estimates: &TierEstimates,
    ) -> Result<(), RenderError> {
        let key = playlist.key;
        let fonts = card.fonts;

        card.centered(at(key, PLAYLIST_NAME), &fonts.regular, 74.0, &key.to_string());

        let rank = fit(self.image(&format!("images/ranks/{}.png", playlist.tier))?, RANK_SIZE);
        card.paste(rank, at(key, RANK_IMAGE));
        card.centered(at(key, RANK_TEXT), &fonts.light, 45.0, &playlist.rank_name());

        card.text(at(key, MATCHES_PLAYED), &fonts.bold, 45.0, &playlist.matches_played.to_string());

        let label = if playlist.win_streak < 0 { "Losing Streak:" } else { "Win Streak:" };
        let (label_width, _) = text_size(PxScale::from(45.0), &fonts.light, label);
        card.text(at(key, WIN_STREAK), &fonts.light, 45.0, label);
        card.text(
            add(at(key, WIN_STREAK), (11 + label_width as i32, 0)),
            &fonts.bold,
            45.0,
            &playlist.win_streak.to_string(),
        );

        card.text(at(key, SKILL), &fonts.bold, 45.0, &format_number(playlist.skill));

        let gain = self
            .tracked_gain(&player.user_id, key)
            .filter(|g| *g != 0.0)
            .map(format_gain)
            .unwrap_or_else(|| "N/A".to_string());
        card.text(at(key, GAIN), &fonts.bold, 45.0, &gain);

        card.text(at(key, DIV_DOWN), &fonts.bold, 45.0, &signed_or_na(estimates.div_down));
        card.text(at(key, DIV_UP), &fonts.bold, 45.0, &signed_or_na(estimates.div_up));

        let tier = estimates.tier;
        let below = if tier > 0 { tier - 1 } else { 0 };
        let above = if tier > 0 && tier < playlist.tier_max { tier + 1 } else { 0 };
        let icons = [
            (below, TIER_DOWN, estimates.tier_down),
            (above, TIER_UP, estimates.tier_up),
        ];
        for (icon_tier, coords, points) in icons {
            let icon = fit(self.image(&format!("images/ranks/{}.png", icon_tier))?, TIER_SIZE);
            let coords = at(key, coords);
            card.paste(icon, coords);
            card.text(
                add(coords, (TIER_SIZE as i32 + 11, -5)),
                &fonts.bold,
                45.0,
                &signed_or_na(points),
            );
        }
        Ok(())
    }

    fn image(&self, relative: &str) -> Result<DynamicImage, RenderError> {
        let path = self.assets.join(relative);
        image::open(&path).map_err(|source| RenderError::Image { path, source })
    }

    /// Rating change between the last two lines of the tracker file, if any
    fn tracked_gain(&self, user_id: &str, key: PlaylistKey) -> Option<f64> {
        let path = self.tracker.as_ref()?.join(format!("{}_{}.txt", user_id, key));
        let content = std::fs::read_to_string(path).ok()?;
        parse_gain(&content)
    }
}

struct Card<'f> {
    canvas: RgbaImage,
    fonts: &'f Fonts,
}

impl Card<'_> {
    fn text(&mut self, (x, y): (i32, i32), font: &FontVec, size: f32, text: &str) {
        draw_text_mut(&mut self.canvas, WHITE, x, y, PxScale::from(size), font, text);
    }

    fn centered(&mut self, center: (i32, i32), font: &FontVec, size: f32, text: &str) {
        let (w, h) = text_size(PxScale::from(size), font, text);
        self.text(add(center, (-(w as i32) / 2, -(h as i32) / 2)), font, size, text);
    }

    fn paste(&mut self, image: DynamicImage, coords: (i32, i32)) {
        self.paste_ref(&image, coords);
    }

    fn paste_ref(&mut self, image: &DynamicImage, (x, y): (i32, i32)) {
        imageops::overlay(&mut self.canvas, &image.to_rgba8(), i64::from(x), i64::from(y));
    }

    fn encode(self) -> Result<Vec<u8>, RenderError> {
        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes)
            .write_image(
                self.canvas.as_raw(),
                self.canvas.width(),
                self.canvas.height(),
                ColorType::Rgba8.into(),
            )
            .map_err(RenderError::Encode)?;
        Ok(bytes)
    }
}

/// Shrinks to fit a `size` square, keeping the aspect ratio
fn fit(image: DynamicImage, size: u32) -> DynamicImage {
    if image.width() > size || image.height() > size {
        image.resize(size, size, FilterType::Lanczos3)
    } else {
        image
    }
}

/// Lines are `;`-separated; the fourth field holds mu. A `Mu` header
/// as the previous line means there is nothing to compare yet.
fn parse_gain(content: &str) -> Option<f64> {
    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    let [.., before, after] = lines.as_slice() else {
        return None;
    };
    let before = before.split(';').nth(3)?.trim();
    let after = after.split(';').nth(3)?.trim();
    if before == "Mu" {
        return Some(0.0);
    }
    let before: f64 = before.parse().ok()?;
    let after: f64 = after.parse().ok()?;
    Some(((after - before) * 20.0).abs())
}

/// Up to three decimals with a decimal comma, e.g. `12,5`
fn format_gain(gain: f64) -> String {
    let text = format!("{:.3}", gain);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    text.replace('.', ",")
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::rlstats::player::Platform;

    #[test]
    fn test_parse_gain() {
        let content = "Date;Playlist;Tier;Mu\n2018-01-01;11;15;37.5\n2018-01-02;11;15;38.125\n";
        assert_eq!(parse_gain(content), Some(12.5));
        assert_eq!(parse_gain("Date;Playlist;Tier;Mu\n2018-01-01;11;15;37.5\n"), Some(0.0));
        assert_eq!(parse_gain("only one line"), None);
        assert_eq!(parse_gain("a;b;c;x\na;b;c;y"), None);
    }

    #[test]
    fn test_format_gain() {
        assert_eq!(format_gain(12.5), "12,5");
        assert_eq!(format_gain(3.0), "3");
        assert_eq!(format_gain(0.12345), "0,123");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1180.0), "1180");
        assert_eq!(format_number(600.5), "600.5");
    }

    #[test]
    fn test_offsets() {
        assert_eq!(at(PlaylistKey::Standard, SKILL), (1689, 655));
        assert_eq!(at(PlaylistKey::SoloDuel, SKILL), SKILL);
    }

    #[test]
    fn test_missing_assets() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = CardRenderer::new(dir.path(), None);
        let player = Player::from_api(
            Platform::Steam,
            serde_json::from_value(serde_json::json!({"user_name": "jack"})).unwrap(),
        );
        let err = renderer.render_blocking(&player, &TierBreakdown::new()).unwrap_err();
        assert!(matches!(err, RenderError::Font { .. }));
    }
}
