//! Account lookup, linking and API error replies against a mock API

mod common;

use image::{Rgba, RgbaImage};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::Harness;
use guild_cogs::application::messaging::context::KEYCAPS;
use guild_cogs::domain::entities::{Event, UserId};
use guild_cogs::domain::traits::Store;
use guild_cogs::infrastructure::adapters::console::{CONSOLE_CHANNEL, CONSOLE_USER};
use guild_cogs::infrastructure::database::SqliteStore;
use guild_cogs::infrastructure::config::RlStatsConfig;
use guild_cogs::plugins::rlstats::{self, ConnectedAccount, Platform, RlStats, TierBreakdown};
use guild_cogs::plugins::Plugin;

const TOKEN: &str = "secret";
const STEAM_ID: &str = "76561198000000001";

const STEAM_MISSING: &str =
    "<?xml version=\"1.0\"?><response><error><![CDATA[The specified profile could not be found.]]></error></response>";

fn config(server: &MockServer, token: Option<&str>) -> RlStatsConfig {
    RlStatsConfig {
        api_base: server.uri(),
        steam_base: server.uri(),
        breakdown_url: format!("{}/tier_breakdown/get_division_stats", server.uri()),
        assets_dir: "/nonexistent/assets".into(),
        tracker_dir: None,
        token: token.map(str::to_string),
    }
}

async fn harness(server: &MockServer, token: Option<&str>) -> (Harness, Arc<RlStats>) {
    harness_with(config(server, token), tempfile::tempdir().unwrap()).await
}

async fn harness_with(config: RlStatsConfig, data: TempDir) -> (Harness, Arc<RlStats>) {
    let mut plugin = None;
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    let harness = Harness::with_store(store, data, |store, dir| {
        let rl = Arc::new(RlStats::new(store, dir, &config));
        plugin = Some(rl.clone());
        vec![rl as Arc<dyn Plugin>]
    })
    .await;
    (harness, plugin.unwrap())
}

/// Plain-colour card assets with the fixture font under every font name
fn write_assets(dir: &Path) {
    let fonts = dir.join("fonts");
    let ranks = dir.join("images/ranks");
    let bars = dir.join("images/rewards/bars");
    for d in [&fonts, &ranks, &bars] {
        std::fs::create_dir_all(d).unwrap();
    }

    let font = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/DejaVuSansMono.ttf");
    for name in ["RobotoCondensedBold", "RobotoBold", "RobotoLight", "RobotoRegular"] {
        std::fs::copy(&font, fonts.join(format!("{}.ttf", name))).unwrap();
    }

    let solid = |w, h, shade| RgbaImage::from_pixel(w, h, Rgba([shade, shade, 90, 255]));
    solid(1920, 1080, 20).save(dir.join("rank_bg.png")).unwrap();
    for tier in 0..=22u8 {
        solid(200, 200, tier * 10).save(ranks.join(format!("{}.png", tier))).unwrap();
    }
    for level in 0..=7u8 {
        for ready in 0..=1 {
            solid(120, 120, level * 30)
                .save(dir.join(format!("images/rewards/{}_{}.png", level, ready)))
                .unwrap();
        }
        solid(70, 20, 200).save(bars.join(format!("Bar_{}_Win.png", level))).unwrap();
        solid(70, 20, 120).save(bars.join(format!("Bar_{}_NoWin.png", level))).unwrap();
    }
    solid(70, 20, 60).save(bars.join("BarRed.png")).unwrap();
}

fn skills(name: &str) -> serde_json::Value {
    json!([{
        "user_name": name,
        "player_skills": [
            {"playlist": 11, "tier": 12, "division": 2, "skill": 1050, "matches_played": 300}
        ],
        "season_rewards": {"level": 3, "wins": 4}
    }])
}

async fn steam_missing(server: &MockServer, name: &str) {
    for kind in ["profiles", "id"] {
        Mock::given(method("GET"))
            .and(path(format!("/{}/{}/", kind, name)))
            .respond_with(ResponseTemplate::new(200).set_body_string(STEAM_MISSING))
            .mount(server)
            .await;
    }
}

async fn player(server: &MockServer, platform: &str, id: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/{}/playerskills/{}/", platform, id)))
        .and(header("Authorization", "Token secret"))
        .respond_with(response)
        .mount(server)
        .await;
}

fn not_found() -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({"detail": "Player not found"}))
}

#[tokio::test]
async fn test_commands_need_a_token() {
    let server = MockServer::start().await;
    let (h, _) = harness(&server, None).await;
    h.say("!rlstats jack").await;
    h.say("!rlconnect jack").await;
    let expected = "`This cog wasn't configured properly. If you're the owner, setup the cog using !rlset`";
    assert_eq!(h.replies(), vec![expected, expected]);
}

#[tokio::test]
async fn test_token_is_only_accepted_in_dm() {
    let server = MockServer::start().await;
    let (h, plugin) = harness(&server, None).await;

    let message = h.message("!rlset token abc");
    let id = message.id;
    h.send(message).await;
    assert_eq!(h.console.deleted(), vec![id]);
    assert_eq!(
        h.replies(),
        vec!["You can't set token from server channel! Use this command in PM instead."]
    );
    assert_eq!(plugin.token().await.unwrap(), None);

    h.send(h.direct_message("!rlset token abc")).await;
    assert_eq!(plugin.token().await.unwrap().as_deref(), Some("abc"));
}

#[tokio::test]
async fn test_connect_single_account() {
    let server = MockServer::start().await;
    steam_missing(&server, "Jack_1").await;
    player(&server, "ps4", "Jack_1", ResponseTemplate::new(200).set_body_json(skills("Jack_1"))).await;
    player(&server, "xboxone", "Jack_1", not_found()).await;

    let (h, plugin) = harness(&server, Some(TOKEN)).await;
    h.say("!rlconnect Jack_1").await;

    assert_eq!(
        h.replies(),
        vec!["You successfully connected your Playstation 4 account with Discord!"]
    );
    assert_eq!(
        plugin.account(CONSOLE_USER).await.unwrap(),
        Some(ConnectedAccount { platform: Platform::Ps4, id: "Jack_1".to_string() })
    );
    assert_eq!(
        plugin.user_data(CONSOLE_USER).await.unwrap(),
        Some(json!({"platform": "ps4", "id": "Jack_1"}))
    );
}

#[tokio::test]
async fn test_connect_picks_from_menu() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/profiles/jack/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(STEAM_MISSING))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/id/jack/"))
        .and(query_param("xml", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "<?xml version=\"1.0\"?><profile><steamID64>{}</steamID64></profile>",
            STEAM_ID
        )))
        .mount(&server)
        .await;
    let mut steam = skills("jack");
    steam[0]["user_id"] = json!(STEAM_ID);
    player(&server, "steam", STEAM_ID, ResponseTemplate::new(200).set_body_json(steam)).await;
    player(&server, "ps4", "jack", ResponseTemplate::new(200).set_body_json(skills("jack"))).await;
    player(&server, "xboxone", "jack", not_found()).await;

    let (h, plugin) = harness(&server, Some(TOKEN)).await;
    let task = h.spawn("!rlconnect jack");
    h.wait_for_prompt().await;

    let menu = h.console.sent_to(CONSOLE_CHANNEL)[0].clone();
    let embed = menu.message.embed.clone().unwrap();
    assert_eq!(embed.title.as_deref(), Some("There are multiple accounts with provided name:"));
    assert_eq!(
        embed.description.as_deref(),
        Some("\n1. Steam account with username: jack\n2. Playstation 4 account with username: jack")
    );

    h.emit(Event::ReactionAdd {
        message_id: menu.id,
        user_id: CONSOLE_USER,
        emoji: KEYCAPS[0].to_string(),
    })
    .await;
    task.await.unwrap();

    assert!(h.console.deleted().contains(&menu.id));
    assert_eq!(
        h.replies().last().unwrap(),
        "You successfully connected your Steam account with Discord!"
    );
    assert_eq!(
        plugin.account(CONSOLE_USER).await.unwrap(),
        Some(ConnectedAccount { platform: Platform::Steam, id: STEAM_ID.to_string() })
    );
}

#[tokio::test]
async fn test_reactions_from_others_are_ignored() {
    let server = MockServer::start().await;
    steam_missing(&server, "jack").await;
    player(&server, "ps4", "jack", ResponseTemplate::new(200).set_body_json(skills("jack"))).await;
    player(&server, "xboxone", "jack", ResponseTemplate::new(200).set_body_json(skills("jack"))).await;

    let (h, plugin) = harness(&server, Some(TOKEN)).await;
    let task = h.spawn("!rlconnect jack");
    h.wait_for_prompt().await;
    let menu = h.console.sent_to(CONSOLE_CHANNEL)[0].id;

    h.emit(Event::ReactionAdd {
        message_id: menu,
        user_id: UserId(777),
        emoji: KEYCAPS[1].to_string(),
    })
    .await;
    assert_eq!(h.interactions.pending(), 1);

    h.emit(Event::ReactionAdd {
        message_id: menu,
        user_id: CONSOLE_USER,
        emoji: KEYCAPS[1].to_string(),
    })
    .await;
    task.await.unwrap();

    assert_eq!(
        plugin.account(CONSOLE_USER).await.unwrap().map(|a| a.platform),
        Some(Platform::XboxOne)
    );
}

#[tokio::test]
async fn test_unknown_player() {
    let server = MockServer::start().await;
    steam_missing(&server, "nobody").await;
    player(&server, "ps4", "nobody", not_found()).await;
    player(&server, "xboxone", "nobody", not_found()).await;

    let (h, plugin) = harness(&server, Some(TOKEN)).await;
    h.say("!rlstats nobody").await;
    h.say("!rlconnect nobody").await;
    assert_eq!(
        h.replies(),
        vec![
            "The specified profile could not be found.",
            "The specified profile could not be found."
        ]
    );
    assert!(plugin.account(CONSOLE_USER).await.unwrap().is_none());
}

#[tokio::test]
async fn test_server_error_asks_to_retry() {
    let server = MockServer::start().await;
    steam_missing(&server, "Jack_1").await;
    player(&server, "ps4", "Jack_1", ResponseTemplate::new(503).set_body_string("down")).await;

    let (h, plugin) = harness(&server, Some(TOKEN)).await;
    h.say("!rlconnect Jack_1").await;
    assert_eq!(
        h.replies(),
        vec!["Rocket League API experiences some issues right now. Try again later."]
    );
    assert!(plugin.account(CONSOLE_USER).await.unwrap().is_none());
}

#[tokio::test]
async fn test_client_error_is_reported() {
    let server = MockServer::start().await;
    steam_missing(&server, "Jack_1").await;
    player(
        &server,
        "ps4",
        "Jack_1",
        ResponseTemplate::new(403).set_body_json(json!({"detail": "Invalid token."})),
    )
    .await;

    let (h, _) = harness(&server, Some(TOKEN)).await;
    h.say("!rlstats Jack_1").await;
    assert!(h.replies()[0].starts_with("An error occured while checking Rocket League Stats."));
}

#[tokio::test]
async fn test_stats_without_connected_account() {
    let server = MockServer::start().await;
    let (h, _) = harness(&server, Some(TOKEN)).await;

    h.say("!rlstats").await;
    h.say("!rlstats <@555>").await;
    let replies = h.replies();
    assert!(replies[0].starts_with("Your game account is not connected with Discord."));
    assert!(replies[0].contains("`!rlconnect <ID>`"));
    assert!(replies[1].starts_with("This user hasn't connected his game account with Discord."));
}

#[tokio::test]
async fn test_update_breakdown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tier_breakdown/get_division_stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"playlist_id": 11, "division": 0, "from": 100.0, "to": 124.0},
            {"playlist_id": 11, "division": 1, "from": 125.0, "to": 149.0}
        ])))
        .mount(&server)
        .await;

    // a cached table keeps initialize from downloading on its own
    let data = tempfile::tempdir().unwrap();
    TierBreakdown::new()
        .save(&rlstats::breakdown_path(data.path()))
        .await
        .unwrap();

    let (h, plugin) = harness_with(config(&server, Some(TOKEN)), data).await;
    assert!(plugin.breakdown().await.is_empty());
    h.send(h.direct_message("!rlset updatebreakdown")).await;
    let sent: Vec<String> = h.console.sent().into_iter().map(|m| m.message.content).collect();
    assert_eq!(sent, vec!["Updating tier breakdown...", "Tier breakdown updated."]);

    let breakdown = plugin.breakdown().await;
    assert_eq!(
        breakdown.bounds(rlstats::PlaylistKey::Doubles, 19, 1),
        Some([125.0, 149.0])
    );

    let saved = TierBreakdown::load(&rlstats::breakdown_path(h.data.path()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&saved, breakdown.as_ref());
}

#[tokio::test]
async fn test_stats_card_is_posted() {
    let server = MockServer::start().await;
    steam_missing(&server, "Jack_1").await;
    player(&server, "ps4", "Jack_1", ResponseTemplate::new(200).set_body_json(skills("Jack_1"))).await;
    player(&server, "xboxone", "Jack_1", not_found()).await;

    let assets = tempfile::tempdir().unwrap();
    write_assets(assets.path());
    let mut config = config(&server, Some(TOKEN));
    config.assets_dir = assets.path().to_path_buf();
    let (h, _) = harness_with(config, tempfile::tempdir().unwrap()).await;

    h.say("!rlstats Jack_1").await;
    let sent = h.console.sent_to(CONSOLE_CHANNEL);
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].message.content,
        "Rocket League Stats for **Jack_1** _(arrows show amount of points for division down/up)_"
    );

    let file = sent[0].message.file.as_ref().unwrap();
    assert_eq!(file.filename, "Jack_1_profile.png");
    assert_eq!(image::guess_format(&file.data).unwrap(), image::ImageFormat::Png);
    let card = image::load_from_memory(&file.data).unwrap();
    assert_eq!((card.width(), card.height()), (1920, 1080));
}

#[tokio::test]
async fn test_user_data_can_be_shown_and_deleted() {
    let server = MockServer::start().await;
    steam_missing(&server, "Jack_1").await;
    player(&server, "ps4", "Jack_1", ResponseTemplate::new(200).set_body_json(skills("Jack_1"))).await;
    player(&server, "xboxone", "Jack_1", not_found()).await;

    let (h, plugin) = harness(&server, Some(TOKEN)).await;
    h.say("!rlconnect Jack_1").await;
    h.console.clear_sent();

    h.say("!mydata").await;
    h.say("!forgetme").await;
    h.say("!mydata").await;
    let replies = h.replies();
    assert!(replies[0].starts_with("```json\n"));
    assert!(replies[0].contains("\"rlstats\""));
    assert!(replies[0].contains("\"Jack_1\""));
    assert_eq!(replies[1], "Your data has been removed.");
    assert_eq!(replies[2], "No data is stored about you.");
    assert!(plugin.account(CONSOLE_USER).await.unwrap().is_none());
}
