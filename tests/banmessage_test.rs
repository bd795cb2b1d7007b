//! Ban announcements and their settings commands

mod common;

use std::sync::Arc;

use common::{Harness, BANS};
use guild_cogs::domain::entities::{Attachment, AttachmentId, Event, User};
use guild_cogs::domain::traits::{Scope, Store};
use guild_cogs::infrastructure::adapters::console::CONSOLE_GUILD;
use guild_cogs::infrastructure::database::SqliteStore;
use guild_cogs::plugins::banmessage::BanMessage;
use guild_cogs::plugins::Plugin;

async fn harness() -> (Harness, Arc<BanMessage>) {
    let mut plugin = None;
    let harness = Harness::new(|store, dir| {
        let banmessage = Arc::new(BanMessage::new(store, dir));
        plugin = Some(banmessage.clone());
        vec![banmessage as Arc<dyn Plugin>]
    })
    .await;
    (harness, plugin.unwrap())
}

fn ban(name: &str) -> Event {
    Event::MemberBan {
        guild_id: CONSOLE_GUILD,
        user: User::new(500, name).with_discriminator("1142"),
    }
}

#[tokio::test]
async fn test_ban_is_announced() {
    let (h, _) = harness().await;
    h.say("!banmessageset channel #bans").await;
    assert_eq!(h.replies(), vec!["Ban messages will now be sent in <#11>"]);

    h.say("!banmessageset addmessage $username was banned from $server").await;
    let replies = h.replies();
    assert_eq!(replies[1], "Ban message set, sending a test message here...");
    assert_eq!(replies[2], "console#0001 was banned from Console");

    h.emit(ban("jack")).await;
    assert_eq!(h.replies_in(BANS), vec!["jack#1142 was banned from Console"]);
}

#[tokio::test]
async fn test_no_channel_or_templates_sends_nothing() {
    let (h, _) = harness().await;
    h.say("!banmessageset addmessage $username left").await;
    h.console.clear_sent();

    h.emit(ban("jack")).await;
    assert!(h.console.sent().is_empty());

    let (h, _) = harness().await;
    h.say("!banmessageset channel bans").await;
    h.console.clear_sent();
    h.emit(ban("jack")).await;
    assert!(h.console.sent().is_empty());
}

#[tokio::test]
async fn test_disable_and_unknown_channel() {
    let (h, _) = harness().await;
    h.say("!banmessageset channel nowhere").await;
    h.say("!banmessageset channel").await;
    assert_eq!(
        h.replies(),
        vec!["Channel \"nowhere\" not found.", "Ban messages are now disabled."]
    );
}

#[tokio::test]
async fn test_forbidden_channel_is_skipped() {
    let (h, _) = harness().await;
    h.say("!banmessageset channel bans").await;
    h.say("!banmessageset addmessage bye $username").await;
    h.console.forbid(BANS);

    h.emit(ban("jack")).await;
    assert!(h.replies_in(BANS).is_empty());
}

#[tokio::test]
async fn test_remove_message_by_index() {
    let (h, plugin) = harness().await;
    h.say("!banmessageset addmessage first").await;
    h.say("!banmessageset addmessage second").await;
    h.console.clear_sent();

    let task = h.spawn("!banmessageset removemessage");
    h.wait_for_prompt().await;
    assert_eq!(
        h.replies(),
        vec!["```\nChoose a ban message to delete:\n\n  0. first\n  1. second\n\n```"]
    );
    h.say("0").await;
    task.await.unwrap();

    assert_eq!(h.replies().last().unwrap(), "Message removed.");
    assert_eq!(plugin.templates(CONSOLE_GUILD).await.unwrap(), vec!["second"]);
}

#[tokio::test]
async fn test_remove_message_out_of_range() {
    let (h, plugin) = harness().await;
    h.say("!banmessageset addmessage only").await;

    let task = h.spawn("!banmessageset removemessage");
    h.wait_for_prompt().await;
    h.say("not a number").await;
    h.say("7").await;
    task.await.unwrap();

    assert_eq!(h.replies().last().unwrap(), "Wow! That's a big number. Too big...");
    assert_eq!(plugin.templates(CONSOLE_GUILD).await.unwrap(), vec!["only"]);
}

#[tokio::test(start_paused = true)]
async fn test_remove_message_timeout() {
    let (h, plugin) = harness().await;
    h.say("!banmessageset addmessage only").await;
    h.say("!banmessageset removemessage").await;

    assert_eq!(h.replies().last().unwrap(), "Okay, no messages will be removed.");
    assert_eq!(plugin.templates(CONSOLE_GUILD).await.unwrap(), vec!["only"]);
}

#[tokio::test]
async fn test_remove_from_empty_list() {
    let (h, _) = harness().await;
    h.say("!banmessageset removemessage").await;
    assert_eq!(h.replies(), vec!["This guild doesn't have any ban message set."]);
}

#[tokio::test]
async fn test_image_is_attached() {
    let (h, plugin) = harness().await;
    let url = "https://cdn.example/attachments/1/ban.gif?size=2";
    h.console.add_attachment(url, b"GIF89a".to_vec());

    let message = h.message("!banmessageset setimage").with_attachment(Attachment {
        id: AttachmentId(1),
        filename: "ban.gif".to_string(),
        url: url.to_string(),
        size: 6,
        width: Some(1),
        height: Some(1),
    });
    h.send(message).await;
    assert_eq!(h.replies(), vec!["Image set."]);
    assert!(plugin.images().find(CONSOLE_GUILD).unwrap().ends_with("1.gif"));

    h.say("!banmessageset channel bans").await;
    h.say("!banmessageset addmessage bye").await;
    h.emit(ban("jack")).await;
    let sent = h.console.sent_to(BANS);
    let file = sent[0].message.file.as_ref().unwrap();
    assert_eq!(file.filename, "1.gif");
    assert_eq!(file.data, b"GIF89a");

    h.say("!banmessageset unsetimage").await;
    assert_eq!(h.replies().last().unwrap(), "Image unset.");
    assert!(plugin.images().find(CONSOLE_GUILD).is_none());
}

#[tokio::test]
async fn test_setimage_needs_one_image() {
    let (h, _) = harness().await;
    h.say("!banmessageset setimage").await;

    let not_image = h.message("!banmessageset setimage").with_attachment(Attachment {
        id: AttachmentId(2),
        filename: "notes.txt".to_string(),
        url: "https://cdn.example/notes.txt".to_string(),
        size: 3,
        width: None,
        height: None,
    });
    h.send(not_image).await;

    assert_eq!(
        h.replies(),
        vec!["You have to send exactly one attachment.", "The attachment has to be an image."]
    );
}

#[tokio::test]
async fn test_legacy_template_is_migrated_on_start() {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    store
        .set(
            "banmessage",
            Scope::Guild(CONSOLE_GUILD),
            "message_template",
            serde_json::json!("$username is gone"),
        )
        .await
        .unwrap();

    let mut plugin = None;
    let _h = Harness::with_store(store.clone(), tempfile::tempdir().unwrap(), |store, dir| {
        let banmessage = Arc::new(BanMessage::new(store, dir));
        plugin = Some(banmessage.clone());
        vec![banmessage as Arc<dyn Plugin>]
    })
    .await;

    let plugin = plugin.unwrap();
    assert_eq!(plugin.templates(CONSOLE_GUILD).await.unwrap(), vec!["$username is gone"]);
    assert!(store
        .get("banmessage", Scope::Guild(CONSOLE_GUILD), "message_template")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_dm_is_refused() {
    let (h, _) = harness().await;
    h.send(h.direct_message("!banmessageset channel bans")).await;
    let sent = h.console.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].message.content, "That command is not available in DMs.");
}
