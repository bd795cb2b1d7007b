//! Discord gateway connection
//!
//! Opens the websocket, identifies, keeps the heartbeat going and turns
//! dispatches into domain events. Sessions are not resumed: on reconnect the
//! client identifies again.

use futures::{SinkExt, StreamExt};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::application::errors::BotError;
use crate::domain::entities::{Channel, Event, Member, Message, Role, User};
use super::cache::Cache;
use super::models::{
    op, DiscordChannel, DiscordGuild, GatewayPayload, GuildBanAdd, GuildDelete, GuildMemberUpdate,
    GuildRoleDelete, GuildRoleEvent, Hello, MessageCreate, ReactionAdd, Ready,
};

/// Close codes after which reconnecting cannot help
const FATAL_CLOSE_CODES: [u16; 6] = [4004, 4010, 4011, 4012, 4013, 4014];

enum SessionEnd {
    Reconnect,
    Closed,
}

pub struct Gateway {
    url: String,
    token: String,
    intents: u64,
    cache: Arc<Cache>,
    events: mpsc::Sender<Event>,
}

impl Gateway {
    pub fn new(
        url: impl Into<String>,
        token: impl Into<String>,
        intents: u64,
        cache: Arc<Cache>,
        events: mpsc::Sender<Event>,
    ) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            intents,
            cache,
            events,
        }
    }

    /// Runs sessions until the event receiver is gone or the token is rejected
    pub async fn run(&self) -> Result<(), BotError> {
        let _ = rustls::crypto::ring::default_provider().install_default();

        loop {
            match self.session().await {
                Ok(SessionEnd::Closed) => return Ok(()),
                Ok(SessionEnd::Reconnect) => {
                    info!("Reconnecting to gateway");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Err(e @ BotError::Auth(_)) => return Err(e),
                Err(e) => {
                    warn!("Gateway session failed: {}", e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }

    async fn session(&self) -> Result<SessionEnd, BotError> {
        let url = format!("{}/?v=10&encoding=json", self.url.trim_end_matches('/'));
        let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;
        debug!("Gateway connected: {}", url);

        let hello: Hello = loop {
            match ws.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    let payload = parse_payload(&text)?;
                    if payload.op == op::HELLO {
                        break decode(payload.d)?;
                    }
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(BotError::Network(e.to_string())),
                None => return Ok(SessionEnd::Reconnect),
            }
        };

        let identify = GatewayPayload::new(op::IDENTIFY, json!({
            "token": self.token,
            "intents": self.intents,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "guild-cogs",
                "device": "guild-cogs",
            },
        }));
        send(&mut ws, &identify).await?;

        let period = Duration::from_millis(hello.heartbeat_interval);
        let jitter = rand::thread_rng().gen_range(0.0..1.0);
        let mut heartbeat = tokio::time::interval_at(
            tokio::time::Instant::now() + period.mul_f64(jitter),
            period,
        );
        let mut sequence: Option<u64> = None;
        let mut acked = true;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if !acked {
                        warn!("Heartbeat not acknowledged, reconnecting");
                        return Ok(SessionEnd::Reconnect);
                    }
                    acked = false;
                    send(&mut ws, &GatewayPayload::new(op::HEARTBEAT, json!(sequence))).await?;
                }
                frame = ws.next() => {
                    let text = match frame {
                        Some(Ok(WsMessage::Text(text))) => text,
                        Some(Ok(WsMessage::Close(frame))) => {
                            let code = frame.as_ref().map(|f| u16::from(f.code)).unwrap_or(1000);
                            if FATAL_CLOSE_CODES.contains(&code) {
                                return Err(BotError::Auth(format!("gateway closed with {}", code)));
                            }
                            info!("Gateway closed with {}", code);
                            return Ok(SessionEnd::Reconnect);
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return Err(BotError::Network(e.to_string())),
                        None => return Ok(SessionEnd::Reconnect),
                    };

                    let payload = parse_payload(&text)?;
                    if payload.s.is_some() {
                        sequence = payload.s;
                    }
                    match payload.op {
                        op::DISPATCH => {
                            let kind = payload.t.unwrap_or_default();
                            if let Err(e) = self.dispatch(&kind, payload.d).await {
                                if self.events.is_closed() {
                                    return Ok(SessionEnd::Closed);
                                }
                                warn!("Could not handle {}: {}", kind, e);
                            }
                        }
                        op::HEARTBEAT => {
                            send(&mut ws, &GatewayPayload::new(op::HEARTBEAT, json!(sequence))).await?;
                        }
                        op::HEARTBEAT_ACK => acked = true,
                        op::RECONNECT => return Ok(SessionEnd::Reconnect),
                        op::INVALID_SESSION => {
                            let wait = rand::thread_rng().gen_range(1000..5000);
                            tokio::time::sleep(Duration::from_millis(wait)).await;
                            return Ok(SessionEnd::Reconnect);
                        }
                        other => debug!("Ignoring gateway op {}", other),
                    }
                }
            }
        }
    }

    /// Updates the cache and forwards the matching domain event
    async fn dispatch(&self, kind: &str, data: Value) -> Result<(), BotError> {
        let event = match kind {
            "READY" => {
                let ready: Ready = decode(data)?;
                info!("Gateway session {} ready", ready.session_id);
                self.cache.set_bot_user(ready.user.id);
                Some(Event::Ready { user: User::from(ready.user) })
            }
            "GUILD_CREATE" => {
                let guild: DiscordGuild = decode(data)?;
                if guild.unavailable {
                    None
                } else {
                    Some(Event::GuildAvailable(self.cache.insert_guild(guild)))
                }
            }
            "GUILD_UPDATE" => {
                self.cache.update_guild(decode(data)?);
                None
            }
            "GUILD_DELETE" => {
                let deleted: GuildDelete = decode(data)?;
                self.cache.remove_guild(deleted.id);
                None
            }
            "GUILD_ROLE_CREATE" | "GUILD_ROLE_UPDATE" => {
                let update: GuildRoleEvent = decode(data)?;
                self.cache.upsert_role(update.guild_id, Role::from(update.role));
                None
            }
            "GUILD_ROLE_DELETE" => {
                let delete: GuildRoleDelete = decode(data)?;
                self.cache.remove_role(delete.guild_id, delete.role_id);
                None
            }
            "CHANNEL_CREATE" | "CHANNEL_UPDATE" => {
                let channel: DiscordChannel = decode(data)?;
                if let Some(guild) = channel.guild_id {
                    self.cache.upsert_channel(guild, Channel::from(channel));
                }
                None
            }
            "CHANNEL_DELETE" => {
                let channel: DiscordChannel = decode(data)?;
                if let Some(guild) = channel.guild_id {
                    self.cache.remove_channel(guild, channel.id);
                }
                None
            }
            "GUILD_BAN_ADD" => {
                let ban: GuildBanAdd = decode(data)?;
                Some(Event::MemberBan {
                    guild_id: ban.guild_id,
                    user: ban.user.into(),
                })
            }
            "GUILD_MEMBER_UPDATE" => {
                let update: GuildMemberUpdate = decode(data)?;
                let after = Member::from(update);
                let before = self.cache.update_member(after.clone());
                Some(Event::MemberUpdate { before, after })
            }
            "GUILD_MEMBER_REMOVE" => {
                let removed: GuildBanAdd = decode(data)?;
                self.cache.remove_member(removed.guild_id, removed.user.id);
                None
            }
            "MESSAGE_CREATE" => {
                let message: MessageCreate = decode(data)?;
                Some(Event::Message(Message::from(message)))
            }
            "MESSAGE_REACTION_ADD" => {
                let reaction: ReactionAdd = decode(data)?;
                reaction.emoji.name.map(|emoji| Event::ReactionAdd {
                    message_id: reaction.message_id,
                    user_id: reaction.user_id,
                    emoji,
                })
            }
            _ => None,
        };

        if let Some(event) = event {
            self.events
                .send(event)
                .await
                .map_err(|_| BotError::Internal("event loop stopped".to_string()))?;
        }
        Ok(())
    }
}

fn parse_payload(text: &str) -> Result<GatewayPayload, BotError> {
    serde_json::from_str(text).map_err(|e| BotError::Parse(e.to_string()))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, BotError> {
    serde_json::from_value(value).map_err(|e| BotError::Parse(e.to_string()))
}

async fn send<S>(ws: &mut S, payload: &GatewayPayload) -> Result<(), BotError>
where
    S: futures::Sink<WsMessage> + Unpin,
    S::Error: std::fmt::Display,
{
    let text = serde_json::to_string(payload).map_err(|e| BotError::Parse(e.to_string()))?;
    ws.send(WsMessage::Text(text))
        .await
        .map_err(|e| BotError::Network(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{GuildId, UserId};

    fn gateway() -> (Gateway, mpsc::Receiver<Event>, Arc<Cache>) {
        let (tx, rx) = mpsc::channel(16);
        let cache = Arc::new(Cache::new());
        (Gateway::new("wss://example", "t", 0, cache.clone(), tx), rx, cache)
    }

    #[tokio::test]
    async fn test_member_update_carries_cached_state() {
        let (gateway, mut rx, _cache) = gateway();
        let update = json!({
            "guild_id": "1",
            "user": {"id": "42", "username": "jack"},
            "roles": [],
            "premium_since": null
        });
        gateway.dispatch("GUILD_MEMBER_UPDATE", update.clone()).await.unwrap();
        match rx.recv().await {
            Some(Event::MemberUpdate { before: None, after }) => assert!(after.premium_since.is_none()),
            other => panic!("unexpected {:?}", other),
        }

        let mut boosted = update;
        boosted["premium_since"] = json!("2024-05-01T10:00:00+00:00");
        gateway.dispatch("GUILD_MEMBER_UPDATE", boosted).await.unwrap();
        match rx.recv().await {
            Some(Event::MemberUpdate { before: Some(before), after }) => {
                assert!(before.premium_since.is_none());
                assert!(after.premium_since.is_some());
                assert_eq!(after.guild_id, GuildId(1));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ready_sets_bot_user() {
        let (gateway, mut rx, cache) = gateway();
        gateway
            .dispatch("READY", json!({"user": {"id": "9", "username": "cogs", "bot": true}, "session_id": "s"}))
            .await
            .unwrap();
        assert_eq!(cache.bot_user(), Some(UserId(9)));
        assert!(matches!(rx.recv().await, Some(Event::Ready { .. })));
    }

    #[tokio::test]
    async fn test_unknown_dispatch_is_ignored() {
        let (gateway, mut rx, _cache) = gateway();
        gateway.dispatch("TYPING_START", json!({})).await.unwrap();
        drop(gateway);
        assert!(rx.recv().await.is_none());
    }
}
