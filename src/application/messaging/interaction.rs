//! Pending interactive prompts (wait for a reply or a reaction)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;
use crate::domain::entities::{ChannelId, Message, MessageId, UserId};

type MessageCheck = Box<dyn Fn(&Message) -> bool + Send>;

enum Waiter {
    Reply {
        channel: ChannelId,
        user: UserId,
        check: MessageCheck,
        tx: oneshot::Sender<Message>,
    },
    Reaction {
        message: MessageId,
        user: UserId,
        emojis: Vec<String>,
        tx: oneshot::Sender<String>,
    },
}

/// Registry of handlers waiting for a user's next reply or reaction.
///
/// Adapters feed every message and reaction through [`Interactions::feed_message`]
/// and [`Interactions::feed_reaction`]; a waiter is resolved by the first event
/// that satisfies it, and dropped on timeout.
#[derive(Default)]
pub struct Interactions {
    next_id: AtomicU64,
    waiters: Mutex<Vec<(u64, Waiter)>>,
}

impl Interactions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for a message from `user` in `channel` that passes `check`.
    pub async fn wait_for_reply<F>(
        &self,
        channel: ChannelId,
        user: UserId,
        check: F,
        timeout: Duration,
    ) -> Option<Message>
    where
        F: Fn(&Message) -> bool + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let id = self.push(Waiter::Reply {
            channel,
            user,
            check: Box::new(check),
            tx,
        });
        self.wait(id, rx, timeout).await
    }

    /// Waits for `user` to react to `message` with one of `emojis`.
    pub async fn wait_for_reaction(
        &self,
        message: MessageId,
        user: UserId,
        emojis: Vec<String>,
        timeout: Duration,
    ) -> Option<String> {
        let (tx, rx) = oneshot::channel();
        let id = self.push(Waiter::Reaction {
            message,
            user,
            emojis,
            tx,
        });
        self.wait(id, rx, timeout).await
    }

    /// Returns `true` if a waiter consumed the message.
    pub fn feed_message(&self, message: &Message) -> bool {
        let Ok(mut waiters) = self.waiters.lock() else {
            return false;
        };
        let position = waiters.iter().position(|(_, w)| match w {
            Waiter::Reply { channel, user, check, tx } => {
                !tx.is_closed()
                    && *channel == message.channel_id
                    && *user == message.author.id
                    && check(message)
            }
            Waiter::Reaction { .. } => false,
        });
        match position.map(|i| waiters.remove(i)) {
            Some((_, Waiter::Reply { tx, .. })) => tx.send(message.clone()).is_ok(),
            _ => false,
        }
    }

    /// Returns `true` if a waiter consumed the reaction.
    pub fn feed_reaction(&self, message: MessageId, user: UserId, emoji: &str) -> bool {
        let Ok(mut waiters) = self.waiters.lock() else {
            return false;
        };
        let position = waiters.iter().position(|(_, w)| match w {
            Waiter::Reaction { message: m, user: u, emojis, tx } => {
                !tx.is_closed() && *m == message && *u == user && emojis.iter().any(|e| e == emoji)
            }
            Waiter::Reply { .. } => false,
        });
        match position.map(|i| waiters.remove(i)) {
            Some((_, Waiter::Reaction { tx, .. })) => tx.send(emoji.to_string()).is_ok(),
            _ => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.waiters.lock().map(|w| w.len()).unwrap_or(0)
    }

    fn push(&self, waiter: Waiter) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut waiters) = self.waiters.lock() {
            waiters.push((id, waiter));
        }
        id
    }

    async fn wait<T>(&self, id: u64, rx: oneshot::Receiver<T>, timeout: Duration) -> Option<T> {
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(value)) => Some(value),
            _ => {
                if let Ok(mut waiters) = self.waiters.lock() {
                    waiters.retain(|(waiter_id, _)| *waiter_id != id);
                }
                None
            }
        }
    }
}
