use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use crate::application::errors::StorageError;
use crate::domain::entities::{GuildId, UserId};

/// What a stored value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Global,
    Guild(GuildId),
    User(UserId),
}

impl Scope {
    pub fn parse(s: &str) -> Option<Self> {
        match s.split_once(':') {
            None if s == "global" => Some(Scope::Global),
            Some(("guild", id)) => id.parse().ok().map(Scope::Guild),
            Some(("user", id)) => id.parse().ok().map(Scope::User),
            _ => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Guild(id) => write!(f, "guild:{}", id),
            Scope::User(id) => write!(f, "user:{}", id),
        }
    }
}

/// Store trait - namespaced, scoped key-value persistence
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, namespace: &str, scope: Scope, key: &str) -> Result<Option<Value>, StorageError>;
    async fn set(&self, namespace: &str, scope: Scope, key: &str, value: Value) -> Result<(), StorageError>;
    async fn clear(&self, namespace: &str, scope: Scope, key: &str) -> Result<(), StorageError>;

    /// Drop every key of one scope
    async fn clear_scope(&self, namespace: &str, scope: Scope) -> Result<(), StorageError>;

    /// Every scope of a namespace with its values
    async fn all(&self, namespace: &str) -> Result<BTreeMap<Scope, Map<String, Value>>, StorageError>;
}
