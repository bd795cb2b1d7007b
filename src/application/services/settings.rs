//! Namespaced settings view over a [`Store`]

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::application::errors::StorageError;
use crate::domain::entities::{GuildId, UserId};
use crate::domain::traits::{Scope, Store};

/// Settings of one plugin
#[derive(Clone)]
pub struct Settings {
    store: Arc<dyn Store>,
    namespace: String,
}

impl Settings {
    pub fn new(store: Arc<dyn Store>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn global(&self) -> Group {
        self.scoped(Scope::Global)
    }

    pub fn guild(&self, id: GuildId) -> Group {
        self.scoped(Scope::Guild(id))
    }

    pub fn user(&self, id: UserId) -> Group {
        self.scoped(Scope::User(id))
    }

    pub fn scoped(&self, scope: Scope) -> Group {
        Group {
            settings: self.clone(),
            scope,
        }
    }

    /// Every stored scope of this namespace
    pub async fn all_scopes(&self) -> Result<BTreeMap<Scope, Map<String, Value>>, StorageError> {
        self.store.all(&self.namespace).await
    }
}

/// Settings of one scope (a guild, a user, or global)
#[derive(Clone)]
pub struct Group {
    settings: Settings,
    scope: Scope,
}

impl Group {
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// A stored `null` reads as unset
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let value = self
            .settings
            .store
            .get(&self.settings.namespace, self.scope, key)
            .await?;
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(v) => Ok(Some(serde_json::from_value(v)?)),
        }
    }

    pub async fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, StorageError> {
        Ok(self.get(key).await?.unwrap_or(default))
    }

    pub async fn set<T: Serialize + ?Sized + Sync>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let value = serde_json::to_value(value)?;
        self.settings
            .store
            .set(&self.settings.namespace, self.scope, key, value)
            .await
    }

    pub async fn clear(&self, key: &str) -> Result<(), StorageError> {
        self.settings
            .store
            .clear(&self.settings.namespace, self.scope, key)
            .await
    }

    pub async fn clear_all(&self) -> Result<(), StorageError> {
        self.settings
            .store
            .clear_scope(&self.settings.namespace, self.scope)
            .await
    }
}
