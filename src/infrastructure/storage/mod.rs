//! File-based storage implementation

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::application::errors::StorageError;
use crate::domain::traits::{Scope, Store};

/// namespace -> scope -> key -> value
type Tree = BTreeMap<String, BTreeMap<String, Map<String, Value>>>;

/// JSON file-based store. The whole tree is kept in memory and the file is
/// rewritten (via a temporary file and rename) after every change.
pub struct JsonStore {
    path: PathBuf,
    data: Arc<RwLock<Tree>>,
}

impl JsonStore {
    /// Opens the store, reading the file if it exists
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let data = match tokio::fs::read(&path).await {
            Ok(bytes) if !bytes.is_empty() => serde_json::from_slice(&bytes)?,
            Ok(_) => Tree::new(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Tree::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            data: Arc::new(RwLock::new(data)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, data: &Tree) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(data)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Applies `change` to a copy of the tree and swaps it in once the copy
    /// is on disk. `change` returns whether anything was modified.
    async fn update<F>(&self, change: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut Tree) -> bool + Send,
    {
        let mut data = self.data.write().await;
        let mut next = data.clone();
        if !change(&mut next) {
            return Ok(());
        }
        self.persist(&next).await?;
        *data = next;
        Ok(())
    }
}

#[async_trait]
impl Store for JsonStore {
    async fn get(&self, namespace: &str, scope: Scope, key: &str) -> Result<Option<Value>, StorageError> {
        let data = self.data.read().await;
        Ok(data
            .get(namespace)
            .and_then(|scopes| scopes.get(&scope.to_string()))
            .and_then(|values| values.get(key))
            .cloned())
    }

    async fn set(&self, namespace: &str, scope: Scope, key: &str, value: Value) -> Result<(), StorageError> {
        self.update(|data| {
            data.entry(namespace.to_string())
                .or_default()
                .entry(scope.to_string())
                .or_default()
                .insert(key.to_string(), value);
            true
        })
        .await
    }

    async fn clear(&self, namespace: &str, scope: Scope, key: &str) -> Result<(), StorageError> {
        let scope_key = scope.to_string();
        self.update(|data| {
            let Some(scopes) = data.get_mut(namespace) else {
                return false;
            };
            let removed = match scopes.get_mut(&scope_key) {
                Some(values) => values.remove(key).is_some(),
                None => false,
            };
            if scopes.get(&scope_key).is_some_and(|v| v.is_empty()) {
                scopes.remove(&scope_key);
            }
            removed
        })
        .await
    }

    async fn clear_scope(&self, namespace: &str, scope: Scope) -> Result<(), StorageError> {
        self.update(|data| {
            data.get_mut(namespace)
                .and_then(|scopes| scopes.remove(&scope.to_string()))
                .is_some()
        })
        .await
    }

    async fn all(&self, namespace: &str) -> Result<BTreeMap<Scope, Map<String, Value>>, StorageError> {
        let data = self.data.read().await;
        let mut out = BTreeMap::new();
        if let Some(scopes) = data.get(namespace) {
            for (scope, values) in scopes {
                match Scope::parse(scope) {
                    Some(scope) => {
                        out.insert(scope, values.clone());
                    }
                    None => tracing::warn!("Skipping unknown scope '{}' in {}", scope, namespace),
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::Settings;
    use crate::domain::entities::{GuildId, UserId};
    use serde_json::json;

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = JsonStore::open(&path).await.unwrap();
        store.set("banmessage", Scope::Guild(GuildId(1)), "channel", json!(5)).await.unwrap();
        store.set("rlstats", Scope::Global, "token", json!("abc")).await.unwrap();
        drop(store);

        let store = JsonStore::open(&path).await.unwrap();
        assert_eq!(
            store.get("banmessage", Scope::Guild(GuildId(1)), "channel").await.unwrap(),
            Some(json!(5))
        );
        assert_eq!(store.get("rlstats", Scope::Global, "token").await.unwrap(), Some(json!("abc")));
        assert_eq!(store.get("rlstats", Scope::Global, "missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_and_all() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("s.json")).await.unwrap();
        let user = Scope::User(UserId(7));
        store.set("rlstats", user, "platform", json!("steam")).await.unwrap();
        store.set("rlstats", user, "id", json!("765")).await.unwrap();
        store.set("rlstats", Scope::Guild(GuildId(2)), "x", json!(1)).await.unwrap();

        store.clear("rlstats", user, "platform").await.unwrap();
        let all = store.all("rlstats").await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[&user].get("id"), Some(&json!("765")));

        store.clear_scope("rlstats", user).await.unwrap();
        assert!(!store.all("rlstats").await.unwrap().contains_key(&user));
        // clearing missing keys is not an error
        store.clear("nope", user, "nope").await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_write_leaves_values_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        let store = JsonStore::open(sub.join("settings.json")).await.unwrap();
        let guild = Scope::Guild(GuildId(1));
        store.set("banmessage", guild, "channel", json!(5)).await.unwrap();

        std::fs::remove_dir_all(&sub).unwrap();
        assert!(store.set("banmessage", guild, "channel", json!(10)).await.is_err());
        assert!(store.clear("banmessage", guild, "channel").await.is_err());
        assert!(store.clear_scope("banmessage", guild).await.is_err());
        assert_eq!(store.get("banmessage", guild, "channel").await.unwrap(), Some(json!(5)));

        // a no-op clear does not touch the file
        store.clear("banmessage", guild, "missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_settings_view() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn Store> = Arc::new(JsonStore::open(dir.path().join("s.json")).await.unwrap());
        let settings = Settings::new(store, "banmessage");
        let guild = settings.guild(GuildId(3));

        assert_eq!(guild.get::<Vec<String>>("message_templates").await.unwrap(), None);
        guild.set("message_templates", &vec!["$username".to_string()]).await.unwrap();
        assert_eq!(
            guild.get_or::<Vec<String>>("message_templates", Vec::new()).await.unwrap(),
            vec!["$username".to_string()]
        );

        // null reads as unset
        guild.set("message_template", &Value::Null).await.unwrap();
        assert_eq!(guild.get::<String>("message_template").await.unwrap(), None);

        guild.clear_all().await.unwrap();
        assert!(settings.all_scopes().await.unwrap().is_empty());
    }
}
