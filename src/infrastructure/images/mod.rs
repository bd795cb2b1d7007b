//! One image per guild, stored as `<dir>/<guild id>.<ext>`

use std::path::{Path, PathBuf};

use crate::application::errors::StorageError;
use crate::domain::entities::GuildId;

#[derive(Debug, Clone)]
pub struct GuildImages {
    dir: PathBuf,
}

impl GuildImages {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every stored file for the guild, whatever its extension
    pub fn all(&self, guild: GuildId) -> Vec<PathBuf> {
        let Some(dir) = self.dir.to_str() else {
            return Vec::new();
        };
        let pattern = format!("{}/{}.*", glob::Pattern::escape(dir), guild);
        match glob::glob(&pattern) {
            Ok(paths) => {
                let mut paths: Vec<PathBuf> = paths.filter_map(Result::ok).collect();
                paths.sort();
                paths
            }
            Err(e) => {
                tracing::warn!("Bad image pattern {}: {}", pattern, e);
                Vec::new()
            }
        }
    }

    pub fn find(&self, guild: GuildId) -> Option<PathBuf> {
        self.all(guild).into_iter().next()
    }

    pub async fn load(&self, guild: GuildId) -> Result<Option<(String, Vec<u8>)>, StorageError> {
        let Some(path) = self.find(guild) else {
            return Ok(None);
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.png", guild));
        Ok(Some((name, tokio::fs::read(&path).await?)))
    }

    /// Stores the image and removes the guild's files with other extensions
    pub async fn save(&self, guild: GuildId, extension: &str, data: &[u8]) -> Result<PathBuf, StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        let path = self.dir.join(format!("{}.{}", guild, extension));
        tokio::fs::write(&path, data).await?;

        for other in self.all(guild) {
            if other != path {
                tokio::fs::remove_file(&other).await?;
            }
        }
        Ok(path)
    }

    /// Returns how many files were removed
    pub async fn remove(&self, guild: GuildId) -> Result<usize, StorageError> {
        let files = self.all(guild);
        for file in &files {
            tokio::fs::remove_file(file).await?;
        }
        Ok(files.len())
    }
}
