//! Admin kernel
//!
//! Runs a small REPL inside the bot process. The listener binds to
//! loopback only and clients must present the key from the connection
//! file, which is linked as `<data>/kernel/kernel.json`.

pub mod repl;

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::application::errors::{BotError, CommandError};
use crate::application::messaging::CommandContext;
use crate::domain::entities::{Command, Permission};
use crate::domain::traits::{Bot, Store};
use crate::infrastructure::config::KernelConfig;
use crate::plugins::trait_def::Plugin;
use repl::Env;

pub const NAME: &str = "kernel";

const KEY_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum KernelError {
    #[error("Kernel is already running")]
    AlreadyRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<KernelError> for BotError {
    fn from(e: KernelError) -> Self {
        BotError::Plugin(e.to_string())
    }
}

/// Contents of the connection file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub transport: String,
    pub ip: String,
    pub port: u16,
    pub key: String,
}

struct Running {
    info: ConnectionInfo,
    file: PathBuf,
    task: JoinHandle<()>,
}

pub struct Kernel {
    store: Arc<dyn Store>,
    bind: SocketAddr,
    runtime_dir: PathBuf,
    link: PathBuf,
    running: Mutex<Option<Running>>,
}

impl Kernel {
    pub fn new(store: Arc<dyn Store>, data_dir: &Path, config: &KernelConfig) -> Self {
        Self {
            store,
            bind: config.bind,
            runtime_dir: config.runtime_dir.clone().unwrap_or_else(std::env::temp_dir),
            link: data_dir.join(NAME).join("kernel.json"),
            running: Mutex::new(None),
        }
    }

    /// Path of the link to the current connection file
    pub fn link_path(&self) -> &Path {
        &self.link
    }

    pub async fn connection(&self) -> Option<ConnectionInfo> {
        self.running.lock().await.as_ref().map(|r| r.info.clone())
    }

    pub async fn start(&self, bot: Arc<dyn Bot>) -> Result<ConnectionInfo, KernelError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(KernelError::AlreadyRunning);
        }

        let listener = TcpListener::bind(self.bind).await?;
        let addr = listener.local_addr()?;
        let info = ConnectionInfo {
            transport: "tcp".to_string(),
            ip: addr.ip().to_string(),
            port: addr.port(),
            key: generate_key(),
        };

        tokio::fs::create_dir_all(&self.runtime_dir).await?;
        let file = self.runtime_dir.join(format!("kernel-{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(&file, serde_json::to_vec_pretty(&info)?).await?;
        if let Err(e) = self.link_to(&file).await {
            let _ = tokio::fs::remove_file(&file).await;
            return Err(e);
        }

        let env = Arc::new(Env::new(bot, self.store.clone()));
        let task = tokio::spawn(serve(listener, Arc::from(info.key.as_str()), env));

        info!("Kernel listening on {} ({})", addr, self.link.display());
        *running = Some(Running {
            info: info.clone(),
            file,
            task,
        });
        Ok(info)
    }

    /// Stops the listener and drops open sessions; no-op when not running
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };
        running.task.abort();
        remove_if_exists(&self.link).await;
        remove_if_exists(&running.file).await;
        info!("Kernel stopped");
    }

    pub async fn restart(&self, bot: Arc<dyn Bot>) -> Result<ConnectionInfo, KernelError> {
        self.stop().await;
        self.start(bot).await
    }

    async fn link_to(&self, file: &Path) -> Result<(), KernelError> {
        if let Some(parent) = self.link.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        remove_if_exists(&self.link).await;
        #[cfg(unix)]
        tokio::fs::symlink(file, &self.link).await?;
        #[cfg(not(unix))]
        tokio::fs::copy(file, &self.link).await?;
        Ok(())
    }

    async fn kernel_command(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let sub = ctx.subcommand().map(str::to_lowercase);
        match sub.as_deref() {
            Some("info") => {
                let reply = match self.connection().await {
                    Some(info) => format!(
                        "Kernel is listening on {}:{}. Connection file: `{}`",
                        info.ip,
                        info.port,
                        self.link.display()
                    ),
                    None => "Kernel is not running.".to_string(),
                };
                ctx.send(reply).await?;
                Ok(())
            }
            Some("restart") => {
                self.restart(ctx.bot.clone()).await.map_err(BotError::from)?;
                ctx.send("Kernel restarted.").await?;
                Ok(())
            }
            _ => Err(CommandError::InvalidArgs(String::new())),
        }
    }
}

fn generate_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(KEY_LEN)
        .map(char::from)
        .collect()
}

async fn remove_if_exists(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {}", path.display(), e),
    }
}

/// Accept loop; sessions live in the set and end when it is dropped
async fn serve(listener: TcpListener, key: Arc<str>, env: Arc<Env>) {
    let mut sessions = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!("Kernel client connected from {}", peer);
                    sessions.spawn(repl::session(stream, key.clone(), env.clone()));
                }
                Err(e) => warn!("Kernel accept failed: {}", e),
            },
            Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                if let Ok(Err(e)) = finished {
                    debug!("Kernel session ended: {}", e);
                }
            }
        }
    }
}

#[async_trait]
impl Plugin for Kernel {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Run an admin REPL inside the bot and connect to it over loopback TCP."
    }

    fn commands(&self) -> Vec<Command> {
        vec![Command::new("kernel")
            .with_description("Manage the embedded admin kernel.")
            .with_usage("<subcommand>")
            .with_permission(Permission::Owner)
            .with_subcommand(Command::new("info").with_description("Show where the kernel listens"))
            .with_subcommand(Command::new("restart").with_description("Restart the kernel with a new key"))]
    }

    async fn initialize(&self, bot: Arc<dyn Bot>) -> Result<(), BotError> {
        self.start(bot).await?;
        Ok(())
    }

    async fn handle_command(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        match ctx.command.name.as_str() {
            "kernel" => self.kernel_command(ctx).await,
            other => Err(CommandError::NotFound(other.to_string())),
        }
    }

    async fn cleanup(&self) {
        self.stop().await;
    }
}
