//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: Configuration loading
//! - Storage / Database: settings persistence (JSON file, SQLite)
//! - Images: per-guild image files
//! - Adapters: Platform integrations (Discord, console)

pub mod config;
pub mod storage;
pub mod database;
pub mod images;
pub mod adapters;
