//! guild-cogs - community plugins for a Discord bot
//!
//! The crate ships the plugins together with the small host they run in:
//! - domain: entities and the `Bot` / `Store` traits
//! - application: command routing, the event loop, scoped settings
//! - infrastructure: config, persistence, Discord and console adapters
//! - plugins: banmessage, nitrorole, rlstats and the admin kernel

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod plugins;
