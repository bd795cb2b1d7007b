//! Application layer - Use cases and business logic
//!
//! This layer contains:
//! - Services: command routing, the event loop, plugin settings
//! - Errors: Domain-specific errors
//! - Messaging: parsing, middleware, prompts, templates

pub mod errors;
pub mod services;
pub mod messaging;
