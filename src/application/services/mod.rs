//! Application services - Business logic orchestration

pub mod command_service;
pub mod event_service;
pub mod settings;

pub use command_service::CommandService;
pub use event_service::EventService;
pub use settings::{Group, Settings};
