//! Message handling - parsing, middleware, prompts and reply formatting

pub mod context;
pub mod converters;
pub mod formatting;
pub mod interaction;
pub mod middleware;
pub mod parser;
pub mod template;

pub use context::CommandContext;
pub use interaction::Interactions;
pub use middleware::{LoggingMiddleware, Middleware, MiddlewareChain, RateLimitMiddleware};
pub use parser::{Invocation, MessageParser};
pub use template::Template;
