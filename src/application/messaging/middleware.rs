//! Middleware system for the command pipeline

use std::sync::Arc;
use std::time::{Duration, Instant};
use std::collections::HashMap;
use crate::domain::entities::{ChannelId, UserId};

/// Context passed through middleware chain
#[derive(Debug, Clone)]
pub struct Context {
    pub channel_id: ChannelId,
    pub user_id: UserId,
    pub command: String,
    pub data: HashMap<String, String>,
}

impl Context {
    pub fn new(channel_id: ChannelId, user_id: UserId, command: impl Into<String>) -> Self {
        Self {
            channel_id,
            user_id,
            command: command.into(),
            data: HashMap::new(),
        }
    }

    /// Get data from context
    pub fn get(&self, key: &str) -> Option<&String> {
        self.data.get(key)
    }

    /// Set data in context
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.insert(key.into(), value.into());
    }
}

/// Middleware trait - processors that can intercept command handling
pub trait Middleware: Send + Sync {
    fn process(&self, ctx: Context, next: Next) -> MiddlewareResult;
}

/// Result of middleware processing
pub type MiddlewareResult = Result<Context, MiddlewareError>;

/// Middleware errors
#[derive(Debug, Clone)]
pub enum MiddlewareError {
    /// Stop processing and return error
    Blocked(String),
    RateLimited { retry_after: Duration },
    PermissionDenied(String),
    Internal(String),
}

impl std::fmt::Display for MiddlewareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MiddlewareError::Blocked(msg) => write!(f, "Blocked: {}", msg),
            MiddlewareError::RateLimited { retry_after } => {
                write!(f, "Rate limited, retry after {:?}", retry_after)
            }
            MiddlewareError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            MiddlewareError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for MiddlewareError {}

/// Next middleware in chain
#[derive(Clone)]
pub struct Next {
    remaining: Arc<Vec<Arc<dyn Middleware>>>,
}

impl Next {
    pub fn new(middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            remaining: Arc::new(middlewares),
        }
    }

    /// Process remaining middleware
    pub fn run(self, ctx: Context) -> MiddlewareResult {
        if let Some(first) = self.remaining.first() {
            let next = Next::new(self.remaining[1..].to_vec());
            first.process(ctx, next)
        } else {
            Ok(ctx)
        }
    }
}

/// Middleware chain builder
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn run(&self, ctx: Context) -> MiddlewareResult {
        Next::new(self.middlewares.clone()).run(ctx)
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

/// Rate limit middleware, keyed by user
pub struct RateLimitMiddleware {
    requests: std::sync::Mutex<HashMap<UserId, Vec<Instant>>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimitMiddleware {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            requests: std::sync::Mutex::new(HashMap::new()),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    fn check_rate_limit(&self, key: UserId) -> Result<(), MiddlewareError> {
        let mut requests = self.requests.lock()
            .map_err(|_| MiddlewareError::Internal("Lock poisoned".to_string()))?;

        let now = Instant::now();
        let times = requests.entry(key).or_default();

        // Remove old requests outside the window
        times.retain(|&t| now.duration_since(t) < self.window);

        if times.len() >= self.max_requests as usize {
            let retry_after = times.first()
                .map(|t| self.window.saturating_sub(now.duration_since(*t)))
                .unwrap_or(self.window);

            return Err(MiddlewareError::RateLimited { retry_after });
        }

        times.push(now);
        Ok(())
    }
}

impl Middleware for RateLimitMiddleware {
    fn process(&self, ctx: Context, next: Next) -> MiddlewareResult {
        self.check_rate_limit(ctx.user_id)?;
        next.run(ctx)
    }
}

/// Logging middleware for debugging
pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn process(&self, ctx: Context, next: Next) -> MiddlewareResult {
        tracing::debug!("[{}] {} invoked {}", ctx.channel_id, ctx.user_id, ctx.command);

        let channel = ctx.channel_id;
        let result = next.run(ctx);

        if let Err(e) = &result {
            tracing::warn!("[{}] Rejected: {}", channel, e);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(user: u64) -> Context {
        Context::new(ChannelId(1), UserId(user), "rlstats")
    }

    #[test]
    fn test_rate_limit_per_user() {
        let chain = MiddlewareChain::new()
            .add(LoggingMiddleware)
            .add(RateLimitMiddleware::new(2, 60));

        assert!(chain.run(ctx(1)).is_ok());
        assert!(chain.run(ctx(1)).is_ok());
        assert!(matches!(chain.run(ctx(1)), Err(MiddlewareError::RateLimited { .. })));
        // another user is unaffected
        assert!(chain.run(ctx(2)).is_ok());
    }

    #[test]
    fn test_empty_chain_passes() {
        let chain = MiddlewareChain::new();
        assert!(chain.is_empty());
        let out = chain.run(ctx(1)).unwrap();
        assert_eq!(out.command, "rlstats");
    }
}
