//! Declarative multiplexer configuration.
//!
//! A configuration names its handlers; the names are resolved against a
//! [`HandlerRegistry`] when the multiplexer is built.
//!
//! ```yaml
//! redirect_status: 308
//! pool_max_idle: 128
//! routes:
//!   - pattern: "GET /users/{id}"
//!     handler: show_user
//!   - pattern: "/static/"
//!     handler: assets
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use http::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::handler::{Body, BoxHandler, Handler, HandlerFn};

/// Multiplexer settings and routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuxConfig {
    /// Status of generated redirects: 301 or 308.
    pub redirect_status: u16,
    /// Released value buffers kept for reuse.
    pub pool_max_idle: usize,
    /// Routes registered in order.
    pub routes: Vec<RouteConfig>,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            redirect_status: 301,
            pool_max_idle: 64,
            routes: Vec::new(),
        }
    }
}

/// A pattern and the name of its handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub pattern: String,
    pub handler: String,
}

impl MuxConfig {
    /// Load a configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a configuration from YAML content.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.redirect_status()?;
        Ok(config)
    }

    /// The redirect status as a [`StatusCode`].
    pub fn redirect_status(&self) -> Result<StatusCode, ConfigError> {
        match self.redirect_status {
            301 => Ok(StatusCode::MOVED_PERMANENTLY),
            308 => Ok(StatusCode::PERMANENT_REDIRECT),
            other => Err(ConfigError::InvalidRedirectStatus(other)),
        }
    }

    /// Append a route.
    pub fn with_route(mut self, pattern: impl Into<String>, handler: impl Into<String>) -> Self {
        self.routes.push(RouteConfig {
            pattern: pattern.into(),
            handler: handler.into(),
        });
        self
    }
}

/// Handlers addressable by name from a [`MuxConfig`].
pub struct HandlerRegistry<B> {
    handlers: HashMap<String, BoxHandler<B>>,
}

impl<B> Default for HandlerRegistry<B> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<B> HandlerRegistry<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous one.
    pub fn insert(&mut self, name: impl Into<String>, handler: impl Handler<B>) -> &mut Self {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    /// Register a closure under `name`.
    pub fn insert_fn<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(Request<B>) -> Response<Body> + Send + Sync + 'static,
    {
        self.insert(name, HandlerFn(f))
    }

    /// The handler registered under `name`.
    pub fn get(&self, name: &str) -> Option<BoxHandler<B>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}

impl<B> fmt::Debug for HandlerRegistry<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("handlers", &names)
            .finish()
    }
}
