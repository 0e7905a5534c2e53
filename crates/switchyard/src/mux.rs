//! The request multiplexer.

use std::borrow::Cow;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::future::{ready, Ready};
use std::sync::Arc;

use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::{Method, Request, Response, StatusCode, Version};
use http_body_util::Full;
use hyper::service::Service;
use parking_lot::RwLock;
use switchyard_telemetry::{
    log_method_not_allowed, log_pattern_registered, log_pattern_rejected,
    log_request_redirected, log_route_not_found, log_trailing_slash_synthesized,
};

use crate::config::{HandlerRegistry, MuxConfig};
use crate::error::{ConfigError, RegisterError};
use crate::handler::{
    with_query, Body, BoxHandler, Handler, HandlerFn, MethodNotAllowed, NotFound, Redirect,
    TrailingSlashRedirect,
};
use crate::path::{clean_path, decode_value, routing_path, strip_host_port};
use crate::pattern::{registration_key, Pattern};
use crate::pool::ValuePool;
use crate::tree::{Entry, Match, Tree};
use crate::vars::{configure_request, PathVars};

/// Method marker of synthesized trailing-slash entries. It cannot collide
/// with a real method, which is alphanumeric.
const TRAILING_SLASH_METHOD: &str = "_tsr";

/// Routes requests to the handler whose pattern matches best.
///
/// Patterns have the form `[METHOD ][HOST]PATH`. A path element `{name}`
/// matches one segment, a final `{name...}` matches the rest of the path and
/// a trailing `/` is shorthand for `/{...}`. Among the patterns that match,
/// literal elements win over variables and variables win over wildcards, no
/// matter the registration order.
///
/// Registration and lookup may run concurrently; routes are normally
/// registered once at startup and matched from many threads.
pub struct ServeMux<B> {
    routes: RwLock<Routes<B>>,
    redirect_status: StatusCode,
    pool_max_idle: usize,
}

struct Routes<B> {
    default: Tree<BoxHandler<B>>,
    hosts: HashMap<String, Tree<BoxHandler<B>>>,
    /// Registration key to the pattern that claimed it.
    registered: HashMap<String, String>,
    pool: ValuePool,
}

impl<B> Routes<B> {
    fn new(pool_max_idle: usize) -> Self {
        Self {
            default: Tree::new(),
            hosts: HashMap::new(),
            registered: HashMap::new(),
            pool: ValuePool::new(0, pool_max_idle),
        }
    }

    /// Host trees are consulted first. A host tree that knows the path but
    /// not the method answers for the request; one that does not know the
    /// path defers to the default tree.
    fn lookup(
        &self,
        host: &str,
        connect: bool,
        path: &str,
        method: &str,
    ) -> Match<'_, '_, BoxHandler<B>> {
        if !self.hosts.is_empty() {
            let host = if connect { host } else { strip_host_port(host) };
            if let Some(tree) = self.hosts.get(host) {
                match tree.search(path, method, &self.pool) {
                    Match::NotFound => {}
                    outcome => return outcome,
                }
            }
        }
        self.default.search(path, method, &self.pool)
    }
}

impl<B: 'static> ServeMux<B> {
    /// Create a multiplexer with the default settings.
    pub fn new() -> Self {
        let config = MuxConfig::default();
        Self {
            routes: RwLock::new(Routes::new(config.pool_max_idle)),
            redirect_status: StatusCode::MOVED_PERMANENTLY,
            pool_max_idle: config.pool_max_idle,
        }
    }

    /// Create a multiplexer with the settings of `config`. Its routes are
    /// not registered; see [`ServeMux::from_config`].
    pub fn with_config(config: &MuxConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            routes: RwLock::new(Routes::new(config.pool_max_idle)),
            redirect_status: config.redirect_status()?,
            pool_max_idle: config.pool_max_idle,
        })
    }

    /// Create a multiplexer and register the routes of `config`, resolving
    /// handler names through `registry`.
    pub fn from_config(
        config: &MuxConfig,
        registry: &HandlerRegistry<B>,
    ) -> Result<Self, ConfigError> {
        let mux = Self::with_config(config)?;
        for route in &config.routes {
            mux.register(&route.pattern, registry.get(&route.handler))?;
        }
        Ok(mux)
    }

    /// Register `handler` for `pattern`.
    ///
    /// Errors mean the routing table is misconfigured; callers are expected
    /// to abort startup on them.
    pub fn handle(&self, pattern: &str, handler: impl Handler<B>) -> Result<(), RegisterError> {
        self.register(pattern, Some(Arc::new(handler)))
    }

    /// Register a closure for `pattern`.
    pub fn handle_fn<F>(&self, pattern: &str, f: F) -> Result<(), RegisterError>
    where
        F: Fn(Request<B>) -> Response<Body> + Send + Sync + 'static,
    {
        self.handle(pattern, HandlerFn(f))
    }

    /// Status used for generated redirects.
    pub fn redirect_status(&self) -> StatusCode {
        self.redirect_status
    }

    fn register(&self, pattern: &str, handler: Option<BoxHandler<B>>) -> Result<(), RegisterError> {
        let result = self.try_register(pattern, handler);
        if let Err(err) = &result {
            log_pattern_rejected!(pattern = %pattern, error = %err);
        }
        result
    }

    fn try_register(
        &self,
        pattern: &str,
        handler: Option<BoxHandler<B>>,
    ) -> Result<(), RegisterError> {
        if pattern.is_empty() {
            return Err(RegisterError::EmptyPattern);
        }
        let Some(handler) = handler else {
            return Err(RegisterError::MissingHandler {
                pattern: pattern.to_string(),
            });
        };
        let parsed = Pattern::parse(pattern).map_err(|source| RegisterError::Syntax {
            pattern: pattern.to_string(),
            source,
        })?;

        let mut guard = self.routes.write();
        let routes = &mut *guard;

        let key = parsed.key();
        if let Some(existing) = routes.registered.get(&key) {
            return Err(RegisterError::Conflict {
                pattern: pattern.to_string(),
                existing: existing.clone(),
            });
        }
        routes.registered.insert(key, pattern.to_string());

        let tree = if parsed.host.is_empty() {
            &mut routes.default
        } else {
            routes.hosts.entry(parsed.host.clone()).or_default()
        };

        tree.add(
            &parsed.path,
            Entry {
                method: parsed.method.clone(),
                pattern: pattern.to_string(),
                handler,
                var_names: parsed.var_names.clone(),
                trailing_slash: false,
            },
        );
        if tree.max_vars() > routes.pool.capacity() {
            routes.pool = ValuePool::new(tree.max_vars(), self.pool_max_idle);
        }

        if let Some(bare) = parsed.trailing_slash_base() {
            let key = registration_key(TRAILING_SLASH_METHOD, &parsed.host, bare);
            if !routes.registered.contains_key(&key) {
                routes.registered.insert(key, pattern.to_string());
                tree.add(
                    bare,
                    Entry {
                        method: String::new(),
                        pattern: pattern.to_string(),
                        handler: Arc::new(TrailingSlashRedirect {
                            status: self.redirect_status,
                        }),
                        var_names: Vec::new(),
                        trailing_slash: true,
                    },
                );
                log_trailing_slash_synthesized!(pattern = %pattern, path = %bare);
            }
        }

        log_pattern_registered!(
            pattern = %pattern,
            method = %parsed.method,
            host = %parsed.host,
            path = %parsed.path
        );
        Ok(())
    }

    /// Resolve the handler for `req` and the pattern it was registered with.
    ///
    /// A handler is always returned: when nothing matches it is a 404 or 405
    /// handler and the pattern is empty. When the path is not canonical the
    /// handler redirects to the canonical path, while the pattern still
    /// names the route the canonical path matches.
    ///
    /// Variables are published into the request's [`PathVars`] only if it
    /// already carries one.
    pub fn handler(&self, req: &mut Request<B>) -> (BoxHandler<B>, String) {
        let uri = req.uri().clone();
        let connect = req.method() == Method::CONNECT;
        let path = if connect {
            Cow::Borrowed(uri.path())
        } else {
            clean_path(uri.path())
        };

        let mut pattern = String::new();
        let handler: BoxHandler<B> = {
            let routed = routing_path(&path);
            let routes = self.routes.read();
            let outcome = routes.lookup(request_host(req), connect, &routed, req.method().as_str());
            match outcome {
                Match::Found { entry, captures } => {
                    if !entry.var_names.is_empty() {
                        if let Some(vars) = req.extensions_mut().get_mut::<PathVars>() {
                            for (name, span) in entry.var_names.iter().zip(captures.spans()) {
                                if !name.is_empty() {
                                    vars.insert(name, &decode_value(&routed[span.clone()]));
                                }
                            }
                        }
                    }
                    pattern.clone_from(&entry.pattern);
                    Arc::clone(&entry.handler)
                }
                Match::MethodNotAllowed { allowed } => {
                    log_method_not_allowed!(
                        method = %req.method(),
                        path = %path,
                        allowed = ?allowed
                    );
                    Arc::new(MethodNotAllowed::new(allowed))
                }
                Match::NotFound => {
                    log_route_not_found!(method = %req.method(), path = %path);
                    Arc::new(NotFound)
                }
            }
        };

        if path != uri.path() {
            let location = with_query(path.into_owned(), uri.query());
            log_request_redirected!(from = %uri.path(), to = %location);
            let redirect: BoxHandler<B> = Arc::new(Redirect::new(location, self.redirect_status));
            return (redirect, pattern);
        }
        (handler, pattern)
    }

    /// Dispatch `req` and produce its response.
    pub fn serve(&self, mut req: Request<B>) -> Response<Body> {
        if req.uri() == "*" {
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = StatusCode::BAD_REQUEST;
            if req.version() >= Version::HTTP_11 {
                response
                    .headers_mut()
                    .insert(header::CONNECTION, HeaderValue::from_static("close"));
            }
            return response;
        }

        configure_request(&mut req);
        let (handler, _) = self.handler(&mut req);
        handler.serve(req)
    }
}

/// The authority of an absolute-form target, else the `Host` header.
fn request_host<B>(req: &Request<B>) -> &str {
    if let Some(authority) = req.uri().authority() {
        return authority.as_str();
    }
    req.headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

impl<B: 'static> Default for ServeMux<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> fmt::Debug for ServeMux<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let routes = self.routes.read();
        let mut hosts: Vec<&str> = routes.hosts.keys().map(String::as_str).collect();
        hosts.sort_unstable();
        f.debug_struct("ServeMux")
            .field("patterns", &routes.registered.len())
            .field("hosts", &hosts)
            .field("redirect_status", &self.redirect_status)
            .finish_non_exhaustive()
    }
}

impl<B: 'static> Service<Request<B>> for ServeMux<B> {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        ready(Ok(self.serve(req)))
    }
}
