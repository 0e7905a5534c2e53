//! Radix-tree HTTP request multiplexer.
//!
//! Patterns of the form `[METHOD ][HOST]PATH` with `{name}` and `{name...}`
//! variables are compiled into a radix tree per host. Lookups walk the tree
//! iteratively with static-over-variable-over-wildcard precedence, capture
//! variable values into pooled buffers and publish them into the request.
//!
//! ```ignore
//! use switchyard::{path_vars, text_response, ServeMux};
//!
//! let mux = ServeMux::new();
//! mux.handle_fn("GET /users/{id}", |req| {
//!     let id = path_vars(&req).and_then(|v| v.get("id")).unwrap_or_default();
//!     text_response(http::StatusCode::OK, format!("user {id}"))
//! })?;
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod mux;
pub mod path;
pub mod pattern;
pub mod pool;
mod tree;
pub mod vars;

pub use config::{HandlerRegistry, MuxConfig, RouteConfig};
pub use error::{ConfigError, RegisterError, SyntaxError};
pub use handler::{
    redirect_response, text_response, Body, BoxHandler, Handler, HandlerFn, MethodNotAllowed,
    NotFound, Redirect,
};
pub use mux::ServeMux;
pub use path::{clean_path, strip_host_port};
pub use pattern::Pattern;
pub use vars::{configure_request, path_vars, PathVars};
