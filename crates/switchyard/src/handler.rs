//! Request handlers, and the handlers the multiplexer generates itself.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::{Method, Request, Response, StatusCode};
use http_body_util::Full;

/// Response body produced by handlers.
pub type Body = Full<Bytes>;

/// Shared handler reference stored in the routing table.
pub type BoxHandler<B> = Arc<dyn Handler<B>>;

/// Serves a request.
pub trait Handler<B>: Send + Sync + 'static {
    /// Produce the response for `req`.
    fn serve(&self, req: Request<B>) -> Response<Body>;
}

impl<B, H> Handler<B> for Arc<H>
where
    H: Handler<B> + ?Sized,
{
    fn serve(&self, req: Request<B>) -> Response<Body> {
        (**self).serve(req)
    }
}

/// Adapts a closure into a [`Handler`].
#[derive(Clone)]
pub struct HandlerFn<F>(pub F);

impl<B, F> Handler<B> for HandlerFn<F>
where
    F: Fn(Request<B>) -> Response<Body> + Send + Sync + 'static,
{
    fn serve(&self, req: Request<B>) -> Response<Body> {
        (self.0)(req)
    }
}

impl<F> fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFn").finish_non_exhaustive()
    }
}

/// Build a plain-text response.
pub fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Body> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response.headers_mut().insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response
}

/// Build a redirect response to `location`.
///
/// `GET` and `HEAD` requests receive a short HTML body linking the target.
pub fn redirect_response(method: &Method, location: &str, status: StatusCode) -> Response<Body> {
    let body = if method == Method::GET || method == Method::HEAD {
        let reason = status.canonical_reason().unwrap_or("Redirect");
        Bytes::from(format!(
            "<a href=\"{}\">{}</a>.\n\n",
            html_escape(location),
            reason
        ))
    } else {
        Bytes::new()
    };

    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    if let Ok(value) = HeaderValue::from_str(location) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    if method == Method::GET || method == Method::HEAD {
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
    }
    response
}

fn html_escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Appends `?query` to `path` unless the query is absent or empty.
pub(crate) fn with_query(mut path: String, query: Option<&str>) -> String {
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        path.push('?');
        path.push_str(query);
    }
    path
}

/// Responds 404.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFound;

impl<B> Handler<B> for NotFound {
    fn serve(&self, _req: Request<B>) -> Response<Body> {
        text_response(StatusCode::NOT_FOUND, "404 page not found\n")
    }
}

/// Responds 405, listing the methods the matched path does accept.
#[derive(Debug, Clone, Default)]
pub struct MethodNotAllowed {
    allowed: Vec<String>,
}

impl MethodNotAllowed {
    /// Create the handler for the given allowed methods.
    pub fn new(allowed: Vec<String>) -> Self {
        Self { allowed }
    }

    /// Methods advertised in the `Allow` header.
    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }
}

impl<B> Handler<B> for MethodNotAllowed {
    fn serve(&self, _req: Request<B>) -> Response<Body> {
        let mut response =
            text_response(StatusCode::METHOD_NOT_ALLOWED, "405 method not allowed\n");
        if !self.allowed.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&self.allowed.join(", ")) {
                response.headers_mut().insert(header::ALLOW, value);
            }
        }
        response
    }
}

/// Redirects to a fixed location.
#[derive(Debug, Clone)]
pub struct Redirect {
    location: String,
    status: StatusCode,
}

impl Redirect {
    /// Create a redirect to `location` with the given status.
    pub fn new(location: impl Into<String>, status: StatusCode) -> Self {
        Self {
            location: location.into(),
            status,
        }
    }

    /// The redirect target.
    pub fn location(&self) -> &str {
        &self.location
    }
}

impl<B> Handler<B> for Redirect {
    fn serve(&self, req: Request<B>) -> Response<Body> {
        redirect_response(req.method(), &self.location, self.status)
    }
}

/// Redirects a bare path to the same path with a `/` appended, keeping the
/// query string.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TrailingSlashRedirect {
    pub(crate) status: StatusCode,
}

impl<B> Handler<B> for TrailingSlashRedirect {
    fn serve(&self, req: Request<B>) -> Response<Body> {
        let mut path = req.uri().path().to_string();
        path.push('/');
        let location = with_query(path, req.uri().query());
        redirect_response(req.method(), &location, self.status)
    }
}
