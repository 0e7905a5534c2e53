//! Pattern grammar: `[METHOD ][HOST]PATH`.
//!
//! Parsing produces the method, the host, a normalized path in which every
//! variable element is reduced to a marker (`{}` for one segment, `{...}` for
//! the remainder of the path) and the ordered list of variable names. Two
//! patterns that differ only in variable names normalize identically.

use std::str::FromStr;
use std::sync::LazyLock;

use http::uri::Authority;
use regex::Regex;

use crate::error::SyntaxError;
use crate::path::{clean_path, routing_path};

/// Marker for a single-segment variable in a normalized path.
pub(crate) const VAR_MARKER: &str = "{}";

/// Marker for a trailing wildcard variable in a normalized path.
pub(crate) const WILDCARD_MARKER: &str = "{...}";

/// Terminal marker: the pattern matches its path exactly, without the
/// implicit trailing wildcard.
const END_MARKER: &str = "{$}";

/// Variable names: a letter or `_`, then letters, digits or `_`.
static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[_\p{L}][_\p{L}\p{N}]*$").expect("identifier regex compiles")
});

/// A parsed pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    /// Method, empty when the pattern accepts any method.
    pub method: String,
    /// Host, empty when the pattern applies to every host.
    pub host: String,
    /// Path with variables replaced by markers and literal segments in
    /// routing form.
    pub path: String,
    /// Variable names in path order; empty names are anonymous.
    pub var_names: Vec<String>,
}

impl Pattern {
    /// Parse a pattern string.
    pub fn parse(pattern: &str) -> Result<Self, SyntaxError> {
        let (method, host_path) = match pattern.split_once(' ') {
            Some((method, host_path)) => (method, host_path),
            None => ("", pattern),
        };

        if !method.is_empty() && !method.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(SyntaxError::InvalidMethod);
        }

        if host_path.is_empty() {
            return Err(SyntaxError::EmptyHostPath);
        }

        let (host, path) = match host_path.find('/') {
            Some(i) => host_path.split_at(i),
            None => (host_path, ""),
        };

        if !host.is_empty() {
            validate_host(host)?;
        }
        if path.is_empty() {
            return Err(SyntaxError::MissingPath);
        }

        let (path, var_names) = normalize_path(&clean_path(path))?;

        Ok(Self {
            method: method.to_string(),
            host: host.to_string(),
            path,
            var_names,
        })
    }

    /// The key used to detect duplicate registrations.
    pub(crate) fn key(&self) -> String {
        registration_key(&self.method, &self.host, &self.path)
    }

    /// The bare path (without its final `/`) in front of the trailing
    /// wildcard, if the wildcard is the only variable and follows a literal
    /// longer than `/`.
    ///
    /// Such patterns get a redirect from the bare path to the slash form.
    pub(crate) fn trailing_slash_base(&self) -> Option<&str> {
        if self.var_names.len() != 1 {
            return None;
        }
        let base = self.path.strip_suffix(WILDCARD_MARKER)?;
        let bare = base.strip_suffix('/')?;
        (!bare.is_empty()).then_some(bare)
    }
}

impl FromStr for Pattern {
    type Err = SyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Builds a registration key from its parts.
pub(crate) fn registration_key(method: &str, host: &str, path: &str) -> String {
    let mut key = String::with_capacity(method.len() + host.len() + path.len() + 1);
    key.push_str(method);
    key.push(' ');
    key.push_str(host);
    key.push_str(path);
    key
}

/// A host must round-trip as the authority of an `http://` URL: no userinfo,
/// and a port, if present, must be numeric.
fn validate_host(host: &str) -> Result<(), SyntaxError> {
    let authority = Authority::from_str(host).map_err(|_| SyntaxError::InvalidHost)?;
    if authority.as_str() != host || host.contains('@') || authority.host().is_empty() {
        return Err(SyntaxError::InvalidHost);
    }

    let has_port = match host.rfind(']') {
        Some(i) => host[i..].contains(':'),
        None => host.contains(':'),
    };
    if has_port && authority.port_u16().is_none() {
        return Err(SyntaxError::InvalidHost);
    }
    Ok(())
}

/// Rewrites a canonical pattern path into its normalized form and collects
/// the variable names.
fn normalize_path(path: &str) -> Result<(String, Vec<String>), SyntaxError> {
    let mut path = path.to_string();

    // `/dir/` is shorthand for `/dir/{...}`
    if path.ends_with('/') {
        path.push_str(WILDCARD_MARKER);
    }
    if let Some(exact) = path.strip_suffix(END_MARKER) {
        path.truncate(exact.len());
    }
    if path.contains(END_MARKER) {
        return Err(SyntaxError::MisplacedEndMarker);
    }

    if !path.contains(['{', '}']) {
        return Ok((routing_path(&path).into_owned(), Vec::new()));
    }

    let mut normalized = String::with_capacity(path.len());
    let mut var_names: Vec<String> = Vec::new();
    let mut elements = path.split('/').peekable();
    let mut first = true;

    while let Some(element) = elements.next() {
        if !first {
            normalized.push('/');
        }
        first = false;

        if !element.contains(['{', '}']) {
            normalized.push_str(&routing_path(element));
            continue;
        }

        let name = element
            .strip_prefix('{')
            .and_then(|e| e.strip_suffix('}'))
            .filter(|name| !name.contains(['{', '}']))
            .ok_or_else(|| SyntaxError::MixedElement(element.to_string()))?;

        let (name, wildcard) = match name.strip_suffix("...") {
            Some(name) => (name, true),
            None => (name, false),
        };

        if wildcard && elements.peek().is_some() {
            return Err(if elements.clone().any(|e| e.contains("...}")) {
                SyntaxError::MultipleWildcards
            } else {
                SyntaxError::WildcardNotLast
            });
        }

        if !name.is_empty() {
            if !IDENTIFIER.is_match(name) {
                return Err(SyntaxError::InvalidVariableName(name.to_string()));
            }
            if var_names.iter().any(|existing| existing == name) {
                return Err(SyntaxError::DuplicateVariableName(name.to_string()));
            }
        }
        var_names.push(name.to_string());

        normalized.push_str(if wildcard { WILDCARD_MARKER } else { VAR_MARKER });
    }

    Ok((normalized, var_names))
}
