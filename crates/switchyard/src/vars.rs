//! Request-scoped store of path variable values.

use std::collections::HashMap;

use http::Request;

/// Named path variables resolved for a request.
///
/// Stored in the request extensions. Anonymous variables are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathVars(HashMap<String, String>);

impl PathVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of the variable `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn insert(&mut self, name: &str, value: &str) {
        self.0.insert(name.to_string(), value.to_string());
    }
}

/// The variables published for `req`, if it carries a store.
pub fn path_vars<B>(req: &Request<B>) -> Option<&PathVars> {
    req.extensions().get::<PathVars>()
}

/// Ensure `req` carries a variable store, creating an empty one if needed.
///
/// An existing store is left as it is.
pub fn configure_request<B>(req: &mut Request<B>) -> &mut PathVars {
    req.extensions_mut().get_or_insert_default::<PathVars>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrouted_request_has_no_vars() {
        let req = Request::new(());
        assert!(path_vars(&req).is_none());
    }

    #[test]
    fn configure_request_creates_store_once() {
        let mut req = Request::new(());
        configure_request(&mut req).insert("id", "7");
        configure_request(&mut req);

        let vars = path_vars(&req).expect("store present");
        assert_eq!(vars.get("id"), Some("7"));
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn iter_yields_pairs() {
        let mut vars = PathVars::new();
        vars.insert("owner", "rust-lang");
        vars.insert("repo", "rust");
        let mut pairs: Vec<_> = vars.iter().collect();
        pairs.sort();
        assert_eq!(pairs, vec![("owner", "rust-lang"), ("repo", "rust")]);
        assert!(!vars.is_empty());
    }
}
