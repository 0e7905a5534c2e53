use thiserror::Error;

/// Grammar violations found while parsing a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    /// The method part contains something other than ASCII letters and digits.
    #[error("method must be alphanumeric")]
    InvalidMethod,

    /// Nothing follows the method.
    #[error("host and path cannot be empty")]
    EmptyHostPath,

    /// The host does not parse as a URL authority.
    #[error("invalid host")]
    InvalidHost,

    /// The pattern has no path (every pattern path starts with `/`).
    #[error("path is required and must start with '/'")]
    MissingPath,

    /// `{$}` used anywhere but at the very end.
    #[error("\"{{$}}\" can only appear at the end of a path")]
    MisplacedEndMarker,

    /// An element mixes literal text and a variable, or has stray braces.
    #[error("path element {0:?} must either be a variable or literal")]
    MixedElement(String),

    /// More than one `...` variable.
    #[error("only one wildcard variable is allowed in a path")]
    MultipleWildcards,

    /// A `...` variable that is not the last element.
    #[error("wildcard variable can only appear at the end of a path")]
    WildcardNotLast,

    /// A variable name that is neither empty nor an identifier.
    #[error("variable name {0:?} must be empty or an identifier")]
    InvalidVariableName(String),

    /// The same variable name used twice.
    #[error("duplicate variable name {0:?}")]
    DuplicateVariableName(String),
}

/// Errors produced when registering a pattern.
///
/// All of these indicate a programming or configuration mistake. They are
/// returned rather than raised so the caller decides how to abort startup.
#[derive(Debug, Error)]
pub enum RegisterError {
    /// The pattern string is empty.
    #[error("empty pattern")]
    EmptyPattern,

    /// No handler was supplied for the pattern.
    #[error("no handler for pattern {pattern:?}")]
    MissingHandler { pattern: String },

    /// The pattern does not follow the grammar.
    #[error("invalid pattern {pattern:?}: {source}")]
    Syntax {
        pattern: String,
        #[source]
        source: SyntaxError,
    },

    /// The pattern normalizes to the same key as an already registered one.
    #[error("pattern {pattern:?} conflicts with {existing:?}")]
    Conflict { pattern: String, existing: String },
}

/// Errors produced while loading a multiplexer configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML decoding failed.
    #[error("invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Redirects must be permanent: 301 or 308.
    #[error("redirect status must be 301 or 308, got {0}")]
    InvalidRedirectStatus(u16),

    /// A configured route could not be registered.
    #[error(transparent)]
    Register(#[from] RegisterError),
}
