//! Error types for routing.

use thiserror::Error;

/// Errors raised by route handlers and middleware during dispatch.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Router-specific errors.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Malformed route path template.
    #[error("invalid route path `{path}`: {reason}")]
    InvalidRoutePath { path: String, reason: String },

    /// `{name:type}` used a type that is not in the pattern registry.
    #[error("unknown parameter pattern `{pattern}` for `{parameter}` in `{path}`")]
    InvalidParameterPattern {
        path: String,
        parameter: String,
        pattern: String,
    },

    /// A custom pattern fragment cannot be used for parameter matching.
    #[error("invalid pattern fragment `{name}`: {reason}")]
    InvalidPatternFragment { name: String, reason: String },

    /// Two routes were registered under the same name.
    #[error("duplicate route name: {0}")]
    DuplicateRouteName(String),

    /// Two static routes claim the same path and method.
    #[error("route `{existing}` already handles {method} {path}")]
    DuplicateRoutePath {
        method: String,
        path: String,
        existing: String,
    },

    /// Route name not found.
    #[error("route not found: {0}")]
    RouteNotFound(String),

    /// URL generation without a required parameter.
    #[error("missing parameter `{parameter}` for route `{route}`")]
    MissingParameter { route: String, parameter: String },

    /// A route references middleware that was never registered.
    #[error("route `{route}` uses unknown middleware `{middleware}`")]
    UnknownMiddleware { route: String, middleware: String },

    /// A named handler reference could not be resolved.
    #[error("no handler registered as `{0}`")]
    UnknownHandler(String),

    /// A route handler panicked while producing a response.
    #[error("route handler panicked: {0}")]
    HandlerPanicked(String),

    /// Middleware panicked before a response was produced.
    #[error("middleware panicked: {0}")]
    MiddlewarePanicked(String),

    /// Unparseable HTTP method token.
    #[error("invalid request method: {0}")]
    InvalidMethod(String),

    /// The route holds a closure and cannot be written to a cache file.
    #[error("route `{0}` has a closure handler and cannot be cached")]
    NotCacheable(String),

    /// Route cache contents are inconsistent.
    #[error("invalid route cache: {0}")]
    Cache(String),

    /// IO error reading or writing cache and config files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error for cache and config files.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;
