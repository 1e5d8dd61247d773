//! Error types for routing.

use thiserror::Error;

/// A boxed error produced by application code inside a handler.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Router-specific errors.
#[derive(Debug, Error)]
pub enum RouterError {
    /// A mutation targeted a route that is not registered.
    #[error("route not found: {method} {path}")]
    RouteNotFound { method: String, path: String },

    /// A group mutation targeted a relative path the group does not own.
    #[error("group route not found: {rel_path}")]
    GroupRouteNotFound { rel_path: String },

    /// A handler in the middleware chain failed.
    #[error("middleware[{index}] error: {source}")]
    Chain {
        index: usize,
        #[source]
        source: Box<RouterError>,
    },

    /// The chain of a dispatched route failed.
    #[error("chain error: {0}")]
    Dispatch(#[source] Box<RouterError>),

    /// A handler aborted the request with an HTTP status.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// An application error propagated by a handler.
    #[error(transparent)]
    Handler(#[from] BoxError),

    /// A static request resolved outside its root directory.
    #[error("forbidden path: {0}")]
    Forbidden(String),

    /// Filesystem failure while serving static content.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// `render` was called on a route without a renderer.
    #[error("no renderer registered for this route")]
    NoRenderer,

    /// The renderer failed.
    #[error("render error: {0}")]
    Render(String),

    /// The requested byte range cannot be satisfied.
    #[error("requested range not satisfiable")]
    InvalidRange,
}

impl RouterError {
    /// Creates an error that aborts the request with the given status.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Returns the HTTP status code this error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Chain { source, .. } | Self::Dispatch(source) => source.status_code(),
            Self::Status { status, .. } => *status,
            Self::RouteNotFound { .. } | Self::GroupRouteNotFound { .. } => 404,
            Self::Forbidden(_) => 403,
            Self::InvalidRange => 416,
            Self::Handler(_) | Self::Io(_) | Self::NoRenderer | Self::Render(_) => 500,
        }
    }

    /// Returns the innermost error, skipping chain bookkeeping.
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Chain { source, .. } | Self::Dispatch(source) => source.root_cause(),
            other => other,
        }
    }
}

/// Result type alias for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_unwraps_chain() {
        let err = RouterError::Dispatch(Box::new(RouterError::Chain {
            index: 1,
            source: Box::new(RouterError::status(401, "unauthorized")),
        }));
        assert_eq!(err.status_code(), 401);
        assert!(matches!(
            err.root_cause(),
            RouterError::Status { status: 401, .. }
        ));
    }

    #[test]
    fn test_chain_message_carries_index() {
        let err = RouterError::Chain {
            index: 2,
            source: Box::new(RouterError::NoRenderer),
        };
        assert_eq!(
            err.to_string(),
            "middleware[2] error: no renderer registered for this route"
        );
    }
}
