//! Error types for the connection registry.
//!
//! Lookups against an unknown key and failures reported by a registered
//! resource are the only two ways a registry operation can fail.

use crate::connection::{BoxError, ConnectionOp};
use thiserror::Error;

/// Main error type for registry operations.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Connection not found: {key}")]
    NotFound { key: String },

    /// The resource's own `ping`/`close`/`reconnect` failed.
    ///
    /// `source` is exactly what the resource returned.
    #[error("Connection {op} failed for {key}: {source}")]
    Connection {
        key: String,
        op: ConnectionOp,
        #[source]
        source: BoxError,
    },
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, PoolError>;

impl PoolError {
    pub(crate) fn not_found(key: &str) -> Self {
        PoolError::NotFound {
            key: key.to_string(),
        }
    }

    pub(crate) fn connection(key: &str, op: ConnectionOp, source: BoxError) -> Self {
        PoolError::Connection {
            key: key.to_string(),
            op,
            source,
        }
    }

    /// Whether the key had no registered connection.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PoolError::NotFound { .. })
    }

    /// The key the failed operation targeted.
    pub fn key(&self) -> &str {
        match self {
            PoolError::NotFound { key } | PoolError::Connection { key, .. } => key,
        }
    }

    /// The resource operation that failed, if the failure came from the resource.
    pub fn op(&self) -> Option<ConnectionOp> {
        match self {
            PoolError::NotFound { .. } => None,
            PoolError::Connection { op, .. } => Some(*op),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[derive(Debug, Error)]
    #[error("DB connection is lost")]
    struct Lost;

    #[test]
    fn test_error_display() {
        let err = PoolError::not_found("db");
        assert_eq!(err.to_string(), "Connection not found: db");

        let err = PoolError::connection("db", ConnectionOp::Ping, Box::new(Lost));
        assert_eq!(
            err.to_string(),
            "Connection ping failed for db: DB connection is lost"
        );
    }

    #[test]
    fn test_accessors() {
        let err = PoolError::not_found("cache");
        assert!(err.is_not_found());
        assert_eq!(err.key(), "cache");
        assert_eq!(err.op(), None);

        let err = PoolError::connection("cache", ConnectionOp::Reconnect, Box::new(Lost));
        assert!(!err.is_not_found());
        assert_eq!(err.key(), "cache");
        assert_eq!(err.op(), Some(ConnectionOp::Reconnect));
    }

    #[test]
    fn test_source_is_preserved() {
        let err = PoolError::connection("db", ConnectionOp::Close, Box::new(Lost));
        let source = err.source().expect("connection errors carry a source");
        assert!(source.downcast_ref::<Lost>().is_some());
    }
}
