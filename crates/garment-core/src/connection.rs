//! The connection capability and its closure-based adapter.
//!
//! A [`Connection`] is anything the pool can health-check, tear down and
//! re-establish. Resource types implement the trait directly; callers that
//! only have a value plus three functions wrap them in a
//! [`CallbackConnection`].

use std::fmt;
use std::sync::Arc;

/// Error type returned by connection operations.
///
/// The pool never inspects it; it is handed back to the caller unchanged.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A long-lived resource managed by a [`ConnectionPool`](crate::ConnectionPool).
///
/// All methods run while the pool's lock is held. Implementations must be
/// quick and must never call back into the pool that owns them, or the
/// calling thread deadlocks.
pub trait Connection: Send + Sync + 'static {
    /// Check that the resource is still alive.
    fn ping(&self) -> Result<(), BoxError>;

    /// Release the resource.
    fn close(&self) -> Result<(), BoxError>;

    /// Re-establish a lost resource.
    fn reconnect(&self) -> Result<(), BoxError>;
}

/// The lifecycle operations a pool can invoke on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionOp {
    Ping,
    Close,
    Reconnect,
}

impl ConnectionOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionOp::Ping => "ping",
            ConnectionOp::Close => "close",
            ConnectionOp::Reconnect => "reconnect",
        }
    }

    /// Run this operation against a connection.
    pub fn apply(self, connection: &dyn Connection) -> Result<(), BoxError> {
        match self {
            ConnectionOp::Ping => connection.ping(),
            ConnectionOp::Close => connection.close(),
            ConnectionOp::Reconnect => connection.reconnect(),
        }
    }
}

impl fmt::Display for ConnectionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Callback<T> = Box<dyn Fn(&T) -> Result<(), BoxError> + Send + Sync>;

/// A plain value paired with ping/close/reconnect functions.
///
/// All three callbacks are required up front, so a registered value can
/// never be missing one of them.
///
/// # Example
///
/// ```
/// use garment::{CallbackConnection, Connection};
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// let conn = CallbackConnection::new(
///     AtomicBool::new(true),
///     |up| if up.load(Ordering::SeqCst) { Ok(()) } else { Err("down".into()) },
///     |up| { up.store(false, Ordering::SeqCst); Ok(()) },
///     |up| { up.store(true, Ordering::SeqCst); Ok(()) },
/// );
///
/// assert!(conn.ping().is_ok());
/// conn.close().unwrap();
/// assert!(conn.ping().is_err());
/// ```
pub struct CallbackConnection<T> {
    value: Arc<T>,
    ping: Callback<T>,
    close: Callback<T>,
    reconnect: Callback<T>,
}

impl<T: Send + Sync + 'static> CallbackConnection<T> {
    /// Wrap an owned value with its callbacks.
    pub fn new<P, C, R>(value: T, ping: P, close: C, reconnect: R) -> Self
    where
        P: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
        C: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
        R: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self::from_arc(Arc::new(value), ping, close, reconnect)
    }

    /// Wrap a value the caller already shares elsewhere.
    pub fn from_arc<P, C, R>(value: Arc<T>, ping: P, close: C, reconnect: R) -> Self
    where
        P: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
        C: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
        R: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            value,
            ping: Box::new(ping),
            close: Box::new(close),
            reconnect: Box::new(reconnect),
        }
    }

    /// The wrapped value.
    pub fn value(&self) -> &Arc<T> {
        &self.value
    }
}

impl<T: Send + Sync + 'static> Connection for CallbackConnection<T> {
    fn ping(&self) -> Result<(), BoxError> {
        (self.ping)(&self.value)
    }

    fn close(&self) -> Result<(), BoxError> {
        (self.close)(&self.value)
    }

    fn reconnect(&self) -> Result<(), BoxError> {
        (self.reconnect)(&self.value)
    }
}

impl<T> fmt::Debug for CallbackConnection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackConnection")
            .field("value", &std::any::type_name::<T>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

    struct Counter {
        pings: AtomicU32,
        closes: AtomicU32,
        reconnects: AtomicU32,
    }

    impl Counter {
        fn new() -> Self {
            Self {
                pings: AtomicU32::new(0),
                closes: AtomicU32::new(0),
                reconnects: AtomicU32::new(0),
            }
        }
    }

    impl Connection for Counter {
        fn ping(&self) -> Result<(), BoxError> {
            self.pings.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn close(&self) -> Result<(), BoxError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn reconnect(&self) -> Result<(), BoxError> {
            self.reconnects.fetch_add(1, Ordering::SeqCst);
            Err("reconnect refused".into())
        }
    }

    #[test]
    fn test_op_display() {
        assert_eq!(ConnectionOp::Ping.to_string(), "ping");
        assert_eq!(ConnectionOp::Close.to_string(), "close");
        assert_eq!(ConnectionOp::Reconnect.to_string(), "reconnect");
    }

    #[test]
    fn test_op_apply_dispatches() {
        let counter = Counter::new();

        assert!(ConnectionOp::Ping.apply(&counter).is_ok());
        assert!(ConnectionOp::Close.apply(&counter).is_ok());
        let err = ConnectionOp::Reconnect.apply(&counter).unwrap_err();
        assert_eq!(err.to_string(), "reconnect refused");

        assert_eq!(counter.pings.load(Ordering::SeqCst), 1);
        assert_eq!(counter.closes.load(Ordering::SeqCst), 1);
        assert_eq!(counter.reconnects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_connection_uses_value() {
        let conn = CallbackConnection::new(
            AtomicU8::new(1),
            |state| {
                if state.load(Ordering::SeqCst) == 1 {
                    Ok(())
                } else {
                    Err("DB connection is lost".into())
                }
            },
            |state| {
                state.store(0, Ordering::SeqCst);
                Ok(())
            },
            |state| {
                state.store(1, Ordering::SeqCst);
                Ok(())
            },
        );

        assert!(conn.ping().is_ok());
        conn.close().unwrap();
        assert_eq!(conn.value().load(Ordering::SeqCst), 0);
        assert_eq!(conn.ping().unwrap_err().to_string(), "DB connection is lost");
        conn.reconnect().unwrap();
        assert!(conn.ping().is_ok());
    }

    #[test]
    fn test_from_arc_shares_value() {
        let shared = Arc::new(AtomicU8::new(1));
        let conn = CallbackConnection::from_arc(
            shared.clone(),
            |_| Ok(()),
            |state| {
                state.store(0, Ordering::SeqCst);
                Ok(())
            },
            |_| Ok(()),
        );

        conn.close().unwrap();
        assert_eq!(shared.load(Ordering::SeqCst), 0);
        assert!(Arc::ptr_eq(conn.value(), &shared));
    }
}
