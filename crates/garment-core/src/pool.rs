//! Thread-safe registry of named connections.
//!
//! A [`ConnectionPool`] maps string keys to exactly one [`Connection`] each.
//! Every operation goes through a single `RwLock` over the whole map, so all
//! calls are linearizable: each one takes effect atomically between its
//! invocation and return.
//!
//! # Locking
//!
//! - Lookups (`get`, `has`, `count`, `keys`, `info`, `stats`) share the lock.
//! - Mutations and resource invocations (`set`, `remove`, `ping`, `close`,
//!   `reconnect`, ...) hold it exclusively.
//!
//! Resource callbacks run while the exclusive lock is held. A slow callback
//! stalls every other caller, and a callback that touches the same pool
//! deadlocks.

use crate::config::PoolConfig;
use crate::connection::{BoxError, CallbackConnection, Connection, ConnectionOp};
use crate::error::{PoolError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace, warn};

static GLOBAL_POOL: LazyLock<ConnectionPool> = LazyLock::new(|| {
    debug!("Initializing global connection pool");
    ConnectionPool::builder()
        .name(PoolConfig::GLOBAL_POOL_NAME)
        .build()
});

/// One registered resource.
struct Entry {
    /// The resource as its capability.
    connection: Arc<dyn Connection>,
    /// The value handed back by `get`.
    handle: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    registered_at: DateTime<Utc>,
}

/// Public description of a registered connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub key: String,
    /// Rust type name of the registered value.
    pub type_name: String,
    pub registered_at: DateTime<Utc>,
}

/// Snapshot of a pool's contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub name: String,
    pub count: usize,
    /// Registered keys in sorted order.
    pub keys: Vec<String>,
}

/// Registry of named connections guarded by one coarse lock.
///
/// Build one at the composition root and share it by `Arc`, or use
/// [`ConnectionPool::global`] for the process-wide instance.
///
/// # Example
///
/// ```
/// use garment::ConnectionPool;
/// use std::sync::atomic::{AtomicU8, Ordering};
///
/// let pool = ConnectionPool::new();
/// pool.set_with(
///     "db",
///     AtomicU8::new(1),
///     |s| if s.load(Ordering::SeqCst) == 1 { Ok(()) } else { Err("lost".into()) },
///     |s| { s.store(0, Ordering::SeqCst); Ok(()) },
///     |s| { s.store(1, Ordering::SeqCst); Ok(()) },
/// );
///
/// assert_eq!(pool.count(), 1);
/// assert!(pool.ping("db").is_ok());
/// pool.close("db").unwrap();
/// assert!(pool.ping("db").is_err());
/// pool.reconnect("db").unwrap();
/// assert!(pool.ping("db").is_ok());
/// ```
pub struct ConnectionPool {
    name: String,
    entries: RwLock<HashMap<String, Entry>>,
}

impl ConnectionPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create an empty pool with room for `capacity` connections.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::builder().capacity(capacity).build()
    }

    /// Start configuring a pool.
    pub fn builder() -> ConnectionPoolBuilder {
        ConnectionPoolBuilder::new()
    }

    /// The process-wide pool.
    ///
    /// Created empty on first access; every call from every thread returns
    /// the same instance.
    pub fn global() -> &'static ConnectionPool {
        &GLOBAL_POOL
    }

    /// Name used in logs and stats.
    pub fn name(&self) -> &str {
        &self.name
    }

    // ========================================
    // Lookups
    // ========================================

    /// Get the value registered under `key`.
    ///
    /// Returns `None` if the key is absent or its value is not a `T`. For
    /// connections registered with [`set`](Self::set) the value is the
    /// connection itself; for [`set_with`](Self::set_with) it is the wrapped
    /// value.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let entries = self.read();
        let handle = entries.get(key)?.handle.clone();
        drop(entries);
        handle.downcast::<T>().ok()
    }

    /// Get the connection registered under `key` without knowing its type.
    pub fn get_connection(&self, key: &str) -> Option<Arc<dyn Connection>> {
        self.read().get(key).map(|entry| entry.connection.clone())
    }

    /// Check whether a connection is registered under `key`.
    pub fn has(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Number of registered connections.
    pub fn count(&self) -> usize {
        self.read().len()
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Describe the connection registered under `key`.
    pub fn info(&self, key: &str) -> Option<ConnectionInfo> {
        self.read().get(key).map(|entry| ConnectionInfo {
            key: key.to_string(),
            type_name: entry.type_name.to_string(),
            registered_at: entry.registered_at,
        })
    }

    /// Snapshot of the pool's contents.
    pub fn stats(&self) -> PoolStats {
        let keys = self.keys();
        PoolStats {
            name: self.name.clone(),
            count: keys.len(),
            keys,
        }
    }

    // ========================================
    // Registration
    // ========================================

    /// Register `connection` under `key`, replacing any previous connection.
    ///
    /// Returns the replaced connection. It is not closed.
    pub fn set<C: Connection>(
        &self,
        key: impl Into<String>,
        connection: C,
    ) -> Option<Arc<dyn Connection>> {
        self.set_arc(key, Arc::new(connection))
    }

    /// Register a connection the caller already shares.
    pub fn set_arc<C: Connection>(
        &self,
        key: impl Into<String>,
        connection: Arc<C>,
    ) -> Option<Arc<dyn Connection>> {
        let entry = Entry {
            connection: connection.clone(),
            handle: connection,
            type_name: std::any::type_name::<C>(),
            registered_at: Utc::now(),
        };
        self.insert(key.into(), entry)
    }

    /// Register a plain value together with its ping, close and reconnect
    /// functions.
    ///
    /// [`get::<T>`](Self::get) on this key returns the value.
    pub fn set_with<T, P, C, R>(
        &self,
        key: impl Into<String>,
        value: T,
        ping: P,
        close: C,
        reconnect: R,
    ) -> Option<Arc<dyn Connection>>
    where
        T: Send + Sync + 'static,
        P: Fn(&T) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
        C: Fn(&T) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
        R: Fn(&T) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        let value = Arc::new(value);
        let connection = CallbackConnection::from_arc(value.clone(), ping, close, reconnect);
        let entry = Entry {
            connection: Arc::new(connection),
            handle: value,
            type_name: std::any::type_name::<T>(),
            registered_at: Utc::now(),
        };
        self.insert(key.into(), entry)
    }

    fn insert(&self, key: String, entry: Entry) -> Option<Arc<dyn Connection>> {
        let previous = self.write().insert(key.clone(), entry);
        match &previous {
            Some(old) => debug!(
                "Pool {}: replaced connection {} ({})",
                self.name, key, old.type_name
            ),
            None => debug!("Pool {}: registered connection {}", self.name, key),
        }
        previous.map(|old| old.connection)
    }

    /// Forget the connection under `key` without closing it.
    ///
    /// Removing an absent key is a no-op.
    pub fn remove(&self, key: &str) {
        // Bind the removed entry so it drops after the guard is released.
        let removed = self.write().remove(key);
        if removed.is_some() {
            debug!("Pool {}: removed connection {}", self.name, key);
        }
    }

    /// Remove the connection under `key` and hand it back to the caller.
    pub fn take(&self, key: &str) -> Option<Arc<dyn Connection>> {
        let removed = self.write().remove(key)?;
        debug!("Pool {}: took connection {}", self.name, key);
        Some(removed.connection)
    }

    /// Forget every connection without closing any. Returns how many were
    /// dropped.
    pub fn clear(&self) -> usize {
        let drained: Vec<Entry> = {
            let mut entries = self.write();
            entries.drain().map(|(_, entry)| entry).collect()
        };
        debug!(
            "Pool {}: cleared {} connections",
            self.name,
            drained.len()
        );
        drained.len()
    }

    // ========================================
    // Resource operations
    // ========================================

    /// Health-check the connection under `key`.
    pub fn ping(&self, key: &str) -> Result<()> {
        self.invoke(key, ConnectionOp::Ping)
    }

    /// Close the connection under `key`. The entry stays registered.
    pub fn close(&self, key: &str) -> Result<()> {
        self.invoke(key, ConnectionOp::Close)
    }

    /// Re-establish the connection under `key`.
    pub fn reconnect(&self, key: &str) -> Result<()> {
        self.invoke(key, ConnectionOp::Reconnect)
    }

    /// Close the connection under `key` and remove it in one step.
    ///
    /// The entry is removed even if closing fails; the close error is still
    /// returned.
    pub fn close_and_remove(&self, key: &str) -> Result<()> {
        let mut entries = self.write();
        let entry = entries
            .remove(key)
            .ok_or_else(|| PoolError::not_found(key))?;
        let outcome = entry.connection.close();
        drop(entries);

        debug!("Pool {}: closed and removed connection {}", self.name, key);
        outcome.map_err(|source| self.failed(key, ConnectionOp::Close, source))
    }

    /// Ping every registered connection once, in key order.
    pub fn ping_all(&self) -> Vec<(String, Result<()>)> {
        let entries = self.write();
        let mut keys: Vec<&String> = entries.keys().collect();
        keys.sort();

        keys.into_iter()
            .map(|key| {
                let outcome = entries[key]
                    .connection
                    .ping()
                    .map_err(|source| self.failed(key, ConnectionOp::Ping, source));
                (key.clone(), outcome)
            })
            .collect()
    }

    fn invoke(&self, key: &str, op: ConnectionOp) -> Result<()> {
        let entries = self.write();
        let entry = entries.get(key).ok_or_else(|| {
            trace!("Pool {}: {} on unknown connection {}", self.name, op, key);
            PoolError::not_found(key)
        })?;
        let outcome = op.apply(entry.connection.as_ref());
        drop(entries);
        outcome.map_err(|source| self.failed(key, op, source))
    }

    fn failed(&self, key: &str, op: ConnectionOp, source: BoxError) -> PoolError {
        debug!(
            "Pool {}: {} failed for connection {}: {}",
            self.name, op, key, source
        );
        PoolError::connection(key, op, source)
    }

    // A callback that panicked poisons the lock, but callbacks never touch the
    // map itself, so the data behind a poisoned lock is still consistent.

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.entries.read().unwrap_or_else(|poisoned| {
            warn!("Pool {}: recovering from poisoned lock", self.name);
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.entries.write().unwrap_or_else(|poisoned| {
            warn!("Pool {}: recovering from poisoned lock", self.name);
            poisoned.into_inner()
        })
    }
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("name", &self.name)
            .field("count", &self.count())
            .finish()
    }
}

/// Builder for configuring a [`ConnectionPool`].
///
/// # Example
///
/// ```
/// use garment::ConnectionPool;
///
/// let pool = ConnectionPool::builder()
///     .name("storage")
///     .capacity(4)
///     .build();
/// assert_eq!(pool.name(), "storage");
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionPoolBuilder {
    name: String,
    capacity: usize,
}

impl ConnectionPoolBuilder {
    pub fn new() -> Self {
        Self {
            name: PoolConfig::DEFAULT_POOL_NAME.to_string(),
            capacity: PoolConfig::DEFAULT_CAPACITY,
        }
    }

    /// Name reported in logs and stats.
    ///
    /// Default: `"pool"`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Initial capacity of the underlying map.
    ///
    /// Default: `16`
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn build(self) -> ConnectionPool {
        ConnectionPool {
            name: self.name,
            entries: RwLock::new(HashMap::with_capacity(self.capacity)),
        }
    }
}

impl Default for ConnectionPoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}
