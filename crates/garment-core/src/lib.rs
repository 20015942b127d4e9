//! Garment - a thread-safe registry of named connections.
//!
//! Register long-lived resources (database clients, sockets, any stateful
//! handle) under a string key, then health-check, reconnect or close them by
//! key from anywhere in the program without knowing their concrete type.
//!
//! # Example
//!
//! ```rust
//! use garment::{BoxError, Connection, ConnectionPool};
//! use std::sync::atomic::{AtomicBool, Ordering};
//!
//! struct Client {
//!     up: AtomicBool,
//! }
//!
//! impl Connection for Client {
//!     fn ping(&self) -> Result<(), BoxError> {
//!         if self.up.load(Ordering::SeqCst) {
//!             Ok(())
//!         } else {
//!             Err("connection lost".into())
//!         }
//!     }
//!
//!     fn close(&self) -> Result<(), BoxError> {
//!         self.up.store(false, Ordering::SeqCst);
//!         Ok(())
//!     }
//!
//!     fn reconnect(&self) -> Result<(), BoxError> {
//!         self.up.store(true, Ordering::SeqCst);
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> garment::Result<()> {
//!     let pool = ConnectionPool::new();
//!     pool.set("db", Client { up: AtomicBool::new(true) });
//!
//!     pool.ping("db")?;
//!     pool.close("db")?;
//!     assert!(pool.ping("db").is_err());
//!
//!     pool.reconnect("db")?;
//!     pool.ping("db")?;
//!
//!     pool.remove("db");
//!     assert!(!pool.has("db"));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod pool;

// Re-export commonly used types
pub use config::PoolConfig;
pub use connection::{BoxError, CallbackConnection, Connection, ConnectionOp};
pub use error::{PoolError, Result};
pub use pool::{ConnectionInfo, ConnectionPool, ConnectionPoolBuilder, PoolStats};
