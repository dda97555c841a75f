//! SQLite backend for the Roster reservation engine.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every mutation is one `BEGIN
//! IMMEDIATE` transaction, which serialises writers across connections and
//! processes sharing the same file.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{DEFAULT_BUSY_TIMEOUT, SqliteStore};
