//! Error type for `roster-store-sqlite`.

use roster_core::Rejection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// An expected domain outcome decided inside a transaction.
  #[error(transparent)]
  Rejected(#[from] Rejection),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored row violates an invariant the schema should have prevented.
  #[error("invalid row: {0}")]
  InvalidRow(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for roster_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Rejected(r) => roster_core::Error::Rejected(r),
      other => roster_core::Error::internal(other),
    }
  }
}
