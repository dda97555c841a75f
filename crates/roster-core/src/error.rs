//! Error types for `roster-core`.
//!
//! [`Rejection`] is the domain taxonomy: expected, recoverable outcomes whose
//! messages are fit to show an end user. [`Error`] adds the single opaque
//! infrastructure arm that storage and hashing failures collapse into.

use thiserror::Error;

use crate::slot::Slot;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
  /// Unknown provider, consumer or session, or a session owned by someone
  /// else. The two cases are not distinguished.
  #[error("not found")]
  NotFound,

  #[error("that identifier is already registered")]
  DuplicateIdentity,

  #[error("incorrect identifier or secret")]
  BadCredential,

  #[error("you already have a session on {0}")]
  SlotConflict(Slot),

  #[error("a provider may hold at most {limit} sessions")]
  CapacityLimitExceeded { limit: usize },

  #[error("this session is full")]
  SessionFull,

  #[error("already enrolled in this session")]
  AlreadyEnrolled,

  #[error("not enrolled in this session")]
  NotEnrolled,

  /// The consumer already holds another session at the same slot.
  #[error("you are already enrolled in another session on {0}")]
  ScheduleConflict(Slot),

  #[error("day must be 0-5 and hour 0-12 (got day {day}, hour {hour})")]
  InvalidSlot { day: i64, hour: i64 },

  #[error("capacity must be at least 1 (got {0})")]
  InvalidCapacity(i64),

  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("too many failed attempts; try again in {retry_after_secs} seconds")]
  Throttled { retry_after_secs: u64 },
}

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Rejected(#[from] Rejection),

  /// Storage or hashing failure. Displays a fixed message; the cause is
  /// reachable only through [`std::error::Error::source`].
  #[error("internal error")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn internal(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
    Self::Internal(source.into())
  }

  /// The domain rejection, if this is one.
  pub fn rejection(&self) -> Option<&Rejection> {
    match self {
      Self::Rejected(r) => Some(r),
      Self::Internal(_) => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
