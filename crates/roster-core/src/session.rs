//! Session Catalog and Enrollment Ledger read models.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::slot::Slot;

/// Capacity used when a provider does not pick one.
pub const DEFAULT_CAPACITY: u32 = 5;

/// Most sessions a single provider may own at once.
pub const MAX_SESSIONS_PER_PROVIDER: usize = 3;

/// Store-assigned session identifier.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// A provider-owned, capacity-bounded offering at a fixed slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub id:         SessionId,
  /// Identifier of the owning provider.
  pub provider:   String,
  /// Copy of the provider's subject at creation time.
  pub subject:    String,
  pub slot:       Slot,
  pub capacity:   u32,
  pub created_at: DateTime<Utc>,
}

/// A session with its current head-count, as a provider sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
  #[serde(flatten)]
  pub session:  Session,
  pub enrolled: u32,
}

/// A session a consumer is enrolled in, with the provider's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerSession {
  #[serde(flatten)]
  pub session:       Session,
  pub provider_name: String,
  pub enrolled:      u32,
}

/// One row of the availability report for a particular consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableSession {
  #[serde(flatten)]
  pub session:        Session,
  pub provider_name:  String,
  /// `capacity - enrolled`, never negative.
  pub remaining:      u32,
  /// The consumer is already enrolled in this exact session.
  pub already_joined: bool,
  /// The consumer holds a different session at the same slot.
  pub has_conflict:   bool,
}

impl AvailableSession {
  /// Whether a `join` by this consumer would currently be accepted.
  pub fn joinable(&self) -> bool {
    self.remaining > 0 && !self.already_joined && !self.has_conflict
  }
}

/// Input to [`crate::store::ReservationStore::create_session`].
#[derive(Debug, Clone)]
pub struct NewSession {
  pub provider: String,
  pub slot:     Slot,
  pub capacity: u32,
}
