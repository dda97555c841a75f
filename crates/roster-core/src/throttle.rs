//! Per-identity login throttling.
//!
//! Consecutive failures are counted per (role, identifier). Once the count
//! reaches [`ThrottlePolicy::max_failures`], further attempts are refused
//! until a lockout window has elapsed since the last failure. The window
//! doubles with every failure past the threshold, up to
//! [`ThrottlePolicy::lockout_max_secs`]. Nothing here sleeps; callers are
//! told how long to wait.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::identity::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottlePolicy {
  /// Failures tolerated before a lockout starts.
  pub max_failures:      u32,
  /// Length of the first lockout window.
  pub lockout_base_secs: u64,
  /// Upper bound on any lockout window.
  pub lockout_max_secs:  u64,
}

impl Default for ThrottlePolicy {
  fn default() -> Self {
    Self { max_failures: 5, lockout_base_secs: 30, lockout_max_secs: 15 * 60 }
  }
}

impl ThrottlePolicy {
  /// Lockout window after `failures` consecutive failures, if any.
  fn window(&self, failures: u32) -> Option<Duration> {
    if failures < self.max_failures {
      return None;
    }
    let doublings = (failures - self.max_failures).min(32);
    let secs = self
      .lockout_base_secs
      .saturating_mul(1u64 << doublings)
      .min(self.lockout_max_secs);
    Some(seconds(secs))
  }

  /// Time after which a record can no longer cause a lockout.
  fn retention(&self) -> Duration { seconds(self.lockout_max_secs) }
}

/// `secs` as a [`Duration`], saturating at the largest representable one.
fn seconds(secs: u64) -> Duration {
  i64::try_from(secs)
    .ok()
    .and_then(Duration::try_seconds)
    .unwrap_or(Duration::MAX)
}

/// `at + span`, saturating at the latest representable instant.
fn after(at: DateTime<Utc>, span: Duration) -> DateTime<Utc> {
  at.checked_add_signed(span).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[derive(Debug, Clone, Copy)]
struct FailureRecord {
  failures:     u32,
  last_failure: DateTime<Utc>,
}

/// In-memory failure ledger. One per engine.
///
/// An attempt is counted as a failure from the moment [`LoginThrottle::begin`]
/// admits it, so concurrent guesses cannot all slip past the threshold before
/// any of them is recorded. A successful login clears the count.
#[derive(Debug, Default)]
pub struct LoginThrottle {
  policy:  ThrottlePolicy,
  records: Mutex<HashMap<(Role, String), FailureRecord>>,
}

impl LoginThrottle {
  pub fn new(policy: ThrottlePolicy) -> Self {
    Self { policy, records: Mutex::new(HashMap::new()) }
  }

  pub fn policy(&self) -> &ThrottlePolicy { &self.policy }

  /// Admit an attempt at `now`.
  ///
  /// Returns the consecutive-failure count the identity will carry if this
  /// attempt fails, or `Err(secs)` with the seconds the caller must still
  /// wait. Records idle for longer than the longest lockout are dropped.
  pub async fn begin(&self, role: Role, identifier: &str, now: DateTime<Utc>) -> Result<u32, u64> {
    let mut records = self.records.lock().await;
    let retention = self.policy.retention();
    records.retain(|_, r| now < after(r.last_failure, retention));

    let record = records
      .entry((role, identifier.to_owned()))
      .or_insert(FailureRecord { failures: 0, last_failure: now });

    if let Some(window) = self.policy.window(record.failures) {
      let unlocks_at = after(record.last_failure, window);
      if now < unlocks_at {
        let remaining = (unlocks_at - now).num_milliseconds();
        // Round up so a caller never retries a moment too early.
        return Err((remaining.saturating_add(999) / 1000).max(1) as u64);
      }
    }

    record.failures = record.failures.saturating_add(1);
    record.last_failure = now;
    Ok(record.failures)
  }

  /// Forget all failures for this identity.
  pub async fn record_success(&self, role: Role, identifier: &str) {
    self.records.lock().await.remove(&(role, identifier.to_owned()));
  }

  #[cfg(test)]
  async fn tracked(&self) -> usize { self.records.lock().await.len() }
}
