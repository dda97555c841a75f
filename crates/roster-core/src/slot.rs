//! Slots: coordinates in the fixed weekly grid.
//!
//! The week runs Sunday (day 0) through Friday (day 5); each day has thirteen
//! one-hour slots numbered 0 through 12. There is no timezone and no calendar
//! date attached.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Rejection;

pub const DAYS: usize = 6;
pub const HOURS: usize = 13;

const DAY_NAMES: [&str; DAYS] =
  ["Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday"];

/// A validated (day, hour) pair. Construct with [`Slot::new`].
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "RawSlot", into = "RawSlot")]
pub struct Slot {
  day:  u8,
  hour: u8,
}

impl Slot {
  /// Validate and build a slot. Out-of-range values are rejected with
  /// [`Rejection::InvalidSlot`].
  pub fn new(day: i64, hour: i64) -> Result<Self, Rejection> {
    if !(0..DAYS as i64).contains(&day) || !(0..HOURS as i64).contains(&hour) {
      return Err(Rejection::InvalidSlot { day, hour });
    }
    Ok(Self { day: day as u8, hour: hour as u8 })
  }

  pub fn day(self) -> u8 { self.day }

  pub fn hour(self) -> u8 { self.hour }

  pub fn day_name(self) -> &'static str { DAY_NAMES[self.day as usize] }

  /// Every slot in grid order (day-major).
  pub fn all() -> impl Iterator<Item = Slot> {
    (0..DAYS as u8)
      .flat_map(|day| (0..HOURS as u8).map(move |hour| Slot { day, hour }))
  }
}

impl fmt::Display for Slot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} hour {}", self.day_name(), self.hour)
  }
}

// ─── Serde bridge ────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct RawSlot {
  day:  i64,
  hour: i64,
}

impl TryFrom<RawSlot> for Slot {
  type Error = Rejection;

  fn try_from(raw: RawSlot) -> Result<Self, Self::Error> { Slot::new(raw.day, raw.hour) }
}

impl From<Slot> for RawSlot {
  fn from(s: Slot) -> Self { RawSlot { day: s.day.into(), hour: s.hour.into() } }
}
