//! Encoding and decoding helpers between Rust domain types and the plain
//! column values stored in SQLite.
//!
//! Timestamps are stored as RFC 3339 strings, slots as two small integers,
//! counts as SQLite integers.

use chrono::{DateTime, Utc};
use roster_core::{
  identity::{Consumer, ConsumerSummary, Provider},
  session::{AvailableSession, ConsumerSession, Session, SessionId, SessionSummary},
  slot::Slot,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Integers ────────────────────────────────────────────────────────────────

fn decode_count(field: &str, n: i64) -> Result<u32> {
  u32::try_from(n).map_err(|_| Error::InvalidRow(format!("{field} out of range: {n}")))
}

fn decode_slot(day: i64, hour: i64) -> Result<Slot> {
  Slot::new(day, hour).map_err(|e| Error::InvalidRow(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawSession::from_row`]; callers alias `sessions`
/// as `s`.
pub const SESSION_COLUMNS: &str =
  "s.session_id, s.provider, s.subject, s.day, s.hour, s.capacity, s.created_at";

/// Number of columns in [`SESSION_COLUMNS`]; extra columns start here.
pub const SESSION_WIDTH: usize = 7;

/// Raw values read directly from a `sessions` row.
pub struct RawSession {
  pub session_id: i64,
  pub provider:   String,
  pub subject:    String,
  pub day:        i64,
  pub hour:       i64,
  pub capacity:   i64,
  pub created_at: String,
}

impl RawSession {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      session_id: row.get(0)?,
      provider:   row.get(1)?,
      subject:    row.get(2)?,
      day:        row.get(3)?,
      hour:       row.get(4)?,
      capacity:   row.get(5)?,
      created_at: row.get(6)?,
    })
  }

  pub fn into_session(self) -> Result<Session> {
    Ok(Session {
      id:         SessionId(self.session_id),
      provider:   self.provider,
      subject:    self.subject,
      slot:       decode_slot(self.day, self.hour)?,
      capacity:   decode_count("capacity", self.capacity)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// A session row plus its enrollment count.
pub struct RawSessionSummary {
  pub session:  RawSession,
  pub enrolled: i64,
}

impl RawSessionSummary {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      session:  RawSession::from_row(row)?,
      enrolled: row.get(SESSION_WIDTH)?,
    })
  }

  pub fn into_summary(self) -> Result<SessionSummary> {
    Ok(SessionSummary {
      session:  self.session.into_session()?,
      enrolled: decode_count("enrolled", self.enrolled)?,
    })
  }
}

/// A session row joined with its provider's name and enrollment count.
pub struct RawConsumerSession {
  pub session:       RawSession,
  pub provider_name: String,
  pub enrolled:      i64,
}

impl RawConsumerSession {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      session:       RawSession::from_row(row)?,
      provider_name: row.get(SESSION_WIDTH)?,
      enrolled:      row.get(SESSION_WIDTH + 1)?,
    })
  }

  pub fn into_consumer_session(self) -> Result<ConsumerSession> {
    Ok(ConsumerSession {
      session:       self.session.into_session()?,
      provider_name: self.provider_name,
      enrolled:      decode_count("enrolled", self.enrolled)?,
    })
  }
}

/// One availability row as computed by the snapshot query.
pub struct RawAvailable {
  pub session:       RawSession,
  pub provider_name: String,
  pub enrolled:      i64,
  pub joined:        bool,
  pub conflict:      bool,
}

impl RawAvailable {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      session:       RawSession::from_row(row)?,
      provider_name: row.get(SESSION_WIDTH)?,
      enrolled:      row.get(SESSION_WIDTH + 1)?,
      joined:        row.get(SESSION_WIDTH + 2)?,
      conflict:      row.get(SESSION_WIDTH + 3)?,
    })
  }

  pub fn into_available(self) -> Result<AvailableSession> {
    let session = self.session.into_session()?;
    let enrolled = decode_count("enrolled", self.enrolled)?;
    Ok(AvailableSession {
      remaining:      session.capacity.saturating_sub(enrolled),
      session,
      provider_name:  self.provider_name,
      already_joined: self.joined,
      has_conflict:   self.conflict,
    })
  }
}

/// Raw values read from a `providers` row (credential excluded).
pub struct RawProvider {
  pub identifier:    String,
  pub name:          String,
  pub subject:       String,
  pub registered_at: String,
}

impl RawProvider {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      identifier:    row.get(0)?,
      name:          row.get(1)?,
      subject:       row.get(2)?,
      registered_at: row.get(3)?,
    })
  }

  pub fn into_provider(self) -> Result<Provider> {
    Ok(Provider {
      identifier:    self.identifier,
      name:          self.name,
      subject:       self.subject,
      registered_at: decode_dt(&self.registered_at)?,
    })
  }
}

/// Raw values read from a `consumers` row (credential excluded).
pub struct RawConsumer {
  pub identifier:    String,
  pub name:          String,
  pub registered_at: String,
}

impl RawConsumer {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      identifier:    row.get(0)?,
      name:          row.get(1)?,
      registered_at: row.get(2)?,
    })
  }

  pub fn into_consumer(self) -> Result<Consumer> {
    Ok(Consumer {
      identifier:    self.identifier,
      name:          self.name,
      registered_at: decode_dt(&self.registered_at)?,
    })
  }

  pub fn into_summary(self) -> ConsumerSummary {
    ConsumerSummary { identifier: self.identifier, name: self.name }
  }
}
