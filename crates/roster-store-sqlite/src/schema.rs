//! SQL schema for the Roster SQLite store.
//!
//! `PRAGMA user_version` records how many entries of [`MIGRATIONS`] have been
//! applied. Each migration runs in its own immediate transaction that
//! re-reads the version first, so two connections opening the same file at
//! once cannot apply a step twice.

use rusqlite::{Connection, TransactionBehavior};

/// Per-connection settings; SQLite does not persist these, so every open
/// applies them.
pub fn configure(conn: &Connection) -> rusqlite::Result<()> {
  // `journal_mode` answers with the resulting mode, so read it back.
  let mode: String =
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |r| r.get(0))?;
  tracing::debug!(%mode, "journal mode");
  conn.pragma_update(None, "foreign_keys", true)
}

const V1_RESERVATIONS: &str = "
CREATE TABLE IF NOT EXISTS providers (
    identifier     TEXT PRIMARY KEY,
    name           TEXT NOT NULL,
    subject        TEXT NOT NULL,
    credential     TEXT NOT NULL,   -- opaque digest from the credential store
    registered_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS consumers (
    identifier     TEXT PRIMARY KEY,
    name           TEXT NOT NULL,
    credential     TEXT NOT NULL,
    registered_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    session_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    provider    TEXT NOT NULL REFERENCES providers(identifier) ON DELETE CASCADE,
    subject     TEXT NOT NULL,   -- provider's subject when the session was created
    day         INTEGER NOT NULL CHECK (day  BETWEEN 0 AND 5),
    hour        INTEGER NOT NULL CHECK (hour BETWEEN 0 AND 12),
    capacity    INTEGER NOT NULL CHECK (capacity > 0),
    created_at  TEXT NOT NULL,
    UNIQUE (provider, day, hour)
);

CREATE TABLE IF NOT EXISTS enrollments (
    session_id   INTEGER NOT NULL REFERENCES sessions(session_id) ON DELETE CASCADE,
    consumer     TEXT NOT NULL REFERENCES consumers(identifier) ON DELETE CASCADE,
    enrolled_at  TEXT NOT NULL,
    PRIMARY KEY (session_id, consumer)
);

CREATE INDEX IF NOT EXISTS sessions_slot_idx        ON sessions(day, hour);
CREATE INDEX IF NOT EXISTS enrollments_consumer_idx ON enrollments(consumer);
";

/// Ordered schema steps. Append only; never edit a released entry.
pub const MIGRATIONS: &[&str] = &[V1_RESERVATIONS];

/// Bring the schema up to `MIGRATIONS.len()`. Returns the final version.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<usize> {
  configure(conn)?;

  loop {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let version: i64 = tx.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    let version = usize::try_from(version).unwrap_or(0);

    let Some(step) = MIGRATIONS.get(version) else {
      return Ok(version);
    };

    tx.execute_batch(step)?;
    tx.pragma_update(None, "user_version", (version + 1) as i64)?;
    tx.commit()?;
    tracing::info!(version = version + 1, "applied schema migration");
  }
}
