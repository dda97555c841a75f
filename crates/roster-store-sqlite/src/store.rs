//! [`SqliteStore`], the SQLite implementation of [`ReservationStore`].
//!
//! Every mutation runs inside one `BEGIN IMMEDIATE` transaction, so the
//! checks that guard an insert and the insert itself hold the database write
//! lock together. Domain outcomes decided inside a transaction come back as
//! `Ok(Err(Rejection))` from the connection thread; the transaction is rolled
//! back by drop on that path.

use std::{path::Path, time::Duration};

use chrono::Utc;
use rusqlite::{ErrorCode, OptionalExtension as _, TransactionBehavior};

use roster_core::{
  Rejection,
  identity::{Consumer, ConsumerSummary, Identity, NewConsumer, NewProvider, Provider, Role},
  session::{
    AvailableSession, ConsumerSession, MAX_SESSIONS_PER_PROVIDER, NewSession, Session, SessionId,
    SessionSummary,
  },
  slot::Slot,
  store::ReservationStore,
};

use crate::{
  Result,
  encode::{
    RawAvailable, RawConsumer, RawConsumerSession, RawProvider, RawSessionSummary, SESSION_COLUMNS,
    encode_dt,
  },
  schema,
};

/// How long a connection waits on another writer before giving up.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a closure run on the connection thread.
type Decided<T> = std::result::Result<T, Rejection>;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A reservation store backed by a single SQLite file.
///
/// Cloning is cheap; clones share one connection thread. Separate
/// [`SqliteStore::open`] calls on the same path get separate connections
/// that coordinate through SQLite's file locks.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and bring its schema up to date.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT).await
  }

  /// Like [`open`](Self::open) with an explicit busy timeout.
  pub async fn open_with_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init(busy_timeout).await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init(DEFAULT_BUSY_TIMEOUT).await?;
    Ok(store)
  }

  async fn init(&self, busy_timeout: Duration) -> Result<()> {
    let version = self
      .conn
      .call(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        Ok(schema::migrate(conn)?)
      })
      .await?;
    tracing::debug!(version, "sqlite store ready");
    Ok(())
  }

  /// The schema version recorded in `PRAGMA user_version`.
  pub async fn schema_version(&self) -> Result<i64> {
    let version = self
      .conn
      .call(|conn| Ok(conn.query_row("PRAGMA user_version", [], |r| r.get(0))?))
      .await?;
    Ok(version)
  }

  /// Fetch one session with its head-count.
  #[cfg(test)]
  pub(crate) async fn get_session(&self, session: SessionId) -> Result<Option<SessionSummary>> {
    let id = session.0;

    let raw = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {SESSION_COLUMNS},
                  (SELECT COUNT(*) FROM enrollments e WHERE e.session_id = s.session_id)
             FROM sessions s
            WHERE s.session_id = ?1"
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id], RawSessionSummary::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSessionSummary::into_summary).transpose()
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _) if f.code == ErrorCode::ConstraintViolation
  )
}

/// Whether `identifier` is registered under either role.
fn identifier_taken(conn: &rusqlite::Connection, identifier: &str) -> rusqlite::Result<bool> {
  conn.query_row(
    "SELECT EXISTS (SELECT 1 FROM providers WHERE identifier = ?1)
         OR EXISTS (SELECT 1 FROM consumers WHERE identifier = ?1)",
    rusqlite::params![identifier],
    |r| r.get(0),
  )
}

fn query_provider(
  conn: &rusqlite::Connection,
  identifier: &str,
) -> rusqlite::Result<Option<RawProvider>> {
  conn
    .query_row(
      "SELECT identifier, name, subject, registered_at FROM providers WHERE identifier = ?1",
      rusqlite::params![identifier],
      RawProvider::from_row,
    )
    .optional()
}

fn query_consumer(
  conn: &rusqlite::Connection,
  identifier: &str,
) -> rusqlite::Result<Option<RawConsumer>> {
  conn
    .query_row(
      "SELECT identifier, name, registered_at FROM consumers WHERE identifier = ?1",
      rusqlite::params![identifier],
      RawConsumer::from_row,
    )
    .optional()
}

fn owns_session(
  conn: &rusqlite::Connection,
  session: i64,
  provider: &str,
) -> rusqlite::Result<bool> {
  conn.query_row(
    "SELECT EXISTS (SELECT 1 FROM sessions WHERE session_id = ?1 AND provider = ?2)",
    rusqlite::params![session, provider],
    |r| r.get(0),
  )
}

// ─── ReservationStore impl ───────────────────────────────────────────────────

impl ReservationStore for SqliteStore {
  type Error = crate::Error;

  // ── Identity Directory ────────────────────────────────────────────────────

  async fn insert_provider(&self, input: NewProvider) -> Result<Provider> {
    let provider = Provider {
      identifier:    input.identifier,
      name:          input.name,
      subject:       input.subject,
      registered_at: Utc::now(),
    };

    let id      = provider.identifier.clone();
    let name    = provider.name.clone();
    let subject = provider.subject.clone();
    let at_str  = encode_dt(provider.registered_at);
    let digest  = input.digest;

    let outcome: Decided<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if identifier_taken(&tx, &id)? {
          return Ok(Err(Rejection::DuplicateIdentity));
        }
        match tx.execute(
          "INSERT INTO providers (identifier, name, subject, credential, registered_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id, name, subject, digest, at_str],
        ) {
          Ok(_) => {}
          Err(e) if is_constraint_violation(&e) => return Ok(Err(Rejection::DuplicateIdentity)),
          Err(e) => return Err(e.into()),
        }
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;

    outcome?;
    Ok(provider)
  }

  async fn insert_consumer(&self, input: NewConsumer) -> Result<Consumer> {
    let consumer = Consumer {
      identifier:    input.identifier,
      name:          input.name,
      registered_at: Utc::now(),
    };

    let id     = consumer.identifier.clone();
    let name   = consumer.name.clone();
    let at_str = encode_dt(consumer.registered_at);
    let digest = input.digest;

    let outcome: Decided<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if identifier_taken(&tx, &id)? {
          return Ok(Err(Rejection::DuplicateIdentity));
        }
        match tx.execute(
          "INSERT INTO consumers (identifier, name, credential, registered_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id, name, digest, at_str],
        ) {
          Ok(_) => {}
          Err(e) if is_constraint_violation(&e) => return Ok(Err(Rejection::DuplicateIdentity)),
          Err(e) => return Err(e.into()),
        }
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;

    outcome?;
    Ok(consumer)
  }

  async fn get_provider<'a>(&'a self, identifier: &'a str) -> Result<Option<Provider>> {
    let id = identifier.to_owned();
    let raw = self.conn.call(move |conn| Ok(query_provider(conn, &id)?)).await?;
    raw.map(RawProvider::into_provider).transpose()
  }

  async fn get_consumer<'a>(&'a self, identifier: &'a str) -> Result<Option<Consumer>> {
    let id = identifier.to_owned();
    let raw = self.conn.call(move |conn| Ok(query_consumer(conn, &id)?)).await?;
    raw.map(RawConsumer::into_consumer).transpose()
  }

  async fn lookup<'a>(&'a self, identifier: &'a str) -> Result<Option<Identity>> {
    let id = identifier.to_owned();

    let (provider, consumer) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let provider = query_provider(&tx, &id)?;
        let consumer = if provider.is_none() { query_consumer(&tx, &id)? } else { None };
        Ok((provider, consumer))
      })
      .await?;

    if let Some(raw) = provider {
      return Ok(Some(Identity::Provider(raw.into_provider()?)));
    }
    consumer
      .map(|raw| raw.into_consumer().map(Identity::Consumer))
      .transpose()
  }

  async fn credential_digest<'a>(
    &'a self,
    role: Role,
    identifier: &'a str,
  ) -> Result<Option<String>> {
    let sql = match role {
      Role::Provider => "SELECT credential FROM providers WHERE identifier = ?1",
      Role::Consumer => "SELECT credential FROM consumers WHERE identifier = ?1",
    };
    let id = identifier.to_owned();

    let digest = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(sql, rusqlite::params![id], |r| r.get(0)).optional()?)
      })
      .await?;
    Ok(digest)
  }

  async fn update_credential_digest<'a>(
    &'a self,
    role: Role,
    identifier: &'a str,
    digest: String,
  ) -> Result<()> {
    let sql = match role {
      Role::Provider => "UPDATE providers SET credential = ?2 WHERE identifier = ?1",
      Role::Consumer => "UPDATE consumers SET credential = ?2 WHERE identifier = ?1",
    };
    let id = identifier.to_owned();

    let changed = self
      .conn
      .call(move |conn| Ok(conn.execute(sql, rusqlite::params![id, digest])?))
      .await?;

    if changed == 0 {
      return Err(Rejection::NotFound.into());
    }
    Ok(())
  }

  // ── Session Catalog ───────────────────────────────────────────────────────

  async fn create_session(&self, input: NewSession) -> Result<Session> {
    let NewSession { provider, slot, capacity } = input;
    let created_at = Utc::now();

    let owner  = provider.clone();
    let day    = i64::from(slot.day());
    let hour   = i64::from(slot.hour());
    let at_str = encode_dt(created_at);

    let outcome: Decided<(i64, String)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let subject: Option<String> = tx
          .query_row(
            "SELECT subject FROM providers WHERE identifier = ?1",
            rusqlite::params![owner],
            |r| r.get(0),
          )
          .optional()?;
        let Some(subject) = subject else {
          return Ok(Err(Rejection::NotFound));
        };

        let owned: i64 = tx.query_row(
          "SELECT COUNT(*) FROM sessions WHERE provider = ?1",
          rusqlite::params![owner],
          |r| r.get(0),
        )?;
        if owned >= MAX_SESSIONS_PER_PROVIDER as i64 {
          return Ok(Err(Rejection::CapacityLimitExceeded { limit: MAX_SESSIONS_PER_PROVIDER }));
        }

        let taken: bool = tx.query_row(
          "SELECT EXISTS (
             SELECT 1 FROM sessions WHERE provider = ?1 AND day = ?2 AND hour = ?3
           )",
          rusqlite::params![owner, day, hour],
          |r| r.get(0),
        )?;
        if taken {
          return Ok(Err(Rejection::SlotConflict(slot)));
        }

        match tx.execute(
          "INSERT INTO sessions (provider, subject, day, hour, capacity, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![owner, subject, day, hour, capacity, at_str],
        ) {
          Ok(_) => {}
          Err(e) if is_constraint_violation(&e) => return Ok(Err(Rejection::SlotConflict(slot))),
          Err(e) => return Err(e.into()),
        }
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(Ok((id, subject)))
      })
      .await?;

    let (id, subject) = outcome?;
    Ok(Session { id: SessionId(id), provider, subject, slot, capacity, created_at })
  }

  async fn delete_session<'a>(&'a self, session: SessionId, provider: &'a str) -> Result<()> {
    let owner = provider.to_owned();
    let id = session.0;

    let outcome: Decided<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !owns_session(&tx, id, &owner)? {
          return Ok(Err(Rejection::NotFound));
        }
        tx.execute("DELETE FROM enrollments WHERE session_id = ?1", rusqlite::params![id])?;
        tx.execute("DELETE FROM sessions WHERE session_id = ?1", rusqlite::params![id])?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;

    Ok(outcome?)
  }

  async fn list_sessions_for_provider<'a>(
    &'a self,
    provider: &'a str,
  ) -> Result<Vec<SessionSummary>> {
    let owner = provider.to_owned();

    let raws: Vec<RawSessionSummary> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {SESSION_COLUMNS},
                  (SELECT COUNT(*) FROM enrollments e WHERE e.session_id = s.session_id)
             FROM sessions s
            WHERE s.provider = ?1
            ORDER BY s.day, s.hour, s.session_id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![owner], RawSessionSummary::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSessionSummary::into_summary).collect()
  }

  // ── Enrollment Ledger ─────────────────────────────────────────────────────

  async fn join<'a>(&'a self, session: SessionId, consumer: &'a str) -> Result<()> {
    let who = consumer.to_owned();
    let id = session.0;
    let at_str = encode_dt(Utc::now());

    let outcome: Decided<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let target: Option<(i64, i64, i64)> = tx
          .query_row(
            "SELECT day, hour, capacity FROM sessions WHERE session_id = ?1",
            rusqlite::params![id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
          )
          .optional()?;
        let Some((day, hour, capacity)) = target else {
          return Ok(Err(Rejection::NotFound));
        };

        let known: bool = tx.query_row(
          "SELECT EXISTS (SELECT 1 FROM consumers WHERE identifier = ?1)",
          rusqlite::params![who],
          |r| r.get(0),
        )?;
        if !known {
          return Ok(Err(Rejection::NotFound));
        }

        let enrolled_here: bool = tx.query_row(
          "SELECT EXISTS (
             SELECT 1 FROM enrollments WHERE session_id = ?1 AND consumer = ?2
           )",
          rusqlite::params![id, who],
          |r| r.get(0),
        )?;
        if enrolled_here {
          return Ok(Err(Rejection::AlreadyEnrolled));
        }

        let count: i64 = tx.query_row(
          "SELECT COUNT(*) FROM enrollments WHERE session_id = ?1",
          rusqlite::params![id],
          |r| r.get(0),
        )?;
        if count >= capacity {
          return Ok(Err(Rejection::SessionFull));
        }

        let clash: Option<(i64, i64)> = tx
          .query_row(
            "SELECT s.day, s.hour
               FROM enrollments e
               JOIN sessions s ON s.session_id = e.session_id
              WHERE e.consumer = ?1 AND s.day = ?2 AND s.hour = ?3
              LIMIT 1",
            rusqlite::params![who, day, hour],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;
        if let Some((day, hour)) = clash {
          let slot =
            Slot::new(day, hour).map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
          return Ok(Err(Rejection::ScheduleConflict(slot)));
        }

        match tx.execute(
          "INSERT INTO enrollments (session_id, consumer, enrolled_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![id, who, at_str],
        ) {
          Ok(_) => {}
          Err(e) if is_constraint_violation(&e) => return Ok(Err(Rejection::AlreadyEnrolled)),
          Err(e) => return Err(e.into()),
        }
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;

    Ok(outcome?)
  }

  async fn leave<'a>(&'a self, session: SessionId, consumer: &'a str) -> Result<()> {
    let who = consumer.to_owned();
    let id = session.0;

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM enrollments WHERE session_id = ?1 AND consumer = ?2",
          rusqlite::params![id, who],
        )?)
      })
      .await?;

    if removed == 0 {
      return Err(Rejection::NotEnrolled.into());
    }
    Ok(())
  }

  async fn list_sessions_for_consumer<'a>(
    &'a self,
    consumer: &'a str,
  ) -> Result<Vec<ConsumerSession>> {
    let who = consumer.to_owned();

    let raws: Vec<RawConsumerSession> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {SESSION_COLUMNS},
                  p.name,
                  (SELECT COUNT(*) FROM enrollments c WHERE c.session_id = s.session_id)
             FROM enrollments e
             JOIN sessions  s ON s.session_id = e.session_id
             JOIN providers p ON p.identifier = s.provider
            WHERE e.consumer = ?1
            ORDER BY s.day, s.hour, s.session_id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![who], RawConsumerSession::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawConsumerSession::into_consumer_session).collect()
  }

  async fn list_enrolled_consumers<'a>(
    &'a self,
    session: SessionId,
    provider: &'a str,
  ) -> Result<Vec<ConsumerSummary>> {
    let owner = provider.to_owned();
    let id = session.0;

    let outcome: Decided<Vec<RawConsumer>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !owns_session(&tx, id, &owner)? {
          return Ok(Err(Rejection::NotFound));
        }
        let rows = {
          let mut stmt = tx.prepare(
            "SELECT c.identifier, c.name, c.registered_at
               FROM enrollments e
               JOIN consumers c ON c.identifier = e.consumer
              WHERE e.session_id = ?1
              ORDER BY c.name, c.identifier",
          )?;
          stmt
            .query_map(rusqlite::params![id], RawConsumer::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(Ok(rows))
      })
      .await?;

    Ok(outcome?.into_iter().map(RawConsumer::into_summary).collect())
  }

  // ── Availability Query ────────────────────────────────────────────────────

  /// The subject filter uses SQLite's `lower()`, which folds ASCII letters
  /// only: `"FÍSICA"` does not match `"física"`.
  async fn list_available_sessions<'a>(
    &'a self,
    consumer: &'a str,
    subject: Option<&'a str>,
  ) -> Result<Vec<AvailableSession>> {
    let who = consumer.to_owned();
    let filter = subject.map(str::to_owned);

    let outcome: Decided<Vec<RawAvailable>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let known: bool = tx.query_row(
          "SELECT EXISTS (SELECT 1 FROM consumers WHERE identifier = ?1)",
          rusqlite::params![who],
          |r| r.get(0),
        )?;
        if !known {
          return Ok(Err(Rejection::NotFound));
        }

        let sql = format!(
          "SELECT {SESSION_COLUMNS},
                  p.name,
                  (SELECT COUNT(*) FROM enrollments c WHERE c.session_id = s.session_id),
                  EXISTS (
                    SELECT 1 FROM enrollments j
                     WHERE j.session_id = s.session_id AND j.consumer = ?1
                  ),
                  EXISTS (
                    SELECT 1 FROM enrollments o
                      JOIN sessions x ON x.session_id = o.session_id
                     WHERE o.consumer = ?1
                       AND x.session_id <> s.session_id
                       AND x.day = s.day AND x.hour = s.hour
                  )
             FROM sessions s
             JOIN providers p ON p.identifier = s.provider
            WHERE ?2 IS NULL OR instr(lower(s.subject), lower(?2)) > 0
            ORDER BY s.day, s.hour, s.session_id"
        );
        let rows = {
          let mut stmt = tx.prepare(&sql)?;
          stmt
            .query_map(rusqlite::params![who, filter], RawAvailable::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(Ok(rows))
      })
      .await?;

    outcome?.into_iter().map(RawAvailable::into_available).collect()
  }
}
