//! The `ReservationStore` trait.
//!
//! Implemented by storage backends (e.g. `roster-store-sqlite`). The
//! [`Engine`](crate::engine::Engine) depends on this abstraction, not on any
//! concrete backend.
//!
//! Every mutating method is a single atomic unit: it either applies fully or
//! leaves the store untouched. Backends must enforce the catalog and ledger
//! invariants themselves, under whatever locking makes them hold against
//! concurrent callers; the engine only validates argument shape.

use std::future::Future;

use crate::{
  identity::{Consumer, ConsumerSummary, Identity, NewConsumer, NewProvider, Provider, Role},
  session::{AvailableSession, ConsumerSession, NewSession, Session, SessionId, SessionSummary},
};

/// Abstraction over a reservation store backend.
///
/// Domain failures travel inside `Self::Error` and must convert into
/// [`crate::Error::Rejected`]; everything else converts into
/// [`crate::Error::Internal`].
pub trait ReservationStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  // ── Identity Directory ────────────────────────────────────────────────

  /// Persist a new provider. Fails with `DuplicateIdentity` if the
  /// identifier is taken in either identity table.
  fn insert_provider(
    &self,
    input: NewProvider,
  ) -> impl Future<Output = Result<Provider, Self::Error>> + Send + '_;

  /// Persist a new consumer. Same uniqueness rule as [`insert_provider`].
  ///
  /// [`insert_provider`]: ReservationStore::insert_provider
  fn insert_consumer(
    &self,
    input: NewConsumer,
  ) -> impl Future<Output = Result<Consumer, Self::Error>> + Send + '_;

  fn get_provider<'a>(
    &'a self,
    identifier: &'a str,
  ) -> impl Future<Output = Result<Option<Provider>, Self::Error>> + Send + 'a;

  fn get_consumer<'a>(
    &'a self,
    identifier: &'a str,
  ) -> impl Future<Output = Result<Option<Consumer>, Self::Error>> + Send + 'a;

  /// Look `identifier` up in both tables at once.
  fn lookup<'a>(
    &'a self,
    identifier: &'a str,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + 'a;

  /// The stored credential digest for `identifier` in the `role` table.
  fn credential_digest<'a>(
    &'a self,
    role: Role,
    identifier: &'a str,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;

  /// Replace the stored digest. `NotFound` if the identity does not exist.
  fn update_credential_digest<'a>(
    &'a self,
    role: Role,
    identifier: &'a str,
    digest: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Session Catalog ───────────────────────────────────────────────────

  /// Create a session for an existing provider, copying the provider's
  /// subject.
  ///
  /// Fails with `NotFound`, `CapacityLimitExceeded` (the provider already
  /// owns [`MAX_SESSIONS_PER_PROVIDER`](crate::session::MAX_SESSIONS_PER_PROVIDER))
  /// or `SlotConflict`.
  fn create_session(
    &self,
    input: NewSession,
  ) -> impl Future<Output = Result<Session, Self::Error>> + Send + '_;

  /// Delete a session owned by `provider` together with its enrollments.
  /// `NotFound` covers both "no such session" and "owned by someone else".
  fn delete_session<'a>(
    &'a self,
    session: SessionId,
    provider: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// All sessions owned by `provider`, ordered by slot.
  fn list_sessions_for_provider<'a>(
    &'a self,
    provider: &'a str,
  ) -> impl Future<Output = Result<Vec<SessionSummary>, Self::Error>> + Send + 'a;

  // ── Enrollment Ledger ─────────────────────────────────────────────────

  /// Enroll `consumer` in `session`.
  ///
  /// Fails with `NotFound`, `AlreadyEnrolled`, `SessionFull` or
  /// `ScheduleConflict`. The capacity check and the insert must be atomic
  /// with respect to every other `join` on the same session.
  fn join<'a>(
    &'a self,
    session: SessionId,
    consumer: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Remove an enrollment. `NotEnrolled` if there is none.
  fn leave<'a>(
    &'a self,
    session: SessionId,
    consumer: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Sessions `consumer` is enrolled in, ordered by slot.
  fn list_sessions_for_consumer<'a>(
    &'a self,
    consumer: &'a str,
  ) -> impl Future<Output = Result<Vec<ConsumerSession>, Self::Error>> + Send + 'a;

  /// Consumers enrolled in a session owned by `provider`, ordered by name.
  fn list_enrolled_consumers<'a>(
    &'a self,
    session: SessionId,
    provider: &'a str,
  ) -> impl Future<Output = Result<Vec<ConsumerSummary>, Self::Error>> + Send + 'a;

  // ── Availability Query ────────────────────────────────────────────────

  /// Every session annotated for `consumer`, optionally restricted to
  /// subjects containing `subject` (case-insensitive). Computed from a
  /// single snapshot. Backends may fold case for ASCII letters only.
  fn list_available_sessions<'a>(
    &'a self,
    consumer: &'a str,
    subject: Option<&'a str>,
  ) -> impl Future<Output = Result<Vec<AvailableSession>, Self::Error>> + Send + 'a;
}
