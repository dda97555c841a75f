//! [`Engine`], the reservation engine.
//!
//! Owns an injected [`ReservationStore`] handle and a [`CredentialStore`],
//! validates every argument before it reaches storage, and translates store
//! errors into the [`Rejection`] / internal split of [`crate::Error`]. The
//! store is the only place state lives; the engine itself keeps nothing but
//! the login throttle.

use chrono::Utc;

use crate::{
  Error, Result,
  credential::CredentialStore,
  error::Rejection,
  grid::WeekGrid,
  identity::{
    Consumer, ConsumerSummary, Identity, NewConsumer, NewProvider, Provider, Role,
    normalize_identifier, required,
  },
  session::{
    AvailableSession, ConsumerSession, DEFAULT_CAPACITY, NewSession, Session, SessionId,
    SessionSummary,
  },
  slot::Slot,
  store::ReservationStore,
  throttle::{LoginThrottle, ThrottlePolicy},
};

pub struct Engine<S, C> {
  store:       S,
  credentials: C,
  throttle:    LoginThrottle,
}

impl<S, C> Engine<S, C>
where
  S: ReservationStore,
  C: CredentialStore,
{
  pub fn new(store: S, credentials: C, policy: ThrottlePolicy) -> Self {
    Self { store, credentials, throttle: LoginThrottle::new(policy) }
  }

  // ── Identity Directory ────────────────────────────────────────────────

  pub async fn register_provider(
    &self,
    name: &str,
    identifier: &str,
    subject: &str,
    secret: &str,
  ) -> Result<Provider> {
    let input = NewProvider {
      identifier: valid_identifier(identifier)?,
      name:       required("name", name)?,
      subject:    required("subject", subject)?,
      digest:     self.credentials.digest(valid_secret(secret)?)?,
    };
    let provider = self.store.insert_provider(input).await.map_err(store_err)?;
    tracing::info!(provider = %provider.identifier, subject = %provider.subject, "provider registered");
    Ok(provider)
  }

  pub async fn register_consumer(
    &self,
    name: &str,
    identifier: &str,
    secret: &str,
  ) -> Result<Consumer> {
    let input = NewConsumer {
      identifier: valid_identifier(identifier)?,
      name:       required("name", name)?,
      digest:     self.credentials.digest(valid_secret(secret)?)?,
    };
    let consumer = self.store.insert_consumer(input).await.map_err(store_err)?;
    tracing::info!(consumer = %consumer.identifier, "consumer registered");
    Ok(consumer)
  }

  /// Verify `secret` for `identifier` in the `role` table.
  ///
  /// Refused with `Throttled` while the identity is locked out; unknown
  /// identities count towards the lockout like wrong secrets do. Every
  /// admitted attempt counts as a failure until it succeeds, so parallel
  /// guesses are limited like sequential ones.
  pub async fn authenticate(&self, identifier: &str, secret: &str, role: Role) -> Result<Identity> {
    let identifier = normalize_identifier(identifier);

    let failures = match self.throttle.begin(role, &identifier, Utc::now()).await {
      Ok(failures) => failures,
      Err(retry_after_secs) => {
        tracing::warn!(%role, %identifier, retry_after_secs, "login refused during lockout");
        return Err(Rejection::Throttled { retry_after_secs }.into());
      }
    };

    let digest = self
      .store
      .credential_digest(role, &identifier)
      .await
      .map_err(store_err)?;

    let Some(digest) = digest else {
      self.note_failure(role, &identifier, failures);
      return Err(Rejection::NotFound.into());
    };

    if !self.credentials.matches(secret, &digest) {
      self.note_failure(role, &identifier, failures);
      return Err(Rejection::BadCredential.into());
    }

    let identity = match role {
      Role::Provider => self
        .store
        .get_provider(&identifier)
        .await
        .map_err(store_err)?
        .map(Identity::Provider),
      Role::Consumer => self
        .store
        .get_consumer(&identifier)
        .await
        .map_err(store_err)?
        .map(Identity::Consumer),
    }
    .ok_or(Rejection::NotFound)?;

    self.throttle.record_success(role, &identifier).await;
    tracing::debug!(%role, %identifier, "authenticated");
    Ok(identity)
  }

  /// The attempt was already counted when the throttle admitted it.
  fn note_failure(&self, role: Role, identifier: &str, failures: u32) {
    if failures >= self.throttle.policy().max_failures {
      tracing::warn!(%role, %identifier, failures, "login locked out");
    } else {
      tracing::info!(%role, %identifier, failures, "login failed");
    }
  }

  /// Find which role, if any, holds `identifier`.
  pub async fn lookup(&self, identifier: &str) -> Result<Option<Identity>> {
    let identifier = normalize_identifier(identifier);
    self.store.lookup(&identifier).await.map_err(store_err)
  }

  /// Replace a secret after proving knowledge of the current one.
  pub async fn change_secret(
    &self,
    identifier: &str,
    role: Role,
    current: &str,
    new: &str,
  ) -> Result<()> {
    let identity = self.authenticate(identifier, current, role).await?;
    let digest = self.credentials.digest(valid_secret(new)?)?;
    self
      .store
      .update_credential_digest(role, identity.identifier(), digest)
      .await
      .map_err(store_err)?;
    tracing::info!(%role, identifier = %identity.identifier(), "secret changed");
    Ok(())
  }

  // ── Session Catalog ───────────────────────────────────────────────────

  /// Create a session at (`day`, `hour`). `capacity` defaults to
  /// [`DEFAULT_CAPACITY`].
  pub async fn create_session(
    &self,
    provider: &str,
    day: i64,
    hour: i64,
    capacity: Option<i64>,
  ) -> Result<Session> {
    let slot = Slot::new(day, hour)?;
    let capacity = match capacity {
      None => DEFAULT_CAPACITY,
      Some(c) if c >= 1 && c <= u32::MAX as i64 => c as u32,
      Some(c) => return Err(Rejection::InvalidCapacity(c).into()),
    };
    let input = NewSession { provider: normalize_identifier(provider), slot, capacity };
    let session = self.store.create_session(input).await.map_err(store_err)?;
    tracing::info!(
      session = %session.id,
      provider = %session.provider,
      slot = %session.slot,
      capacity = session.capacity,
      "session created"
    );
    Ok(session)
  }

  pub async fn delete_session(&self, session: SessionId, provider: &str) -> Result<()> {
    let provider = normalize_identifier(provider);
    self.store.delete_session(session, &provider).await.map_err(store_err)?;
    tracing::info!(%session, %provider, "session deleted");
    Ok(())
  }

  pub async fn list_sessions_for_provider(&self, provider: &str) -> Result<Vec<SessionSummary>> {
    let provider = normalize_identifier(provider);
    self.store.list_sessions_for_provider(&provider).await.map_err(store_err)
  }

  // ── Enrollment Ledger ─────────────────────────────────────────────────

  pub async fn join(&self, session: SessionId, consumer: &str) -> Result<()> {
    let consumer = normalize_identifier(consumer);
    match self.store.join(session, &consumer).await.map_err(store_err) {
      Ok(()) => {
        tracing::info!(%session, %consumer, "joined session");
        Ok(())
      }
      Err(e) => {
        if let Some(rejection) = e.rejection() {
          tracing::debug!(%session, %consumer, %rejection, "join rejected");
        }
        Err(e)
      }
    }
  }

  pub async fn leave(&self, session: SessionId, consumer: &str) -> Result<()> {
    let consumer = normalize_identifier(consumer);
    self.store.leave(session, &consumer).await.map_err(store_err)?;
    tracing::info!(%session, %consumer, "left session");
    Ok(())
  }

  pub async fn list_sessions_for_consumer(&self, consumer: &str) -> Result<Vec<ConsumerSession>> {
    let consumer = normalize_identifier(consumer);
    self.store.list_sessions_for_consumer(&consumer).await.map_err(store_err)
  }

  pub async fn list_enrolled_consumers(
    &self,
    session: SessionId,
    provider: &str,
  ) -> Result<Vec<ConsumerSummary>> {
    let provider = normalize_identifier(provider);
    self
      .store
      .list_enrolled_consumers(session, &provider)
      .await
      .map_err(store_err)
  }

  // ── Availability Query ────────────────────────────────────────────────

  /// Blank filters are treated as no filter.
  pub async fn list_available_sessions(
    &self,
    consumer: &str,
    subject: Option<&str>,
  ) -> Result<Vec<AvailableSession>> {
    let consumer = normalize_identifier(consumer);
    let subject = subject.map(str::trim).filter(|s| !s.is_empty());
    self
      .store
      .list_available_sessions(&consumer, subject)
      .await
      .map_err(store_err)
  }

  // ── Week grids ────────────────────────────────────────────────────────

  /// Slots at which `provider` holds a session. `NotFound` for an unknown
  /// provider.
  pub async fn provider_schedule(&self, provider: &str) -> Result<WeekGrid> {
    let provider = normalize_identifier(provider);
    if self.store.get_provider(&provider).await.map_err(store_err)?.is_none() {
      return Err(Rejection::NotFound.into());
    }
    let sessions = self.store.list_sessions_for_provider(&provider).await.map_err(store_err)?;
    Ok(sessions.iter().map(|s| s.session.slot).collect())
  }

  /// Slots at which `consumer` is enrolled somewhere.
  pub async fn consumer_schedule(&self, consumer: &str) -> Result<WeekGrid> {
    let consumer = normalize_identifier(consumer);
    if self.store.get_consumer(&consumer).await.map_err(store_err)?.is_none() {
      return Err(Rejection::NotFound.into());
    }
    let sessions = self.store.list_sessions_for_consumer(&consumer).await.map_err(store_err)?;
    Ok(sessions.iter().map(|s| s.session.slot).collect())
  }
}

fn store_err<E: Into<Error>>(e: E) -> Error { e.into() }

fn valid_identifier(raw: &str) -> Result<String, Rejection> {
  let identifier = normalize_identifier(raw);
  if identifier.is_empty() {
    return Err(Rejection::InvalidInput("identifier must not be empty".into()));
  }
  if identifier.chars().any(char::is_whitespace) {
    return Err(Rejection::InvalidInput("identifier must not contain spaces".into()));
  }
  Ok(identifier)
}

fn valid_secret(secret: &str) -> Result<&str, Rejection> {
  if secret.is_empty() {
    return Err(Rejection::InvalidInput("secret must not be empty".into()));
  }
  Ok(secret)
}

impl<S, C> std::fmt::Debug for Engine<S, C> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Engine").field("throttle", &self.throttle.policy()).finish_non_exhaustive()
  }
}
