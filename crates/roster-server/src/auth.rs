//! Argon2 credential store and HTTP Basic-auth extractors.

use argon2::{
  Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
  password_hash::SaltString,
};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use rand_core::OsRng;
use roster_core::{
  Rejection,
  credential::CredentialStore,
  identity::{Consumer, Identity, Provider, Role},
  store::ReservationStore,
};

use crate::{AppState, error::ApiError};

// ─── Credential store ────────────────────────────────────────────────────────

/// Hashes secrets into argon2id PHC strings (`$argon2id$v=19$…`).
#[derive(Clone)]
pub struct Argon2Credentials {
  hasher: Argon2<'static>,
}

impl Argon2Credentials {
  pub fn new(params: Params) -> Self {
    Self { hasher: Argon2::new(Algorithm::Argon2id, Version::V0x13, params) }
  }
}

impl Default for Argon2Credentials {
  fn default() -> Self { Self { hasher: Argon2::default() } }
}

impl CredentialStore for Argon2Credentials {
  fn digest(&self, secret: &str) -> roster_core::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    self
      .hasher
      .hash_password(secret.as_bytes(), &salt)
      .map(|hash| hash.to_string())
      .map_err(|e| roster_core::Error::internal(format!("argon2 error: {e}")))
  }

  fn matches(&self, secret: &str, digest: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(digest) else {
      tracing::warn!("stored credential is not a valid PHC string");
      return false;
    };
    self.hasher.verify_password(secret.as_bytes(), &parsed).is_ok()
  }
}

// ─── Basic auth ──────────────────────────────────────────────────────────────

/// Identifier and secret decoded from an `Authorization: Basic` header, not
/// yet verified.
pub struct BasicCredentials {
  pub identifier: String,
  pub secret:     String,
}

/// Decode the `Authorization` header.
pub fn basic_credentials(headers: &HeaderMap) -> Result<BasicCredentials, ApiError> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;

  let (identifier, secret) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;

  Ok(BasicCredentials { identifier: identifier.to_owned(), secret: secret.to_owned() })
}

impl<S> FromRequestParts<S> for BasicCredentials
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
    basic_credentials(&parts.headers)
  }
}

/// Map a failed login behind Basic auth. An unknown identifier answers like
/// a wrong secret, so the header cannot reveal which identifiers exist.
pub fn login_error(e: roster_core::Error) -> ApiError {
  match e.rejection() {
    Some(Rejection::NotFound | Rejection::BadCredential) => ApiError::Unauthorized,
    _ => e.into(),
  }
}

/// Authenticate the request's Basic credentials against the `role` table.
async fn authenticate<S>(
  parts: &Parts,
  state: &AppState<S>,
  role: Role,
) -> Result<Identity, ApiError>
where
  S: ReservationStore + 'static,
{
  let creds = basic_credentials(&parts.headers)?;
  state
    .engine
    .authenticate(&creds.identifier, &creds.secret, role)
    .await
    .map_err(login_error)
}

/// An authenticated provider.
pub struct ProviderAuth(pub Provider);

impl<S> FromRequestParts<AppState<S>> for ProviderAuth
where
  S: ReservationStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    match authenticate(parts, state, Role::Provider).await? {
      Identity::Provider(provider) => Ok(ProviderAuth(provider)),
      Identity::Consumer(_) => Err(ApiError::Unauthorized),
    }
  }
}

/// An authenticated consumer.
pub struct ConsumerAuth(pub Consumer);

impl<S> FromRequestParts<AppState<S>> for ConsumerAuth
where
  S: ReservationStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    match authenticate(parts, state, Role::Consumer).await? {
      Identity::Consumer(consumer) => Ok(ConsumerAuth(consumer)),
      Identity::Provider(_) => Err(ApiError::Unauthorized),
    }
  }
}
