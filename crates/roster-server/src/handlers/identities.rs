//! Handlers for registration, login and secret changes.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/providers` | 201 with the new provider |
//! | `POST` | `/consumers` | 201 with the new consumer |
//! | `POST` | `/login` | Body carries the role; answers with the identity |
//! | `POST` | `/provider/secret` | Basic auth with the current secret; 204 |
//! | `POST` | `/consumer/secret` | Basic auth with the current secret; 204 |

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use roster_core::{
  identity::{Identity, Role},
  store::ReservationStore,
};
use serde::Deserialize;

use crate::{
  AppState,
  auth::{BasicCredentials, login_error},
  error::ApiError,
};

// ─── Register ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RegisterProvider {
  pub name:       String,
  pub identifier: String,
  pub subject:    String,
  pub secret:     String,
}

/// `POST /providers`
pub async fn register_provider<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<RegisterProvider>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ReservationStore + 'static,
{
  let provider = state
    .engine
    .register_provider(&body.name, &body.identifier, &body.subject, &body.secret)
    .await?;
  Ok((StatusCode::CREATED, Json(provider)))
}

#[derive(Deserialize)]
pub struct RegisterConsumer {
  pub name:       String,
  pub identifier: String,
  pub secret:     String,
}

/// `POST /consumers`
pub async fn register_consumer<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<RegisterConsumer>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ReservationStore + 'static,
{
  let consumer = state
    .engine
    .register_consumer(&body.name, &body.identifier, &body.secret)
    .await?;
  Ok((StatusCode::CREATED, Json(consumer)))
}

// ─── Login ───────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct Login {
  pub identifier: String,
  pub secret:     String,
  pub role:       Role,
}

/// `POST /login`
pub async fn login<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<Login>,
) -> Result<Json<Identity>, ApiError>
where
  S: ReservationStore + 'static,
{
  let identity = state
    .engine
    .authenticate(&body.identifier, &body.secret, body.role)
    .await?;
  Ok(Json(identity))
}

// ─── Change secret ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ChangeSecret {
  /// The replacement secret.
  pub secret: String,
}

async fn change_secret<S>(
  state: AppState<S>,
  creds: BasicCredentials,
  role: Role,
  body: ChangeSecret,
) -> Result<StatusCode, ApiError>
where
  S: ReservationStore + 'static,
{
  state
    .engine
    .change_secret(&creds.identifier, role, &creds.secret, &body.secret)
    .await
    .map_err(login_error)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /provider/secret`
pub async fn change_provider_secret<S>(
  State(state): State<AppState<S>>,
  creds: BasicCredentials,
  Json(body): Json<ChangeSecret>,
) -> Result<StatusCode, ApiError>
where
  S: ReservationStore + 'static,
{
  change_secret(state, creds, Role::Provider, body).await
}

/// `POST /consumer/secret`
pub async fn change_consumer_secret<S>(
  State(state): State<AppState<S>>,
  creds: BasicCredentials,
  Json(body): Json<ChangeSecret>,
) -> Result<StatusCode, ApiError>
where
  S: ReservationStore + 'static,
{
  change_secret(state, creds, Role::Consumer, body).await
}
