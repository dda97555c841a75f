//! Handlers for the authenticated provider's own sessions.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/provider/sessions` | Own sessions with head-counts |
//! | `POST`   | `/provider/sessions` | Body: `{"day":1,"hour":5,"capacity":3}`; capacity optional |
//! | `DELETE` | `/provider/sessions/{id}` | 404 for sessions owned by someone else |
//! | `GET`    | `/provider/sessions/{id}/consumers` | Enrolled consumers by name |
//! | `GET`    | `/provider/schedule` | Week grid of own sessions |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use roster_core::{
  grid::WeekGrid,
  identity::ConsumerSummary,
  session::{SessionId, SessionSummary},
  store::ReservationStore,
};
use serde::Deserialize;

use crate::{AppState, auth::ProviderAuth, error::ApiError};

/// `GET /provider/sessions`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  ProviderAuth(provider): ProviderAuth,
) -> Result<Json<Vec<SessionSummary>>, ApiError>
where
  S: ReservationStore + 'static,
{
  let sessions = state.engine.list_sessions_for_provider(&provider.identifier).await?;
  Ok(Json(sessions))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub day:      i64,
  pub hour:     i64,
  pub capacity: Option<i64>,
}

/// `POST /provider/sessions`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  ProviderAuth(provider): ProviderAuth,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ReservationStore + 'static,
{
  let session = state
    .engine
    .create_session(&provider.identifier, body.day, body.hour, body.capacity)
    .await?;
  Ok((StatusCode::CREATED, Json(session)))
}

/// `DELETE /provider/sessions/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  ProviderAuth(provider): ProviderAuth,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: ReservationStore + 'static,
{
  state.engine.delete_session(SessionId(id), &provider.identifier).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `GET /provider/sessions/{id}/consumers`
pub async fn enrolled<S>(
  State(state): State<AppState<S>>,
  ProviderAuth(provider): ProviderAuth,
  Path(id): Path<i64>,
) -> Result<Json<Vec<ConsumerSummary>>, ApiError>
where
  S: ReservationStore + 'static,
{
  let consumers = state
    .engine
    .list_enrolled_consumers(SessionId(id), &provider.identifier)
    .await?;
  Ok(Json(consumers))
}

/// `GET /provider/schedule`
pub async fn schedule<S>(
  State(state): State<AppState<S>>,
  ProviderAuth(provider): ProviderAuth,
) -> Result<Json<WeekGrid>, ApiError>
where
  S: ReservationStore + 'static,
{
  Ok(Json(state.engine.provider_schedule(&provider.identifier).await?))
}
