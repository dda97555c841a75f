//! Handlers for the authenticated consumer.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/consumer/sessions` | Sessions the consumer is enrolled in |
//! | `GET`    | `/consumer/available` | Optional `?subject=` substring filter |
//! | `POST`   | `/consumer/sessions/{id}` | Join; 201 |
//! | `DELETE` | `/consumer/sessions/{id}` | Leave; 204 |
//! | `GET`    | `/consumer/schedule` | Week grid of enrollments |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use roster_core::{
  grid::WeekGrid,
  session::{AvailableSession, ConsumerSession, SessionId},
  store::ReservationStore,
};
use serde::Deserialize;

use crate::{AppState, auth::ConsumerAuth, error::ApiError};

/// `GET /consumer/sessions`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  ConsumerAuth(consumer): ConsumerAuth,
) -> Result<Json<Vec<ConsumerSession>>, ApiError>
where
  S: ReservationStore + 'static,
{
  let sessions = state.engine.list_sessions_for_consumer(&consumer.identifier).await?;
  Ok(Json(sessions))
}

#[derive(Debug, Deserialize)]
pub struct AvailableParams {
  pub subject: Option<String>,
}

/// `GET /consumer/available[?subject=<text>]`
pub async fn available<S>(
  State(state): State<AppState<S>>,
  ConsumerAuth(consumer): ConsumerAuth,
  Query(params): Query<AvailableParams>,
) -> Result<Json<Vec<AvailableSession>>, ApiError>
where
  S: ReservationStore + 'static,
{
  let sessions = state
    .engine
    .list_available_sessions(&consumer.identifier, params.subject.as_deref())
    .await?;
  Ok(Json(sessions))
}

/// `POST /consumer/sessions/{id}`
pub async fn join<S>(
  State(state): State<AppState<S>>,
  ConsumerAuth(consumer): ConsumerAuth,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: ReservationStore + 'static,
{
  state.engine.join(SessionId(id), &consumer.identifier).await?;
  Ok(StatusCode::CREATED)
}

/// `DELETE /consumer/sessions/{id}`
pub async fn leave<S>(
  State(state): State<AppState<S>>,
  ConsumerAuth(consumer): ConsumerAuth,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: ReservationStore + 'static,
{
  state.engine.leave(SessionId(id), &consumer.identifier).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `GET /consumer/schedule`
pub async fn schedule<S>(
  State(state): State<AppState<S>>,
  ConsumerAuth(consumer): ConsumerAuth,
) -> Result<Json<WeekGrid>, ApiError>
where
  S: ReservationStore + 'static,
{
  Ok(Json(state.engine.consumer_schedule(&consumer.identifier).await?))
}
