//! JSON-over-HTTP front end for the Roster reservation engine.
//!
//! Exposes an axum [`Router`] backed by any [`ReservationStore`]. Callers
//! authenticate with HTTP Basic credentials checked by the engine against
//! the provider or consumer table, depending on the route.

pub mod auth;
pub mod error;
pub mod handlers;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
  Router,
  routing::{delete, get, post},
};
use roster_core::{Engine, store::ReservationStore, throttle::ThrottlePolicy};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::Argon2Credentials;
use handlers::{consumer, identities, provider};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `roster.toml` and
/// `ROSTER_*` environment variables. Every field has a default.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:            String,
  pub port:            u16,
  pub store_path:      PathBuf,
  /// How long a write waits for another connection's lock.
  pub busy_timeout_ms: u64,
  pub login:           ThrottlePolicy,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:            "127.0.0.1".to_string(),
      port:            8080,
      store_path:      PathBuf::from("roster.db"),
      busy_timeout_ms: roster_store_sqlite::DEFAULT_BUSY_TIMEOUT.as_millis() as u64,
      login:           ThrottlePolicy::default(),
    }
  }
}

impl ServerConfig {
  pub fn busy_timeout(&self) -> Duration { Duration::from_millis(self.busy_timeout_ms) }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub engine: Arc<Engine<S, Argon2Credentials>>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self { Self { engine: Arc::clone(&self.engine) } }
}

impl<S: ReservationStore> AppState<S> {
  pub fn new(store: S, credentials: Argon2Credentials, login: ThrottlePolicy) -> Self {
    Self { engine: Arc::new(Engine::new(store, credentials, login)) }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the reservation API.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: ReservationStore + 'static,
{
  Router::new()
    // Identity Directory
    .route("/providers",                          post(identities::register_provider::<S>))
    .route("/consumers",                          post(identities::register_consumer::<S>))
    .route("/login",                              post(identities::login::<S>))
    .route("/provider/secret",                    post(identities::change_provider_secret::<S>))
    .route("/consumer/secret",                    post(identities::change_consumer_secret::<S>))
    // Provider side
    .route("/provider/sessions",                  get(provider::list::<S>).post(provider::create::<S>))
    .route("/provider/sessions/{id}",             delete(provider::delete::<S>))
    .route("/provider/sessions/{id}/consumers",   get(provider::enrolled::<S>))
    .route("/provider/schedule",                  get(provider::schedule::<S>))
    // Consumer side
    .route("/consumer/sessions",                  get(consumer::list::<S>))
    .route("/consumer/sessions/{id}",             post(consumer::join::<S>).delete(consumer::leave::<S>))
    .route("/consumer/available",                 get(consumer::available::<S>))
    .route("/consumer/schedule",                  get(consumer::schedule::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

#[cfg(test)]
mod tests {
  use super::*;

  use argon2::Params;
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use roster_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  async fn make_state(login: ThrottlePolicy) -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let credentials = Argon2Credentials::new(Params::new(8, 1, 1, None).unwrap());
    AppState::new(store, credentials, login)
  }

  async fn state() -> AppState<SqliteStore> { make_state(ThrottlePolicy::default()).await }

  fn auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn oneshot_raw(
    state:  AppState<SqliteStore>,
    method: &str,
    uri:    &str,
    auth:   Option<(&str, &str)>,
    body:   Option<Value>,
  ) -> axum::response::Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((user, pass)) = auth {
      builder = builder.header(header::AUTHORIZATION, auth_header(user, pass));
    }
    let body = match body {
      Some(json) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(json.to_string())
      }
      None => Body::empty(),
    };
    router(state).oneshot(builder.body(body).unwrap()).await.unwrap()
  }

  async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  async fn seed(state: &AppState<SqliteStore>) {
    let p = oneshot_raw(
      state.clone(),
      "POST",
      "/providers",
      None,
      Some(json!({ "name": "Pat", "identifier": "p@example.com", "subject": "CS", "secret": "pw" })),
    )
    .await;
    assert_eq!(p.status(), StatusCode::CREATED);

    for (name, id) in [("Ann", "a@example.com"), ("Ben", "b@example.com")] {
      let c = oneshot_raw(
        state.clone(),
        "POST",
        "/consumers",
        None,
        Some(json!({ "name": name, "identifier": id, "secret": "pw" })),
      )
      .await;
      assert_eq!(c.status(), StatusCode::CREATED);
    }
  }

  async fn create_session(state: &AppState<SqliteStore>, day: i64, hour: i64, capacity: i64) -> i64 {
    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/provider/sessions",
      Some(("p@example.com", "pw")),
      Some(json!({ "day": day, "hour": hour, "capacity": capacity })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    json_body(resp).await["id"].as_i64().unwrap()
  }

  // ── Identity ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn duplicate_registration_is_409() {
    let state = state().await;
    seed(&state).await;

    let resp = oneshot_raw(
      state,
      "POST",
      "/consumers",
      None,
      Some(json!({ "name": "Ann again", "identifier": "A@Example.com", "secret": "pw" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert!(json_body(resp).await["error"].is_string());
  }

  #[tokio::test]
  async fn blank_name_is_400() {
    let state = state().await;
    let resp = oneshot_raw(
      state,
      "POST",
      "/consumers",
      None,
      Some(json!({ "name": " ", "identifier": "a@example.com", "secret": "pw" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn login_reports_role() {
    let state = state().await;
    seed(&state).await;

    let resp = oneshot_raw(
      state,
      "POST",
      "/login",
      None,
      Some(json!({ "identifier": "p@example.com", "secret": "pw", "role": "provider" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["role"], "provider");
    assert_eq!(body["subject"], "CS");
  }

  #[tokio::test]
  async fn login_with_wrong_secret_is_401() {
    let state = state().await;
    seed(&state).await;

    let resp = oneshot_raw(
      state,
      "POST",
      "/login",
      None,
      Some(json!({ "identifier": "a@example.com", "secret": "nope", "role": "consumer" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
  }

  #[tokio::test]
  async fn repeated_failures_are_throttled() {
    let state = make_state(ThrottlePolicy {
      max_failures:      2,
      lockout_base_secs: 60,
      lockout_max_secs:  600,
    })
    .await;
    seed(&state).await;

    for _ in 0..2 {
      let resp =
        oneshot_raw(state.clone(), "GET", "/consumer/sessions", Some(("a@example.com", "bad")), None)
          .await;
      assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    let resp =
      oneshot_raw(state, "GET", "/consumer/sessions", Some(("a@example.com", "pw")), None).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry: u64 = resp.headers()[header::RETRY_AFTER].to_str().unwrap().parse().unwrap();
    assert!(retry > 0 && retry <= 60);
  }

  #[tokio::test]
  async fn change_secret_replaces_it() {
    let state = state().await;
    seed(&state).await;

    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/consumer/secret",
      Some(("a@example.com", "pw")),
      Some(json!({ "secret": "new" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let old =
      oneshot_raw(state.clone(), "GET", "/consumer/sessions", Some(("a@example.com", "pw")), None)
        .await;
    assert_eq!(old.status(), StatusCode::UNAUTHORIZED);
    let new =
      oneshot_raw(state, "GET", "/consumer/sessions", Some(("a@example.com", "new")), None).await;
    assert_eq!(new.status(), StatusCode::OK);
  }

  // ── Auth ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn missing_credentials_are_401() {
    let state = state().await;
    let resp = oneshot_raw(state, "GET", "/provider/sessions", None, None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
  }

  #[tokio::test]
  async fn consumer_cannot_use_provider_routes() {
    let state = state().await;
    seed(&state).await;
    let resp =
      oneshot_raw(state, "GET", "/provider/sessions", Some(("a@example.com", "pw")), None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  // ── Sessions ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn invalid_slot_is_400() {
    let state = state().await;
    seed(&state).await;
    let resp = oneshot_raw(
      state,
      "POST",
      "/provider/sessions",
      Some(("p@example.com", "pw")),
      Some(json!({ "day": 6, "hour": 0 })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn fourth_session_is_409() {
    let state = state().await;
    seed(&state).await;
    for hour in 0..3 {
      create_session(&state, 0, hour, 5).await;
    }
    let resp = oneshot_raw(
      state,
      "POST",
      "/provider/sessions",
      Some(("p@example.com", "pw")),
      Some(json!({ "day": 0, "hour": 3 })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn provider_sees_enrolled_consumers_and_schedule() {
    let state = state().await;
    seed(&state).await;
    let id = create_session(&state, 1, 5, 3).await;

    let joined = oneshot_raw(
      state.clone(),
      "POST",
      &format!("/consumer/sessions/{id}"),
      Some(("a@example.com", "pw")),
      None,
    )
    .await;
    assert_eq!(joined.status(), StatusCode::CREATED);

    let resp = oneshot_raw(
      state.clone(),
      "GET",
      &format!("/provider/sessions/{id}/consumers"),
      Some(("p@example.com", "pw")),
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!([{ "identifier": "a@example.com", "name": "Ann" }]));

    let grid = oneshot_raw(state, "GET", "/provider/schedule", Some(("p@example.com", "pw")), None)
      .await;
    assert_eq!(grid.status(), StatusCode::OK);
    assert_eq!(json_body(grid).await["cells"][1][5], true);
  }

  #[tokio::test]
  async fn deleting_unknown_session_is_404() {
    let state = state().await;
    seed(&state).await;
    let resp =
      oneshot_raw(state, "DELETE", "/provider/sessions/999", Some(("p@example.com", "pw")), None)
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  // ── Enrollment ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn join_leave_status_codes() {
    let state = state().await;
    seed(&state).await;
    let id = create_session(&state, 1, 5, 1).await;
    let path = format!("/consumer/sessions/{id}");
    let ann = Some(("a@example.com", "pw"));
    let ben = Some(("b@example.com", "pw"));

    assert_eq!(oneshot_raw(state.clone(), "POST", &path, ann, None).await.status(), StatusCode::CREATED);
    assert_eq!(oneshot_raw(state.clone(), "POST", &path, ann, None).await.status(), StatusCode::CONFLICT);
    assert_eq!(oneshot_raw(state.clone(), "POST", &path, ben, None).await.status(), StatusCode::CONFLICT);
    assert_eq!(oneshot_raw(state.clone(), "DELETE", &path, ann, None).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(oneshot_raw(state.clone(), "DELETE", &path, ann, None).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(oneshot_raw(state, "POST", &path, ben, None).await.status(), StatusCode::CREATED);
  }

  #[tokio::test]
  async fn available_filters_by_subject() {
    let state = state().await;
    seed(&state).await;
    create_session(&state, 2, 2, 2).await;

    let hit = oneshot_raw(
      state.clone(),
      "GET",
      "/consumer/available?subject=cs",
      Some(("b@example.com", "pw")),
      None,
    )
    .await;
    assert_eq!(hit.status(), StatusCode::OK);
    let rows = json_body(hit).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["remaining"], 2);
    assert_eq!(rows[0]["provider_name"], "Pat");
    assert_eq!(rows[0]["already_joined"], false);

    let miss = oneshot_raw(
      state,
      "GET",
      "/consumer/available?subject=art",
      Some(("b@example.com", "pw")),
      None,
    )
    .await;
    assert_eq!(json_body(miss).await, json!([]));
  }
}
