//! End-to-end reservation scenario against a file-backed store.

use argon2::Params;
use roster_core::{
  Engine, Rejection, identity::Role, session::SessionId, throttle::ThrottlePolicy,
};
use roster_server::auth::Argon2Credentials;
use roster_store_sqlite::SqliteStore;

fn credentials() -> Argon2Credentials { Argon2Credentials::new(Params::new(8, 1, 1, None).unwrap()) }

async fn enrolled(engine: &Engine<SqliteStore, Argon2Credentials>, id: SessionId) -> u32 {
  engine
    .list_sessions_for_provider("p@example.com")
    .await
    .unwrap()
    .into_iter()
    .find(|s| s.session.id == id)
    .map(|s| s.enrolled)
    .unwrap()
}

#[tokio::test]
async fn provider_and_two_consumers_share_one_seat() {
  let dir = tempfile::tempdir().unwrap();
  let store = SqliteStore::open(dir.path().join("roster.db")).await.unwrap();
  let engine = Engine::new(store, credentials(), ThrottlePolicy::default());

  engine.register_provider("Pat", "p@example.com", "CS", "p-secret").await.unwrap();
  engine.register_consumer("Ann", "a@example.com", "a-secret").await.unwrap();
  engine.register_consumer("Ben", "b@example.com", "b-secret").await.unwrap();

  let provider = engine.authenticate("p@example.com", "p-secret", Role::Provider).await.unwrap();
  let session = engine
    .create_session(provider.identifier(), 1, 5, Some(1))
    .await
    .unwrap();
  assert_eq!(session.subject, "CS");

  engine.join(session.id, "a@example.com").await.unwrap();
  assert_eq!(enrolled(&engine, session.id).await, 1);

  let full = engine.join(session.id, "b@example.com").await.unwrap_err();
  assert_eq!(full.rejection(), Some(&Rejection::SessionFull));

  engine.leave(session.id, "a@example.com").await.unwrap();
  assert_eq!(enrolled(&engine, session.id).await, 0);

  engine.join(session.id, "b@example.com").await.unwrap();
  assert_eq!(enrolled(&engine, session.id).await, 1);

  let roster = engine.list_enrolled_consumers(session.id, "p@example.com").await.unwrap();
  assert_eq!(roster.len(), 1);
  assert_eq!(roster[0].name, "Ben");
}
