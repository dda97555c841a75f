//! Identity Directory types: providers, consumers and the role tag that
//! distinguishes them.
//!
//! Credential digests never appear on these types; the store hands them out
//! only through [`crate::store::ReservationStore::credential_digest`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Rejection;

/// Which identity table a caller belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Provider,
  Consumer,
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Role::Provider => "provider",
      Role::Consumer => "consumer",
    })
  }
}

/// An agent who offers sessions in a single subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
  pub identifier:    String,
  pub name:          String,
  /// Fixed at registration; copied onto every session the provider creates.
  pub subject:       String,
  pub registered_at: DateTime<Utc>,
}

/// An agent who enrolls in sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumer {
  pub identifier:    String,
  pub name:          String,
  pub registered_at: DateTime<Utc>,
}

/// Result of a lookup across both identity tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Identity {
  Provider(Provider),
  Consumer(Consumer),
}

impl Identity {
  pub fn role(&self) -> Role {
    match self {
      Self::Provider(_) => Role::Provider,
      Self::Consumer(_) => Role::Consumer,
    }
  }

  pub fn identifier(&self) -> &str {
    match self {
      Self::Provider(p) => &p.identifier,
      Self::Consumer(c) => &c.identifier,
    }
  }
}

/// The slice of a consumer a provider may see for their own sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerSummary {
  pub identifier: String,
  pub name:       String,
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to [`crate::store::ReservationStore::insert_provider`].
/// The digest has already been produced by the credential store.
#[derive(Debug, Clone)]
pub struct NewProvider {
  pub identifier: String,
  pub name:       String,
  pub subject:    String,
  pub digest:     String,
}

/// Input to [`crate::store::ReservationStore::insert_consumer`].
#[derive(Debug, Clone)]
pub struct NewConsumer {
  pub identifier: String,
  pub name:       String,
  pub digest:     String,
}

// ─── Normalisation ───────────────────────────────────────────────────────────

/// Canonical form of an identifier: trimmed and lower-cased.
pub fn normalize_identifier(raw: &str) -> String { raw.trim().to_lowercase() }

/// Trim `value`, rejecting it if nothing is left.
pub fn required(field: &str, value: &str) -> Result<String, Rejection> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    return Err(Rejection::InvalidInput(format!("{field} must not be empty")));
  }
  Ok(trimmed.to_owned())
}
