//! Core types and trait definitions for the Roster reservation engine.
//!
//! This crate has no HTTP or database dependencies. Storage
//! backends implement [`store::ReservationStore`]; credential hashing is
//! plugged in through [`credential::CredentialStore`]; [`Engine`] ties the two
//! together.

pub mod credential;
pub mod engine;
pub mod error;
pub mod grid;
pub mod identity;
pub mod session;
pub mod slot;
pub mod store;
pub mod throttle;

pub use engine::Engine;
pub use error::{Error, Rejection, Result};
