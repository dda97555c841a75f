//! Route handlers, grouped by who calls them.

pub mod consumer;
pub mod identities;
pub mod provider;
