//! The `CredentialStore` collaborator: turns secrets into opaque digests and
//! checks secrets against them. The engine never sees how.

use crate::Result;

pub trait CredentialStore: Send + Sync {
  /// Produce a freshly salted digest for `secret`.
  fn digest(&self, secret: &str) -> Result<String>;

  /// Whether `secret` matches a digest previously returned by [`digest`].
  /// Malformed digests simply do not match.
  ///
  /// [`digest`]: CredentialStore::digest
  fn matches(&self, secret: &str, digest: &str) -> bool;
}
