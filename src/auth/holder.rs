//! In-memory slot for the current access token.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, BearerToken},
};

/// Shared, in-memory slot holding the current access token (or none).
///
/// Clones share the same slot. Nothing here touches durable storage; the token is lost when
/// the last clone is dropped.
#[derive(Clone, Debug, Default)]
pub struct CredentialHolder(Arc<RwLock<Option<AccessToken>>>);
impl CredentialHolder {
	/// Returns the bearer value currently held.
	pub fn bearer(&self) -> Option<BearerToken> {
		self.0.read().as_ref().map(|record| record.token.clone())
	}

	/// Returns the full access-token record currently held.
	pub fn current(&self) -> Option<AccessToken> {
		self.0.read().clone()
	}

	/// Returns `true` when a token is held.
	pub fn is_authenticated(&self) -> bool {
		self.0.read().is_some()
	}

	/// Replaces the held token, returning the previous record.
	pub fn store(&self, token: AccessToken) -> Option<AccessToken> {
		self.0.write().replace(token)
	}

	/// Clears the held token, returning the previous record.
	pub fn clear(&self) -> Option<AccessToken> {
		self.0.write().take()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn clones_share_the_slot() {
		let holder = CredentialHolder::default();
		let view = holder.clone();

		assert!(!view.is_authenticated());
		assert!(holder.store(AccessToken::new("t1")).is_none());
		assert_eq!(view.bearer().map(|token| token.expose().to_owned()), Some("t1".into()));

		let previous = view.store(AccessToken::new("t2")).expect("Previous token should exist.");

		assert_eq!(previous.token.expose(), "t1");
		assert_eq!(holder.clear().map(|record| record.token), Some(BearerToken::new("t2")));
		assert!(holder.current().is_none());
		assert!(view.bearer().is_none());
	}
}
