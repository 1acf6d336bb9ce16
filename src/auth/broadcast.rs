//! Typed publish/subscribe channel for credential lifecycle events.
//!
//! Listeners registered through [`CredentialBroadcast::subscribe`] run synchronously on the
//! publishing task, in registration order. Async consumers can use
//! [`CredentialBroadcast::subscribe_channel`] instead and drain an unbounded receiver; dropped
//! receivers are pruned on the next publish. Events are never persisted, so a subscriber only
//! sees what is published while it is registered.

// crates.io
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
// self
use crate::{_prelude::*, auth::BearerToken};

type Listener = Arc<dyn Fn(&CredentialEvent) + Send + Sync>;

/// Credential lifecycle notifications.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CredentialEvent {
	/// A new bearer token was stored after refresh, login, or signup.
	TokenUpdated(BearerToken),
	/// A refresh episode failed and the stored token was cleared.
	AuthenticationFailed,
}
impl CredentialEvent {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::TokenUpdated(_) => "token_updated",
			Self::AuthenticationFailed => "authentication_failed",
		}
	}
}

/// Handle returned by subscribe calls; pass it to [`CredentialBroadcast::unsubscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
enum Subscriber {
	Callback(Listener),
	Channel(UnboundedSender<CredentialEvent>),
}

#[derive(Default)]
struct Registry {
	next_id: u64,
	subscribers: Vec<(SubscriptionId, Subscriber)>,
}

/// Process-wide (per client) broadcast of [`CredentialEvent`]s.
///
/// Clones share the same subscriber registry.
#[derive(Clone, Default)]
pub struct CredentialBroadcast(Arc<RwLock<Registry>>);
impl CredentialBroadcast {
	/// Registers a synchronous listener.
	pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
	where
		F: 'static + Fn(&CredentialEvent) + Send + Sync,
	{
		self.register(Subscriber::Callback(Arc::new(listener)))
	}

	/// Registers a channel subscriber and returns its receiving half.
	pub fn subscribe_channel(&self) -> (SubscriptionId, UnboundedReceiver<CredentialEvent>) {
		let (tx, rx) = mpsc::unbounded_channel();

		(self.register(Subscriber::Channel(tx)), rx)
	}

	/// Removes a subscriber. Returns `false` when the id was unknown or already removed.
	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		let mut registry = self.0.write();
		let before = registry.subscribers.len();

		registry.subscribers.retain(|(existing, _)| *existing != id);

		registry.subscribers.len() != before
	}

	/// Number of registered subscribers.
	pub fn subscriber_count(&self) -> usize {
		self.0.read().subscribers.len()
	}

	/// Delivers `event` to every subscriber registered at call time.
	///
	/// Returns how many subscribers received the event.
	pub fn publish(&self, event: CredentialEvent) -> usize {
		let snapshot = self.0.read().subscribers.clone();
		let mut delivered = 0;
		let mut closed = Vec::new();

		for (id, subscriber) in snapshot {
			match subscriber {
				Subscriber::Callback(listener) => {
					listener(&event);

					delivered += 1;
				},
				Subscriber::Channel(tx) =>
					if tx.send(event.clone()).is_ok() {
						delivered += 1;
					} else {
						closed.push(id);
					},
			}
		}

		if !closed.is_empty() {
			self.0.write().subscribers.retain(|(id, _)| !closed.contains(id));
		}

		#[cfg(feature = "tracing")]
		tracing::debug!(event = event.as_str(), delivered, "Credential event published.");

		delivered
	}

	fn register(&self, subscriber: Subscriber) -> SubscriptionId {
		let mut registry = self.0.write();
		let id = SubscriptionId(registry.next_id);

		registry.next_id += 1;
		registry.subscribers.push((id, subscriber));

		id
	}
}
impl Debug for CredentialBroadcast {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialBroadcast")
			.field("subscribers", &self.subscriber_count())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn listeners_receive_events_in_order_until_unsubscribed() {
		let broadcast = CredentialBroadcast::default();
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = seen.clone();
		let id = broadcast.subscribe(move |event| sink.lock().push(event.clone()));

		assert_eq!(broadcast.publish(CredentialEvent::TokenUpdated("t1".into())), 1);
		assert_eq!(broadcast.publish(CredentialEvent::TokenUpdated("t2".into())), 1);
		assert_eq!(broadcast.publish(CredentialEvent::AuthenticationFailed), 1);
		assert!(broadcast.unsubscribe(id));
		assert!(!broadcast.unsubscribe(id));
		assert_eq!(broadcast.publish(CredentialEvent::AuthenticationFailed), 0);
		assert_eq!(
			*seen.lock(),
			vec![
				CredentialEvent::TokenUpdated("t1".into()),
				CredentialEvent::TokenUpdated("t2".into()),
				CredentialEvent::AuthenticationFailed,
			]
		);
	}

	#[test]
	fn dropped_channels_are_pruned() {
		let broadcast = CredentialBroadcast::default();
		let (_, mut live) = broadcast.subscribe_channel();
		let (_, dropped) = broadcast.subscribe_channel();

		drop(dropped);

		assert_eq!(broadcast.subscriber_count(), 2);
		assert_eq!(broadcast.publish(CredentialEvent::AuthenticationFailed), 1);
		assert_eq!(broadcast.subscriber_count(), 1);
		assert_eq!(live.try_recv().ok(), Some(CredentialEvent::AuthenticationFailed));
	}

	#[test]
	fn listeners_may_subscribe_while_publishing() {
		let broadcast = CredentialBroadcast::default();
		let inner = broadcast.clone();

		broadcast.subscribe(move |_| {
			inner.subscribe(|_| {});
		});

		assert_eq!(broadcast.publish(CredentialEvent::AuthenticationFailed), 1);
		assert_eq!(broadcast.subscriber_count(), 2);
	}
}
