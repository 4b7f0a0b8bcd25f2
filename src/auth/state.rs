//! Auth state bridge
//!
//! Owns at most one native auth state observer and forwards every
//! transition to one long-lived script callback. Re-arming replaces the
//! observer; it never stacks a second one.
//!
//! # Native Reference
//! - `FIRAuth addAuthStateDidChangeListener:`
//! - `FIRAuth removeAuthStateDidChangeListener:`
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use firebase_bridge::auth::{AuthStateBridge, InMemoryIdentityProvider};
//! use firebase_bridge::bridge::{CallbackId, ScriptChannel};
//!
//! let provider = Arc::new(InMemoryIdentityProvider::new());
//! let bridge = AuthStateBridge::new(provider.clone());
//! let (channel, _receiver) = ScriptChannel::new();
//!
//! bridge.start_listening(channel.listener(CallbackId::from("state")));
//! bridge.start_listening(channel.listener(CallbackId::from("state")));
//! assert_eq!(provider.listener_count(), 1);
//!
//! assert!(bridge.stop_listening());
//! assert!(!bridge.stop_listening());
//! assert_eq!(provider.listener_count(), 0);
//! ```

use super::provider::{AuthStateSink, IdentityProvider, StateListenerHandle};
use super::types::User;
use crate::bridge::ListenerCallback;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

struct ActiveListener {
    handle: StateListenerHandle,
    generation: u64,
    callback: ListenerCallback,
}

#[derive(Default)]
struct Slot {
    active: Option<ActiveListener>,
    next_generation: u64,
}

/// Single-slot bridge from the identity provider's state stream to a script callback
pub struct AuthStateBridge {
    provider: Arc<dyn IdentityProvider>,
    slot: Arc<Mutex<Slot>>,
}

impl AuthStateBridge {
    /// Create a bridge that is not yet listening
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Forward every auth state transition to `callback`
    ///
    /// An existing observer is cancelled first; its callback receives
    /// nothing further. The provider reports the current state right after
    /// registration, as `OK <user>` or `OK null`.
    pub fn start_listening(&self, callback: ListenerCallback) {
        let mut slot = self.slot.lock();

        if let Some(previous) = slot.active.take() {
            self.provider.remove_state_listener(previous.handle);
            debug!(handle = %previous.handle, "replacing auth state listener");
        }

        slot.next_generation += 1;
        let generation = slot.next_generation;
        let handle = self
            .provider
            .add_state_listener(state_sink(Arc::downgrade(&self.slot), generation));

        debug!(handle = %handle, callback_id = %callback.id(), "auth state listener attached");
        slot.active = Some(ActiveListener {
            handle,
            generation,
            callback,
        });
    }

    /// Stop forwarding auth state transitions
    ///
    /// Returns whether a listener was active. Calling it again is a no-op.
    pub fn stop_listening(&self) -> bool {
        let Some(active) = self.slot.lock().active.take() else {
            return false;
        };
        self.provider.remove_state_listener(active.handle);
        debug!(handle = %active.handle, "auth state listener removed");
        true
    }

    /// Whether a listener is active
    pub fn is_listening(&self) -> bool {
        self.slot.lock().active.is_some()
    }
}

impl Drop for AuthStateBridge {
    fn drop(&mut self) {
        self.stop_listening();
    }
}

fn state_sink(slot: Weak<Mutex<Slot>>, generation: u64) -> AuthStateSink {
    Arc::new(move |user: Option<User>| {
        let Some(slot) = slot.upgrade() else {
            return;
        };
        let slot = slot.lock();
        let Some(active) = slot.active.as_ref().filter(|a| a.generation == generation) else {
            trace!(generation, "dropping auth state for replaced listener");
            return;
        };
        active.callback.deliver(User::payload_of(user.as_ref()));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::memory::InMemoryIdentityProvider;
    use crate::bridge::{CallbackId, ScriptChannel, Status};

    #[tokio::test]
    async fn test_initial_state_is_null_when_signed_out() {
        let provider = Arc::new(InMemoryIdentityProvider::new());
        let bridge = AuthStateBridge::new(provider.clone());
        let (channel, mut receiver) = ScriptChannel::new();

        bridge.start_listening(channel.listener(CallbackId::from("state")));
        provider.flush().await;

        let messages = receiver.drain();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].status, Status::Ok);
        assert!(messages[0].keep_callback);
        assert!(messages[0].payload.is_null());
    }

    #[tokio::test]
    async fn test_replaced_listener_receives_nothing() {
        let provider = Arc::new(InMemoryIdentityProvider::new());
        let bridge = AuthStateBridge::new(provider.clone());
        let (channel, mut receiver) = ScriptChannel::new();

        bridge.start_listening(channel.listener(CallbackId::from("first")));
        bridge.start_listening(channel.listener(CallbackId::from("second")));
        provider.sign_in_anonymously().await.unwrap();
        provider.flush().await;

        let ids: Vec<String> = receiver
            .drain()
            .into_iter()
            .map(|m| m.callback_id.to_string())
            .collect();
        assert_eq!(ids, vec!["second", "second"]);
    }

    #[tokio::test]
    async fn test_drop_detaches_observer() {
        let provider = Arc::new(InMemoryIdentityProvider::new());
        let (channel, _receiver) = ScriptChannel::new();
        {
            let bridge = AuthStateBridge::new(provider.clone());
            bridge.start_listening(channel.listener(CallbackId::from("state")));
            assert!(bridge.is_listening());
            assert_eq!(provider.listener_count(), 1);
        }
        assert_eq!(provider.listener_count(), 0);
    }
}
