//! Continuations addressed to script callbacks.
//!
//! Two shapes exist:
//! - [`Continuation`] fires exactly once. Its completion methods consume it,
//!   and dropping it unresolved reports a `CALLBACK_DROPPED` error instead.
//! - [`ListenerCallback`] fires any number of times with `keepCallback` set,
//!   until a terminal error consumes it through [`ListenerCallback::fail`].

use super::channel::{CallbackMessage, ScriptChannel};
use crate::error::FirebaseError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Result status of a callback invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// Successful result
    Ok,
    /// Failure; payload is `{code, message}`
    Error,
}

/// Identifier of a script-side callback
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallbackId(String);

impl CallbackId {
    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CallbackId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for CallbackId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One-shot completion handle
///
/// Resolving consumes the continuation, so a second invocation does not
/// compile. If it is dropped without being resolved, one `ERROR` result with
/// code `CALLBACK_DROPPED` is sent in its place.
pub struct Continuation {
    id: CallbackId,
    channel: Option<ScriptChannel>,
}

impl Continuation {
    pub(crate) fn new(id: CallbackId, channel: ScriptChannel) -> Self {
        Self {
            id,
            channel: Some(channel),
        }
    }

    /// Callback this continuation resolves
    pub fn id(&self) -> &CallbackId {
        &self.id
    }

    /// Resolve with `OK`
    pub fn success(mut self, payload: impl Into<Value>) {
        self.complete(Status::Ok, payload.into());
    }

    /// Resolve with `ERROR`
    pub fn error(mut self, err: &FirebaseError) {
        self.complete(Status::Error, err.to_payload());
    }

    /// Resolve with `OK` or `ERROR` depending on `result`
    pub fn resolve<E>(self, result: Result<Value, E>)
    where
        E: Into<FirebaseError>,
    {
        match result {
            Ok(payload) => self.success(payload),
            Err(err) => self.error(&err.into()),
        }
    }

    fn complete(&mut self, status: Status, payload: Value) {
        let Some(channel) = self.channel.take() else {
            return;
        };
        channel.send(CallbackMessage {
            callback_id: self.id.clone(),
            status,
            payload,
            keep_callback: false,
        });
    }
}

impl Drop for Continuation {
    fn drop(&mut self) {
        if self.channel.is_none() {
            return;
        }
        tracing::warn!(callback_id = %self.id, "continuation dropped without a result");
        self.complete(
            Status::Error,
            json!({
                "code": "CALLBACK_DROPPED",
                "message": "operation finished without reporting a result",
            }),
        );
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("id", &self.id)
            .field("pending", &self.channel.is_some())
            .finish()
    }
}

/// Long-lived delivery handle for listeners
#[derive(Debug)]
pub struct ListenerCallback {
    id: CallbackId,
    channel: ScriptChannel,
}

impl ListenerCallback {
    pub(crate) fn new(id: CallbackId, channel: ScriptChannel) -> Self {
        Self { id, channel }
    }

    /// Callback this listener delivers to
    pub fn id(&self) -> &CallbackId {
        &self.id
    }

    /// Deliver an `OK` result and keep the callback alive
    pub fn deliver(&self, payload: Value) -> bool {
        self.send(Status::Ok, payload, true)
    }

    /// Deliver a terminal `ERROR`; the callback is released
    pub fn fail(self, err: &FirebaseError) {
        self.send(Status::Error, err.to_payload(), false);
    }

    fn send(&self, status: Status, payload: Value, keep_callback: bool) -> bool {
        self.channel.send(CallbackMessage {
            callback_id: self.id.clone(),
            status,
            payload,
            keep_callback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;

    #[test]
    fn test_success_fires_once() {
        let (channel, mut receiver) = ScriptChannel::new();
        channel.continuation(CallbackId::from("a")).success(json!({"ok": true}));

        let messages = receiver.drain();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].status, Status::Ok);
        assert!(!messages[0].keep_callback);
    }

    #[test]
    fn test_resolve_error_uses_payload() {
        let (channel, mut receiver) = ScriptChannel::new();
        channel
            .continuation(CallbackId::from("a"))
            .resolve::<AuthError>(Err(AuthError::WrongPassword));

        let messages = receiver.drain();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].status, Status::Error);
        assert_eq!(messages[0].payload["code"], "ERROR_WRONG_PASSWORD");
    }

    #[test]
    fn test_dropped_continuation_reports_error() {
        let (channel, mut receiver) = ScriptChannel::new();
        {
            let _pending = channel.continuation(CallbackId::from("lost"));
        }

        let messages = receiver.drain();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].callback_id, CallbackId::from("lost"));
        assert_eq!(messages[0].payload["code"], "CALLBACK_DROPPED");
    }

    #[test]
    fn test_listener_keeps_callback_until_failed() {
        let (channel, mut receiver) = ScriptChannel::new();
        let listener = channel.listener(CallbackId::from("l"));
        assert!(listener.deliver(json!(1)));
        assert!(listener.deliver(json!(2)));
        listener.fail(&AuthError::UserTokenExpired.into());

        let keep: Vec<bool> = receiver.drain().iter().map(|m| m.keep_callback).collect();
        assert_eq!(keep, vec![true, true, false]);
    }
}
