//! Single asynchronous channel back to the script environment.
//!
//! Every continuation, whatever native event stream it belongs to, writes to
//! the same unbounded channel. The host drains [`ScriptReceiver`] and routes
//! each [`CallbackMessage`] to the script callback named by its id.
//!
//! # Example
//! ```
//! use firebase_bridge::bridge::{CallbackId, ScriptChannel, Status};
//!
//! let (channel, mut receiver) = ScriptChannel::new();
//! channel.continuation(CallbackId::from("cb-1")).success(serde_json::json!(42));
//!
//! let message = receiver.try_recv().unwrap();
//! assert_eq!(message.status, Status::Ok);
//! assert_eq!(message.payload, serde_json::json!(42));
//! ```

use super::continuation::{CallbackId, Continuation, ListenerCallback, Status};
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// One result addressed to a script callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackMessage {
    /// Script-side callback this result belongs to
    pub callback_id: CallbackId,
    /// `OK` or `ERROR`
    pub status: Status,
    /// Result body
    pub payload: Value,
    /// Whether the script side should keep the callback for further results
    pub keep_callback: bool,
}

/// Sending half of the script channel
///
/// Cheap to clone; every clone feeds the same [`ScriptReceiver`].
#[derive(Clone, Debug)]
pub struct ScriptChannel {
    tx: mpsc::UnboundedSender<CallbackMessage>,
}

impl ScriptChannel {
    /// Create a channel and its receiving half
    pub fn new() -> (Self, ScriptReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, ScriptReceiver { rx })
    }

    /// One-shot continuation bound to `id`
    pub fn continuation(&self, id: CallbackId) -> Continuation {
        Continuation::new(id, self.clone())
    }

    /// Repeatable listener callback bound to `id`
    pub fn listener(&self, id: CallbackId) -> ListenerCallback {
        ListenerCallback::new(id, self.clone())
    }

    /// Whether the receiving side has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Queue a message. Never blocks.
    ///
    /// Returns `false` when the receiver was dropped; the message is discarded.
    pub(crate) fn send(&self, message: CallbackMessage) -> bool {
        match self.tx.send(message) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    callback_id = %err.0.callback_id,
                    "script channel closed, dropping result"
                );
                false
            }
        }
    }
}

/// Receiving half of the script channel
///
/// Implements [`Stream`]; the stream ends once every [`ScriptChannel`] clone
/// (and every continuation holding one) has been dropped.
#[derive(Debug)]
pub struct ScriptReceiver {
    rx: mpsc::UnboundedReceiver<CallbackMessage>,
}

impl ScriptReceiver {
    /// Wait for the next message
    pub async fn recv(&mut self) -> Option<CallbackMessage> {
        self.rx.recv().await
    }

    /// Take the next message if one is already queued
    pub fn try_recv(&mut self) -> Option<CallbackMessage> {
        self.rx.try_recv().ok()
    }

    /// Take every message that is already queued
    pub fn drain(&mut self) -> Vec<CallbackMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            messages.push(message);
        }
        messages
    }
}

impl Stream for ScriptReceiver {
    type Item = CallbackMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
