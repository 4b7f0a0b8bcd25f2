//! Continuation and channel plumbing shared by the auth and database bridges

pub mod channel;
pub mod continuation;

pub use channel::{CallbackMessage, ScriptChannel, ScriptReceiver};
pub use continuation::{CallbackId, Continuation, ListenerCallback, Status};
