//! Firebase Bridge
//!
//! Listener and command bridge between a hybrid-app script environment and
//! the native Firebase Authentication and Realtime Database SDKs.
//!
//! Native observers (database value/child listeners, the auth state
//! listener) are registered under caller-chosen keys, and every result is
//! multiplexed onto one [`ScriptReceiver`](bridge::ScriptReceiver).
//!
//! # Example (listen to a node)
//! ```no_run
//! # async fn example() -> Result<(), firebase_bridge::FirebaseError> {
//! use std::sync::Arc;
//! use serde_json::json;
//! use firebase_bridge::{App, AppOptions};
//! use firebase_bridge::auth::InMemoryIdentityProvider;
//! use firebase_bridge::database::InMemoryDataStore;
//!
//! let (app, mut receiver) = App::new(
//!     AppOptions::from_env()?,
//!     Arc::new(InMemoryIdentityProvider::new()),
//!     Arc::new(InMemoryDataStore::new()),
//! )?;
//! app.execute("db", "on", vec![json!(""), json!("/rooms/1"), json!("value"),
//!     json!(null), json!(null), json!(null), json!("k1")], "cb-1");
//! while let Some(message) = receiver.recv().await {
//!     println!("{}: {}", message.callback_id, message.payload);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod app;
pub mod bridge;
pub mod command;
pub mod database;
pub mod dispatch;
pub mod error;
pub mod logging;

// Auth module
pub mod auth {
    //! Firebase Authentication bridge
    //!
    //! # Native Reference
    //! - `FirebaseAuth` framework (`FIRAuth`, `FIRUser`, `FIRPhoneAuthProvider`)

    pub mod commands;
    pub mod memory;
    pub mod provider;
    pub mod state;
    pub mod types;

    pub use commands::AuthCommands;
    pub use memory::{InMemoryIdentityProvider, SentEmail};
    pub use provider::{AuthStateSink, IdentityProvider, StateListenerHandle};
    pub use state::AuthStateBridge;
    pub use types::{AuthResult, Credential, User, UserProfile};
}

// Re-exports for convenience
pub use app::{App, AppOptions};
pub use command::CommandDispatcher;
pub use error::{AuthError, DatabaseError, FirebaseError};

// Auth re-exports
pub use auth::{AuthStateBridge, User};

// Database re-exports
pub use database::{DatabaseListenerRegistry, EventType, Location, Query};
