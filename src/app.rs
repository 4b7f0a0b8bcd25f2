//! Firebase bridge application context
//!
//! # Native Reference
//! - `FIRApp configure` / `FIROptions`
//!
//! An [`App`] is constructed explicitly and owns every bridge component:
//! there is no process-wide instance map. Dropping the app detaches every
//! native observer it registered.

use crate::auth::{AuthCommands, AuthStateBridge, IdentityProvider};
use crate::bridge::{CallbackId, ScriptChannel, ScriptReceiver};
use crate::command::CommandDispatcher;
use crate::database::{DataStore, DatabaseCommands, DatabaseListenerRegistry, DatabaseSettings};
use crate::error::FirebaseError;
use serde_json::Value;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::info;

/// Name used when no app name is configured
pub const DEFAULT_APP_NAME: &str = "[DEFAULT]";

/// Firebase bridge configuration options
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppOptions {
    /// App name (defaults to "[DEFAULT]")
    pub app_name: String,
    /// Realtime Database settings
    pub database: DatabaseSettings,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            database: DatabaseSettings::default(),
        }
    }
}

impl AppOptions {
    /// Options from the environment
    ///
    /// Reads `FIREBASE_APP_NAME`, `FIREBASE_DATABASE_URL` and
    /// `FIREBASE_PERSISTENCE` (`true`/`false`/`1`/`0`); unset variables keep
    /// their defaults.
    pub fn from_env() -> Result<Self, FirebaseError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, FirebaseError> {
        let mut options = Self::default();
        if let Some(name) = lookup("FIREBASE_APP_NAME") {
            options.app_name = name;
        }
        if let Some(url) = lookup("FIREBASE_DATABASE_URL").filter(|u| !u.trim().is_empty()) {
            options.database.default_url = Some(url);
        }
        if let Some(flag) = lookup("FIREBASE_PERSISTENCE") {
            options.database.persistence_enabled = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(FirebaseError::invalid_argument(format!(
                        "FIREBASE_PERSISTENCE must be a boolean, got '{}'",
                        flag
                    )))
                }
            };
        }
        Ok(options)
    }
}

/// Firebase bridge instance
///
/// Holds the command dispatcher and, through it, the auth state bridge and
/// database listener registry.
pub struct App {
    name: String,
    options: AppOptions,
    dispatcher: CommandDispatcher,
}

impl App {
    /// Create an app over the given native SDKs
    ///
    /// Must be called from within a tokio runtime; one-shot commands run on
    /// that runtime. Returns the app together with the receiver on which
    /// every script callback result arrives.
    ///
    /// # Example
    /// ```
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), firebase_bridge::FirebaseError> {
    /// use std::sync::Arc;
    /// use firebase_bridge::{App, AppOptions};
    /// use firebase_bridge::auth::InMemoryIdentityProvider;
    /// use firebase_bridge::database::InMemoryDataStore;
    ///
    /// let (app, mut receiver) = App::new(
    ///     AppOptions::default(),
    ///     Arc::new(InMemoryIdentityProvider::new()),
    ///     Arc::new(InMemoryDataStore::new()),
    /// )?;
    /// app.execute("auth", "currentUser", vec![], "cb-1");
    /// let message = receiver.recv().await.expect("result");
    /// assert!(message.payload.is_null());
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(
        options: AppOptions,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DataStore>,
    ) -> Result<(Self, ScriptReceiver), FirebaseError> {
        // Validate options (error case first)
        if options.app_name.trim().is_empty() {
            return Err(FirebaseError::invalid_argument("app name cannot be empty"));
        }
        let runtime = Handle::try_current()
            .map_err(|e| FirebaseError::internal(format!("no tokio runtime: {}", e)))?;

        store.set_persistence_enabled(options.database.persistence_enabled);

        let (channel, receiver) = ScriptChannel::new();
        let dispatcher = CommandDispatcher::new(
            channel,
            AuthCommands::new(Arc::clone(&identity), runtime.clone()),
            AuthStateBridge::new(identity),
            DatabaseCommands::new(Arc::clone(&store), runtime, options.database.clone()),
            DatabaseListenerRegistry::new(store),
        );

        info!(app = %options.app_name, "firebase bridge created");
        Ok((
            Self {
                name: options.app_name.clone(),
                options,
                dispatcher,
            },
            receiver,
        ))
    }

    /// Get the app name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the app options
    pub fn options(&self) -> &AppOptions {
        &self.options
    }

    /// Run a script command; see [`CommandDispatcher::execute`]
    pub fn execute(
        &self,
        service: &str,
        action: &str,
        args: Vec<Value>,
        callback_id: impl Into<CallbackId>,
    ) {
        self.dispatcher.execute(service, action, args, callback_id);
    }

    /// Command dispatcher
    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Auth state bridge
    pub fn auth_state(&self) -> &AuthStateBridge {
        self.dispatcher.auth_state()
    }

    /// Database listener registry
    pub fn registry(&self) -> &DatabaseListenerRegistry {
        self.dispatcher.registry()
    }
}
