//! Command dispatch
//!
//! Routes `(service, action, args, callbackId)` invocations from the script
//! environment to the auth and database bridges. Arguments arrive as a
//! positional JSON array; malformed arguments are reported on the callback
//! as `INVALID_ARGUMENT` without any native call.
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), firebase_bridge::FirebaseError> {
//! use std::sync::Arc;
//! use serde_json::json;
//! use firebase_bridge::{App, AppOptions};
//! use firebase_bridge::auth::InMemoryIdentityProvider;
//! use firebase_bridge::database::InMemoryDataStore;
//!
//! let (app, mut receiver) = App::new(
//!     AppOptions::default(),
//!     Arc::new(InMemoryIdentityProvider::new()),
//!     Arc::new(InMemoryDataStore::new()),
//! )?;
//! app.execute("db", "on", vec![json!(""), json!("/rooms/1"), json!("value"),
//!     json!(null), json!(null), json!(null), json!("k1")], "cb-1");
//! let first = receiver.recv().await;
//! # Ok(())
//! # }
//! ```

use crate::auth::{AuthCommands, AuthStateBridge, Credential, UserProfile};
use crate::bridge::{CallbackId, ScriptChannel};
use crate::database::{DatabaseCommands, DatabaseListenerRegistry, EventType, Query};
use crate::error::FirebaseError;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Command namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Firebase Authentication
    Auth,
    /// Realtime Database
    Database,
}

impl FromStr for Service {
    type Err = FirebaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auth" | "FirebaseAuthentication" => Ok(Self::Auth),
            "db" | "database" | "FirebaseDatabase" => Ok(Self::Database),
            _ => Err(FirebaseError::invalid_argument(format!("unknown service '{}'", s))),
        }
    }
}

/// Positional command arguments
struct Args {
    action: String,
    values: Vec<Value>,
}

impl Args {
    fn get(&self, index: usize) -> &Value {
        self.values.get(index).unwrap_or(&Value::Null)
    }

    fn missing(&self, index: usize, name: &str, expected: &str) -> FirebaseError {
        FirebaseError::invalid_argument(format!(
            "{}: argument {} ({}) must be {}",
            self.action, index, name, expected
        ))
    }

    fn string(&self, index: usize, name: &str) -> Result<String, FirebaseError> {
        self.get(index)
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.missing(index, name, "a string"))
    }

    /// A string that may be absent or `null`
    fn opt_string(&self, index: usize, name: &str) -> Result<Option<String>, FirebaseError> {
        match self.get(index) {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s.clone())),
            _ => Err(self.missing(index, name, "a string or null")),
        }
    }

    fn bool(&self, index: usize, name: &str) -> Result<bool, FirebaseError> {
        self.get(index)
            .as_bool()
            .ok_or_else(|| self.missing(index, name, "a boolean"))
    }

    fn bool_or(&self, index: usize, name: &str, default: bool) -> Result<bool, FirebaseError> {
        match self.get(index) {
            Value::Null => Ok(default),
            _ => self.bool(index, name),
        }
    }

    fn millis_or(&self, index: usize, name: &str, default: Duration) -> Result<Duration, FirebaseError> {
        match self.get(index) {
            Value::Null => Ok(default),
            value => value
                .as_u64()
                .map(Duration::from_millis)
                .ok_or_else(|| self.missing(index, name, "a non-negative integer")),
        }
    }

    fn value(&self, index: usize) -> Value {
        self.get(index).clone()
    }
}

/// Routes script commands to the bridges
pub struct CommandDispatcher {
    channel: ScriptChannel,
    auth: AuthCommands,
    auth_state: AuthStateBridge,
    database: DatabaseCommands,
    registry: DatabaseListenerRegistry,
}

impl CommandDispatcher {
    /// Create a dispatcher that reports every result on `channel`
    pub fn new(
        channel: ScriptChannel,
        auth: AuthCommands,
        auth_state: AuthStateBridge,
        database: DatabaseCommands,
        registry: DatabaseListenerRegistry,
    ) -> Self {
        Self {
            channel,
            auth,
            auth_state,
            database,
            registry,
        }
    }

    /// Auth state bridge
    pub fn auth_state(&self) -> &AuthStateBridge {
        &self.auth_state
    }

    /// Database listener registry
    pub fn registry(&self) -> &DatabaseListenerRegistry {
        &self.registry
    }

    /// Run `action` of `service` with positional `args`
    ///
    /// Never blocks. The result, or any argument error, is reported on the
    /// script channel under `callback_id`.
    pub fn execute(
        &self,
        service: &str,
        action: &str,
        args: Vec<Value>,
        callback_id: impl Into<CallbackId>,
    ) {
        let callback_id = callback_id.into();
        let args = Args {
            action: action.to_string(),
            values: args,
        };
        debug!(service, action, callback_id = %callback_id, "executing command");

        let result = Service::from_str(service).and_then(|service| match service {
            Service::Auth => self.execute_auth(&args, &callback_id),
            Service::Database => self.execute_database(&args, &callback_id),
        });
        if let Err(err) = result {
            warn!(service, action, error = %err, "command rejected");
            self.channel.continuation(callback_id).error(&err);
        }
    }

    fn execute_auth(&self, args: &Args, id: &CallbackId) -> Result<(), FirebaseError> {
        let auth = &self.auth;
        let continuation = || self.channel.continuation(id.clone());

        match args.action.as_str() {
            "getIdToken" => {
                let force_refresh = args.bool_or(0, "forceRefresh", false)?;
                auth.get_id_token(force_refresh, continuation());
            }
            "createUserWithEmailAndPassword" => {
                let email = args.string(0, "email")?;
                let password = args.string(1, "password")?;
                auth.create_user_with_email_and_password(email, password, continuation());
            }
            "sendEmailVerification" => auth.send_email_verification(continuation()),
            "sendPasswordResetEmail" => {
                let email = args.string(0, "email")?;
                auth.send_password_reset_email(email, continuation());
            }
            "signInWithEmailAndPassword" => {
                let email = args.string(0, "email")?;
                let password = args.string(1, "password")?;
                auth.sign_in_with_email_and_password(email, password, continuation());
            }
            "signInAnonymously" => auth.sign_in_anonymously(continuation()),
            "signInWithGoogle" => {
                let credential = Credential::Google {
                    id_token: args.string(0, "idToken")?,
                    access_token: args.string(1, "accessToken")?,
                };
                auth.sign_in_with_credential(credential, continuation());
            }
            "signInWithFacebook" => {
                let credential = Credential::Facebook {
                    access_token: args.string(0, "accessToken")?,
                };
                auth.sign_in_with_credential(credential, continuation());
            }
            "signInWithTwitter" => {
                let credential = Credential::Twitter {
                    token: args.string(0, "token")?,
                    secret: args.string(1, "secret")?,
                };
                auth.sign_in_with_credential(credential, continuation());
            }
            "verifyPhoneNumber" => {
                let number = args.string(0, "phoneNumber")?;
                let timeout = args.millis_or(
                    1,
                    "timeoutMillis",
                    crate::auth::commands::DEFAULT_VERIFICATION_TIMEOUT,
                )?;
                auth.verify_phone_number(number, timeout, continuation());
            }
            "signInWithVerificationId" => {
                let verification_id = args.string(0, "verificationId")?;
                let code = args.string(1, "code")?;
                auth.sign_in_with_verification_id(verification_id, code, continuation());
            }
            "signOut" => auth.sign_out(continuation()),
            "setLanguageCode" => {
                let code = args.opt_string(0, "languageCode")?;
                auth.set_language_code(code, continuation());
            }
            "setAuthStateChanged" => {
                if args.bool(0, "enable")? {
                    self.auth_state.start_listening(self.channel.listener(id.clone()));
                } else {
                    self.auth_state.stop_listening();
                    continuation().success(Value::Null);
                }
            }
            "changePassword" => {
                let password = args.string(0, "password")?;
                auth.change_password(password, continuation());
            }
            "updateEmail" => {
                let email = args.string(0, "email")?;
                auth.update_email(email, continuation());
            }
            "updateProfile" => {
                let profile = UserProfile {
                    display_name: args.opt_string(0, "displayName")?,
                    photo_url: args.opt_string(1, "photoURL")?,
                };
                auth.update_profile(profile, continuation());
            }
            "deleteCurrentAnonymousUser" => auth.delete_current_anonymous_user(continuation()),
            "currentUser" => auth.current_user(continuation()),
            "reauthenticateWithCredential" => {
                let email = args.string(0, "email")?;
                let password = args.string(1, "password")?;
                auth.reauthenticate_with_credential(email, password, continuation());
            }
            other => {
                return Err(FirebaseError::invalid_argument(format!(
                    "unknown auth action '{}'",
                    other
                )))
            }
        }
        Ok(())
    }

    fn execute_database(&self, args: &Args, id: &CallbackId) -> Result<(), FirebaseError> {
        let db = &self.database;
        let continuation = || self.channel.continuation(id.clone());
        let location = || -> Result<_, FirebaseError> {
            let url = args.opt_string(0, "url")?.unwrap_or_default();
            let path = args.string(1, "path")?;
            Ok(db.settings().location(&url, &path))
        };

        match args.action.as_str() {
            "on" => {
                let event_type: EventType = args.string(2, "eventType")?.parse()?;
                let query =
                    Query::from_args(location()?, args.get(3), args.get(4), args.get(5))?;
                match args.opt_string(6, "key")?.filter(|key| !key.is_empty()) {
                    Some(key) => {
                        self.registry
                            .subscribe(query, event_type, key, self.channel.listener(id.clone()));
                    }
                    None => db.once(query, event_type, continuation()),
                }
            }
            "off" => {
                let location = location()?;
                match args.opt_string(2, "key")?.filter(|key| !key.is_empty()) {
                    Some(key) => {
                        self.registry.unsubscribe(&key);
                    }
                    None => {
                        self.registry.unsubscribe_all(location.path());
                    }
                }
                continuation().success(Value::Null);
            }
            "push" => db.push(location()?, args.value(2), continuation()),
            "set" => {
                let priority = Some(args.value(3)).filter(|p| !p.is_null());
                db.set(location()?, args.value(2), priority, continuation());
            }
            "update" => db.update(location()?, args.value(2), continuation()),
            "setOnline" => {
                let url = args.opt_string(0, "url")?.unwrap_or_default();
                let online = args.bool(1, "enabled")?;
                db.set_online(&url, online, continuation());
            }
            other => {
                return Err(FirebaseError::invalid_argument(format!(
                    "unknown database action '{}'",
                    other
                )))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(values: Vec<Value>) -> Args {
        Args {
            action: "test".to_string(),
            values,
        }
    }

    #[test]
    fn test_service_names() {
        assert_eq!(Service::from_str("auth").unwrap(), Service::Auth);
        assert_eq!(Service::from_str("FirebaseDatabase").unwrap(), Service::Database);
        assert!(Service::from_str("firestore").is_err());
    }

    #[test]
    fn test_positional_parsing() {
        let args = args(vec![json!("a@b.c"), Value::Null, json!(true), json!(1500)]);
        assert_eq!(args.string(0, "email").unwrap(), "a@b.c");
        assert_eq!(args.opt_string(1, "name").unwrap(), None);
        assert!(args.bool(2, "flag").unwrap());
        assert!(!args.bool_or(9, "flag", false).unwrap());
        assert_eq!(
            args.millis_or(3, "timeout", Duration::ZERO).unwrap(),
            Duration::from_millis(1500)
        );

        let err = args.string(2, "email").unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGUMENT");
        assert!(err.message().contains("email"));
    }
}
