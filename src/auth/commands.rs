//! One-shot authentication commands
//!
//! Each command makes exactly one native call and resolves its
//! [`Continuation`] exactly once. Commands that act on the signed-in user
//! fail with `ERROR_NO_SIGNED_IN_USER` before any native call when nobody is
//! signed in. The auth state bridge is never involved.
//!
//! # Native Reference
//! - `FIRAuth` sign-in and account management methods
//! - `FIRUser` profile and credential methods
//! - `FIRPhoneAuthProvider verifyPhoneNumber:UIDelegate:completion:`

use super::provider::IdentityProvider;
use super::types::{Credential, User, UserProfile};
use crate::bridge::Continuation;
use crate::error::AuthError;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::debug;

/// Phone verification timeout when the caller gives none
pub const DEFAULT_VERIFICATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Authentication commands against an [`IdentityProvider`]
#[derive(Clone)]
pub struct AuthCommands {
    provider: Arc<dyn IdentityProvider>,
    runtime: Handle,
}

impl AuthCommands {
    /// Create commands that run their native calls on `runtime`
    pub fn new(provider: Arc<dyn IdentityProvider>, runtime: Handle) -> Self {
        Self { provider, runtime }
    }

    /// Run `op` on the runtime and resolve `continuation` with its result
    fn spawn<F, Fut>(&self, continuation: Continuation, op: F)
    where
        F: FnOnce(Arc<dyn IdentityProvider>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, AuthError>> + Send + 'static,
    {
        let provider = Arc::clone(&self.provider);
        self.runtime.spawn(async move {
            continuation.resolve(op(provider).await);
        });
    }

    /// Like [`spawn`](Self::spawn), but fail without a native call when signed out
    fn spawn_for_user<F, Fut>(&self, continuation: Continuation, op: F)
    where
        F: FnOnce(Arc<dyn IdentityProvider>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, AuthError>> + Send + 'static,
    {
        if self.provider.current_user().is_none() {
            continuation.error(&AuthError::NoSignedInUser.into());
            return;
        }
        self.spawn(continuation, op);
    }

    /// Create an email/password account; resolves with the user and `token`
    pub fn create_user_with_email_and_password(
        &self,
        email: String,
        password: String,
        continuation: Continuation,
    ) {
        self.spawn(continuation, move |provider| async move {
            let result = provider
                .create_user_with_email_and_password(&email, &password)
                .await?;
            Ok(result.to_payload())
        });
    }

    /// Sign in with email and password
    pub fn sign_in_with_email_and_password(
        &self,
        email: String,
        password: String,
        continuation: Continuation,
    ) {
        self.spawn(continuation, move |provider| async move {
            let result = provider
                .sign_in_with_email_and_password(&email, &password)
                .await?;
            Ok(result.to_payload())
        });
    }

    /// Sign in with a new anonymous account
    pub fn sign_in_anonymously(&self, continuation: Continuation) {
        self.spawn(continuation, |provider| async move {
            Ok(provider.sign_in_anonymously().await?.to_payload())
        });
    }

    /// Sign in with a provider credential (Google, Facebook, Twitter, ...)
    pub fn sign_in_with_credential(&self, credential: Credential, continuation: Continuation) {
        self.spawn(continuation, move |provider| async move {
            debug!(provider_id = credential.provider_id(), "signing in with credential");
            Ok(provider.sign_in_with_credential(credential).await?.to_payload())
        });
    }

    /// Start SMS verification; resolves with `{verificationId}`
    ///
    /// The identifier is handed to the caller and not retained here.
    pub fn verify_phone_number(
        &self,
        phone_number: String,
        timeout: Duration,
        continuation: Continuation,
    ) {
        self.spawn(continuation, move |provider| async move {
            let verification_id = provider.verify_phone_number(&phone_number, timeout).await?;
            Ok(json!({ "verificationId": verification_id }))
        });
    }

    /// Complete SMS verification
    ///
    /// Signs in with the phone credential, or links the number to the
    /// current user when one is signed in.
    pub fn sign_in_with_verification_id(
        &self,
        verification_id: String,
        code: String,
        continuation: Continuation,
    ) {
        let credential = Credential::Phone {
            verification_id,
            code,
        };
        self.spawn(continuation, move |provider| async move {
            // Decided when the native call runs, not when the command arrived
            let result = if provider.current_user().is_some() {
                provider.update_phone_number(credential).await?
            } else {
                provider.sign_in_with_credential(credential).await?
            };
            Ok(result.to_payload())
        });
    }

    /// Send a password reset email
    pub fn send_password_reset_email(&self, email: String, continuation: Continuation) {
        self.spawn(continuation, move |provider| async move {
            provider.send_password_reset_email(&email).await?;
            Ok(Value::Null)
        });
    }

    /// Send a verification email to the current user
    pub fn send_email_verification(&self, continuation: Continuation) {
        self.spawn_for_user(continuation, |provider| async move {
            provider.send_email_verification().await?;
            Ok(Value::Null)
        });
    }

    /// Change the current user's password
    pub fn change_password(&self, password: String, continuation: Continuation) {
        self.spawn_for_user(continuation, move |provider| async move {
            provider.update_password(&password).await?;
            Ok(Value::Null)
        });
    }

    /// Change the current user's email address
    pub fn update_email(&self, email: String, continuation: Continuation) {
        self.spawn_for_user(continuation, move |provider| async move {
            provider.update_email(&email).await?;
            Ok(Value::Null)
        });
    }

    /// Change the current user's display name and/or photo URL
    pub fn update_profile(&self, profile: UserProfile, continuation: Continuation) {
        self.spawn_for_user(continuation, move |provider| async move {
            provider.update_profile(profile).await?;
            Ok(Value::Null)
        });
    }

    /// Re-confirm the current user's email and password
    pub fn reauthenticate_with_credential(
        &self,
        email: String,
        password: String,
        continuation: Continuation,
    ) {
        self.spawn_for_user(continuation, move |provider| async move {
            provider
                .reauthenticate(Credential::EmailPassword { email, password })
                .await?;
            Ok(Value::Null)
        });
    }

    /// Delete the current user if it is anonymous
    ///
    /// Succeeds without a native call when nobody, or a non-anonymous
    /// user, is signed in.
    pub fn delete_current_anonymous_user(&self, continuation: Continuation) {
        let anonymous = self
            .provider
            .current_user()
            .is_some_and(|user| user.is_anonymous);
        if !anonymous {
            continuation.success(Value::Null);
            return;
        }
        self.spawn(continuation, |provider| async move {
            provider.delete_user().await?;
            Ok(Value::Null)
        });
    }

    /// Sign out; resolves with `null`
    pub fn sign_out(&self, continuation: Continuation) {
        continuation.resolve(self.provider.sign_out().map(|()| Value::Null));
    }

    /// Resolve with the current user's profile, or `null` when signed out
    pub fn current_user(&self, continuation: Continuation) {
        continuation.success(User::payload_of(self.provider.current_user().as_ref()));
    }

    /// Resolve with the current user's ID token
    pub fn get_id_token(&self, force_refresh: bool, continuation: Continuation) {
        self.spawn_for_user(continuation, move |provider| async move {
            Ok(Value::String(provider.get_id_token(force_refresh).await?))
        });
    }

    /// Set the language for SMS and emails; `None` follows the app language
    pub fn set_language_code(&self, code: Option<String>, continuation: Continuation) {
        self.provider.set_language_code(code.as_deref());
        continuation.success(Value::Null);
    }
}
