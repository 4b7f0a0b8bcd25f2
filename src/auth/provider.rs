//! Native identity provider interface
//!
//! The bridge reaches the Authentication SDK only through
//! [`IdentityProvider`]. One-shot operations are async; the state observer is
//! attached with a sink closure and cancelled with the returned handle.
//!
//! # Native Reference
//! - `FIRAuth addAuthStateDidChangeListener:` -> `FIRAuthStateDidChangeListenerHandle`
//! - `FIRAuth removeAuthStateDidChangeListener:`
//! - `FIRAuth signIn*`, `FIRAuth createUserWithEmail:password:`
//! - `FIRPhoneAuthProvider verifyPhoneNumber:UIDelegate:completion:`
//! - `FIRUser updatePassword: / updateEmail: / reauthenticateWithCredential: / deleteWithCompletion:`

use super::types::{AuthResult, Credential, User, UserProfile};
use crate::error::AuthError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Opaque token identifying one native auth state observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateListenerHandle(pub u64);

impl fmt::Display for StateListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Callback receiving the current user (`None` when signed out)
pub type AuthStateSink = Arc<dyn Fn(Option<User>) + Send + Sync>;

/// Identity provider (Firebase Authentication SDK)
///
/// Operations documented as acting on "the current user" may assume one is
/// signed in; callers check [`current_user`](Self::current_user) first.
///
/// # Contract
/// - `add_state_listener` reports the current state to the new sink soon
///   after registration, never from inside the call.
/// - `remove_state_listener` never waits for in-flight callbacks and ignores
///   unknown handles.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Attach an auth state observer
    fn add_state_listener(&self, sink: AuthStateSink) -> StateListenerHandle;

    /// Detach an auth state observer
    fn remove_state_listener(&self, handle: StateListenerHandle);

    /// Currently signed-in user
    fn current_user(&self) -> Option<User>;

    /// Create an email/password account and sign it in
    async fn create_user_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthResult, AuthError>;

    /// Sign in with email and password
    async fn sign_in_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthResult, AuthError>;

    /// Sign in with a fresh anonymous account
    async fn sign_in_anonymously(&self) -> Result<AuthResult, AuthError>;

    /// Sign in with a provider credential
    async fn sign_in_with_credential(&self, credential: Credential) -> Result<AuthResult, AuthError>;

    /// Start SMS verification of `phone_number`; yields the verification identifier
    async fn verify_phone_number(
        &self,
        phone_number: &str,
        timeout: Duration,
    ) -> Result<String, AuthError>;

    /// Replace the current user's phone number using a phone credential
    async fn update_phone_number(&self, credential: Credential) -> Result<AuthResult, AuthError>;

    /// Send a password reset email to `email`
    async fn send_password_reset_email(&self, email: &str) -> Result<(), AuthError>;

    /// Send a verification email to the current user
    async fn send_email_verification(&self) -> Result<(), AuthError>;

    /// Change the current user's password
    async fn update_password(&self, password: &str) -> Result<(), AuthError>;

    /// Change the current user's email
    async fn update_email(&self, email: &str) -> Result<(), AuthError>;

    /// Change the current user's display name and/or photo URL
    async fn update_profile(&self, profile: UserProfile) -> Result<(), AuthError>;

    /// Re-confirm the current user's credentials
    async fn reauthenticate(&self, credential: Credential) -> Result<(), AuthError>;

    /// Delete the current user's account and sign out
    async fn delete_user(&self) -> Result<(), AuthError>;

    /// ID token of the current user
    async fn get_id_token(&self, force_refresh: bool) -> Result<String, AuthError>;

    /// Language for SMS and emails; `None` follows the app language
    fn set_language_code(&self, code: Option<&str>);

    /// Sign out the current user
    fn sign_out(&self) -> Result<(), AuthError>;
}
