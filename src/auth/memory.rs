//! In-memory identity provider
//!
//! A self-contained [`IdentityProvider`] for tests and hosts without the
//! native SDK. Accounts live in a map, state observers fire on a private
//! dispatch thread, and SMS verification accepts one configurable code.

use super::provider::{AuthStateSink, IdentityProvider, StateListenerHandle};
use super::types::{AuthResult, Credential, User, UserProfile};
use crate::dispatch::DispatchQueue;
use crate::error::AuthError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::debug;

const DEFAULT_SMS_CODE: &str = "123456";
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
struct Account {
    user: User,
    password: Option<String>,
    /// `(provider id, provider token)` pairs that sign in to this account
    federated: Vec<(String, String)>,
}

#[derive(Default)]
struct ProviderState {
    accounts: HashMap<String, Account>,
    current: Option<String>,
    listeners: BTreeMap<u64, AuthStateSink>,
    next_handle: u64,
    fail_next: Option<AuthError>,
    /// Verification id -> phone number awaiting its SMS code
    verifications: HashMap<String, String>,
    sms_code: String,
    language_code: Option<String>,
    sent_emails: Vec<SentEmail>,
    disabled: Vec<String>,
}

/// Email the provider would have sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentEmail {
    /// Password reset link
    PasswordReset {
        /// Recipient
        email: String,
    },
    /// Address verification link
    Verification {
        /// Recipient
        email: String,
    },
}

/// In-memory [`IdentityProvider`] with native-like asynchronous state delivery
pub struct InMemoryIdentityProvider {
    state: Arc<Mutex<ProviderState>>,
    queue: DispatchQueue,
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIdentityProvider {
    /// Create a provider with no accounts and nobody signed in
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ProviderState {
                sms_code: DEFAULT_SMS_CODE.to_string(),
                ..ProviderState::default()
            })),
            queue: DispatchQueue::new("firebase-auth-dispatch"),
        }
    }

    /// Accept `code` as the SMS code for phone verification
    pub fn with_sms_code(self, code: impl Into<String>) -> Self {
        self.state.lock().sms_code = code.into();
        self
    }

    /// Wait until every state notification queued so far has been delivered
    pub async fn flush(&self) {
        self.queue.flush().await;
    }

    /// Number of attached state observers
    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    /// Fail the next provider operation with `err`
    pub fn fail_next(&self, err: AuthError) {
        self.state.lock().fail_next = Some(err);
    }

    /// Disable the account registered under `email`
    pub fn disable_user(&self, email: &str) {
        let mut state = self.state.lock();
        if let Some(uid) = state.uid_for_email(email) {
            state.disabled.push(uid);
        }
    }

    /// Language currently used for SMS and emails
    pub fn language_code(&self) -> Option<String> {
        self.state.lock().language_code.clone()
    }

    /// Emails sent so far
    pub fn sent_emails(&self) -> Vec<SentEmail> {
        self.state.lock().sent_emails.clone()
    }

    /// Queue `user` for every listener; `state` is the locked provider state
    fn notify(&self, state: &ProviderState, user: Option<User>) {
        for (handle, sink) in &state.listeners {
            self.deliver(*handle, Arc::clone(sink), user.clone());
        }
    }

    /// Queue one delivery; callers hold the state lock so deliveries keep
    /// the order of the transitions that produced them
    fn deliver(&self, handle: u64, sink: AuthStateSink, user: Option<User>) {
        let state: Weak<Mutex<ProviderState>> = Arc::downgrade(&self.state);
        self.queue.dispatch(move || {
            let live = state
                .upgrade()
                .is_some_and(|s| s.lock().listeners.contains_key(&handle));
            if live {
                sink(user);
            }
        });
    }

    /// Run a state-changing operation, then notify observers if the user changed
    fn transition<T, F>(&self, op: F) -> Result<T, AuthError>
    where
        F: FnOnce(&mut ProviderState) -> Result<T, AuthError>,
    {
        let mut state = self.state.lock();
        if let Some(err) = state.fail_next.take() {
            return Err(err);
        }
        let before = state.current_user();
        let result = op(&mut *state)?;
        let after = state.current_user();
        if before.as_ref().map(|u| &u.uid) != after.as_ref().map(|u| &u.uid) {
            debug!(uid = ?after.as_ref().map(|u| u.uid.as_str()), "auth state changed");
            self.notify(&state, after);
        }
        Ok(result)
    }

    /// Run an operation on the signed-in user's account
    fn with_current<T, F>(&self, op: F) -> Result<T, AuthError>
    where
        F: FnOnce(&mut ProviderState, String) -> Result<T, AuthError>,
    {
        self.transition(|state| {
            let Some(uid) = state.current.clone() else {
                return Err(AuthError::NoSignedInUser);
            };
            op(state, uid)
        })
    }
}

impl ProviderState {
    fn current_user(&self) -> Option<User> {
        self.current
            .as_ref()
            .and_then(|uid| self.accounts.get(uid))
            .map(|a| a.user.clone())
    }

    fn uid_for_email(&self, email: &str) -> Option<String> {
        self.accounts
            .values()
            .find(|a| a.user.email.as_deref() == Some(email))
            .map(|a| a.user.uid.clone())
    }

    fn account_mut(&mut self, uid: &str) -> Result<&mut Account, AuthError> {
        self.accounts.get_mut(uid).ok_or(AuthError::UserNotFound)
    }

    fn insert(&mut self, user: User, password: Option<String>) -> String {
        let uid = user.uid.clone();
        self.accounts.insert(
            uid.clone(),
            Account {
                user,
                password,
                federated: Vec::new(),
            },
        );
        uid
    }

    fn sign_in(&mut self, uid: String) -> Result<AuthResult, AuthError> {
        if self.disabled.contains(&uid) {
            return Err(AuthError::UserDisabled);
        }
        let user = self.account_mut(&uid)?.user.clone();
        self.current = Some(uid);
        Ok(AuthResult {
            user,
            id_token: new_token(),
        })
    }

    /// Consume a phone verification, returning the verified number
    fn redeem(&mut self, credential: &Credential) -> Result<String, AuthError> {
        let Credential::Phone {
            verification_id,
            code,
        } = credential
        else {
            return Err(AuthError::InvalidCredential(format!(
                "expected a phone credential, got {}",
                credential.provider_id()
            )));
        };
        if !self.verifications.contains_key(verification_id) {
            return Err(AuthError::InvalidVerificationId);
        }
        if *code != self.sms_code {
            return Err(AuthError::InvalidVerificationCode);
        }
        self.verifications
            .remove(verification_id)
            .ok_or(AuthError::InvalidVerificationId)
    }
}

fn new_uid() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn new_token() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(AuthError::InvalidEmail);
    };
    if local.is_empty() || domain.is_empty() {
        return Err(AuthError::InvalidEmail);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }
    Ok(())
}

/// Provider token identifying a federated account
fn federated_key(credential: &Credential) -> Result<String, AuthError> {
    let token = match credential {
        Credential::Google { id_token, .. } => id_token,
        Credential::Facebook { access_token } => access_token,
        Credential::Twitter { token, .. } => token,
        Credential::EmailPassword { .. } | Credential::Phone { .. } => {
            return Err(AuthError::InvalidCredential(
                "not a federated credential".to_string(),
            ))
        }
    };
    if token.is_empty() {
        return Err(AuthError::InvalidCredential(format!(
            "empty {} token",
            credential.provider_id()
        )));
    }
    Ok(token.clone())
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    fn add_state_listener(&self, sink: AuthStateSink) -> StateListenerHandle {
        let mut state = self.state.lock();
        state.next_handle += 1;
        let handle = state.next_handle;
        state.listeners.insert(handle, Arc::clone(&sink));
        let current = state.current_user();
        self.deliver(handle, sink, current);
        StateListenerHandle(handle)
    }

    fn remove_state_listener(&self, handle: StateListenerHandle) {
        self.state.lock().listeners.remove(&handle.0);
    }

    fn current_user(&self) -> Option<User> {
        self.state.lock().current_user()
    }

    async fn create_user_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthResult, AuthError> {
        validate_email(email)?;
        validate_password(password)?;
        self.transition(|state| {
            if state.uid_for_email(email).is_some() {
                return Err(AuthError::EmailAlreadyInUse);
            }
            let mut user = User::new(new_uid());
            user.email = Some(email.to_string());
            user.provider_data.push("password".to_string());
            let uid = state.insert(user, Some(password.to_string()));
            state.sign_in(uid)
        })
    }

    async fn sign_in_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthResult, AuthError> {
        validate_email(email)?;
        self.transition(|state| {
            let Some(uid) = state.uid_for_email(email) else {
                return Err(AuthError::UserNotFound);
            };
            if state.account_mut(&uid)?.password.as_deref() != Some(password) {
                return Err(AuthError::WrongPassword);
            }
            state.sign_in(uid)
        })
    }

    async fn sign_in_anonymously(&self) -> Result<AuthResult, AuthError> {
        self.transition(|state| {
            let mut user = User::new(new_uid());
            user.is_anonymous = true;
            let uid = state.insert(user, None);
            state.sign_in(uid)
        })
    }

    async fn sign_in_with_credential(&self, credential: Credential) -> Result<AuthResult, AuthError> {
        self.transition(|state| match &credential {
            Credential::EmailPassword { email, password } => {
                let Some(uid) = state.uid_for_email(email) else {
                    return Err(AuthError::UserNotFound);
                };
                if state.account_mut(&uid)?.password.as_deref() != Some(password.as_str()) {
                    return Err(AuthError::WrongPassword);
                }
                state.sign_in(uid)
            }
            Credential::Phone { .. } => {
                let phone = state.redeem(&credential)?;
                let existing = state
                    .accounts
                    .values()
                    .find(|a| a.user.phone_number.as_deref() == Some(phone.as_str()))
                    .map(|a| a.user.uid.clone());
                let uid = match existing {
                    Some(uid) => uid,
                    None => {
                        let mut user = User::new(new_uid());
                        user.phone_number = Some(phone);
                        user.provider_data.push("phone".to_string());
                        state.insert(user, None)
                    }
                };
                state.sign_in(uid)
            }
            federated => {
                let provider = federated.provider_id().to_string();
                let token = federated_key(federated)?;
                let existing = state
                    .accounts
                    .values()
                    .find(|a| a.federated.contains(&(provider.clone(), token.clone())))
                    .map(|a| a.user.uid.clone());
                let uid = match existing {
                    Some(uid) => uid,
                    None => {
                        let mut user = User::new(new_uid());
                        user.provider_data.push(provider.clone());
                        let uid = state.insert(user, None);
                        state.account_mut(&uid)?.federated.push((provider, token));
                        uid
                    }
                };
                state.sign_in(uid)
            }
        })
    }

    async fn verify_phone_number(
        &self,
        phone_number: &str,
        timeout: Duration,
    ) -> Result<String, AuthError> {
        // Validate number (error case first)
        let digits = phone_number.trim_start_matches('+');
        if !phone_number.starts_with('+')
            || digits.is_empty()
            || !digits.chars().all(|c| c.is_ascii_digit())
        {
            return Err(AuthError::Native {
                code: "ERROR_INVALID_PHONE_NUMBER".to_string(),
                message: format!("'{}' is not an E.164 phone number", phone_number),
            });
        }
        let mut state = self.state.lock();
        if let Some(err) = state.fail_next.take() {
            return Err(err);
        }
        let verification_id = uuid::Uuid::new_v4().to_string();
        state
            .verifications
            .insert(verification_id.clone(), phone_number.to_string());
        debug!(timeout_ms = timeout.as_millis() as u64, "sms code sent");
        Ok(verification_id)
    }

    async fn update_phone_number(&self, credential: Credential) -> Result<AuthResult, AuthError> {
        self.with_current(|state, uid| {
            let phone = state.redeem(&credential)?;
            let account = state.account_mut(&uid)?;
            account.user.phone_number = Some(phone);
            if !account.user.has_provider("phone") {
                account.user.provider_data.push("phone".to_string());
            }
            Ok(AuthResult {
                user: account.user.clone(),
                id_token: new_token(),
            })
        })
    }

    async fn send_password_reset_email(&self, email: &str) -> Result<(), AuthError> {
        validate_email(email)?;
        self.transition(|state| {
            if state.uid_for_email(email).is_none() {
                return Err(AuthError::UserNotFound);
            }
            state.sent_emails.push(SentEmail::PasswordReset {
                email: email.to_string(),
            });
            Ok(())
        })
    }

    async fn send_email_verification(&self) -> Result<(), AuthError> {
        self.with_current(|state, uid| {
            let Some(email) = state.account_mut(&uid)?.user.email.clone() else {
                return Err(AuthError::InvalidEmail);
            };
            state.sent_emails.push(SentEmail::Verification { email });
            Ok(())
        })
    }

    async fn update_password(&self, password: &str) -> Result<(), AuthError> {
        validate_password(password)?;
        self.with_current(|state, uid| {
            state.account_mut(&uid)?.password = Some(password.to_string());
            Ok(())
        })
    }

    async fn update_email(&self, email: &str) -> Result<(), AuthError> {
        validate_email(email)?;
        self.with_current(|state, uid| {
            if state.uid_for_email(email).is_some_and(|owner| owner != uid) {
                return Err(AuthError::EmailAlreadyInUse);
            }
            let user = &mut state.account_mut(&uid)?.user;
            user.email = Some(email.to_string());
            user.email_verified = false;
            Ok(())
        })
    }

    async fn update_profile(&self, profile: UserProfile) -> Result<(), AuthError> {
        self.with_current(|state, uid| {
            let user = &mut state.account_mut(&uid)?.user;
            if let Some(name) = profile.display_name {
                user.display_name = Some(name);
            }
            if let Some(url) = profile.photo_url {
                user.photo_url = Some(url);
            }
            Ok(())
        })
    }

    async fn reauthenticate(&self, credential: Credential) -> Result<(), AuthError> {
        self.with_current(|state, uid| {
            let Credential::EmailPassword { email, password } = &credential else {
                return Err(AuthError::InvalidCredential(format!(
                    "cannot reauthenticate with {}",
                    credential.provider_id()
                )));
            };
            let account = state.account_mut(&uid)?;
            if account.user.email.as_deref() != Some(email.as_str()) {
                return Err(AuthError::UserNotFound);
            }
            if account.password.as_deref() != Some(password.as_str()) {
                return Err(AuthError::WrongPassword);
            }
            Ok(())
        })
    }

    async fn delete_user(&self) -> Result<(), AuthError> {
        self.with_current(|state, uid| {
            state.accounts.remove(&uid);
            state.current = None;
            Ok(())
        })
    }

    async fn get_id_token(&self, _force_refresh: bool) -> Result<String, AuthError> {
        self.with_current(|_, _| Ok(new_token()))
    }

    fn set_language_code(&self, code: Option<&str>) {
        self.state.lock().language_code = code.map(str::to_string);
    }

    fn sign_out(&self) -> Result<(), AuthError> {
        self.transition(|state| {
            state.current = None;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_sink() -> (AuthStateSink, Arc<Mutex<Vec<Option<String>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&seen);
        let sink: AuthStateSink = Arc::new(move |user: Option<User>| {
            captured.lock().push(user.map(|u| u.uid));
        });
        (sink, seen)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_transitions_deliver_current_state_last() {
        let provider = Arc::new(InMemoryIdentityProvider::new());
        let mut observed = Vec::new();
        let mut tasks = Vec::new();

        for worker in 0..4 {
            let provider_task = Arc::clone(&provider);
            tasks.push(tokio::spawn(async move {
                for i in 0..25 {
                    if (worker + i) % 2 == 0 {
                        provider_task.sign_in_anonymously().await.unwrap();
                    } else {
                        provider_task.sign_out().unwrap();
                    }
                }
            }));
            let (sink, seen) = recording_sink();
            let handle = provider.add_state_listener(sink);
            observed.push((handle, seen));
        }
        for task in tasks {
            task.await.unwrap();
        }
        provider.flush().await;

        let current = provider.current_user().map(|u| u.uid);
        for (handle, seen) in observed {
            assert_eq!(seen.lock().last().cloned(), Some(current.clone()));
            provider.remove_state_listener(handle);
        }
        assert_eq!(provider.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_email_account_lifecycle() {
        let provider = InMemoryIdentityProvider::new();
        let created = provider
            .create_user_with_email_and_password("ann@example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(created.user.email.as_deref(), Some("ann@example.com"));

        assert_eq!(
            provider
                .create_user_with_email_and_password("ann@example.com", "secret1")
                .await,
            Err(AuthError::EmailAlreadyInUse)
        );
        assert_eq!(
            provider
                .sign_in_with_email_and_password("ann@example.com", "wrong!")
                .await,
            Err(AuthError::WrongPassword)
        );

        provider.sign_out().unwrap();
        assert!(provider.current_user().is_none());
        let signed_in = provider
            .sign_in_with_email_and_password("ann@example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(signed_in.user.uid, created.user.uid);
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let provider = InMemoryIdentityProvider::new();
        assert_eq!(
            provider.create_user_with_email_and_password("nope", "secret1").await,
            Err(AuthError::InvalidEmail)
        );
        assert_eq!(
            provider.create_user_with_email_and_password("a@b.c", "123").await,
            Err(AuthError::WeakPassword)
        );
        assert_eq!(provider.update_password("secret2").await, Err(AuthError::NoSignedInUser));
    }

    #[tokio::test]
    async fn test_state_listener_sees_transitions() {
        let provider = InMemoryIdentityProvider::new();
        let (sink, seen) = recording_sink();
        provider.add_state_listener(sink);

        let result = provider.sign_in_anonymously().await.unwrap();
        provider.sign_out().unwrap();
        provider.sign_out().unwrap();
        provider.flush().await;

        assert_eq!(*seen.lock(), vec![None, Some(result.user.uid), None]);
    }

    #[tokio::test]
    async fn test_removed_listener_is_silent() {
        let provider = InMemoryIdentityProvider::new();
        let (sink, seen) = recording_sink();
        let handle = provider.add_state_listener(sink);
        provider.remove_state_listener(handle);
        provider.sign_in_anonymously().await.unwrap();
        provider.flush().await;

        assert!(seen.lock().is_empty());
        assert_eq!(provider.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_phone_verification() {
        let provider = InMemoryIdentityProvider::new().with_sms_code("424242");
        let verification_id = provider
            .verify_phone_number("+15550100", Duration::from_secs(30))
            .await
            .unwrap();

        let wrong = Credential::Phone {
            verification_id: verification_id.clone(),
            code: "000000".to_string(),
        };
        assert_eq!(
            provider.sign_in_with_credential(wrong).await,
            Err(AuthError::InvalidVerificationCode)
        );

        let right = Credential::Phone {
            verification_id: verification_id.clone(),
            code: "424242".to_string(),
        };
        let result = provider.sign_in_with_credential(right.clone()).await.unwrap();
        assert_eq!(result.user.phone_number.as_deref(), Some("+15550100"));

        // Verification ids are single use
        assert_eq!(
            provider.sign_in_with_credential(right).await,
            Err(AuthError::InvalidVerificationId)
        );
    }

    #[tokio::test]
    async fn test_federated_sign_in_reuses_account() {
        let provider = InMemoryIdentityProvider::new();
        let credential = Credential::Google {
            id_token: "g-id".to_string(),
            access_token: "g-access".to_string(),
        };
        let first = provider.sign_in_with_credential(credential.clone()).await.unwrap();
        let second = provider.sign_in_with_credential(credential).await.unwrap();
        assert_eq!(first.user.uid, second.user.uid);
        assert!(first.user.has_provider("google.com"));

        let empty = Credential::Facebook {
            access_token: String::new(),
        };
        assert!(matches!(
            provider.sign_in_with_credential(empty).await,
            Err(AuthError::InvalidCredential(_))
        ));
    }

    #[tokio::test]
    async fn test_injected_failure_and_disabled_account() {
        let provider = InMemoryIdentityProvider::new();
        provider.fail_next(AuthError::NetworkRequestFailed("offline".to_string()));
        assert!(provider.sign_in_anonymously().await.is_err());
        assert!(provider.sign_in_anonymously().await.is_ok());

        provider
            .create_user_with_email_and_password("bo@example.com", "secret1")
            .await
            .unwrap();
        provider.disable_user("bo@example.com");
        assert_eq!(
            provider
                .sign_in_with_email_and_password("bo@example.com", "secret1")
                .await,
            Err(AuthError::UserDisabled)
        );
    }
}
