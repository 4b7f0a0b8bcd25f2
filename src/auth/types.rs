//! Authentication types
//!
//! # Native Reference
//! - `FIRUser.h` / `FIRUserInfo.h`
//! - `FIRAuthCredential.h` and the per-provider credential factories
//! - `FIRUserProfileChangeRequest`

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Snapshot of a signed-in user's profile
///
/// # Native Reference
/// - `FIRUser.h`
///
/// Serializes to the user payload script callbacks receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID
    pub uid: String,

    /// Display name
    pub display_name: Option<String>,

    /// Email address
    pub email: Option<String>,

    /// Phone number in E.164 form
    pub phone_number: Option<String>,

    /// Photo URL
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,

    /// Provider of the user record itself (always `"firebase"` for the native SDK)
    pub provider_id: String,

    /// IDs of the providers linked to this account (e.g. `"password"`, `"phone"`)
    pub provider_data: Vec<String>,

    /// Whether the account was created anonymously
    pub is_anonymous: bool,

    /// Whether the email address has been verified
    pub email_verified: bool,
}

impl User {
    /// A user record with no profile data
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: None,
            email: None,
            phone_number: None,
            photo_url: None,
            provider_id: "firebase".to_string(),
            provider_data: Vec::new(),
            is_anonymous: false,
            email_verified: false,
        }
    }

    /// Profile payload delivered to script callbacks
    pub fn to_payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Payload for an optional user; signed out is `null`
    pub fn payload_of(user: Option<&User>) -> Value {
        user.map_or(Value::Null, User::to_payload)
    }

    /// Whether `provider_id` is linked to this account
    pub fn has_provider(&self, provider_id: &str) -> bool {
        self.provider_data.iter().any(|p| p == provider_id)
    }
}

/// Authentication credential
///
/// # Native Reference
/// - `FIREmailAuthProvider credentialWithEmail:password:`
/// - `FIRGoogleAuthProvider credentialWithIDToken:accessToken:`
/// - `FIRFacebookAuthProvider credentialWithAccessToken:`
/// - `FIRTwitterAuthProvider credentialWithToken:secret:`
/// - `FIRPhoneAuthProvider credentialWithVerificationID:verificationCode:`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Email and password credential
    EmailPassword {
        /// Email address
        email: String,
        /// Password
        password: String,
    },

    /// Google Sign-In credential
    Google {
        /// Google Sign-In ID token
        id_token: String,
        /// Google Sign-In access token
        access_token: String,
    },

    /// Facebook Login credential
    Facebook {
        /// Facebook access token
        access_token: String,
    },

    /// Twitter credential
    Twitter {
        /// OAuth token
        token: String,
        /// OAuth token secret
        secret: String,
    },

    /// Phone credential completing an SMS verification
    Phone {
        /// Identifier returned by phone verification
        verification_id: String,
        /// Code received by SMS
        code: String,
    },
}

impl Credential {
    /// Get the provider ID for this credential
    pub fn provider_id(&self) -> &str {
        match self {
            Credential::EmailPassword { .. } => "password",
            Credential::Google { .. } => "google.com",
            Credential::Facebook { .. } => "facebook.com",
            Credential::Twitter { .. } => "twitter.com",
            Credential::Phone { .. } => "phone",
        }
    }
}

/// User profile update request
///
/// # Native Reference
/// - `FIRUserProfileChangeRequest`
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UserProfile {
    /// Display name to update (None = no change)
    pub display_name: Option<String>,

    /// Photo URL to update (None = no change)
    pub photo_url: Option<String>,
}

impl UserProfile {
    /// Set display name
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set photo URL
    pub fn photo_url(mut self, url: impl Into<String>) -> Self {
        self.photo_url = Some(url.into());
        self
    }

    /// Whether the request changes nothing
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.photo_url.is_none()
    }
}

/// Result of a successful sign-in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    /// The signed-in user
    pub user: User,

    /// ID token issued for the session
    pub id_token: String,
}

impl AuthResult {
    /// User payload with the session `token` added
    pub fn to_payload(&self) -> Value {
        let mut payload = self.user.to_payload();
        if let Value::Object(fields) = &mut payload {
            fields.insert("token".to_string(), Value::String(self.id_token.clone()));
        }
        payload
    }
}
