//! Firebase bridge error types
//!
//! Provides a unified error type hierarchy for every command and listener.
//!
//! # Native Reference
//! - `FIRAuthErrors.h` (FIRAuthErrorCode, surfaced as `ERROR_*` names)
//! - `FIRDatabaseReference.h` / `DatabaseError` codes (`PERMISSION_DENIED`, ...)
//!
//! # Design
//! Uses thiserror for ergonomic error definitions. All errors implement
//! std::error::Error and can be converted to FirebaseError via From trait.
//! Every error can be rendered as the `{code, message}` payload that script
//! callbacks receive.

use serde_json::{json, Value};
use thiserror::Error;

/// Top-level bridge error type
///
/// Wraps specific error types (Auth, Database) into a unified type.
/// Supports conversion from all module-specific errors via `From` trait.
///
/// # Example
/// ```
/// use firebase_bridge::{FirebaseError, AuthError};
///
/// let auth_err: FirebaseError = AuthError::InvalidEmail.into();
/// assert_eq!(auth_err.code(), "ERROR_INVALID_EMAIL");
/// ```
#[derive(Debug, Error)]
pub enum FirebaseError {
    /// Authentication-related errors reported by the identity provider
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Realtime Database errors reported by the data store
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Malformed or missing command argument; no native call was attempted
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation needed a live subscription that does not exist
    #[error("Unknown subscription: {0}")]
    UnknownSubscription(String),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Authentication errors
///
/// # Native Reference
/// - `FIRAuthErrors.h` - FIRAuthErrorCode
///
/// Maps identity provider error codes to Rust enum variants.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Email address is invalid
    #[error("Invalid email address")]
    InvalidEmail,

    /// Password does not meet the provider's strength rules
    #[error("Password is too weak")]
    WeakPassword,

    /// Email already in use by another account
    #[error("Email already in use")]
    EmailAlreadyInUse,

    /// User not found
    #[error("User not found")]
    UserNotFound,

    /// Wrong password
    #[error("Wrong password")]
    WrongPassword,

    /// User account has been disabled
    #[error("User account disabled")]
    UserDisabled,

    /// Too many failed login attempts
    #[error("Too many requests, try again later")]
    TooManyRequests,

    /// Operation not allowed (e.g., provider disabled)
    #[error("Operation not allowed")]
    OperationNotAllowed,

    /// Invalid credential
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// SMS code does not match the verification
    #[error("Invalid verification code")]
    InvalidVerificationCode,

    /// Verification identifier is unknown or already consumed
    #[error("Invalid verification ID")]
    InvalidVerificationId,

    /// User token has expired
    #[error("User token expired")]
    UserTokenExpired,

    /// Network error
    #[error("Network error: {0}")]
    NetworkRequestFailed(String),

    /// No signed-in user
    #[error("User is not authorized")]
    NoSignedInUser,

    /// Requires recent login
    #[error("This operation requires recent authentication")]
    RequiresRecentLogin,

    /// Account exists with different credential
    #[error("Account exists with different credential")]
    AccountExistsWithDifferentCredential,

    /// Any other code reported by the native SDK, passed through verbatim
    #[error("{message}")]
    Native {
        /// Native error code
        code: String,
        /// Native error message
        message: String,
    },
}

/// Realtime Database errors
///
/// # Native Reference
/// - `com.google.firebase.database.DatabaseError` constants
///
/// Maps data store error codes to Rust enum variants.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    /// Security rules rejected the read or write
    #[error("Permission denied")]
    PermissionDenied,

    /// Operation aborted by a network disconnect
    #[error("Disconnected")]
    Disconnected,

    /// Network error
    #[error("Network error")]
    NetworkError,

    /// Service is unavailable
    #[error("Service unavailable")]
    Unavailable,

    /// Write cancelled by the client
    #[error("Write canceled")]
    WriteCanceled,

    /// Transaction overridden by a subsequent set
    #[error("Overridden by set")]
    OverriddenBySet,

    /// Supplied auth token has expired
    #[error("Expired token")]
    ExpiredToken,

    /// Supplied auth token was invalid
    #[error("Invalid token")]
    InvalidToken,

    /// Transaction had too many retries
    #[error("Max retries")]
    MaxRetries,

    /// Server indicated the operation failed
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// Unknown error with code
    #[error("Unknown database error: code {0}")]
    Unknown(i32),
}

impl FirebaseError {
    /// Create an internal error from a string
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a validation error from a string
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Stable error code reported to script callbacks
    pub fn code(&self) -> String {
        match self {
            Self::Auth(e) => e.code().to_string(),
            Self::Database(e) => e.code().to_string(),
            Self::InvalidArgument(_) => "INVALID_ARGUMENT".to_string(),
            Self::UnknownSubscription(_) => "UNKNOWN_SUBSCRIPTION".to_string(),
            Self::Serialization(_) => "SERIALIZATION_ERROR".to_string(),
            Self::Internal(_) => "INTERNAL".to_string(),
        }
    }

    /// Human-readable message without the category prefix
    pub fn message(&self) -> String {
        match self {
            Self::Auth(e) => e.to_string(),
            Self::Database(e) => e.to_string(),
            Self::InvalidArgument(msg) | Self::Internal(msg) => msg.clone(),
            other => other.to_string(),
        }
    }

    /// `{code, message}` payload delivered with an `ERROR` status
    pub fn to_payload(&self) -> Value {
        json!({
            "code": self.code(),
            "message": self.message(),
        })
    }

    /// Check if error is retryable
    ///
    /// The bridge never retries on its own; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Auth(AuthError::NetworkRequestFailed(_))
                | Self::Auth(AuthError::TooManyRequests)
                | Self::Database(DatabaseError::Disconnected)
                | Self::Database(DatabaseError::NetworkError)
                | Self::Database(DatabaseError::Unavailable)
        )
    }

    /// Check if error indicates authentication is required
    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            Self::Auth(AuthError::NoSignedInUser)
                | Self::Auth(AuthError::RequiresRecentLogin)
                | Self::Auth(AuthError::UserTokenExpired)
                | Self::Database(DatabaseError::ExpiredToken)
                | Self::Database(DatabaseError::InvalidToken)
        )
    }
}

impl AuthError {
    /// Error code in the `ERROR_*` form the native SDK reports
    pub fn code(&self) -> &str {
        match self {
            Self::InvalidEmail => "ERROR_INVALID_EMAIL",
            Self::WeakPassword => "ERROR_WEAK_PASSWORD",
            Self::EmailAlreadyInUse => "ERROR_EMAIL_ALREADY_IN_USE",
            Self::UserNotFound => "ERROR_USER_NOT_FOUND",
            Self::WrongPassword => "ERROR_WRONG_PASSWORD",
            Self::UserDisabled => "ERROR_USER_DISABLED",
            Self::TooManyRequests => "ERROR_TOO_MANY_REQUESTS",
            Self::OperationNotAllowed => "ERROR_OPERATION_NOT_ALLOWED",
            Self::InvalidCredential(_) => "ERROR_INVALID_CREDENTIAL",
            Self::InvalidVerificationCode => "ERROR_INVALID_VERIFICATION_CODE",
            Self::InvalidVerificationId => "ERROR_INVALID_VERIFICATION_ID",
            Self::UserTokenExpired => "ERROR_USER_TOKEN_EXPIRED",
            Self::NetworkRequestFailed(_) => "ERROR_NETWORK_REQUEST_FAILED",
            Self::NoSignedInUser => "ERROR_NO_SIGNED_IN_USER",
            Self::RequiresRecentLogin => "ERROR_REQUIRES_RECENT_LOGIN",
            Self::AccountExistsWithDifferentCredential => {
                "ERROR_ACCOUNT_EXISTS_WITH_DIFFERENT_CREDENTIAL"
            }
            Self::Native { code, .. } => code,
        }
    }

    /// Create from a native `ERROR_*` code
    ///
    /// Unrecognised codes are kept verbatim as [`AuthError::Native`].
    pub fn from_error_code(code: &str, message: impl Into<String>) -> Self {
        match code {
            "ERROR_INVALID_EMAIL" => Self::InvalidEmail,
            "ERROR_WEAK_PASSWORD" => Self::WeakPassword,
            "ERROR_EMAIL_ALREADY_IN_USE" => Self::EmailAlreadyInUse,
            "ERROR_USER_NOT_FOUND" => Self::UserNotFound,
            "ERROR_WRONG_PASSWORD" => Self::WrongPassword,
            "ERROR_USER_DISABLED" => Self::UserDisabled,
            "ERROR_TOO_MANY_REQUESTS" => Self::TooManyRequests,
            "ERROR_OPERATION_NOT_ALLOWED" => Self::OperationNotAllowed,
            "ERROR_INVALID_CREDENTIAL" => Self::InvalidCredential(message.into()),
            "ERROR_INVALID_VERIFICATION_CODE" => Self::InvalidVerificationCode,
            "ERROR_INVALID_VERIFICATION_ID" => Self::InvalidVerificationId,
            "ERROR_USER_TOKEN_EXPIRED" => Self::UserTokenExpired,
            "ERROR_NETWORK_REQUEST_FAILED" => Self::NetworkRequestFailed(message.into()),
            "ERROR_NO_SIGNED_IN_USER" => Self::NoSignedInUser,
            "ERROR_REQUIRES_RECENT_LOGIN" => Self::RequiresRecentLogin,
            "ERROR_ACCOUNT_EXISTS_WITH_DIFFERENT_CREDENTIAL" => {
                Self::AccountExistsWithDifferentCredential
            }
            _ => Self::Native {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }
}

impl DatabaseError {
    /// Error code name the native SDK reports
    pub fn code(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::Disconnected => "DISCONNECTED",
            Self::NetworkError => "NETWORK_ERROR",
            Self::Unavailable => "UNAVAILABLE",
            Self::WriteCanceled => "WRITE_CANCELED",
            Self::OverriddenBySet => "OVERRIDDEN_BY_SET",
            Self::ExpiredToken => "EXPIRED_TOKEN",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::MaxRetries => "MAX_RETRIES",
            Self::OperationFailed(_) => "OPERATION_FAILED",
            Self::Unknown(_) => "UNKNOWN_ERROR",
        }
    }

    /// Create from a native numeric database error code
    pub fn from_code(code: i32) -> Self {
        match code {
            -2 => Self::OperationFailed(String::new()),
            -3 => Self::PermissionDenied,
            -4 => Self::Disconnected,
            -6 => Self::ExpiredToken,
            -7 => Self::InvalidToken,
            -8 => Self::MaxRetries,
            -9 => Self::OverriddenBySet,
            -10 => Self::Unavailable,
            -24 => Self::NetworkError,
            -25 => Self::WriteCanceled,
            _ => Self::Unknown(code),
        }
    }
}
