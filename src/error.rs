//! Error handling for the clinic booking client

use std::fmt;
use thiserror::Error;

use clinic_booking_auth::AuthError;
use clinic_booking_postgrest::PostgrestError;

use crate::booking::BookingRejection;
use crate::validation::FormError;

/// Unified error type for the clinic booking client
#[derive(Error, Debug)]
pub enum Error {
    /// Sign in, sign up, session and token errors from the auth service
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Query and write errors from the table API
    #[error("Database error: {0}")]
    Database(#[from] PostgrestError),

    /// Network or HTTP client errors outside the two service clients
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading or writing local files
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A login or registration field failed its check
    #[error("{0}")]
    Validation(#[from] FormError),

    /// A booking form that failed its checks; nothing was submitted
    #[error("{0}")]
    Booking(#[from] BookingRejection),

    /// The operation needs a signed-in user
    #[error("User must be authenticated")]
    NotAuthenticated,

    /// No appointment record with this id is visible to the caller
    #[error("Appointment record not found: {0}")]
    RecordNotFound(String),

    /// The record holds no appointment with this id or position
    #[error("Appointment not found: {0}")]
    EntryNotFound(String),

    /// The record changed between read and write
    #[error("Appointment record was changed by another session; reload and try again")]
    Conflict,

    /// The same action is already waiting on the backend
    #[error("This action is already in progress")]
    Busy,

    /// General errors
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new general error
    pub fn general<T: fmt::Display>(msg: T) -> Self {
        Error::General(msg.to_string())
    }

    /// True when the failure came from missing or rejected credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth(_) | Error::NotAuthenticated)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_are_classified() {
        assert!(Error::NotAuthenticated.is_auth());
        assert!(Error::from(AuthError::MissingSession).is_auth());
        assert!(!Error::Conflict.is_auth());
    }

    #[test]
    fn messages() {
        assert_eq!(
            Error::RecordNotFound("42".into()).to_string(),
            "Appointment record not found: 42"
        );
        assert_eq!(Error::config("missing key").to_string(), "Configuration error: missing key");
    }
}
