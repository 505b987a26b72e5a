//! Field checks for the login and registration forms

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

// `regex` has no lookahead, so the password pattern only covers the charset
// and length; the class requirements are checked separately.
static EMAIL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());
static PASSWORD_CHARSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9@$!%*?&]{8,}$").unwrap());
static NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z\s\-']{2,50}$").unwrap());

/// `local@domain.tld` with no whitespace or extra `@` in any part.
pub fn validate_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// At least 8 characters from letters, digits and `@$!%*?&`, with at least one
/// lowercase letter, one uppercase letter and one digit.
pub fn validate_password(password: &str) -> bool {
    PASSWORD_CHARSET.is_match(password)
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
}

/// 2 to 50 ASCII letters, whitespace, hyphens or apostrophes.
pub fn validate_name(name: &str) -> bool {
    NAME.is_match(name)
}

/// A form field that failed its check. The display text is shown to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("Please fill in all fields")]
    MissingField,
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("First name must be 2-50 characters and contain only letters")]
    InvalidFirstName,
    #[error("Last name must be 2-50 characters and contain only letters")]
    InvalidLastName,
    #[error("Password must be at least 8 characters with uppercase, lowercase, and number")]
    WeakPassword,
    #[error("Passwords do not match")]
    PasswordMismatch,
}

/// Credentials typed into the login form.
#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), FormError> {
        if self.email.is_empty() || self.password.is_empty() {
            return Err(FormError::MissingField);
        }
        if !validate_email(&self.email) {
            return Err(FormError::InvalidEmail);
        }
        Ok(())
    }
}

/// Fields of the registration form.
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
}

impl RegistrationForm {
    /// Runs the checks in the order the form reports them; the first failure wins.
    pub fn validate(&self) -> Result<(), FormError> {
        let fields = [
            &self.email,
            &self.password,
            &self.confirm_password,
            &self.first_name,
            &self.last_name,
        ];
        if fields.iter().any(|f| f.is_empty()) {
            return Err(FormError::MissingField);
        }
        if !validate_email(&self.email) {
            return Err(FormError::InvalidEmail);
        }
        if !validate_name(&self.first_name) {
            return Err(FormError::InvalidFirstName);
        }
        if !validate_name(&self.last_name) {
            return Err(FormError::InvalidLastName);
        }
        if !validate_password(&self.password) {
            return Err(FormError::WeakPassword);
        }
        if self.password != self.confirm_password {
            return Err(FormError::PasswordMismatch);
        }
        Ok(())
    }
}
