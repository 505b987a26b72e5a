//! Configuration for the clinic booking client

use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};

/// Environment variable holding the project URL.
pub const URL_ENV: &str = "SUPABASE_URL";
/// Environment variable holding the anonymous API key.
pub const ANON_KEY_ENV: &str = "SUPABASE_ANON_KEY";

/// Tunables that have sensible defaults
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Whether to automatically refresh an expired access token
    pub auto_refresh_token: bool,

    /// Whether the auth client keeps the session it signs in with
    pub persist_session: bool,

    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// Table holding one appointment record per user
    pub appointments_table: String,

    /// Read-only table of doctors
    pub doctors_table: String,

    /// How many months past the current one can be booked
    pub lookahead_months: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            auto_refresh_token: true,
            persist_session: true,
            request_timeout: Some(Duration::from_secs(30)),
            appointments_table: "appointments".to_string(),
            doctors_table: "doctors".to_string(),
            lookahead_months: 3,
        }
    }
}

impl ClientOptions {
    /// Set whether to automatically refresh the token
    pub fn with_auto_refresh_token(mut self, value: bool) -> Self {
        self.auto_refresh_token = value;
        self
    }

    /// Set whether to persist the session
    pub fn with_persist_session(mut self, value: bool) -> Self {
        self.persist_session = value;
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the appointments table name
    pub fn with_appointments_table(mut self, value: &str) -> Self {
        self.appointments_table = value.to_string();
        self
    }

    /// Set the doctors table name
    pub fn with_doctors_table(mut self, value: &str) -> Self {
        self.doctors_table = value.to_string();
        self
    }

    /// Set the booking lookahead, in months after the current one
    pub fn with_lookahead_months(mut self, value: u32) -> Self {
        self.lookahead_months = value;
        self
    }
}

/// Where the backend lives and how to talk to it.
#[derive(Debug, Clone)]
pub struct ClinicConfig {
    pub url: Url,
    pub anon_key: String,
    pub options: ClientOptions,
}

impl ClinicConfig {
    /// Creates a new configuration, validating the URL.
    pub fn new(url_str: &str, anon_key: &str) -> Result<Self> {
        let url = Url::parse(url_str)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "{} must be an http(s) URL, got {}",
                URL_ENV, url_str
            )));
        }
        if anon_key.trim().is_empty() {
            return Err(Error::config("anon_key cannot be empty"));
        }
        Ok(Self {
            url,
            anon_key: anon_key.to_string(),
            options: ClientOptions::default(),
        })
    }

    /// Reads `SUPABASE_URL` and `SUPABASE_ANON_KEY` from the environment.
    pub fn from_env() -> Result<Self> {
        let url_str = std::env::var(URL_ENV)
            .map_err(|_| Error::config(format!("{} environment variable not found", URL_ENV)))?;
        let anon_key = std::env::var(ANON_KEY_ENV).map_err(|_| {
            Error::config(format!("{} environment variable not found", ANON_KEY_ENV))
        })?;
        Self::new(&url_str, &anon_key)
    }

    /// Replace the client options
    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Project URL without the trailing slash `Url` adds to bare hosts.
    pub fn base_url(&self) -> &str {
        self.url.as_str().trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_new_valid() {
        let config = ClinicConfig::new("http://localhost:54321", "anon").unwrap();
        assert_eq!(config.base_url(), "http://localhost:54321");
        assert_eq!(config.options.appointments_table, "appointments");
        assert_eq!(config.options.lookahead_months, 3);
    }

    #[test]
    fn config_new_invalid_url() {
        let config = ClinicConfig::new("not a valid url", "anon");
        assert!(matches!(config, Err(Error::Url(_))));
    }

    #[test]
    fn config_rejects_other_schemes() {
        let config = ClinicConfig::new("ftp://example.com", "anon");
        assert!(matches!(config, Err(Error::Config(_))));
    }

    #[test]
    fn config_new_empty_key() {
        match ClinicConfig::new("http://localhost:54321", " ") {
            Err(Error::Config(msg)) => assert!(msg.contains("anon_key cannot be empty")),
            other => panic!("Expected Config error for empty key, got {:?}", other),
        }
    }

    #[test]
    fn options_builder() {
        let options = ClientOptions::default()
            .with_request_timeout(None)
            .with_doctors_table("staff")
            .with_lookahead_months(5);
        assert_eq!(options.request_timeout, None);
        assert_eq!(options.doctors_table, "staff");
        assert_eq!(options.lookahead_months, 5);
    }
}
