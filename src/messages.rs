//! Status lines shown next to forms

use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Error,
    Success,
    Loading,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

impl StatusMessage {
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Success,
            text: text.into(),
        }
    }

    pub fn loading(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Loading,
            text: text.into(),
        }
    }

    /// How long the message stays up. Loading messages stay until replaced.
    pub fn dismiss_after(&self) -> Option<Duration> {
        match self.kind {
            StatusKind::Error => Some(Duration::from_secs(5)),
            StatusKind::Success => Some(Duration::from_secs(3)),
            StatusKind::Loading => None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == StatusKind::Error
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
