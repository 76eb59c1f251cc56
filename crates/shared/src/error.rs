use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Unauthorized,
    Unavailable,
    Transport,
    Server,
    Decode,
}

/// Failure of a single remote collection request. This is the only error that
/// crosses from the aggregation core to its consumers.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Unauthorized, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Unavailable, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Transport, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Server, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Decode, message)
    }

    pub fn requires_reauth(&self) -> bool {
        self.kind == FetchErrorKind::Unauthorized
    }

    /// Text for the transient notification shown in place of a failed refresh.
    pub fn user_message(&self) -> String {
        match self.kind {
            FetchErrorKind::Unauthorized => "Token expired, log in again".to_string(),
            FetchErrorKind::Unavailable => {
                "Couldn't connect to the backend - try again later".to_string()
            }
            FetchErrorKind::Server => self.message.clone(),
            FetchErrorKind::Transport => format!("Request failed: {}", self.message),
            FetchErrorKind::Decode => {
                format!("Unexpected response from the backend: {}", self.message)
            }
        }
    }
}
