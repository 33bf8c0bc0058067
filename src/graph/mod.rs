//! Microsoft Graph collaborator.
//!
//! Everything the breakout workflow needs from Graph goes through the
//! [`GraphApi`] trait. [`GraphClient`] is the HTTPS implementation; it is built
//! once at startup and bound to a caller's delegated token per request through
//! [`GraphConnector`].

mod batch;
mod client;
mod types;

pub use batch::*;
pub use client::*;
pub use types::*;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{CalendarEvent, User};

/// Errors returned by Graph calls.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{code} ({status}): {message}")]
    Status {
        status: u16,
        code: String,
        message: String,
    },
    #[error("response missing {0}")]
    MissingField(&'static str),
    #[error("invalid response: {0}")]
    Decode(String),
}

impl GraphError {
    pub fn is_not_found(&self) -> bool {
        match self {
            GraphError::Status { status, code, .. } => {
                *status == 404 || code == "ErrorItemNotFound"
            }
            _ => false,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, GraphError::Status { status: 401, .. })
    }
}

/// Operations the breakout workflow performs against Graph on behalf of the
/// signed-in user.
#[async_trait]
pub trait GraphApi: Send + Sync {
    /// The signed-in user.
    async fn me(&self) -> Result<User, GraphError>;

    /// Calendar view between two instants.
    async fn list_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, GraphError>;

    async fn get_event(&self, event_id: &str) -> Result<CalendarEvent, GraphError>;

    /// Members of an online meeting's chat, as directory users.
    async fn list_chat_members(&self, chat_id: &str) -> Result<Vec<User>, GraphError>;

    async fn get_extension(&self, event_id: &str, name: &str)
        -> Result<EventExtension, GraphError>;

    async fn create_extension(
        &self,
        event_id: &str,
        extension: &EventExtension,
    ) -> Result<EventExtension, GraphError>;

    async fn update_extension(
        &self,
        event_id: &str,
        name: &str,
        extension: &EventExtension,
    ) -> Result<(), GraphError>;

    /// Start team creation; returns the location of the async operation.
    async fn create_team(&self, team: &TeamRequest) -> Result<String, GraphError>;

    async fn get_operation(&self, location: &str) -> Result<TeamsAsyncOperation, GraphError>;

    async fn list_channels(&self, team_id: &str) -> Result<Vec<Channel>, GraphError>;

    /// Send one `$batch` round-trip. Item failures are reported per response,
    /// the error is reserved for the batch call itself.
    async fn batch(&self, steps: &[BatchStep]) -> Result<Vec<BatchItemResponse>, GraphError>;

    async fn archive_team(&self, team_id: &str) -> Result<(), GraphError>;

    async fn send_chat_message(&self, chat_id: &str, message: &ChatMessage)
        -> Result<(), GraphError>;
}

/// Delegated access token presented by the caller.
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Hands out Graph handles bound to a caller's token.
pub trait GraphConnector: Send + Sync {
    fn connect(&self, token: &AccessToken) -> Arc<dyn GraphApi>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        let by_status = GraphError::Status {
            status: 404,
            code: "NotFound".to_string(),
            message: String::new(),
        };
        let by_code = GraphError::Status {
            status: 400,
            code: "ErrorItemNotFound".to_string(),
            message: String::new(),
        };
        let other = GraphError::MissingField("Location");

        assert!(by_status.is_not_found());
        assert!(by_code.is_not_found());
        assert!(!other.is_not_found());
    }

    #[test]
    fn test_token_is_redacted_in_debug() {
        let token = AccessToken::new("secret");
        assert_eq!(format!("{:?}", token), "AccessToken(***)");
        assert_eq!(token.as_str(), "secret");
    }
}
