//! Request and response bodies of the REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BreakoutAssignment, CalendarEvent, User};

/// Request body for opening a breakout session on an event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionRequest {
    pub event_id: String,
    /// Attendees to group; resolved from the meeting chat when omitted
    #[serde(default)]
    pub attendees: Option<Vec<User>>,
}

/// Request body for previewing a grouping of the session's participants.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    pub group_size: usize,
    /// Seed for a reproducible shuffle
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Request body for starting breakout provisioning.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBreakoutsRequest {
    /// Groups as previewed by the moderator; partitioned afresh when omitted
    #[serde(default)]
    pub groups: Option<Vec<Vec<User>>>,
    #[serde(default)]
    pub group_size: Option<usize>,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Request body for messaging every breakout.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRequest {
    pub message: String,
}

/// Query parameters for listing upcoming events.
#[derive(Debug, Clone, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub days: Option<u32>,
}

/// Snapshot of a breakout session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: Uuid,
    pub event: CalendarEvent,
    pub current_user: User,
    pub moderators: Vec<User>,
    pub participants: Vec<User>,
    pub assignment: Option<BreakoutAssignment>,
    pub revision: i64,
    pub opened_at: DateTime<Utc>,
}

/// Proposed grouping of the session's participants.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub group_size: usize,
    pub groups: Vec<Vec<User>>,
}

/// Acknowledgement of a started provisioning job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStarted {
    pub job_id: Uuid,
}

/// Outcome of messaging every breakout.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastReport {
    /// Names of groups whose meeting chat received the message
    pub sent: Vec<String>,
    /// Names of groups the message could not be delivered to
    pub failed: Vec<String>,
}
