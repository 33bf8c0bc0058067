//! In-memory Graph used by unit and integration tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::graph::{
    AccessToken, BatchItemResponse, BatchStep, Channel, ChatMessage, EventExtension, GraphApi,
    GraphConnector, GraphError, OperationStatus, TeamRequest, TeamsAsyncOperation,
};
use crate::models::{CalendarEvent, DateTimeTimeZone, OnlineMeetingInfo, User};

pub const TEAM_ID: &str = "team-1";

/// Recorded calls and scripted behaviour of [`FakeGraph`].
#[derive(Default)]
pub struct FakeState {
    pub me: Option<User>,
    pub events: HashMap<String, CalendarEvent>,
    pub chat_members: HashMap<String, Vec<User>>,
    pub extensions: HashMap<(String, String), EventExtension>,
    /// Statuses returned by successive operation reads; the last one repeats
    pub operation_statuses: VecDeque<OperationStatus>,
    pub create_team_fails: bool,
    pub operation_read_fails: bool,
    pub extension_read_fails: bool,
    /// Channels returned for the team; derived from the team request when unset
    pub channels: Option<Vec<Channel>>,
    /// Zero-based indexes of `$batch` calls that fail as a whole
    pub failing_batch_calls: HashSet<usize>,
    /// Sub-request URL fragments answered with a 500
    pub failing_urls: Vec<String>,
    pub archive_fails: bool,
    pub failing_chats: HashSet<String>,

    pub teams_created: Vec<TeamRequest>,
    pub operation_reads: usize,
    pub batch_calls: Vec<Vec<BatchStep>>,
    pub archived: Vec<String>,
    pub chat_messages: Vec<(String, ChatMessage)>,
    pub extension_writes: usize,
}

/// Scriptable [`GraphApi`] double.
#[derive(Default)]
pub struct FakeGraph {
    state: Mutex<FakeState>,
}

impl FakeGraph {
    pub fn new() -> Arc<Self> {
        let graph = Self::default();
        {
            let mut s = graph.state();
            s.me = Some(User::new("me", "Moderator Me"));
            s.operation_statuses = VecDeque::from(vec![
                OperationStatus::InProgress,
                OperationStatus::Succeeded,
            ]);
        }
        Arc::new(graph)
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake graph state poisoned")
    }

    /// Add a Teams meeting whose chat holds `attendees`.
    pub fn add_meeting(&self, event_id: &str, subject: &str, attendees: Vec<User>) -> CalendarEvent {
        let chat_id = format!("19%3ameeting_{event_id}%40thread.v2");
        let event = CalendarEvent {
            id: event_id.to_string(),
            subject: subject.to_string(),
            body_preview: None,
            start: DateTimeTimeZone {
                date_time: "2026-10-19T15:00:00.0000000".to_string(),
                time_zone: "UTC".to_string(),
            },
            end: DateTimeTimeZone {
                date_time: "2026-10-19T16:00:00.0000000".to_string(),
                time_zone: "UTC".to_string(),
            },
            is_online_meeting: true,
            online_meeting_provider: Some("teamsForBusiness".to_string()),
            online_meeting: Some(OnlineMeetingInfo {
                join_url: format!("https://teams.microsoft.com/l/meetup-join/{chat_id}/0"),
            }),
        };

        let mut s = self.state();
        s.events.insert(event_id.to_string(), event.clone());
        s.chat_members.insert(chat_id, attendees);
        event
    }

    pub fn extension(&self, event_id: &str, name: &str) -> Option<EventExtension> {
        self.state()
            .extensions
            .get(&(event_id.to_string(), name.to_string()))
            .cloned()
    }
}

fn not_found(what: &str) -> GraphError {
    GraphError::Status {
        status: 404,
        code: "ErrorItemNotFound".to_string(),
        message: format!("{what} not found"),
    }
}

fn server_error(what: &str) -> GraphError {
    GraphError::Status {
        status: 500,
        code: "InternalServerError".to_string(),
        message: format!("{what} failed"),
    }
}

#[async_trait]
impl GraphApi for FakeGraph {
    async fn me(&self) -> Result<User, GraphError> {
        self.state().me.clone().ok_or_else(|| not_found("me"))
    }

    async fn list_events(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, GraphError> {
        let mut events: Vec<_> = self.state().events.values().cloned().collect();
        events.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(events)
    }

    async fn get_event(&self, event_id: &str) -> Result<CalendarEvent, GraphError> {
        self.state()
            .events
            .get(event_id)
            .cloned()
            .ok_or_else(|| not_found("event"))
    }

    async fn list_chat_members(&self, chat_id: &str) -> Result<Vec<User>, GraphError> {
        self.state()
            .chat_members
            .get(chat_id)
            .cloned()
            .ok_or_else(|| not_found("chat"))
    }

    async fn get_extension(
        &self,
        event_id: &str,
        name: &str,
    ) -> Result<EventExtension, GraphError> {
        let s = self.state();
        if s.extension_read_fails {
            return Err(server_error("extension read"));
        }
        s.extensions
            .get(&(event_id.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| not_found("extension"))
    }

    async fn create_extension(
        &self,
        event_id: &str,
        extension: &EventExtension,
    ) -> Result<EventExtension, GraphError> {
        let name = extension
            .extension_name
            .clone()
            .ok_or(GraphError::MissingField("extensionName"))?;
        let mut s = self.state();
        s.extension_writes += 1;
        s.extensions
            .insert((event_id.to_string(), name), extension.clone());
        Ok(extension.clone())
    }

    async fn update_extension(
        &self,
        event_id: &str,
        name: &str,
        extension: &EventExtension,
    ) -> Result<(), GraphError> {
        let mut s = self.state();
        let key = (event_id.to_string(), name.to_string());
        if !s.extensions.contains_key(&key) {
            return Err(not_found("extension"));
        }
        let mut stored = extension.clone();
        stored.extension_name = Some(name.to_string());
        s.extension_writes += 1;
        s.extensions.insert(key, stored);
        Ok(())
    }

    async fn create_team(&self, team: &TeamRequest) -> Result<String, GraphError> {
        let mut s = self.state();
        if s.create_team_fails {
            return Err(server_error("team creation"));
        }
        s.teams_created.push(team.clone());
        Ok(format!("/teams('{TEAM_ID}')/operations('op-1')"))
    }

    async fn get_operation(&self, _location: &str) -> Result<TeamsAsyncOperation, GraphError> {
        let mut s = self.state();
        s.operation_reads += 1;
        if s.operation_read_fails {
            return Err(server_error("operation read"));
        }
        let status = if s.operation_statuses.len() > 1 {
            s.operation_statuses.pop_front()
        } else {
            s.operation_statuses.front().copied()
        }
        .unwrap_or(OperationStatus::Succeeded);

        Ok(TeamsAsyncOperation {
            id: Some("op-1".to_string()),
            status,
            target_resource_id: (status == OperationStatus::Succeeded).then(|| TEAM_ID.to_string()),
            error: None,
        })
    }

    async fn list_channels(&self, _team_id: &str) -> Result<Vec<Channel>, GraphError> {
        let s = self.state();
        if let Some(channels) = &s.channels {
            return Ok(channels.clone());
        }
        let mut channels = vec![Channel {
            id: "general".to_string(),
            display_name: "General".to_string(),
        }];
        if let Some(team) = s.teams_created.last() {
            for (i, c) in team.channels.iter().enumerate().rev() {
                channels.push(Channel {
                    id: format!("channel-{}", i + 1),
                    display_name: c.display_name.clone(),
                });
            }
        }
        Ok(channels)
    }

    async fn batch(&self, steps: &[BatchStep]) -> Result<Vec<BatchItemResponse>, GraphError> {
        let mut s = self.state();
        let call = s.batch_calls.len();
        s.batch_calls.push(steps.to_vec());
        if s.failing_batch_calls.contains(&call) {
            return Err(server_error("batch"));
        }

        // answered in reverse to exercise id correlation
        Ok(steps
            .iter()
            .rev()
            .map(|step| {
                if s.failing_urls.iter().any(|f| step.url.contains(f.as_str())) {
                    return BatchItemResponse {
                        id: step.id.clone(),
                        status: 500,
                        body: Some(json!({ "error": { "code": "Boom", "message": "scripted" } })),
                    };
                }
                let (status, body) = if step.url.ends_with("/onlineMeetings") {
                    let subject = step
                        .body
                        .as_ref()
                        .and_then(|b| b["subject"].as_str())
                        .unwrap_or_default()
                        .replace(' ', "_");
                    (
                        201,
                        Some(json!({
                            "id": format!("meeting-{}", step.id),
                            "joinUrl": format!("https://teams.microsoft.com/l/meetup-join/19%3ameeting_{subject}%40thread.v2/0")
                        })),
                    )
                } else if step.url.ends_with("/messages") {
                    (201, Some(json!({ "id": format!("message-{}", step.id) })))
                } else {
                    (204, None)
                };
                BatchItemResponse {
                    id: step.id.clone(),
                    status,
                    body,
                }
            })
            .collect())
    }

    async fn archive_team(&self, team_id: &str) -> Result<(), GraphError> {
        let mut s = self.state();
        if s.archive_fails {
            return Err(server_error("archive"));
        }
        s.archived.push(team_id.to_string());
        Ok(())
    }

    async fn send_chat_message(
        &self,
        chat_id: &str,
        message: &ChatMessage,
    ) -> Result<(), GraphError> {
        let mut s = self.state();
        if s.failing_chats.contains(chat_id) {
            return Err(server_error("chat message"));
        }
        s.chat_messages.push((chat_id.to_string(), message.clone()));
        Ok(())
    }
}

/// Connector handing out the same fake regardless of token.
pub struct FakeConnector(pub Arc<FakeGraph>);

impl GraphConnector for FakeConnector {
    fn connect(&self, _token: &AccessToken) -> Arc<dyn GraphApi> {
        self.0.clone()
    }
}
