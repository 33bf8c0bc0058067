//! Graph wire types used by the breakout workflow.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `@odata.type` of open extensions.
pub const OPEN_EXTENSION_TYPE: &str = "microsoft.graph.openTypeExtension";

/// Schema tag written alongside the serialized assignment.
pub const EXTENSION_SCHEMA_VERSION: u32 = 1;

/// Collection envelope (`{ "value": [...] }`).
#[derive(Debug, Clone, Deserialize)]
pub struct ODataCollection<T> {
    pub value: Vec<T>,
}

/// Open extension carrying breakout state on a calendar event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventExtension {
    #[serde(rename = "@odata.type", default = "open_extension_type")]
    pub odata_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_name: Option<String>,
    /// Serialized assignment, empty while no breakout is running
    #[serde(default)]
    pub breakouts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u32>,
    /// Incremented on every write; absent on payloads written without it
    #[serde(default)]
    pub revision: i64,
}

fn open_extension_type() -> String {
    OPEN_EXTENSION_TYPE.to_string()
}

impl EventExtension {
    /// Empty extension as created on first access.
    pub fn empty(name: &str) -> Self {
        Self {
            odata_type: open_extension_type(),
            extension_name: Some(name.to_string()),
            breakouts: String::new(),
            schema_version: Some(EXTENSION_SCHEMA_VERSION),
            revision: 0,
        }
    }
}

/// Channel requested at team creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRequest {
    pub display_name: String,
}

/// Team creation body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamRequest {
    #[serde(rename = "template@odata.bind")]
    pub template: String,
    pub visibility: String,
    pub display_name: String,
    pub description: String,
    pub channels: Vec<ChannelRequest>,
}

/// Status of a teams async operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum OperationStatus {
    NotStarted,
    InProgress,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

impl OperationStatus {
    pub fn is_pending(self) -> bool {
        matches!(self, OperationStatus::NotStarted | OperationStatus::InProgress)
    }
}

/// Teams async operation resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamsAsyncOperation {
    #[serde(default)]
    pub id: Option<String>,
    pub status: OperationStatus,
    #[serde(default)]
    pub target_resource_id: Option<String>,
    #[serde(default)]
    pub error: Option<Value>,
}

/// Team channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
}

/// Conversation member of a chat.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMember {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Online meeting as returned by `POST /me/onlineMeetings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineMeeting {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub join_url: Option<String>,
    #[serde(default)]
    pub join_web_url: Option<String>,
}

impl OnlineMeeting {
    pub fn join_link(&self) -> Option<&str> {
        self.join_url
            .as_deref()
            .or(self.join_web_url.as_deref())
            .filter(|url| !url.is_empty())
    }
}

/// Message body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemBody {
    pub content_type: String,
    pub content: String,
}

/// Mentioned directory user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MentionedUser {
    pub display_name: String,
    pub id: String,
    pub user_identity_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MentionedIdentity {
    pub user: MentionedUser,
}

/// `@mention` entry referenced by an `<at id="n">` tag in the message body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Mention {
    pub id: usize,
    pub mention_text: String,
    pub mentioned: MentionedIdentity,
}

/// Chat or channel message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub body: ItemBody,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<Mention>,
}

/// Graph error body (`{ "error": { "code", "message" } }`).
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorInner,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorInner {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_status_decoding() {
        let op: TeamsAsyncOperation = serde_json::from_value(serde_json::json!({
            "id": "op-1",
            "status": "inProgress",
            "targetResourceId": null
        }))
        .unwrap();
        assert!(op.status.is_pending());

        let op: TeamsAsyncOperation =
            serde_json::from_value(serde_json::json!({ "status": "unknownFutureValue" })).unwrap();
        assert_eq!(op.status, OperationStatus::Unknown);
        assert!(!op.status.is_pending());
    }

    #[test]
    fn test_team_request_wire_shape() {
        let team = TeamRequest {
            template: "https://graph.microsoft.com/beta/teamsTemplates('standard')".to_string(),
            visibility: "private".to_string(),
            display_name: "Sync Breakouts".to_string(),
            description: "d".to_string(),
            channels: vec![ChannelRequest {
                display_name: "Group 1".to_string(),
            }],
        };
        let json = serde_json::to_value(&team).unwrap();
        assert_eq!(
            json["template@odata.bind"],
            "https://graph.microsoft.com/beta/teamsTemplates('standard')"
        );
        assert_eq!(json["channels"][0]["displayName"], "Group 1");
    }

    #[test]
    fn test_legacy_extension_without_revision() {
        let ext: EventExtension = serde_json::from_value(serde_json::json!({
            "@odata.type": "microsoft.graph.openTypeExtension",
            "extensionName": "com.moderatorTest",
            "breakouts": ""
        }))
        .unwrap();
        assert_eq!(ext.revision, 0);
        assert_eq!(ext.schema_version, None);
    }
}
