//! Breakout assignment model persisted on the governing calendar event.

use serde::{Deserialize, Serialize};

use super::User;

/// One provisioned breakout group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    /// Display name, `Group {n}` in provisioning order
    pub name: String,
    /// Channel id within the backing team
    pub id: String,
    /// Join URL of the group's dedicated online meeting
    pub online_meeting: String,
    pub members: Vec<User>,
}

/// The current breakout assignment of an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BreakoutAssignment {
    pub team_name: String,
    #[serde(default)]
    pub team_id: String,
    pub moderators: Vec<User>,
    pub groups: Vec<GroupInfo>,
}

impl BreakoutAssignment {
    /// A stored assignment is only meaningful once the team exists and has groups.
    pub fn is_complete(&self) -> bool {
        !self.team_id.is_empty() && !self.groups.is_empty() && !self.moderators.is_empty()
    }

    /// Every user referenced by the assignment, moderators first.
    pub fn all_users(&self) -> impl Iterator<Item = &User> {
        self.moderators
            .iter()
            .chain(self.groups.iter().flat_map(|g| g.members.iter()))
    }
}

/// Breakout state read from the store together with its concurrency token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredBreakouts {
    pub assignment: Option<BreakoutAssignment>,
    pub revision: i64,
}

/// Sub-requests that failed during the best-effort provisioning stages.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PartialFailures {
    /// User ids that could not be added to the team
    pub members_not_added: Vec<String>,
    /// Group indexes without an online meeting
    pub meetings_not_created: Vec<usize>,
    /// Group indexes whose channel announcement was not posted
    pub announcements_not_posted: Vec<usize>,
}

impl PartialFailures {
    pub fn count(&self) -> usize {
        self.members_not_added.len()
            + self.meetings_not_created.len()
            + self.announcements_not_posted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

/// Result of a completed provisioning run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionReport {
    pub assignment: BreakoutAssignment,
    pub revision: i64,
    pub failures: PartialFailures,
    pub failure_count: usize,
}
