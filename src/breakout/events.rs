//! Notifications about breakout changes for the presentation layer.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::User;

/// Something the meeting tab may want to refresh on.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BreakoutEvent {
    #[serde(rename_all = "camelCase")]
    GroupsCreated {
        event_id: String,
        team_id: String,
        groups: usize,
    },
    #[serde(rename_all = "camelCase")]
    TeamArchived { event_id: String, team_id: String },
    #[serde(rename_all = "camelCase")]
    ModeratorAdded { event_id: String, user: User },
    #[serde(rename_all = "camelCase")]
    ModeratorRemoved { event_id: String, user: User },
}

/// Fan-out of [`BreakoutEvent`]s to any number of subscribers.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<BreakoutEvent>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BreakoutEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: BreakoutEvent) {
        tracing::info!(?event, "Breakout event");
        let _ = self.tx.send(event);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(64)
    }
}
