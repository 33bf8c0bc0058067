//! Open breakout sessions, one per event opened in the meeting tab.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::roster::Roster;
use crate::errors::AppError;
use crate::models::{BreakoutAssignment, CalendarEvent, SessionView};

/// Server-side state of one opened event.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub event: CalendarEvent,
    pub roster: Roster,
    pub assignment: Option<BreakoutAssignment>,
    /// Store revision the assignment was read at
    pub revision: i64,
    pub opened_at: DateTime<Utc>,
    /// Last time the session was read or changed
    pub last_seen: DateTime<Utc>,
}

impl Session {
    pub fn new(
        event: CalendarEvent,
        roster: Roster,
        assignment: Option<BreakoutAssignment>,
        revision: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            event,
            roster,
            assignment,
            revision,
            opened_at: now,
            last_seen: now,
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            session_id: self.id,
            event: self.event.clone(),
            current_user: self.roster.current_user().clone(),
            moderators: self.roster.moderators().to_vec(),
            participants: self.roster.participants().to_vec(),
            assignment: self.assignment.clone(),
            revision: self.revision,
            opened_at: self.opened_at,
        }
    }
}

/// Sessions untouched for this long are dropped.
const SESSION_IDLE_TTL_HOURS: i64 = 12;

/// In-memory session registry.
///
/// Idle sessions are pruned whenever a new one is opened.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, Session>>>,
    idle_ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_idle_ttl(Duration::hours(SESSION_IDLE_TTL_HOURS))
    }
}

impl SessionStore {
    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            idle_ttl,
        }
    }

    pub async fn insert(&self, session: Session) -> SessionView {
        let view = session.view();
        let mut sessions = self.inner.write().await;

        let now = Utc::now();
        let before = sessions.len();
        sessions.retain(|_, s| now - s.last_seen < self.idle_ttl);
        let pruned = before - sessions.len();
        if pruned > 0 {
            tracing::info!(pruned, "Dropped idle sessions");
        }

        sessions.insert(session.id, session);
        view
    }

    pub async fn get(&self, id: Uuid) -> Result<Session, AppError> {
        self.update(id, |s| Ok(s.clone())).await
    }

    /// Apply `f` to the session under the write lock.
    pub async fn update<T, F>(&self, id: Uuid, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Session) -> Result<T, AppError>,
    {
        let mut sessions = self.inner.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Session {} not found", id)))?;
        session.last_seen = Utc::now();
        f(session)
    }

    /// Close a session.
    pub async fn remove(&self, id: Uuid) -> Result<Session, AppError> {
        self.inner
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| AppError::NotFound(format!("Session {} not found", id)))
    }
}
