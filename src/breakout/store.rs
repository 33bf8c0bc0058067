//! Breakout state persisted as an open extension on the calendar event.
//!
//! The extension holds the serialized assignment in its `breakouts` field
//! (empty while no breakout runs) next to a schema tag and a revision counter.
//! Writes carry the revision they were based on and are refused when the
//! stored revision moved on.

use std::sync::Arc;

use crate::errors::AppError;
use crate::graph::{EventExtension, GraphApi, EXTENSION_SCHEMA_VERSION, OPEN_EXTENSION_TYPE};
use crate::models::{BreakoutAssignment, StoredBreakouts};

pub struct BreakoutStore {
    graph: Arc<dyn GraphApi>,
    extension_name: String,
}

impl BreakoutStore {
    pub fn new(graph: Arc<dyn GraphApi>, extension_name: impl Into<String>) -> Self {
        Self {
            graph,
            extension_name: extension_name.into(),
        }
    }

    /// Read the event's breakout state, creating the extension when missing.
    ///
    /// Read failures are logged and reported as "no breakout".
    pub async fn load(&self, event_id: &str) -> StoredBreakouts {
        match self.graph.get_extension(event_id, &self.extension_name).await {
            Ok(extension) => decode(event_id, &extension),
            Err(e) if e.is_not_found() => {
                let empty = EventExtension::empty(&self.extension_name);
                if let Err(e) = self.graph.create_extension(event_id, &empty).await {
                    tracing::warn!(event_id, error = %e, "Failed to create breakout extension");
                }
                StoredBreakouts {
                    assignment: None,
                    revision: 0,
                }
            }
            Err(e) => {
                tracing::warn!(event_id, error = %e, "Failed to read breakout extension");
                StoredBreakouts {
                    assignment: None,
                    revision: 0,
                }
            }
        }
    }

    /// Replace the stored assignment, or clear it with `None`.
    ///
    /// Returns the new revision.
    pub async fn save(
        &self,
        event_id: &str,
        assignment: Option<&BreakoutAssignment>,
        expected_revision: i64,
    ) -> Result<i64, AppError> {
        if let Some(a) = assignment {
            if !a.is_complete() {
                return Err(AppError::Internal(
                    "Refusing to store an incomplete breakout assignment".to_string(),
                ));
            }
        }

        let current = self.current_revision(event_id).await?;
        if current != expected_revision {
            return Err(AppError::Conflict {
                message: format!(
                    "Breakouts changed concurrently: expected revision {}, current {}",
                    expected_revision, current
                ),
                current_revision: current,
            });
        }

        let breakouts = match assignment {
            Some(a) => serde_json::to_string(a).map_err(|e| AppError::Internal(e.to_string()))?,
            None => String::new(),
        };
        let revision = current + 1;
        let extension = EventExtension {
            odata_type: OPEN_EXTENSION_TYPE.to_string(),
            extension_name: None,
            breakouts,
            schema_version: Some(EXTENSION_SCHEMA_VERSION),
            revision,
        };

        self.graph
            .update_extension(event_id, &self.extension_name, &extension)
            .await?;

        tracing::info!(event_id, revision, cleared = assignment.is_none(), "Breakout state saved");
        Ok(revision)
    }

    async fn current_revision(&self, event_id: &str) -> Result<i64, AppError> {
        match self.graph.get_extension(event_id, &self.extension_name).await {
            Ok(extension) => Ok(extension.revision),
            Err(e) if e.is_not_found() => {
                let empty = EventExtension::empty(&self.extension_name);
                self.graph.create_extension(event_id, &empty).await?;
                Ok(0)
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn decode(event_id: &str, extension: &EventExtension) -> StoredBreakouts {
    let revision = extension.revision;
    if extension.breakouts.trim().is_empty() {
        return StoredBreakouts {
            assignment: None,
            revision,
        };
    }

    if let Some(version) = extension.schema_version {
        if version > EXTENSION_SCHEMA_VERSION {
            tracing::warn!(event_id, version, "Breakout state written by a newer schema");
        }
    }

    let assignment = match serde_json::from_str::<BreakoutAssignment>(&extension.breakouts) {
        Ok(a) if a.is_complete() => Some(a),
        Ok(_) => {
            tracing::warn!(event_id, "Ignoring incomplete stored breakout assignment");
            None
        }
        Err(e) => {
            tracing::warn!(event_id, error = %e, "Ignoring undecodable breakout assignment");
            None
        }
    };

    StoredBreakouts {
        assignment,
        revision,
    }
}
