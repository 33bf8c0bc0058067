//! Tear down a running breakout.

use std::sync::Arc;

use super::store::BreakoutStore;
use crate::errors::AppError;
use crate::graph::GraphApi;
use crate::models::BreakoutAssignment;

/// Archive the backing team and clear the stored assignment.
///
/// The store is only cleared once Graph accepted the archive request, so a
/// failed attempt can simply be retried. Returns the new store revision.
pub async fn archive(
    graph: Arc<dyn GraphApi>,
    store: &BreakoutStore,
    event_id: &str,
    assignment: &BreakoutAssignment,
    expected_revision: i64,
) -> Result<i64, AppError> {
    tracing::info!(
        event_id,
        team_id = %assignment.team_id,
        users = assignment.all_users().count(),
        "Archiving breakout team"
    );

    if let Err(e) = graph.archive_team(&assignment.team_id).await {
        tracing::error!(event_id, team_id = %assignment.team_id, error = %e, "Team archive failed");
        return Err(AppError::ArchivalFailure(format!(
            "Could not archive team {}: {}",
            assignment.team_id, e
        )));
    }

    store
        .save(event_id, None, expected_revision)
        .await
        .inspect_err(|e| {
            tracing::error!(
                event_id,
                team_id = %assignment.team_id,
                error = %e,
                "Team archived, state not cleared"
            );
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::models::{GroupInfo, User};
    use crate::testing::FakeGraph;

    const EXT: &str = "com.moderatorTest";

    fn assignment() -> BreakoutAssignment {
        BreakoutAssignment {
            team_name: "Sync Breakouts".to_string(),
            team_id: "team-1".to_string(),
            moderators: vec![User::new("me", "Me")],
            groups: vec![GroupInfo {
                name: "Group 1".to_string(),
                id: "channel-1".to_string(),
                online_meeting: "https://teams.example/meetup-join/a/0".to_string(),
                members: vec![User::new("a", "A"), User::new("b", "B")],
            }],
        }
    }

    #[tokio::test]
    async fn test_archive_clears_store() {
        let graph = FakeGraph::new();
        let store = BreakoutStore::new(graph.clone(), EXT);
        let revision = store.save("evt-1", Some(&assignment()), 0).await.unwrap();

        let revision = archive(graph.clone(), &store, "evt-1", &assignment(), revision)
            .await
            .unwrap();

        assert_eq!(revision, 2);
        assert_eq!(graph.state().archived, vec!["team-1".to_string()]);
        assert_eq!(store.load("evt-1").await.assignment, None);
    }

    #[tokio::test]
    async fn test_failed_archive_leaves_assignment() {
        let graph = FakeGraph::new();
        let store = BreakoutStore::new(graph.clone(), EXT);
        let revision = store.save("evt-1", Some(&assignment()), 0).await.unwrap();
        graph.state().archive_fails = true;

        let err = archive(graph.clone(), &store, "evt-1", &assignment(), revision)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ArchivalFailure(_)));
        let stored = store.load("evt-1").await;
        assert_eq!(stored.assignment, Some(assignment()));
        assert_eq!(stored.revision, revision);
    }

    #[tokio::test]
    async fn test_archived_team_with_stale_revision_keeps_state() {
        let graph = FakeGraph::new();
        let store = BreakoutStore::new(graph.clone(), EXT);
        let revision = store.save("evt-1", Some(&assignment()), 0).await.unwrap();

        let err = archive(graph.clone(), &store, "evt-1", &assignment(), revision - 1)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict { current_revision, .. } if current_revision == revision));
        assert_eq!(graph.state().archived, vec!["team-1".to_string()]);
        assert_eq!(store.load("evt-1").await.assignment, Some(assignment()));
    }
}
