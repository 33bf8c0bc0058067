//! Wait for Graph's asynchronous team creation to finish.

use crate::config::PollPolicy;
use crate::graph::{GraphApi, OperationStatus, TeamsAsyncOperation};

/// Where a team-creation operation stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeamCreation {
    Pending,
    /// Carries the id of the new team
    Succeeded(String),
    Failed(String),
    TimedOut { attempts: u32 },
}

impl TeamCreation {
    fn from_operation(op: &TeamsAsyncOperation) -> Self {
        match op.status {
            OperationStatus::NotStarted | OperationStatus::InProgress => TeamCreation::Pending,
            OperationStatus::Succeeded => match op.target_resource_id.as_deref() {
                Some(id) if !id.is_empty() => TeamCreation::Succeeded(id.to_string()),
                _ => TeamCreation::Failed("operation succeeded without a team id".to_string()),
            },
            OperationStatus::Failed => TeamCreation::Failed(match &op.error {
                Some(error) => format!("operation failed: {}", error),
                None => "operation failed".to_string(),
            }),
            OperationStatus::Unknown => {
                TeamCreation::Failed("operation ended in an unknown state".to_string())
            }
        }
    }
}

/// Poll the operation at `location` until it leaves the pending states or the
/// policy's attempt budget runs out.
///
/// Dropping the returned future stops polling.
pub async fn await_team_creation(
    graph: &dyn GraphApi,
    location: &str,
    policy: &PollPolicy,
) -> TeamCreation {
    for attempt in 0..policy.max_attempts {
        tokio::time::sleep(policy.delay_for(attempt)).await;

        let op = match graph.get_operation(location).await {
            Ok(op) => op,
            Err(e) => {
                return TeamCreation::Failed(format!("could not read operation status: {}", e))
            }
        };

        let state = TeamCreation::from_operation(&op);
        tracing::debug!(attempt, status = ?op.status, "Team creation status");
        if state != TeamCreation::Pending {
            return state;
        }
    }

    TeamCreation::TimedOut {
        attempts: policy.max_attempts,
    }
}
