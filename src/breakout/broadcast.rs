//! Message every running breakout at once.

use std::sync::Arc;

use super::message::{broadcast_message, chat_id_from_join_url, render_broadcast};
use crate::graph::GraphApi;
use crate::models::{BreakoutAssignment, BroadcastReport};

/// Post `template` to each group's meeting chat, mentioning its members.
///
/// `[group-name]` and `[meeting-link]` are filled per group. Groups are
/// messaged one after another; a failure for one group does not stop the rest.
pub async fn send_to_all_breakouts(
    graph: Arc<dyn GraphApi>,
    assignment: &BreakoutAssignment,
    template: &str,
    main_join_url: Option<&str>,
) -> BroadcastReport {
    let mut report = BroadcastReport::default();

    for group in &assignment.groups {
        let Some(chat_id) = chat_id_from_join_url(&group.online_meeting) else {
            tracing::warn!(group = %group.name, "Group has no meeting chat");
            report.failed.push(group.name.clone());
            continue;
        };

        let text = render_broadcast(template, &group.name, main_join_url);
        let message = broadcast_message(text, &group.members);

        match graph.send_chat_message(&chat_id, &message).await {
            Ok(()) => report.sent.push(group.name.clone()),
            Err(e) => {
                tracing::warn!(group = %group.name, error = %e, "Failed to message breakout");
                report.failed.push(group.name.clone());
            }
        }
    }

    report
}
