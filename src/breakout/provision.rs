//! Provision a backing team, channels and meetings for a set of groups.
//!
//! Stages run strictly in order: create team, add members, resolve channels,
//! create meetings, post announcements, persist. Team creation and channel
//! resolution are fatal when they fail; the batched stages in between are
//! best effort and their failures are collected into the report.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use super::message::channel_announcement;
use super::poll::{await_team_creation, TeamCreation};
use super::store::BreakoutStore;
use crate::config::{Config, PollPolicy};
use crate::errors::AppError;
use crate::graph::{run_batched, BatchStep, Channel, ChannelRequest, GraphApi, OnlineMeeting, TeamRequest};
use crate::models::{BreakoutAssignment, GroupInfo, PartialFailures, ProvisionReport, User};

static GROUP_CHANNEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Group ([0-9]+)").expect("valid group channel pattern"));

const TEAM_DESCRIPTION: &str = "This is a team used for breakout discussions";

/// Display name of the group at `index`.
pub fn group_name(index: usize) -> String {
    format!("Group {}", index + 1)
}

/// Group index encoded in a channel display name (`Group 3` is index 2).
pub fn group_index(channel_name: &str) -> Option<usize> {
    let n: usize = GROUP_CHANNEL
        .captures(channel_name)?
        .get(1)?
        .as_str()
        .parse()
        .ok()?;
    n.checked_sub(1)
}

/// Tunables of a provisioning run.
#[derive(Debug, Clone)]
pub struct ProvisionSettings {
    pub poll: PollPolicy,
    pub batch_size: usize,
    pub fail_on_partial: bool,
    pub graph_beta_url: String,
    pub extension_name: String,
}

impl From<&Config> for ProvisionSettings {
    fn from(config: &Config) -> Self {
        Self {
            poll: config.poll,
            batch_size: config.batch_size,
            fail_on_partial: config.fail_on_partial,
            graph_beta_url: config.graph_beta_url.trim_end_matches('/').to_string(),
            extension_name: config.extension_name.clone(),
        }
    }
}

/// Everything needed to provision breakouts for one event.
#[derive(Debug, Clone)]
pub struct ProvisionPlan {
    pub event_id: String,
    pub team_name: String,
    pub meeting_start: DateTime<Utc>,
    pub meeting_end: DateTime<Utc>,
    /// Signed-in moderator; owns the team and is not added again
    pub acting_user: User,
    pub moderators: Vec<User>,
    pub groups: Vec<Vec<User>>,
}

impl ProvisionPlan {
    /// Users to add to the team: every moderator and group member except the
    /// acting user, without duplicates.
    fn members_to_add(&self) -> Vec<User> {
        let mut seen = HashSet::new();
        self.groups
            .iter()
            .flatten()
            .chain(self.moderators.iter())
            .filter(|u| **u != self.acting_user)
            .filter(|u| seen.insert(u.id.clone()))
            .cloned()
            .collect()
    }
}

pub struct Provisioner {
    graph: Arc<dyn GraphApi>,
    store: BreakoutStore,
    settings: ProvisionSettings,
}

impl Provisioner {
    pub fn new(graph: Arc<dyn GraphApi>, settings: ProvisionSettings) -> Self {
        let store = BreakoutStore::new(graph.clone(), settings.extension_name.clone());
        Self {
            graph,
            store,
            settings,
        }
    }

    /// Run all stages and persist the resulting assignment.
    pub async fn provision(&self, plan: ProvisionPlan) -> Result<ProvisionReport, AppError> {
        if plan.groups.is_empty() {
            return Err(AppError::Validation("There are no participants to group".to_string()));
        }

        let stored = self.store.load(&plan.event_id).await;
        if stored.assignment.is_some() {
            return Err(AppError::Conflict {
                message: "Breakouts are already running for this event".to_string(),
                current_revision: stored.revision,
            });
        }

        let event_id = plan.event_id.as_str();
        tracing::info!(event_id, groups = plan.groups.len(), team = %plan.team_name, "Creating breakout team");
        let team_id = self.create_team(&plan).await?;

        tracing::info!(event_id, %team_id, "Adding members to team");
        let (team_members, members_not_added) = self.add_members(&team_id, &plan).await;

        let channels = self.resolve_channels(&team_id, plan.groups.len()).await?;

        tracing::info!(event_id, %team_id, "Creating online meetings");
        let meetings = self.create_meetings(&plan).await;

        let mut failures = PartialFailures {
            members_not_added,
            ..PartialFailures::default()
        };

        let groups: Vec<GroupInfo> = plan
            .groups
            .iter()
            .enumerate()
            .map(|(index, members)| {
                let online_meeting = match meetings.get(&index) {
                    Some(url) => url.clone(),
                    None => {
                        failures.meetings_not_created.push(index);
                        String::new()
                    }
                };
                let channel_id = channels.get(&index).map(|c| c.id.clone()).unwrap_or_default();
                if channel_id.is_empty() {
                    tracing::warn!(event_id, %team_id, group = index + 1, "No channel found for group");
                }
                GroupInfo {
                    name: group_name(index),
                    id: channel_id,
                    online_meeting,
                    members: members.clone(),
                }
            })
            .collect();

        tracing::info!(event_id, %team_id, "Posting channel announcements");
        failures.announcements_not_posted = self.post_announcements(&team_id, &groups, &team_members).await;

        let failure_count = failures.count();
        if failure_count > 0 {
            tracing::warn!(event_id, %team_id, failure_count, "Breakouts provisioned with partial failures");
            if self.settings.fail_on_partial {
                return Err(AppError::ProvisioningPartial {
                    message: format!(
                        "{} sub-requests failed while provisioning team {}",
                        failure_count, team_id
                    ),
                    failed: failure_count,
                });
            }
        }

        let assignment = BreakoutAssignment {
            team_name: plan.team_name.clone(),
            team_id: team_id.clone(),
            moderators: plan.moderators.clone(),
            groups,
        };

        let revision = match self
            .store
            .save(event_id, Some(&assignment), stored.revision)
            .await
        {
            Ok(revision) => revision,
            Err(e) => {
                tracing::error!(event_id, %team_id, error = %e, "Provisioned team could not be recorded");
                return Err(e);
            }
        };

        Ok(ProvisionReport {
            assignment,
            revision,
            failures,
            failure_count,
        })
    }

    async fn create_team(&self, plan: &ProvisionPlan) -> Result<String, AppError> {
        let team = TeamRequest {
            template: format!("{}/teamsTemplates('standard')", self.settings.graph_beta_url),
            visibility: "private".to_string(),
            display_name: plan.team_name.clone(),
            description: TEAM_DESCRIPTION.to_string(),
            channels: (0..plan.groups.len())
                .map(|i| ChannelRequest {
                    display_name: group_name(i),
                })
                .collect(),
        };

        let location = self.graph.create_team(&team).await.map_err(|e| {
            tracing::error!(event_id = %plan.event_id, error = %e, "Team creation request failed");
            AppError::ProvisioningFatal(format!("Team creation request failed: {}", e))
        })?;

        match await_team_creation(self.graph.as_ref(), &location, &self.settings.poll).await {
            TeamCreation::Succeeded(team_id) => Ok(team_id),
            TeamCreation::Failed(reason) => {
                tracing::error!(event_id = %plan.event_id, %reason, "Team creation failed");
                Err(AppError::ProvisioningFatal(format!("Team creation failed: {}", reason)))
            }
            TeamCreation::TimedOut { attempts } => {
                tracing::error!(event_id = %plan.event_id, attempts, "Team creation timed out");
                Err(AppError::ProvisioningTimeout(format!(
                    "Team creation still pending after {} status checks",
                    attempts
                )))
            }
            TeamCreation::Pending => Err(AppError::ProvisioningFatal(
                "Team creation left pending".to_string(),
            )),
        }
    }

    /// Returns the ids of all team members (acting user included) and the ids
    /// that could not be added.
    async fn add_members(&self, team_id: &str, plan: &ProvisionPlan) -> (HashSet<String>, Vec<String>) {
        let users = plan.members_to_add();
        let steps = users
            .iter()
            .enumerate()
            .map(|(i, user)| {
                BatchStep::post(
                    i,
                    format!("/groups/{}/members/$ref", team_id),
                    json!({
                        "@odata.id": format!("{}/directoryObjects/{}", self.settings.graph_beta_url, user.id)
                    }),
                )
            })
            .collect();

        let report = run_batched(self.graph.as_ref(), steps, self.settings.batch_size, "add_members").await;

        let mut members = HashSet::from([plan.acting_user.id.clone()]);
        let mut not_added = Vec::new();
        for (i, user) in users.iter().enumerate() {
            if report.is_success(&i.to_string()) {
                members.insert(user.id.clone());
            } else {
                not_added.push(user.id.clone());
            }
        }
        (members, not_added)
    }

    async fn resolve_channels(
        &self,
        team_id: &str,
        group_count: usize,
    ) -> Result<BTreeMap<usize, Channel>, AppError> {
        let channels = self.graph.list_channels(team_id).await.map_err(|e| {
            tracing::error!(%team_id, error = %e, "Failed to list team channels");
            AppError::ProvisioningFatal(format!("Could not list channels of team {}: {}", team_id, e))
        })?;

        let resolved: BTreeMap<usize, Channel> = channels
            .into_iter()
            .filter_map(|c| {
                let index = group_index(&c.display_name)?;
                (index < group_count).then_some((index, c))
            })
            .collect();

        if resolved.is_empty() {
            tracing::error!(%team_id, "Team has no group channels; team left unrecorded");
            return Err(AppError::ProvisioningFatal(format!(
                "No group channels found in team {}",
                team_id
            )));
        }
        Ok(resolved)
    }

    /// Join URLs keyed by group index.
    async fn create_meetings(&self, plan: &ProvisionPlan) -> BTreeMap<usize, String> {
        let start = plan.meeting_start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let end = plan.meeting_end.to_rfc3339_opts(SecondsFormat::Secs, true);
        let steps = (0..plan.groups.len())
            .map(|i| {
                BatchStep::post(
                    i,
                    "/me/onlineMeetings",
                    json!({
                        "startDateTime": start,
                        "endDateTime": end,
                        "subject": format!("{} breakout", group_name(i)),
                    }),
                )
            })
            .collect();

        let report = run_batched(self.graph.as_ref(), steps, self.settings.batch_size, "create_meetings").await;

        (0..plan.groups.len())
            .filter_map(|i| {
                let body = report.success(&i.to_string())?;
                let meeting: OnlineMeeting = serde_json::from_value(body.clone()).ok()?;
                Some((i, meeting.join_link()?.to_string()))
            })
            .collect()
    }

    /// Post one announcement per group; returns the indexes that were not posted.
    ///
    /// Only team members are mentioned, so nobody is pinged in a channel they
    /// cannot open.
    async fn post_announcements(
        &self,
        team_id: &str,
        groups: &[GroupInfo],
        team_members: &HashSet<String>,
    ) -> Vec<usize> {
        let mut not_posted = Vec::new();
        let mut steps = Vec::new();

        for (i, group) in groups.iter().enumerate() {
            if group.id.is_empty() || group.online_meeting.is_empty() {
                not_posted.push(i);
                continue;
            }
            let mentioned: Vec<User> = group
                .members
                .iter()
                .filter(|m| team_members.contains(&m.id))
                .cloned()
                .collect();
            let message = channel_announcement(&group.online_meeting, &mentioned);
            let body = match serde_json::to_value(&message) {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(group = i + 1, error = %e, "Failed to encode announcement");
                    not_posted.push(i);
                    continue;
                }
            };
            steps.push(BatchStep::post(
                i,
                format!("/teams/{}/channels/{}/messages", team_id, group.id),
                body,
            ));
        }

        let report = run_batched(self.graph.as_ref(), steps, self.settings.batch_size, "post_announcements").await;
        not_posted.extend(
            report
                .failed_ids()
                .into_iter()
                .filter_map(|id| id.parse::<usize>().ok()),
        );
        not_posted.sort_unstable();
        not_posted
    }
}
