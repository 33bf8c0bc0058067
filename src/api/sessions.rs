//! Breakout session endpoints.
//!
//! A session is the server-side roster of one opened event. Grouping,
//! provisioning, teardown and broadcasts all run against it.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, SeedableRng};
use uuid::Uuid;

use super::{success, ApiResponse, ApiResult};
use crate::auth::GraphToken;
use crate::breakout::{
    archive, chat_id_from_join_url, partition, send_to_all_breakouts, validate_group_size,
    BreakoutEvent, BreakoutStore, ProvisionPlan, ProvisionSettings, Provisioner, Roster, Session,
};
use crate::errors::AppError;
use crate::graph::GraphApi;
use crate::models::{
    BroadcastReport, BroadcastRequest, CalendarEvent, CreateBreakoutsRequest, JobStarted,
    OpenSessionRequest, PreviewRequest, PreviewResponse, SessionView, User,
};
use crate::AppState;

/// Group size used when a create request names neither groups nor a size.
const DEFAULT_GROUP_SIZE: usize = 5;

fn session_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn meeting_window(event: &CalendarEvent) -> Result<(DateTime<Utc>, DateTime<Utc>), AppError> {
    match (event.start.to_utc(), event.end.to_utc()) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(AppError::Validation(format!(
            "Event {} has no usable start or end time",
            event.id
        ))),
    }
}

async fn meeting_attendees(graph: &dyn GraphApi, event: &CalendarEvent) -> Result<Vec<User>, AppError> {
    let chat_id = event
        .join_url()
        .and_then(chat_id_from_join_url)
        .ok_or_else(|| AppError::Validation(format!("Event {} has no meeting chat", event.id)))?;
    Ok(graph.list_chat_members(&chat_id).await?)
}

/// POST /api/sessions - Open a breakout session on a Teams meeting.
pub async fn open_session(
    State(state): State<AppState>,
    GraphToken(token): GraphToken,
    Json(request): Json<OpenSessionRequest>,
) -> ApiResult<SessionView> {
    if request.event_id.trim().is_empty() {
        return Err(AppError::Validation("Event id is required".to_string()));
    }

    let graph = state.graph.connect(&token);
    let me = graph.me().await?;
    let event = graph.get_event(&request.event_id).await?;

    if !event.is_teams_meeting() {
        return Err(AppError::Validation(format!(
            "Event {} is not a Teams meeting",
            event.id
        )));
    }

    let attendees = match request.attendees {
        Some(attendees) => attendees,
        None => meeting_attendees(graph.as_ref(), &event).await?,
    };

    let store = BreakoutStore::new(graph.clone(), state.config.extension_name.clone());
    let stored = store.load(&event.id).await;
    let stored_moderators = stored.assignment.as_ref().map(|a| a.moderators.clone());

    let roster = Roster::new(me, attendees, stored_moderators);
    let session = Session::new(event, roster, stored.assignment, stored.revision);

    tracing::info!(
        session_id = %session.id,
        event_id = %session.event.id,
        participants = session.roster.participants().len(),
        breakouts_running = session.assignment.is_some(),
        "Opened breakout session"
    );

    success(state.sessions.insert(session).await)
}

/// GET /api/sessions/:id - Current session state.
pub async fn get_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<SessionView> {
    success(state.sessions.get(id).await?.view())
}

/// DELETE /api/sessions/:id - Close a session. Teams and stored state are untouched.
pub async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<SessionView> {
    let session = state.sessions.remove(id).await?;
    tracing::info!(session_id = %id, event_id = %session.event.id, "Closed breakout session");
    success(session.view())
}

/// POST /api/sessions/:id/moderators - Promote a participant.
pub async fn add_moderator(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(user): Json<User>,
) -> ApiResult<SessionView> {
    let view = state
        .sessions
        .update(id, |s| {
            s.roster.add_moderator(&user)?;
            Ok(s.view())
        })
        .await?;

    state.notifier.publish(BreakoutEvent::ModeratorAdded {
        event_id: view.event.id.clone(),
        user,
    });
    success(view)
}

/// DELETE /api/sessions/:id/moderators/:user_id - Demote a moderator.
pub async fn remove_moderator(
    State(state): State<AppState>,
    Path((id, user_id)): Path<(Uuid, String)>,
) -> ApiResult<SessionView> {
    let (view, user) = state
        .sessions
        .update(id, |s| {
            let user = s.roster.remove_moderator(&user_id)?;
            Ok((s.view(), user))
        })
        .await?;

    state.notifier.publish(BreakoutEvent::ModeratorRemoved {
        event_id: view.event.id.clone(),
        user,
    });
    success(view)
}

/// POST /api/sessions/:id/preview - Propose groups for the participants.
pub async fn preview_groups(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PreviewRequest>,
) -> ApiResult<PreviewResponse> {
    let group_size = validate_group_size(request.group_size)?;
    let session = state.sessions.get(id).await?;

    let groups = partition(
        session.roster.participants(),
        group_size,
        &mut session_rng(request.seed),
    );
    success(PreviewResponse { group_size, groups })
}

/// POST /api/sessions/:id/breakouts - Start provisioning in the background.
pub async fn create_breakouts(
    State(state): State<AppState>,
    GraphToken(token): GraphToken,
    Path(id): Path<Uuid>,
    Json(request): Json<CreateBreakoutsRequest>,
) -> Result<(StatusCode, ApiResponse<JobStarted>), AppError> {
    let session = state.sessions.get(id).await?;
    let event_id = session.event.id.clone();

    if session.assignment.is_some() {
        return Err(AppError::Conflict {
            message: "Breakouts are already running for this event".to_string(),
            current_revision: session.revision,
        });
    }
    if state.jobs.is_running(&event_id).await {
        return Err(AppError::Conflict {
            message: "Breakouts are already being created for this event".to_string(),
            current_revision: session.revision,
        });
    }

    let groups = match request.groups {
        Some(groups) => {
            session.roster.check_groups(&groups, request.group_size)?;
            groups
        }
        None => {
            let size = validate_group_size(request.group_size.unwrap_or(DEFAULT_GROUP_SIZE))?;
            partition(session.roster.participants(), size, &mut session_rng(request.seed))
        }
    };
    if groups.is_empty() {
        return Err(AppError::Validation("There are no participants to group".to_string()));
    }

    let (meeting_start, meeting_end) = meeting_window(&session.event)?;
    let plan = ProvisionPlan {
        event_id: event_id.clone(),
        team_name: session.event.breakout_team_name(),
        meeting_start,
        meeting_end,
        acting_user: session.roster.current_user().clone(),
        moderators: session.roster.moderators().to_vec(),
        groups,
    };

    let provisioner = Provisioner::new(
        state.graph.connect(&token),
        ProvisionSettings::from(state.config.as_ref()),
    );
    let sessions = state.sessions.clone();
    let notifier = state.notifier.clone();
    let job_event_id = event_id.clone();

    let job_id = state
        .jobs
        .spawn(&event_id, async move {
            let report = provisioner.provision(plan).await?;

            let updated = sessions
                .update(id, |s| {
                    s.assignment = Some(report.assignment.clone());
                    s.revision = report.revision;
                    Ok(())
                })
                .await;
            if let Err(e) = updated {
                tracing::warn!(session_id = %id, error = %e, "Session closed before provisioning finished");
            }

            notifier.publish(BreakoutEvent::GroupsCreated {
                event_id: job_event_id,
                team_id: report.assignment.team_id.clone(),
                groups: report.assignment.groups.len(),
            });
            Ok::<_, AppError>(report)
        })
        .await;

    tracing::info!(session_id = %id, %event_id, %job_id, "Provisioning job started");
    Ok((StatusCode::ACCEPTED, ApiResponse::new(JobStarted { job_id })))
}

/// DELETE /api/sessions/:id/breakouts - Archive the running breakouts.
pub async fn archive_breakouts(
    State(state): State<AppState>,
    GraphToken(token): GraphToken,
    Path(id): Path<Uuid>,
) -> ApiResult<SessionView> {
    let session = state.sessions.get(id).await?;
    let Some(assignment) = session.assignment.clone() else {
        return Err(AppError::NotFound(format!(
            "No breakouts are running for event {}",
            session.event.id
        )));
    };

    let graph = state.graph.connect(&token);
    let store = BreakoutStore::new(graph.clone(), state.config.extension_name.clone());

    let stored = store.load(&session.event.id).await;
    if stored.revision != session.revision {
        return Err(AppError::Conflict {
            message: "Breakouts were changed by someone else; reopen the session".to_string(),
            current_revision: stored.revision,
        });
    }

    let revision = archive(graph, &store, &session.event.id, &assignment, session.revision).await?;

    let view = state
        .sessions
        .update(id, |s| {
            s.assignment = None;
            s.revision = revision;
            Ok(s.view())
        })
        .await?;

    state.notifier.publish(BreakoutEvent::TeamArchived {
        event_id: session.event.id,
        team_id: assignment.team_id,
    });
    success(view)
}

/// POST /api/sessions/:id/messages - Message every breakout's meeting chat.
pub async fn broadcast_to_breakouts(
    State(state): State<AppState>,
    GraphToken(token): GraphToken,
    Path(id): Path<Uuid>,
    Json(request): Json<BroadcastRequest>,
) -> ApiResult<BroadcastReport> {
    if request.message.trim().is_empty() {
        return Err(AppError::Validation("Message is required".to_string()));
    }

    let session = state.sessions.get(id).await?;
    let Some(assignment) = session.assignment.as_ref() else {
        return Err(AppError::NotFound(format!(
            "No breakouts are running for event {}",
            session.event.id
        )));
    };

    let graph = state.graph.connect(&token);
    let report =
        send_to_all_breakouts(graph, assignment, &request.message, session.event.join_url()).await;

    tracing::info!(
        session_id = %id,
        sent = report.sent.len(),
        failed = report.failed.len(),
        "Broadcast to breakouts"
    );
    success(report)
}
