//! Signed-in user and calendar endpoints.

use axum::extract::{Path, Query, State};
use chrono::{Duration, Utc};

use super::{success, ApiResult};
use crate::auth::GraphToken;
use crate::breakout::BreakoutStore;
use crate::models::{CalendarEvent, EventsQuery, StoredBreakouts, User};
use crate::AppState;

const DEFAULT_DAYS: u32 = 3;
const MAX_DAYS: u32 = 31;

/// GET /api/me - The signed-in user.
pub async fn get_me(State(state): State<AppState>, GraphToken(token): GraphToken) -> ApiResult<User> {
    let graph = state.graph.connect(&token);
    success(graph.me().await?)
}

/// GET /api/events - Calendar view from the start of today.
pub async fn list_events(
    State(state): State<AppState>,
    GraphToken(token): GraphToken,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Vec<CalendarEvent>> {
    let days = query.days.unwrap_or(DEFAULT_DAYS).clamp(1, MAX_DAYS);

    let start = Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|t| t.and_utc())
        .unwrap_or_else(Utc::now);
    let end = start + Duration::days(i64::from(days));

    let graph = state.graph.connect(&token);
    success(graph.list_events(start, end).await?)
}

/// GET /api/events/:id/breakouts - Breakout state stored on the event.
pub async fn get_event_breakouts(
    State(state): State<AppState>,
    GraphToken(token): GraphToken,
    Path(event_id): Path<String>,
) -> ApiResult<StoredBreakouts> {
    let graph = state.graph.connect(&token);
    let store = BreakoutStore::new(graph, state.config.extension_name.clone());
    success(store.load(&event_id).await)
}
