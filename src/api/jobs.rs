//! Provisioning job endpoints.

use axum::extract::{Path, State};
use uuid::Uuid;

use super::{success, ApiResult};
use crate::breakout::JobView;
use crate::AppState;

/// GET /api/jobs/:id - Job status.
pub async fn get_job(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<JobView> {
    success(state.jobs.get(id).await?)
}

/// DELETE /api/jobs/:id - Abort a running job.
pub async fn cancel_job(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<JobView> {
    success(state.jobs.cancel(id).await?)
}
