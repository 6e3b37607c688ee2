use std::sync::Arc;

use axum::{extract::State, response::Response};
use uuid::Uuid;

use super::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use super::{created, ok, AppState};
use crate::error::AppError;
use crate::progression::{self, CompleteStepRequest};
use crate::submissions::{self, SubmissionFilter, SubmitWorkRequest};

#[axum::debug_handler]
pub async fn overview(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Response, AppError> {
    let overview = progression::progress_overview(state.store.as_ref(), user_id).await?;
    Ok(ok(overview))
}

#[axum::debug_handler]
pub async fn complete_step(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    ApiPath(progress_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<CompleteStepRequest>,
) -> Result<Response, AppError> {
    let outcome =
        progression::complete_step(state.store.as_ref(), progress_id, body.step_type, user_id)
            .await?;
    Ok(ok(outcome))
}

#[axum::debug_handler]
pub async fn submit_work(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    ApiPath(progress_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<SubmitWorkRequest>,
) -> Result<Response, AppError> {
    let submission = submissions::submit_work(
        state.store.as_ref(),
        progress_id,
        body.step_type,
        &body.content,
        user_id,
    )
    .await?;
    Ok(created(submission))
}

#[axum::debug_handler]
pub async fn list_submissions(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    ApiQuery(filter): ApiQuery<SubmissionFilter>,
) -> Result<Response, AppError> {
    let history =
        submissions::list_submissions(state.store.as_ref(), user_id, filter.step_type).await?;
    Ok(ok(history))
}
