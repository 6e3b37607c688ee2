use std::sync::Arc;

use axum::{extract::State, response::Response};
use uuid::Uuid;

use super::extract::{ApiPath, CurrentUser};
use super::{created, ok, AppState};
use crate::error::AppError;
use crate::progression;

#[axum::debug_handler]
pub async fn list_modules(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Response, AppError> {
    let overview = progression::modules_overview(state.store.as_ref(), user_id).await?;
    Ok(ok(overview))
}

#[axum::debug_handler]
pub async fn get_module(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    ApiPath(module_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    let detail = progression::module_detail(state.store.as_ref(), module_id, user_id).await?;
    Ok(ok(detail))
}

#[axum::debug_handler]
pub async fn start_module(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    ApiPath(module_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    let started = progression::start_module(state.store.as_ref(), module_id, user_id).await?;
    Ok(created(started))
}
