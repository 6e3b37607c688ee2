use std::sync::Arc;

use axum::{extract::State, response::Response};
use uuid::Uuid;

use super::extract::{ApiJson, ApiPath, CurrentUser};
use super::{created, ok, AppState};
use crate::dialogue::{self, CreateDialogueRequest, SendMessageRequest};
use crate::error::AppError;

#[axum::debug_handler]
pub async fn create_dialogue(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    ApiJson(body): ApiJson<CreateDialogueRequest>,
) -> Result<Response, AppError> {
    let created_dialogue =
        dialogue::create_dialogue(state.store.as_ref(), body.progress_id, user_id).await?;
    Ok(created(created_dialogue))
}

#[axum::debug_handler]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    ApiPath(dialogue_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<SendMessageRequest>,
) -> Result<Response, AppError> {
    let sent = dialogue::send_message(
        state.store.as_ref(),
        state.tutor.as_ref(),
        &state.dialogue,
        dialogue_id,
        &body.content,
        user_id,
    )
    .await?;
    Ok(ok(sent))
}

#[axum::debug_handler]
pub async fn get_dialogue(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    ApiPath(dialogue_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    let view =
        dialogue::get_dialogue(state.store.as_ref(), &state.dialogue, dialogue_id, user_id).await?;
    Ok(ok(view))
}
