use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use futures_util::{stream, StreamExt};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::extract::{ApiJson, CurrentUser};
use super::{ok, AppState};
use crate::dialogue::{self, SocraticTurnRequest};
use crate::error::AppError;
use crate::tutor::PromptCoach;

/// Pause between words of a streamed tutor reply.
const WORD_INTERVAL: Duration = Duration::from_millis(30);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzePromptRequest {
    pub module_id: Uuid,
    pub prompt: String,
    pub scenario_context: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparePromptsRequest {
    pub module_id: Uuid,
    pub prompt_a: String,
    pub prompt_b: String,
}

fn non_empty<'a>(field: &str, value: &'a str) -> Result<&'a str, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    Ok(value)
}

async fn coach_for(state: &AppState, module_id: Uuid) -> Result<&dyn PromptCoach, AppError> {
    state
        .store
        .module(module_id)
        .await?
        .filter(|m| m.is_active)
        .ok_or(AppError::NotFound("module"))?;

    state
        .coach
        .as_deref()
        .ok_or(AppError::Unavailable("prompt coaching needs a configured model"))
}

#[axum::debug_handler]
pub async fn analyze_prompt(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    ApiJson(body): ApiJson<AnalyzePromptRequest>,
) -> Result<Response, AppError> {
    let prompt = non_empty("prompt", &body.prompt)?;
    let coach = coach_for(&state, body.module_id).await?;

    let analysis = coach
        .analyze_prompt(prompt, body.scenario_context.as_deref())
        .await?;
    info!(user_id = %user_id, module_id = %body.module_id, score = analysis.score, "prompt analyzed");
    Ok(ok(analysis))
}

#[axum::debug_handler]
pub async fn compare_prompts(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    ApiJson(body): ApiJson<ComparePromptsRequest>,
) -> Result<Response, AppError> {
    let prompt_a = non_empty("promptA", &body.prompt_a)?;
    let prompt_b = non_empty("promptB", &body.prompt_b)?;
    let coach = coach_for(&state, body.module_id).await?;

    let comparison = coach.compare_prompts(prompt_a, prompt_b).await?;
    info!(user_id = %user_id, module_id = %body.module_id, "prompts compared");
    Ok(ok(comparison))
}

#[axum::debug_handler]
pub async fn socratic(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    ApiJson(body): ApiJson<SocraticTurnRequest>,
) -> Result<Response, AppError> {
    let turn = dialogue::socratic_turn(
        state.store.as_ref(),
        state.tutor.as_ref(),
        &state.dialogue,
        body,
        user_id,
    )
    .await?;
    Ok(ok(turn))
}

/// Same turn as [`socratic`], written out word by word as plain text.
#[axum::debug_handler]
pub async fn socratic_stream(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    ApiJson(body): ApiJson<SocraticTurnRequest>,
) -> Result<Response, AppError> {
    let turn = dialogue::socratic_turn(
        state.store.as_ref(),
        state.tutor.as_ref(),
        &state.dialogue,
        body,
        user_id,
    )
    .await?;

    let words: Vec<String> = turn
        .message
        .split(' ')
        .map(|word| format!("{word} "))
        .collect();
    let chunks = stream::iter(words).then(|word| async move {
        tokio::time::sleep(WORD_INTERVAL).await;
        Ok::<_, Infallible>(word)
    });

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(chunks),
    )
        .into_response())
}
