//! HTTP surface of the service.
//!
//! Every `/api` route answers with the `{"ok": true, "data": ...}` envelope
//! on success and the [`AppError`](crate::error::AppError) envelope on
//! failure. Anything else falls through to the static frontend.

mod ai;
mod dialogues;
mod extract;
mod modules;
mod progress;

pub use extract::CurrentUser;

use std::path::Path;
use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::dialogue::DialogueSettings;
use crate::store::Store;
use crate::tutor::{PromptCoach, Tutor};

/// Everything a handler may reach, built once at startup.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub tutor: Arc<dyn Tutor>,
    /// Prompt analysis and comparison; absent when no model is configured.
    pub coach: Option<Arc<dyn PromptCoach>>,
    pub dialogue: DialogueSettings,
}

#[derive(Serialize)]
struct Envelope<T> {
    ok: bool,
    data: T,
}

pub(crate) fn ok<T: Serialize>(data: T) -> Response {
    Json(Envelope { ok: true, data }).into_response()
}

pub(crate) fn created<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(Envelope { ok: true, data })).into_response()
}

async fn health() -> &'static str {
    "ok"
}

pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/modules", get(modules::list_modules))
        .route("/api/modules/{id}", get(modules::get_module))
        .route("/api/modules/{id}/start", post(modules::start_module))
        .route("/api/dialogues", post(dialogues::create_dialogue))
        .route("/api/dialogues/{id}", get(dialogues::get_dialogue))
        .route("/api/dialogues/{id}/messages", post(dialogues::send_message))
        .route("/api/progress", get(progress::overview))
        .route("/api/progress/{id}/complete-step", post(progress::complete_step))
        .route("/api/progress/{id}/submissions", post(progress::submit_work))
        .route("/api/submissions", get(progress::list_submissions))
        .route("/api/ai/socratic", post(ai::socratic))
        .route("/api/ai/socratic/stream", post(ai::socratic_stream))
        .route("/api/ai/analyze-prompt", post(ai::analyze_prompt))
        .route("/api/ai/compare", post(ai::compare_prompts))
        .route("/health", get(health))
        .with_state(state)
}

/// The API plus the static frontend served from `static_dir`.
pub fn router(state: Arc<AppState>, static_dir: &Path) -> Router {
    api_routes(state)
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
}
