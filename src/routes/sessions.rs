use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::constants::DEFAULT_QUESTION_COUNT;
use crate::extractors::JsonBody;
use crate::response::{created, ok, AppError};
use crate::selection::engine::SelectionRequest;
use crate::selection::types::{DifficultyBucket, ScopeTag, SelectionMode};
use crate::services::practice::{self, AnswerInput};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(start_session))
        .route("/:id", get(get_session))
        .route("/:id/answers", post(submit_answer))
        .route("/:id/finish", post(finish_session))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartSessionRequest {
    topic_id: Option<String>,
    program_id: Option<String>,
    count: Option<usize>,
    #[serde(default)]
    mode: SelectionMode,
    #[serde(default)]
    difficulty_filter: Vec<DifficultyBucket>,
}

async fn start_session(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<StartSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let scope = ScopeTag::from_request(req.topic_id.as_deref(), req.program_id.as_deref())?;
    let request = SelectionRequest {
        count: req.count.unwrap_or(DEFAULT_QUESTION_COUNT),
        mode: req.mode,
        difficulty_filter: req.difficulty_filter,
    };
    let view = practice::start_session(&state, &auth.learner_id, scope, request).await?;
    Ok(created(view))
}

async fn get_session(
    auth: AuthUser,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let details = practice::get_session(&state, &auth.learner_id, &id).await?;
    Ok(ok(details))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitAnswerRequest {
    question_id: String,
    is_correct: bool,
    response_time_ms: Option<i64>,
}

async fn submit_answer(
    auth: AuthUser,
    Path(id): Path<String>,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.response_time_ms.is_some_and(|ms| ms < 0) {
        return Err(AppError::validation("responseTimeMs must not be negative"));
    }
    let result = practice::submit_answer(
        &state,
        &auth.learner_id,
        &id,
        AnswerInput {
            question_id: req.question_id,
            is_correct: req.is_correct,
            response_time_ms: req.response_time_ms,
        },
    )
    .await?;
    Ok(ok(result))
}

async fn finish_session(
    auth: AuthUser,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let record = practice::finish_session(&state, &auth.learner_id, &id).await?;
    tracing::info!(session_id = %id, status = ?record.status, "Practice session finished");
    Ok(ok(record))
}
