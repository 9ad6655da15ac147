use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::extractors::{JsonBody, QueryParams};
use crate::response::{created, paginated, AppError};
use crate::selection::types::ScopeTag;
use crate::services::practice::{self, AnswerInput};
use crate::state::AppState;
use crate::store::operations::attempts::Attempt;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_attempts).post(create_attempt))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListAttemptsQuery {
    page: Option<u64>,
    per_page: Option<u64>,
}

impl ListAttemptsQuery {
    fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }
    fn per_page(&self) -> u64 {
        self.per_page
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }
}

async fn list_attempts(
    auth: AuthUser,
    QueryParams(q): QueryParams<ListAttemptsQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let page = q.page();
    let per_page = q.per_page();
    let offset = page.saturating_sub(1).saturating_mul(per_page) as usize;
    let attempts = state
        .store()
        .list_learner_attempts(&auth.learner_id, per_page as usize, offset)?;
    let total = state.store().count_learner_attempts(&auth.learner_id)? as u64;
    Ok(paginated(attempts, total, page, per_page))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAttemptRequest {
    question_id: String,
    is_correct: bool,
    response_time_ms: Option<i64>,
    topic_id: Option<String>,
    program_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateAttemptResponse {
    attempt: Attempt,
    first_attempt: bool,
}

async fn create_attempt(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.question_id.trim().is_empty() {
        return Err(AppError::validation("questionId is required"));
    }
    if req.response_time_ms.is_some_and(|ms| ms < 0) {
        return Err(AppError::validation("responseTimeMs must not be negative"));
    }
    let scope = ScopeTag::from_request(req.topic_id.as_deref(), req.program_id.as_deref())?;
    let (attempt, first_attempt) = practice::record_standalone_attempt(
        &state,
        &auth.learner_id,
        scope,
        AnswerInput {
            question_id: req.question_id,
            is_correct: req.is_correct,
            response_time_ms: req.response_time_ms,
        },
    )
    .await?;
    Ok(created(CreateAttemptResponse {
        attempt,
        first_attempt,
    }))
}
