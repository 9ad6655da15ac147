use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::auth::AuthUser;
use crate::response::{ok, AppError};
use crate::services::practice;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/:id/difficulty", get(question_difficulty))
}

async fn question_difficulty(
    auth: AuthUser,
    Path(question_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let report = practice::question_difficulty(&state, &auth.learner_id, &question_id).await?;
    Ok(ok(report))
}
