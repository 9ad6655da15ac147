use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::extractors::QueryParams;
use crate::response::{ok, AppError};
use crate::selection::types::ScopeTag;
use crate::services::practice;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/:id/pool", get(topic_pool))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PoolQuery {
    program_id: Option<String>,
}

async fn topic_pool(
    auth: AuthUser,
    Path(topic_id): Path<String>,
    QueryParams(q): QueryParams<PoolQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    if topic_id.trim().is_empty() {
        return Err(AppError::validation("topic id is required"));
    }
    let scope = ScopeTag::from_request(Some(&topic_id), q.program_id.as_deref())?;
    let summary = practice::preview_pool(&state, &auth.learner_id, scope).await?;
    Ok(ok(summary))
}
