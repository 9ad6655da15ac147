//! Async orchestration of the selection core: store reads run on the blocking
//! pool under a request-level timeout, session state lives in the registry.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::response::AppError;
use crate::selection::adaptive::{AdaptationOutcome, ControllerState};
use crate::selection::catalog::CatalogSizes;
use crate::selection::difficulty::{DifficultyClassifier, DifficultyReport};
use crate::selection::engine::{self, SelectedQuestion, SelectionRequest, SelectionStatus};
use crate::selection::pool::build_pool;
use crate::selection::scope::resolve_scope;
use crate::selection::session::PracticeSession;
use crate::selection::types::{ScopeTag, SelectionMode};
use crate::selection::SelectionError;
use crate::state::AppState;
use crate::store::operations::attempts::Attempt;
use crate::store::operations::practice_sessions::{PracticeSessionRecord, SessionStatus};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub scope: ScopeTag,
    pub scope_key: String,
    pub mode: SelectionMode,
    pub status: SelectionStatus,
    pub requested_count: usize,
    /// Not yet answered, in presentation order.
    pub questions: Vec<SelectedQuestion>,
    pub answered_question_ids: Vec<String>,
    pub controller_state: Option<ControllerState>,
    pub catalog: Option<CatalogSizes>,
    pub adaptations: u32,
}

impl SessionView {
    fn of(session: &PracticeSession) -> Self {
        Self {
            session_id: session.id.clone(),
            scope: session.scope.clone(),
            scope_key: session.scope.as_key(),
            mode: session.mode,
            status: session.status,
            requested_count: session.requested_count,
            questions: session.pending().to_vec(),
            answered_question_ids: session
                .presented()
                .iter()
                .map(|q| q.question.id.clone())
                .collect(),
            controller_state: session.controller_state(),
            catalog: session.catalog_sizes(),
            adaptations: session.adaptations(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetails {
    pub record: PracticeSessionRecord,
    /// `None` once the session left memory (finished, evicted, restarted).
    pub live: Option<SessionView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResult {
    pub attempt: Attempt,
    pub first_attempt: bool,
    pub adaptation: Option<AdaptationOutcome>,
    pub controller_state: Option<ControllerState>,
    pub remaining: Vec<SelectedQuestion>,
    pub finished: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSummary {
    pub scope: ScopeTag,
    pub scope_key: String,
    pub total: usize,
    pub never_seen: usize,
    pub answered: usize,
    pub buckets: CatalogSizes,
    pub skipped_entries: usize,
}

#[derive(Debug, Clone)]
pub struct AnswerInput {
    pub question_id: String,
    pub is_correct: bool,
    pub response_time_ms: Option<i64>,
}

/// Runs store work off the async runtime. Timeouts and panics surface as
/// `PoolBuildFailed`, never as an empty result.
async fn run_blocking<T, F>(state: &AppState, what: &'static str, work: F) -> Result<T, SelectionError>
where
    F: FnOnce() -> Result<T, SelectionError> + Send + 'static,
    T: Send + 'static,
{
    let limit_ms = state.config().store_timeout_ms;
    match tokio::time::timeout(
        Duration::from_millis(limit_ms),
        tokio::task::spawn_blocking(work),
    )
    .await
    {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(SelectionError::PoolBuildFailed {
            reason: format!("{what} task failed: {join_err}"),
        }),
        Err(_) => Err(SelectionError::PoolBuildFailed {
            reason: format!("{what} timed out after {limit_ms}ms"),
        }),
    }
}

fn validate_request(request: &SelectionRequest) -> Result<(), SelectionError> {
    let max = crate::constants::MAX_QUESTION_COUNT;
    if request.count == 0 || request.count > max {
        return Err(SelectionError::InvalidRequest(format!(
            "count must be between 1 and {max}"
        )));
    }
    Ok(())
}

pub async fn start_session(
    state: &AppState,
    learner_id: &str,
    scope: ScopeTag,
    request: SelectionRequest,
) -> Result<SessionView, AppError> {
    validate_request(&request)?;

    let store = state.store_arc();
    let policy = state.policy_arc();
    let learner = learner_id.to_string();
    let work_request = request.clone();
    let outcome = run_blocking(state, "selection", move || {
        let resolved = resolve_scope(&store, &scope)?;
        let pool = build_pool(store.as_ref(), &learner, &resolved)?;
        let needs_classification = work_request.mode == SelectionMode::Adaptive
            || !work_request.difficulty_filter.is_empty();
        let buckets = if needs_classification {
            DifficultyClassifier::new(store.as_ref(), &policy)
                .effective_buckets(&learner, &resolved.questions)?
        } else {
            HashMap::new()
        };
        Ok(engine::select(pool, &work_request, &buckets))
    })
    .await?;

    let session = PracticeSession::start(
        Uuid::new_v4().to_string(),
        learner_id.to_string(),
        request.count,
        outcome,
        &state.policy().adaptive,
    );

    let now = Utc::now();
    let record = PracticeSessionRecord {
        id: session.id.clone(),
        learner_id: learner_id.to_string(),
        scope: session.scope.clone(),
        mode: session.mode,
        requested_count: request.count,
        delivered_count: session.pending().len(),
        answered_count: 0,
        adaptations: 0,
        status: SessionStatus::Active,
        created_at: now,
        updated_at: now,
    };
    state.store().create_practice_session(&record)?;

    let view = SessionView::of(&session);
    let (_, evicted) = state.sessions().insert(session).await;
    for session_id in evicted {
        if let Err(e) = state
            .store()
            .close_practice_session(&session_id, SessionStatus::Abandoned)
        {
            tracing::warn!(session_id = %session_id, error = %e, "Failed to mark evicted session abandoned");
        }
    }

    tracing::info!(
        learner_id,
        session_id = %view.session_id,
        scope = %view.scope_key,
        mode = ?view.mode,
        delivered = view.questions.len(),
        "Practice session started"
    );
    Ok(view)
}

pub async fn get_session(
    state: &AppState,
    learner_id: &str,
    session_id: &str,
) -> Result<SessionDetails, AppError> {
    let record = owned_record(state, learner_id, session_id)?;
    let live = match state.sessions().get(session_id).await {
        Some(shared) => Some(SessionView::of(&*shared.lock().await)),
        None => None,
    };
    Ok(SessionDetails { record, live })
}

pub async fn submit_answer(
    state: &AppState,
    learner_id: &str,
    session_id: &str,
    input: AnswerInput,
) -> Result<AnswerResult, AppError> {
    let shared = state
        .sessions()
        .get(session_id)
        .await
        .ok_or_else(session_not_found)?;
    let mut session = shared.lock().await;
    if session.learner_id != learner_id {
        return Err(AppError::forbidden("Session belongs to another learner"));
    }
    session.ensure_pending(&input.question_id)?;

    let attempt = Attempt {
        id: Uuid::new_v4().to_string(),
        learner_id: learner_id.to_string(),
        question_id: input.question_id,
        is_correct: input.is_correct,
        scope: session.scope.as_key(),
        session_id: Some(session.id.clone()),
        response_time_ms: input.response_time_ms,
        created_at: Utc::now(),
    };
    let first_attempt = record_attempt(state, &attempt).await?;

    let effect = session.answer(&attempt.question_id, attempt.is_correct)?;
    for event in &effect.events {
        if let Err(e) = state.store().append_adaptation_event(event) {
            tracing::warn!(event_id = %event.id, error = %e, "Failed to persist adaptation event");
        }
        state.publish_adaptation(event.clone());
    }

    if let Some(mut record) = state.store().get_practice_session(session_id)? {
        record.answered_count = session.presented().len();
        record.delivered_count = session.presented().len() + session.pending().len();
        record.adaptations = session.adaptations();
        if session.is_finished() {
            record.status = SessionStatus::Completed;
        }
        record.updated_at = Utc::now();
        state.store().update_practice_session(&record)?;
    }

    Ok(AnswerResult {
        attempt,
        first_attempt,
        adaptation: effect.adaptation,
        controller_state: session.controller_state(),
        remaining: session.pending().to_vec(),
        finished: session.is_finished(),
    })
}

pub async fn finish_session(
    state: &AppState,
    learner_id: &str,
    session_id: &str,
) -> Result<PracticeSessionRecord, AppError> {
    let record = owned_record(state, learner_id, session_id)?;

    let finished = match state.sessions().remove(session_id).await {
        Some(shared) => shared.lock().await.is_finished(),
        None => record.answered_count >= record.delivered_count,
    };
    let status = if finished {
        SessionStatus::Completed
    } else {
        SessionStatus::Abandoned
    };
    state
        .store()
        .close_practice_session(session_id, status)?
        .ok_or_else(session_not_found)
}

/// Records an answer given outside a live session. A topic scope must
/// actually contain the question, so history is never filed under a scope
/// it was not practiced in.
pub async fn record_standalone_attempt(
    state: &AppState,
    learner_id: &str,
    scope: ScopeTag,
    input: AnswerInput,
) -> Result<(Attempt, bool), AppError> {
    let question = state
        .store()
        .get_question(&input.question_id)?
        .filter(|q| q.active)
        .ok_or_else(|| AppError::not_found("QUESTION_NOT_FOUND", "Question not found"))?;
    if matches!(scope, ScopeTag::Topic { .. }) {
        let store = state.store_arc();
        let work_scope = scope.clone();
        let question_id = question.id.clone();
        let in_scope = run_blocking(state, "scope check", move || {
            let resolved = resolve_scope(&store, &work_scope)?;
            Ok(resolved.question_ids().contains(question_id.as_str()))
        })
        .await?;
        if !in_scope {
            return Err(AppError::unprocessable(
                "QUESTION_NOT_IN_SCOPE",
                &format!("question {} is not part of scope {scope}", question.id),
            ));
        }
    }

    let attempt = Attempt {
        id: Uuid::new_v4().to_string(),
        learner_id: learner_id.to_string(),
        question_id: question.id,
        is_correct: input.is_correct,
        scope: scope.as_key(),
        session_id: None,
        response_time_ms: input.response_time_ms,
        created_at: Utc::now(),
    };
    let first = record_attempt(state, &attempt).await?;
    Ok((attempt, first))
}

pub async fn preview_pool(
    state: &AppState,
    learner_id: &str,
    scope: ScopeTag,
) -> Result<PoolSummary, AppError> {
    let store = state.store_arc();
    let policy = state.policy_arc();
    let learner = learner_id.to_string();
    let summary = run_blocking(state, "pool preview", move || {
        let resolved = resolve_scope(&store, &scope)?;
        let pool = build_pool(store.as_ref(), &learner, &resolved)?;
        let buckets = DifficultyClassifier::new(store.as_ref(), &policy)
            .effective_buckets(&learner, &resolved.questions)?;
        let total = pool.len();
        let (never_seen, answered) = (pool.never_seen.len(), pool.answered.len());
        let request = SelectionRequest {
            count: total,
            mode: SelectionMode::Adaptive,
            difficulty_filter: Vec::new(),
        };
        let outcome = engine::select(pool, &request, &buckets);
        Ok(PoolSummary {
            scope_key: scope.as_key(),
            scope,
            total,
            never_seen,
            answered,
            buckets: outcome
                .catalog
                .map(|c| c.sizes())
                .unwrap_or_default(),
            skipped_entries: resolved.warnings.len(),
        })
    })
    .await?;
    Ok(summary)
}

pub async fn question_difficulty(
    state: &AppState,
    learner_id: &str,
    question_id: &str,
) -> Result<DifficultyReport, AppError> {
    let question = state
        .store()
        .get_question(question_id)?
        .ok_or_else(|| AppError::not_found("QUESTION_NOT_FOUND", "Question not found"))?;
    let store = state.store_arc();
    let policy = state.policy_arc();
    let learner = learner_id.to_string();
    let report = run_blocking(state, "difficulty", move || {
        DifficultyClassifier::new(store.as_ref(), &policy)
            .report(&question, Some(learner.as_str()))
            .map_err(SelectionError::from)
    })
    .await?;
    Ok(report)
}

/// Attempt writes are not cut short by the timeout: a write that outlives
/// the request still lands, and the ledger insert stays conditional.
async fn record_attempt(state: &AppState, attempt: &Attempt) -> Result<bool, AppError> {
    let store = state.store_arc();
    let attempt = attempt.clone();
    let first = tokio::task::spawn_blocking(move || store.record_attempt(&attempt))
        .await
        .map_err(|e| AppError::internal(&format!("attempt write task failed: {e}")))??;
    Ok(first)
}

fn owned_record(
    state: &AppState,
    learner_id: &str,
    session_id: &str,
) -> Result<PracticeSessionRecord, AppError> {
    let record = state
        .store()
        .get_practice_session(session_id)?
        .ok_or_else(session_not_found)?;
    if record.learner_id != learner_id {
        return Err(AppError::forbidden("Session belongs to another learner"));
    }
    Ok(record)
}

fn session_not_found() -> AppError {
    AppError::not_found("SESSION_NOT_FOUND", "Practice session not found")
}
