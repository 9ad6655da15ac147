use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::selection::history::AttemptHistory;
use crate::selection::scope::ResolvedScope;
use crate::selection::types::ScopeTag;
use crate::selection::SelectionError;
use crate::store::operations::content::Question;

#[derive(Debug, Clone)]
pub struct PoolEntry {
    pub question: Question,
    /// Position in the resolved scope; curated relevance order.
    pub scope_position: usize,
    /// Most recent attempt under this exact scope. `None` iff never-seen.
    pub last_in_scope: Option<DateTime<Utc>>,
    /// Most recent attempt under any scope. Only used for ordering.
    pub last_anywhere: Option<DateTime<Utc>>,
}

/// Per-request partition of a scope. Every scope question is in exactly one
/// of the two lists.
#[derive(Debug, Clone)]
pub struct CandidatePool {
    pub scope: ScopeTag,
    pub never_seen: Vec<PoolEntry>,
    pub answered: Vec<PoolEntry>,
}

impl CandidatePool {
    pub fn len(&self) -> usize {
        self.never_seen.len() + self.answered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partitions the scope for `learner_id`.
///
/// Answered means at least one attempt recorded under exactly this scope tag.
/// Membership is decided against a set built from one scoped history read, so
/// a question answered elsewhere stays never-seen here.
pub fn build_pool<H: AttemptHistory + ?Sized>(
    history: &H,
    learner_id: &str,
    scope: &ResolvedScope,
) -> Result<CandidatePool, SelectionError> {
    let question_ids = scope.question_ids();

    let scoped = history
        .scoped_attempts(learner_id, &scope.tag, &question_ids)
        .map_err(|e| SelectionError::PoolBuildFailed {
            reason: format!("scoped history read failed: {e}"),
        })?;
    let anywhere = history
        .learner_attempts(learner_id, &question_ids)
        .map_err(|e| SelectionError::PoolBuildFailed {
            reason: format!("learner history read failed: {e}"),
        })?;

    let mut last_in_scope: HashMap<&str, DateTime<Utc>> = HashMap::new();
    for attempt in &scoped {
        let slot = last_in_scope
            .entry(attempt.question_id.as_str())
            .or_insert(attempt.created_at);
        if attempt.created_at > *slot {
            *slot = attempt.created_at;
        }
    }

    let mut never_seen = Vec::new();
    let mut answered = Vec::new();
    let mut placed: HashSet<&str> = HashSet::with_capacity(scope.len());
    for (scope_position, question) in scope.questions.iter().enumerate() {
        if !placed.insert(question.id.as_str()) {
            continue;
        }
        let entry = PoolEntry {
            question: question.clone(),
            scope_position,
            last_in_scope: last_in_scope.get(question.id.as_str()).copied(),
            last_anywhere: anywhere
                .get(&question.id)
                .and_then(|attempts| attempts.iter().map(|a| a.created_at).max()),
        };
        if entry.last_in_scope.is_some() {
            answered.push(entry);
        } else {
            never_seen.push(entry);
        }
    }

    tracing::debug!(
        learner_id,
        scope = %scope.tag,
        never_seen = never_seen.len(),
        answered = answered.len(),
        "Candidate pool built"
    );

    Ok(CandidatePool {
        scope: scope.tag.clone(),
        never_seen,
        answered,
    })
}
