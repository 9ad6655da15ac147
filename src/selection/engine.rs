//! Batch selection: never-seen first, then oldest-answered review.

use std::collections::HashMap;

use serde::Serialize;

use crate::selection::catalog::AdaptiveCatalog;
use crate::selection::pool::{CandidatePool, PoolEntry};
use crate::selection::types::{DifficultyBucket, ScopeTag, SelectionMode};
use crate::store::operations::content::Question;

#[derive(Debug, Clone, Default)]
pub struct SelectionRequest {
    pub count: usize,
    pub mode: SelectionMode,
    /// Restricts the pool to these effective buckets. Empty means no filter.
    pub difficulty_filter: Vec<DifficultyBucket>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SelectionStatus {
    Complete,
    /// Fewer questions than requested; the session still proceeds.
    InsufficientPool { requested: usize, available: usize },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedQuestion {
    pub question: Question,
    pub difficulty: DifficultyBucket,
    pub never_seen: bool,
}

#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    pub scope: ScopeTag,
    pub mode: SelectionMode,
    pub questions: Vec<SelectedQuestion>,
    pub status: SelectionStatus,
    /// Present only in adaptive mode.
    pub catalog: Option<AdaptiveCatalog>,
}

fn never_seen_order(a: &PoolEntry, b: &PoolEntry) -> std::cmp::Ordering {
    // least recently surfaced anywhere (never surfaced first), then curated order
    a.last_anywhere
        .cmp(&b.last_anywhere)
        .then(a.scope_position.cmp(&b.scope_position))
        .then_with(|| a.question.id.cmp(&b.question.id))
}

fn answered_order(a: &PoolEntry, b: &PoolEntry) -> std::cmp::Ordering {
    a.last_in_scope
        .cmp(&b.last_in_scope)
        .then_with(|| a.question.id.cmp(&b.question.id))
}

/// Orders the pool and takes the batch. `buckets` holds effective difficulty
/// per question id; a missing entry falls back to the static label.
pub fn select(
    pool: CandidatePool,
    request: &SelectionRequest,
    buckets: &HashMap<String, DifficultyBucket>,
) -> SelectionOutcome {
    let CandidatePool {
        scope,
        mut never_seen,
        mut answered,
    } = pool;
    never_seen.sort_by(never_seen_order);
    answered.sort_by(answered_order);

    let to_selected = |entry: PoolEntry, never_seen: bool| {
        let difficulty = buckets
            .get(&entry.question.id)
            .copied()
            .unwrap_or(entry.question.static_difficulty);
        SelectedQuestion {
            question: entry.question,
            difficulty,
            never_seen,
        }
    };
    let keep = |item: &SelectedQuestion| {
        request.difficulty_filter.is_empty() || request.difficulty_filter.contains(&item.difficulty)
    };

    let never_seen: Vec<SelectedQuestion> = never_seen
        .into_iter()
        .map(|e| to_selected(e, true))
        .filter(|s| keep(s))
        .collect();
    let answered: Vec<SelectedQuestion> = answered
        .into_iter()
        .map(|e| to_selected(e, false))
        .filter(|s| keep(s))
        .collect();

    let available = never_seen.len() + answered.len();
    let status = if request.count > available {
        SelectionStatus::InsufficientPool {
            requested: request.count,
            available,
        }
    } else {
        SelectionStatus::Complete
    };

    let questions: Vec<SelectedQuestion> = never_seen
        .iter()
        .chain(answered.iter())
        .take(request.count)
        .cloned()
        .collect();

    let catalog = match request.mode {
        SelectionMode::Adaptive => Some(AdaptiveCatalog::build(&never_seen, &answered)),
        SelectionMode::Plain => None,
    };

    tracing::debug!(
        scope = %scope,
        requested = request.count,
        selected = questions.len(),
        available,
        "Selection completed"
    );

    SelectionOutcome {
        scope,
        mode: request.mode,
        questions,
        status,
        catalog,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::pool::build_pool;
    use crate::selection::pool::tests::{question, resolved, MemoryHistory};
    use crate::selection::scope::ResolvedScope;

    fn plain(count: usize) -> SelectionRequest {
        SelectionRequest {
            count,
            mode: SelectionMode::Plain,
            difficulty_filter: Vec::new(),
        }
    }

    #[test]
    fn never_seen_first_then_oldest_answered() {
        let scope = resolved(ScopeTag::topic("civil", None), 30);
        let history = MemoryHistory::default();
        // q00 answered longest ago, q21 most recently
        for i in 0..22 {
            history.answer(&format!("q{i:02}"), &scope.tag, 100 - i);
        }

        let pool = build_pool(&history, "u1", &scope).unwrap();
        let outcome = select(pool, &plain(10), &HashMap::new());

        let ids: Vec<&str> = outcome.questions.iter().map(|s| s.question.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["q22", "q23", "q24", "q25", "q26", "q27", "q28", "q29", "q00", "q01"]
        );
        assert_eq!(outcome.questions.iter().filter(|s| s.never_seen).count(), 8);
        assert_eq!(outcome.status, SelectionStatus::Complete);
        assert!(outcome.catalog.is_none());
    }

    #[test]
    fn short_pool_returns_everything_with_status() {
        let scope = resolved(ScopeTag::All, 3);
        let pool = build_pool(&MemoryHistory::default(), "u1", &scope).unwrap();
        let outcome = select(pool, &plain(10), &HashMap::new());

        assert_eq!(outcome.questions.len(), 3);
        assert_eq!(
            outcome.status,
            SelectionStatus::InsufficientPool {
                requested: 10,
                available: 3
            }
        );
    }

    #[test]
    fn questions_surfaced_elsewhere_go_after_fresh_ones() {
        let scope = resolved(ScopeTag::topic("b", None), 3);
        let history = MemoryHistory::default();
        history.answer("q00", &ScopeTag::topic("a", None), 1);

        let pool = build_pool(&history, "u1", &scope).unwrap();
        let outcome = select(pool, &plain(3), &HashMap::new());
        let ids: Vec<&str> = outcome.questions.iter().map(|s| s.question.id.as_str()).collect();
        assert_eq!(ids, vec!["q01", "q02", "q00"]);
        assert!(outcome.questions.iter().all(|s| s.never_seen));
    }

    #[test]
    fn adaptive_mode_catalogs_the_whole_pool() {
        let scope = ResolvedScope {
            tag: ScopeTag::All,
            questions: vec![
                question("e1", DifficultyBucket::Easy),
                question("m1", DifficultyBucket::Medium),
                question("h1", DifficultyBucket::Hard),
                question("x1", DifficultyBucket::Extreme),
            ],
            warnings: Vec::new(),
        };
        let history = MemoryHistory::default();
        history.answer("h1", &ScopeTag::All, 10);
        let pool = build_pool(&history, "u1", &scope).unwrap();

        let mut buckets = HashMap::new();
        buckets.insert("m1".to_string(), DifficultyBucket::Easy);
        let request = SelectionRequest {
            count: 2,
            mode: SelectionMode::Adaptive,
            difficulty_filter: Vec::new(),
        };
        let outcome = select(pool, &request, &buckets);

        let catalog = outcome.catalog.unwrap();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.never_seen.easy.len(), 2);
        assert_eq!(catalog.answered.hard.len(), 1);
        assert_eq!(outcome.questions.len(), 2);
    }

    #[test]
    fn difficulty_filter_restricts_the_pool() {
        let scope = ResolvedScope {
            tag: ScopeTag::All,
            questions: vec![
                question("e1", DifficultyBucket::Easy),
                question("h1", DifficultyBucket::Hard),
                question("h2", DifficultyBucket::Hard),
            ],
            warnings: Vec::new(),
        };
        let pool = build_pool(&MemoryHistory::default(), "u1", &scope).unwrap();
        let request = SelectionRequest {
            count: 3,
            mode: SelectionMode::Plain,
            difficulty_filter: vec![DifficultyBucket::Hard],
        };
        let outcome = select(pool, &request, &HashMap::new());

        assert_eq!(outcome.questions.len(), 2);
        assert!(outcome
            .questions
            .iter()
            .all(|s| s.difficulty == DifficultyBucket::Hard));
        assert!(matches!(
            outcome.status,
            SelectionStatus::InsufficientPool { available: 2, .. }
        ));
    }
}
