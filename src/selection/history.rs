//! The one seam through which the selection core reads and writes answer
//! history. `Store` is the canonical implementation; there is no second
//! table that can disagree about whether a question was answered.

use std::collections::{HashMap, HashSet};

use crate::selection::types::ScopeTag;
use crate::store::operations::attempts::{Attempt, FirstAttemptRecord};
use crate::store::{Store, StoreError};

pub trait AttemptHistory {
    /// Attempts recorded under exactly `scope`, restricted to `question_ids`.
    fn scoped_attempts(
        &self,
        learner_id: &str,
        scope: &ScopeTag,
        question_ids: &HashSet<&str>,
    ) -> Result<Vec<Attempt>, StoreError>;

    /// Every attempt (any scope) the learner made on the given questions.
    fn learner_attempts(
        &self,
        learner_id: &str,
        question_ids: &HashSet<&str>,
    ) -> Result<HashMap<String, Vec<Attempt>>, StoreError>;

    fn first_attempts(&self, question_id: &str) -> Result<Vec<FirstAttemptRecord>, StoreError>;

    /// Appends an attempt; returns whether it became the learner's
    /// first-attempt record for the question.
    fn record_attempt(&self, attempt: &Attempt) -> Result<bool, StoreError>;
}

impl AttemptHistory for Store {
    fn scoped_attempts(
        &self,
        learner_id: &str,
        scope: &ScopeTag,
        question_ids: &HashSet<&str>,
    ) -> Result<Vec<Attempt>, StoreError> {
        self.list_scope_attempts(learner_id, &scope.as_key(), question_ids)
    }

    fn learner_attempts(
        &self,
        learner_id: &str,
        question_ids: &HashSet<&str>,
    ) -> Result<HashMap<String, Vec<Attempt>>, StoreError> {
        self.list_learner_attempts_by_question(learner_id, question_ids)
    }

    fn first_attempts(&self, question_id: &str) -> Result<Vec<FirstAttemptRecord>, StoreError> {
        self.list_first_attempts(question_id)
    }

    fn record_attempt(&self, attempt: &Attempt) -> Result<bool, StoreError> {
        Store::record_attempt(self, attempt)
    }
}
