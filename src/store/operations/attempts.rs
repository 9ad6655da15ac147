use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::Transactional;
use std::collections::{HashMap, HashSet};

use crate::store::keys;
use crate::store::{map_transaction_error, Store, StoreError};

/// One answer. Immutable once written; `scope` is the scope tag the learner
/// was practicing under when answering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: String,
    pub learner_id: String,
    pub question_id: String,
    pub is_correct: bool,
    pub scope: String,
    pub session_id: Option<String>,
    pub response_time_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Ledger row holding only a learner's first-ever answer to a question.
/// Written once, never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirstAttemptRecord {
    pub learner_id: String,
    pub question_id: String,
    pub is_correct: bool,
    pub attempt_id: String,
    pub created_at: DateTime<Utc>,
}

impl FirstAttemptRecord {
    fn from_attempt(attempt: &Attempt) -> Self {
        Self {
            learner_id: attempt.learner_id.clone(),
            question_id: attempt.question_id.clone(),
            is_correct: attempt.is_correct,
            attempt_id: attempt.id.clone(),
            created_at: attempt.created_at,
        }
    }
}

impl Store {
    /// Appends the attempt and, in the same transaction, inserts the
    /// first-attempt ledger row if none exists yet for (learner, question).
    ///
    /// Returns `true` when this attempt became the ledger row. Concurrent
    /// first answers from two devices conflict inside sled and are retried,
    /// so exactly one of them wins.
    pub fn record_attempt(&self, attempt: &Attempt) -> Result<bool, StoreError> {
        let attempt_key = keys::attempt_key(
            &attempt.learner_id,
            &attempt.scope,
            &attempt.question_id,
            attempt.created_at.timestamp_millis(),
            &attempt.id,
        )?;
        let attempt_bytes = Self::serialize(attempt)?;
        let ledger_key = keys::first_attempt_key(&attempt.question_id, &attempt.learner_id)?;
        let ledger_bytes = Self::serialize(&FirstAttemptRecord::from_attempt(attempt))?;

        let first = (&self.attempts, &self.first_attempts)
            .transaction(|(tx_attempts, tx_ledger)| {
                if tx_attempts.get(attempt_key.as_bytes())?.is_some() {
                    return Err(sled::transaction::ConflictableTransactionError::Abort(
                        StoreError::Conflict {
                            entity: "attempt".to_string(),
                            key: attempt.id.clone(),
                        },
                    ));
                }
                tx_attempts.insert(attempt_key.as_bytes(), attempt_bytes.as_slice())?;

                if tx_ledger.get(ledger_key.as_bytes())?.is_some() {
                    return Ok(false);
                }
                tx_ledger.insert(ledger_key.as_bytes(), ledger_bytes.as_slice())?;
                Ok(true)
            })
            .map_err(map_transaction_error)?;

        Ok(first)
    }

    pub fn get_first_attempt(
        &self,
        question_id: &str,
        learner_id: &str,
    ) -> Result<Option<FirstAttemptRecord>, StoreError> {
        let key = keys::first_attempt_key(question_id, learner_id)?;
        match self.first_attempts.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn list_first_attempts(
        &self,
        question_id: &str,
    ) -> Result<Vec<FirstAttemptRecord>, StoreError> {
        let prefix = keys::first_attempt_question_prefix(question_id)?;
        let mut records = Vec::new();
        for item in self.first_attempts.scan_prefix(prefix.as_bytes()) {
            let (_, value) = item?;
            records.push(Self::deserialize::<FirstAttemptRecord>(&value)?);
        }
        Ok(records)
    }

    /// Attempts the learner made under exactly `scope`, restricted to the
    /// given question ids. Attempts under any other scope are never read.
    pub fn list_scope_attempts(
        &self,
        learner_id: &str,
        scope: &str,
        question_ids: &HashSet<&str>,
    ) -> Result<Vec<Attempt>, StoreError> {
        let prefix = keys::attempt_scope_prefix(learner_id, scope)?;
        let mut attempts = Vec::new();
        for item in self.attempts.scan_prefix(prefix.as_bytes()) {
            let (_, value) = item?;
            let attempt: Attempt = Self::deserialize(&value)?;
            if question_ids.contains(attempt.question_id.as_str()) {
                attempts.push(attempt);
            }
        }
        Ok(attempts)
    }

    /// All of the learner's attempts (every scope) on the given questions,
    /// grouped by question id, oldest first.
    pub fn list_learner_attempts_by_question(
        &self,
        learner_id: &str,
        question_ids: &HashSet<&str>,
    ) -> Result<HashMap<String, Vec<Attempt>>, StoreError> {
        let prefix = keys::attempt_learner_prefix(learner_id)?;
        let mut grouped: HashMap<String, Vec<Attempt>> = HashMap::new();
        for item in self.attempts.scan_prefix(prefix.as_bytes()) {
            let (_, value) = item?;
            let attempt: Attempt = Self::deserialize(&value)?;
            if question_ids.contains(attempt.question_id.as_str()) {
                grouped
                    .entry(attempt.question_id.clone())
                    .or_default()
                    .push(attempt);
            }
        }
        for attempts in grouped.values_mut() {
            attempts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        }
        Ok(grouped)
    }

    /// Learner history, newest first.
    pub fn list_learner_attempts(
        &self,
        learner_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Attempt>, StoreError> {
        let prefix = keys::attempt_learner_prefix(learner_id)?;
        let mut attempts = Vec::new();
        for item in self.attempts.scan_prefix(prefix.as_bytes()) {
            let (_, value) = item?;
            attempts.push(Self::deserialize::<Attempt>(&value)?);
        }
        attempts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(attempts.into_iter().skip(offset).take(limit).collect())
    }

    pub fn count_learner_attempts(&self, learner_id: &str) -> Result<usize, StoreError> {
        let prefix = keys::attempt_learner_prefix(learner_id)?;
        let mut count = 0usize;
        for item in self.attempts.scan_prefix(prefix.as_bytes()) {
            let _ = item?;
            count += 1;
        }
        Ok(count)
    }
}
