//! Difficulty classification.
//!
//! Global difficulty is computed from first attempts only, so one learner
//! retrying a question cannot move its population bucket. Personal difficulty
//! uses every attempt the learner made. Neither is stored: both are derived on
//! demand from the append-only history.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::selection::history::AttemptHistory;
use crate::selection::policy::SelectionPolicy;
use crate::selection::types::{Confidence, DifficultyBucket};
use crate::store::operations::attempts::{Attempt, FirstAttemptRecord};
use crate::store::operations::content::Question;
use crate::store::StoreError;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalDifficulty {
    pub question_id: String,
    /// `None` until at least one first attempt exists.
    pub bucket: Option<DifficultyBucket>,
    pub accuracy: Option<f64>,
    pub confidence: Confidence,
    pub sample_size: u64,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalDifficulty {
    pub learner_id: String,
    pub question_id: String,
    pub bucket: Option<DifficultyBucket>,
    pub accuracy: Option<f64>,
    pub sample_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultySource {
    Personal,
    Global,
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveDifficulty {
    pub bucket: DifficultyBucket,
    pub source: DifficultySource,
}

fn accuracy(correct: u64, total: u64) -> Option<f64> {
    if total == 0 {
        None
    } else {
        Some(correct as f64 / total as f64)
    }
}

pub fn classify_global(
    question_id: &str,
    records: &[FirstAttemptRecord],
    policy: &SelectionPolicy,
    now: DateTime<Utc>,
) -> GlobalDifficulty {
    let total = records.len() as u64;
    let correct = records.iter().filter(|r| r.is_correct).count() as u64;
    let accuracy = accuracy(correct, total);
    GlobalDifficulty {
        question_id: question_id.to_string(),
        bucket: accuracy.map(|a| policy.difficulty.bucket_for(a)),
        accuracy,
        confidence: policy.confidence.confidence_for(total),
        sample_size: total,
        computed_at: now,
    }
}

pub fn classify_personal(
    learner_id: &str,
    question_id: &str,
    attempts: &[Attempt],
    policy: &SelectionPolicy,
) -> PersonalDifficulty {
    let total = attempts.len() as u64;
    let correct = attempts.iter().filter(|a| a.is_correct).count() as u64;
    let accuracy = accuracy(correct, total);
    PersonalDifficulty {
        learner_id: learner_id.to_string(),
        question_id: question_id.to_string(),
        bucket: accuracy.map(|a| policy.difficulty.bucket_for(a)),
        accuracy,
        sample_size: total,
    }
}

/// personal (enough samples) → global (trusted confidence) → static label.
pub fn effective_difficulty(
    question: &Question,
    global: Option<&GlobalDifficulty>,
    personal: Option<&PersonalDifficulty>,
    policy: &SelectionPolicy,
) -> EffectiveDifficulty {
    if let Some(p) = personal {
        if let Some(bucket) = p.bucket {
            if p.sample_size >= policy.personal.min_samples {
                return EffectiveDifficulty {
                    bucket,
                    source: DifficultySource::Personal,
                };
            }
        }
    }

    if let Some(g) = global {
        if let Some(bucket) = g.bucket {
            if g.confidence >= policy.confidence.trusted {
                return EffectiveDifficulty {
                    bucket,
                    source: DifficultySource::Global,
                };
            }
        }
    }

    EffectiveDifficulty {
        bucket: question.static_difficulty,
        source: DifficultySource::Static,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyReport {
    pub global: GlobalDifficulty,
    pub personal: Option<PersonalDifficulty>,
    pub effective: EffectiveDifficulty,
}

/// Reads history through [`AttemptHistory`] and applies the pure functions above.
pub struct DifficultyClassifier<'a, H: AttemptHistory + ?Sized> {
    history: &'a H,
    policy: &'a SelectionPolicy,
}

impl<'a, H: AttemptHistory + ?Sized> DifficultyClassifier<'a, H> {
    pub fn new(history: &'a H, policy: &'a SelectionPolicy) -> Self {
        Self { history, policy }
    }

    pub fn global(&self, question_id: &str) -> Result<GlobalDifficulty, StoreError> {
        let records = self.history.first_attempts(question_id)?;
        Ok(classify_global(question_id, &records, self.policy, Utc::now()))
    }

    pub fn report(
        &self,
        question: &Question,
        learner_id: Option<&str>,
    ) -> Result<DifficultyReport, StoreError> {
        let global = self.global(&question.id)?;
        let personal = match learner_id {
            Some(learner_id) => {
                let ids: HashSet<&str> = [question.id.as_str()].into_iter().collect();
                let mut grouped = self.history.learner_attempts(learner_id, &ids)?;
                let attempts = grouped.remove(&question.id).unwrap_or_default();
                Some(classify_personal(
                    learner_id,
                    &question.id,
                    &attempts,
                    self.policy,
                ))
            }
            None => None,
        };
        let effective = effective_difficulty(question, Some(&global), personal.as_ref(), self.policy);
        Ok(DifficultyReport {
            global,
            personal,
            effective,
        })
    }

    /// Effective bucket for every question, one ledger read per question and a
    /// single history scan for the learner.
    pub fn effective_buckets<'q>(
        &self,
        learner_id: &str,
        questions: impl IntoIterator<Item = &'q Question>,
    ) -> Result<HashMap<String, DifficultyBucket>, StoreError> {
        let questions: Vec<&Question> = questions.into_iter().collect();
        let ids: HashSet<&str> = questions.iter().map(|q| q.id.as_str()).collect();
        let personal_attempts = self.history.learner_attempts(learner_id, &ids)?;
        let now = Utc::now();

        let mut buckets = HashMap::with_capacity(questions.len());
        for question in questions {
            let records = self.history.first_attempts(&question.id)?;
            let global = classify_global(&question.id, &records, self.policy, now);
            let personal = personal_attempts
                .get(&question.id)
                .map(|attempts| classify_personal(learner_id, &question.id, attempts, self.policy));
            let effective =
                effective_difficulty(question, Some(&global), personal.as_ref(), self.policy);
            buckets.insert(question.id.clone(), effective.bucket);
        }
        Ok(buckets)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::store::operations::content::QuestionContent;
    use crate::store::Store;

    fn question(static_difficulty: DifficultyBucket) -> Question {
        Question {
            id: "q1".to_string(),
            article_id: "a1".to_string(),
            content: QuestionContent {
                statement: "?".to_string(),
                options: vec![],
                explanation: None,
            },
            static_difficulty,
            active: true,
            created_at: Utc::now(),
        }
    }

    fn first(learner: &str, correct: bool) -> FirstAttemptRecord {
        FirstAttemptRecord {
            learner_id: learner.to_string(),
            question_id: "q1".to_string(),
            is_correct: correct,
            attempt_id: format!("a-{learner}"),
            created_at: Utc::now(),
        }
    }

    fn attempt(id: &str, learner: &str, correct: bool) -> Attempt {
        Attempt {
            id: id.to_string(),
            learner_id: learner.to_string(),
            question_id: "q1".to_string(),
            is_correct: correct,
            scope: "*".to_string(),
            session_id: None,
            response_time_ms: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn low_confidence_global_falls_back_to_static() {
        let policy = SelectionPolicy::default();
        let records: Vec<_> = (0..5).map(|i| first(&format!("u{i}"), false)).collect();
        let global = classify_global("q1", &records, &policy, Utc::now());
        assert_eq!(global.bucket, Some(DifficultyBucket::Extreme));
        assert_eq!(global.confidence, Confidence::Low);

        let effective =
            effective_difficulty(&question(DifficultyBucket::Easy), Some(&global), None, &policy);
        assert_eq!(effective.bucket, DifficultyBucket::Easy);
        assert_eq!(effective.source, DifficultySource::Static);
    }

    #[test]
    fn trusted_global_beats_static() {
        let policy = SelectionPolicy::default();
        let records: Vec<_> = (0..12).map(|i| first(&format!("u{i}"), i < 6)).collect();
        let global = classify_global("q1", &records, &policy, Utc::now());
        assert_eq!(global.confidence, Confidence::Medium);

        let effective =
            effective_difficulty(&question(DifficultyBucket::Easy), Some(&global), None, &policy);
        assert_eq!(effective.bucket, DifficultyBucket::Hard);
        assert_eq!(effective.source, DifficultySource::Global);
    }

    #[test]
    fn personal_needs_minimum_samples() {
        let policy = SelectionPolicy::default();
        let two = vec![attempt("a1", "u1", true), attempt("a2", "u1", true)];
        let personal = classify_personal("u1", "q1", &two, &policy);
        let effective =
            effective_difficulty(&question(DifficultyBucket::Hard), None, Some(&personal), &policy);
        assert_eq!(effective.source, DifficultySource::Static);

        let mut three = two.clone();
        three.push(attempt("a3", "u1", true));
        let personal = classify_personal("u1", "q1", &three, &policy);
        let effective =
            effective_difficulty(&question(DifficultyBucket::Hard), None, Some(&personal), &policy);
        assert_eq!(effective.bucket, DifficultyBucket::Easy);
        assert_eq!(effective.source, DifficultySource::Personal);
    }

    #[test]
    fn no_samples_means_no_bucket() {
        let policy = SelectionPolicy::default();
        let global = classify_global("q1", &[], &policy, Utc::now());
        assert!(global.bucket.is_none());
        assert!(global.accuracy.is_none());
        assert_eq!(global.sample_size, 0);
    }

    #[test]
    fn retries_move_personal_but_not_global() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("difficulty-db").to_str().unwrap()).unwrap();
        let policy = SelectionPolicy::default();
        let classifier = DifficultyClassifier::new(&store, &policy);

        store.record_attempt(&attempt("a0", "u1", false)).unwrap();
        let before = classifier.global("q1").unwrap();

        for i in 1..=6 {
            store
                .record_attempt(&attempt(&format!("a{i}"), "u1", true))
                .unwrap();
        }
        let after = classifier.global("q1").unwrap();
        assert_eq!(before.sample_size, 1);
        assert_eq!(after.sample_size, 1);
        assert_eq!(before.bucket, after.bucket);
        assert_eq!(after.bucket, Some(DifficultyBucket::Extreme));

        let report = classifier
            .report(&question(DifficultyBucket::Medium), Some("u1"))
            .unwrap();
        let personal = report.personal.unwrap();
        assert_eq!(personal.sample_size, 7);
        assert_eq!(personal.bucket, Some(DifficultyBucket::Easy));
        assert_eq!(report.effective.source, DifficultySource::Personal);
    }
}
