//! Session runtime: the delivered batch, the already-shown set, and (in
//! adaptive mode) the catalog and controller. Owned by exactly one session.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::selection::adaptive::{
    AdaptationDirection, AdaptationEvent, AdaptationOutcome, AdaptiveController, ControllerState,
    Trigger,
};
use crate::selection::catalog::{AdaptiveCatalog, CatalogSizes};
use crate::selection::engine::{SelectedQuestion, SelectionOutcome, SelectionStatus};
use crate::selection::policy::AdaptiveConfig;
use crate::selection::types::{ScopeTag, SelectionMode};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("question {0} was already answered in this session")]
    AlreadyAnswered(String),
    #[error("question {0} is not part of this session")]
    NotInSession(String),
}

#[derive(Debug, Clone, Default)]
pub struct AnswerEffect {
    pub adaptation: Option<AdaptationOutcome>,
    pub events: Vec<AdaptationEvent>,
}

#[derive(Debug)]
pub struct PracticeSession {
    pub id: String,
    pub learner_id: String,
    pub scope: ScopeTag,
    pub mode: SelectionMode,
    pub requested_count: usize,
    pub status: SelectionStatus,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    presented: Vec<SelectedQuestion>,
    pending: Vec<SelectedQuestion>,
    shown: HashSet<String>,
    catalog: Option<AdaptiveCatalog>,
    controller: Option<AdaptiveController>,
    adaptations: u32,
}

impl PracticeSession {
    pub fn start(
        id: String,
        learner_id: String,
        requested_count: usize,
        outcome: SelectionOutcome,
        adaptive: &AdaptiveConfig,
    ) -> Self {
        let controller = match outcome.mode {
            SelectionMode::Adaptive => Some(AdaptiveController::new(adaptive.clone())),
            SelectionMode::Plain => None,
        };
        let now = Utc::now();
        Self {
            id,
            learner_id,
            scope: outcome.scope,
            mode: outcome.mode,
            requested_count,
            status: outcome.status,
            created_at: now,
            last_active_at: now,
            presented: Vec::new(),
            pending: outcome.questions,
            shown: HashSet::new(),
            catalog: outcome.catalog,
            controller,
            adaptations: 0,
        }
    }

    pub fn pending(&self) -> &[SelectedQuestion] {
        &self.pending
    }

    pub fn presented(&self) -> &[SelectedQuestion] {
        &self.presented
    }

    pub fn is_finished(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn adaptations(&self) -> u32 {
        self.adaptations
    }

    pub fn controller_state(&self) -> Option<ControllerState> {
        self.controller.as_ref().map(AdaptiveController::state)
    }

    pub fn catalog_sizes(&self) -> Option<CatalogSizes> {
        self.catalog.as_ref().map(AdaptiveCatalog::sizes)
    }

    /// Fails unless `question_id` is waiting to be answered.
    pub fn ensure_pending(&self, question_id: &str) -> Result<(), SessionError> {
        if self.pending.iter().any(|q| q.question.id == question_id) {
            Ok(())
        } else if self.shown.contains(question_id) {
            Err(SessionError::AlreadyAnswered(question_id.to_string()))
        } else {
            Err(SessionError::NotInSession(question_id.to_string()))
        }
    }

    pub fn answer(&mut self, question_id: &str, is_correct: bool) -> Result<AnswerEffect, SessionError> {
        self.ensure_pending(question_id)?;
        let Some(position) = self.pending.iter().position(|q| q.question.id == question_id) else {
            return Err(SessionError::NotInSession(question_id.to_string()));
        };

        let answered = self.pending.remove(position);
        self.shown.insert(answered.question.id.clone());
        self.presented.push(answered);
        self.last_active_at = Utc::now();

        let Some(trigger) = self.controller.as_mut().and_then(|c| c.record(is_correct)) else {
            return Ok(AnswerEffect::default());
        };

        let outcome = self.substitute(trigger.direction);
        let events = self.transition_events(&trigger, &outcome);
        self.adaptations += 1;

        Ok(AnswerEffect {
            adaptation: Some(outcome),
            events,
        })
    }

    /// Replaces the not-yet-presented part of the batch, drawing unseen
    /// questions from the target bucket then its fallback before any answered
    /// ones. Nothing already shown comes back.
    fn substitute(&mut self, direction: AdaptationDirection) -> AdaptationOutcome {
        let drawn = match &self.catalog {
            Some(catalog) => catalog.draw(&direction.buckets(), &self.shown, self.pending.len()),
            None => Vec::new(),
        };
        let Some(bucket) = drawn.first().map(|q| q.difficulty) else {
            tracing::info!(
                session_id = %self.id,
                ?direction,
                "No questions left in target buckets, keeping current batch"
            );
            return AdaptationOutcome::NoAdaptationAvailable { direction };
        };

        let target_len = self.pending.len();
        let previously_pending: HashSet<&str> =
            self.pending.iter().map(|q| q.question.id.as_str()).collect();
        let replaced = drawn
            .iter()
            .filter(|q| !previously_pending.contains(q.question.id.as_str()))
            .count();

        let drawn_ids: HashSet<String> = drawn.iter().map(|q| q.question.id.clone()).collect();
        let mut next = drawn;
        for remaining in self.pending.drain(..) {
            if next.len() >= target_len {
                break;
            }
            if !drawn_ids.contains(&remaining.question.id) {
                next.push(remaining);
            }
        }
        self.pending = next;

        tracing::info!(
            session_id = %self.id,
            ?direction,
            %bucket,
            replaced,
            "Remaining batch substituted"
        );
        AdaptationOutcome::Substituted {
            direction,
            bucket,
            replaced,
        }
    }

    fn transition_events(
        &mut self,
        trigger: &Trigger,
        outcome: &AdaptationOutcome,
    ) -> Vec<AdaptationEvent> {
        let (bucket, substituted) = match outcome {
            AdaptationOutcome::Substituted {
                bucket, replaced, ..
            } => (Some(*bucket), *replaced),
            AdaptationOutcome::NoAdaptationAvailable { .. } => (None, 0),
        };
        let window_size = self
            .controller
            .as_ref()
            .map(|c| c.config().window_size)
            .unwrap_or_default();
        let session_id = self.id.clone();
        let learner_id = self.learner_id.clone();

        let event = |from: ControllerState, to: ControllerState| AdaptationEvent {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.clone(),
            learner_id: learner_id.clone(),
            from,
            to,
            direction: trigger.direction,
            bucket,
            sample_accuracy: trigger.accuracy,
            window_size,
            substituted,
            created_at: Utc::now(),
        };

        let mut events = vec![event(trigger.from, trigger.to)];
        let settled = self.controller.as_mut().and_then(AdaptiveController::settle);
        if let Some((from, to)) = settled {
            events.push(event(from, to));
        }
        events
    }
}
