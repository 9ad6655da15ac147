//! In-session difficulty adaptation over a rolling answer window.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::selection::policy::AdaptiveConfig;
use crate::selection::types::DifficultyBucket;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControllerState {
    Stable,
    AdaptingEasier,
    AdaptingHarder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdaptationDirection {
    Easier,
    Harder,
}

impl AdaptationDirection {
    /// Target bucket first, then its fallback.
    pub fn buckets(self) -> [DifficultyBucket; 2] {
        match self {
            AdaptationDirection::Easier => [DifficultyBucket::Easy, DifficultyBucket::Medium],
            AdaptationDirection::Harder => [DifficultyBucket::Hard, DifficultyBucket::Extreme],
        }
    }

    fn state(self) -> ControllerState {
        match self {
            AdaptationDirection::Easier => ControllerState::AdaptingEasier,
            AdaptationDirection::Harder => ControllerState::AdaptingHarder,
        }
    }
}

/// Emitted on every controller state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptationEvent {
    pub id: String,
    pub session_id: String,
    pub learner_id: String,
    pub from: ControllerState,
    pub to: ControllerState,
    pub direction: AdaptationDirection,
    /// Bucket the substitution drew from; `None` when nothing was available.
    pub bucket: Option<DifficultyBucket>,
    pub sample_accuracy: f64,
    pub window_size: usize,
    pub substituted: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AdaptationOutcome {
    #[serde(rename_all = "camelCase")]
    Substituted {
        direction: AdaptationDirection,
        bucket: DifficultyBucket,
        replaced: usize,
    },
    /// Target and fallback buckets had nothing left; the batch is unchanged.
    #[serde(rename_all = "camelCase")]
    NoAdaptationAvailable { direction: AdaptationDirection },
}

/// A qualifying window: the controller has moved into an adapting state and
/// expects [`AdaptiveController::settle`] once substitution has been tried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trigger {
    pub direction: AdaptationDirection,
    pub from: ControllerState,
    pub to: ControllerState,
    pub accuracy: f64,
}

#[derive(Debug, Clone)]
pub struct AdaptiveController {
    config: AdaptiveConfig,
    state: ControllerState,
    window: VecDeque<bool>,
}

impl AdaptiveController {
    pub fn new(config: AdaptiveConfig) -> Self {
        Self {
            window: VecDeque::with_capacity(config.window_size),
            config,
            state: ControllerState::Stable,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn config(&self) -> &AdaptiveConfig {
        &self.config
    }

    /// `None` until the window is full.
    pub fn window_accuracy(&self) -> Option<f64> {
        if self.window.len() < self.config.window_size || self.window.is_empty() {
            return None;
        }
        let correct = self.window.iter().filter(|c| **c).count();
        Some(correct as f64 / self.window.len() as f64)
    }

    /// Feeds one answer. Returns a trigger when the full window crosses a
    /// threshold while stable.
    pub fn record(&mut self, is_correct: bool) -> Option<Trigger> {
        if self.window.len() == self.config.window_size {
            self.window.pop_front();
        }
        self.window.push_back(is_correct);

        if self.state != ControllerState::Stable {
            return None;
        }
        let accuracy = self.window_accuracy()?;
        let direction = if accuracy < self.config.low_accuracy {
            AdaptationDirection::Easier
        } else if accuracy > self.config.high_accuracy {
            AdaptationDirection::Harder
        } else {
            return None;
        };

        let from = self.state;
        self.state = direction.state();
        Some(Trigger {
            direction,
            from,
            to: self.state,
            accuracy,
        })
    }

    /// Returns to `Stable` after a substitution attempt. The window restarts
    /// so the next transition needs a fresh full window.
    pub fn settle(&mut self) -> Option<(ControllerState, ControllerState)> {
        if self.state == ControllerState::Stable {
            return None;
        }
        let from = self.state;
        self.state = ControllerState::Stable;
        self.window.clear();
        Some((from, ControllerState::Stable))
    }
}
