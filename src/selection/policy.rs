//! Selection policy: every tunable threshold used by the classifier and the
//! adaptive controller lives here and nowhere else.

use serde::{Deserialize, Serialize};

use crate::selection::types::{Confidence, DifficultyBucket};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyThresholds {
    /// accuracy >= this is `easy`
    pub easy_min_accuracy: f64,
    /// accuracy >= this is `medium`
    pub medium_min_accuracy: f64,
    /// accuracy >= this is `hard`, anything below is `extreme`
    pub hard_min_accuracy: f64,
}

impl Default for DifficultyThresholds {
    fn default() -> Self {
        Self {
            easy_min_accuracy: 0.80,
            medium_min_accuracy: 0.55,
            hard_min_accuracy: 0.30,
        }
    }
}

impl DifficultyThresholds {
    pub fn bucket_for(&self, accuracy: f64) -> DifficultyBucket {
        if accuracy >= self.easy_min_accuracy {
            DifficultyBucket::Easy
        } else if accuracy >= self.medium_min_accuracy {
            DifficultyBucket::Medium
        } else if accuracy >= self.hard_min_accuracy {
            DifficultyBucket::Hard
        } else {
            DifficultyBucket::Extreme
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceThresholds {
    /// below this many first attempts the global bucket is `low` confidence
    pub medium_min_samples: u64,
    /// at or above this many first attempts the global bucket is `high`
    pub high_min_samples: u64,
    /// weakest confidence at which the global bucket is trusted for selection
    pub trusted: Confidence,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            medium_min_samples: 10,
            high_min_samples: 30,
            trusted: Confidence::Medium,
        }
    }
}

impl ConfidenceThresholds {
    pub fn confidence_for(&self, samples: u64) -> Confidence {
        if samples < self.medium_min_samples {
            Confidence::Low
        } else if samples < self.high_min_samples {
            Confidence::Medium
        } else {
            Confidence::High
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalDifficultyConfig {
    pub min_samples: u64,
}

impl Default for PersonalDifficultyConfig {
    fn default() -> Self {
        Self { min_samples: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveConfig {
    /// rolling window length; no transition happens before it is full
    pub window_size: usize,
    /// window accuracy strictly below this adapts easier
    pub low_accuracy: f64,
    /// window accuracy strictly above this adapts harder
    pub high_accuracy: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            window_size: 3,
            low_accuracy: 0.60,
            high_accuracy: 0.90,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionPolicy {
    #[serde(default)]
    pub difficulty: DifficultyThresholds,
    #[serde(default)]
    pub confidence: ConfidenceThresholds,
    #[serde(default)]
    pub personal: PersonalDifficultyConfig,
    #[serde(default)]
    pub adaptive: AdaptiveConfig,
}

impl SelectionPolicy {
    pub fn from_env(env_config: &crate::config::SelectionEnvConfig) -> Self {
        let mut policy = Self::default();
        if let Some(window_size) = env_config.window_size {
            policy.adaptive.window_size = window_size;
        }
        if let Some(low) = env_config.low_accuracy {
            policy.adaptive.low_accuracy = low;
        }
        if let Some(high) = env_config.high_accuracy {
            policy.adaptive.high_accuracy = high;
        }
        if let Some(samples) = env_config.min_global_samples {
            policy.confidence.medium_min_samples = samples;
        }
        if let Some(samples) = env_config.high_confidence_samples {
            policy.confidence.high_min_samples = samples;
        }
        if let Some(samples) = env_config.min_personal_samples {
            policy.personal.min_samples = samples;
        }
        policy
    }

    pub fn validate(&self) -> Result<(), String> {
        let d = &self.difficulty;
        for (name, value) in [
            ("difficulty.easy_min_accuracy", d.easy_min_accuracy),
            ("difficulty.medium_min_accuracy", d.medium_min_accuracy),
            ("difficulty.hard_min_accuracy", d.hard_min_accuracy),
            ("adaptive.low_accuracy", self.adaptive.low_accuracy),
            ("adaptive.high_accuracy", self.adaptive.high_accuracy),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{name} must be in [0,1]"));
            }
        }
        if !(d.easy_min_accuracy > d.medium_min_accuracy
            && d.medium_min_accuracy > d.hard_min_accuracy)
        {
            return Err("difficulty thresholds must be strictly descending".to_string());
        }
        if self.confidence.medium_min_samples > self.confidence.high_min_samples {
            return Err(
                "confidence.medium_min_samples must be <= confidence.high_min_samples".to_string(),
            );
        }
        if self.personal.min_samples == 0 {
            return Err("personal.min_samples must be > 0".to_string());
        }
        if self.adaptive.window_size == 0 {
            return Err("adaptive.window_size must be > 0".to_string());
        }
        if self.adaptive.low_accuracy >= self.adaptive.high_accuracy {
            return Err("adaptive.low_accuracy must be < adaptive.high_accuracy".to_string());
        }
        Ok(())
    }
}
