use std::fmt;

use serde::{Deserialize, Serialize};

use crate::selection::SelectionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyBucket {
    Easy,
    Medium,
    Hard,
    Extreme,
}

impl DifficultyBucket {
    pub const ALL: [DifficultyBucket; 4] = [
        DifficultyBucket::Easy,
        DifficultyBucket::Medium,
        DifficultyBucket::Hard,
        DifficultyBucket::Extreme,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DifficultyBucket::Easy => "easy",
            DifficultyBucket::Medium => "medium",
            DifficultyBucket::Hard => "hard",
            DifficultyBucket::Extreme => "extreme",
        }
    }
}

impl fmt::Display for DifficultyBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    #[default]
    Plain,
    Adaptive,
}

/// The scope a learner practices under. Seen/unseen is tracked per exact
/// scope, so the same topic under two programs is two scopes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ScopeTag {
    All,
    #[serde(rename_all = "camelCase")]
    Topic {
        topic_id: String,
        program_id: Option<String>,
    },
}

impl ScopeTag {
    pub fn topic(topic_id: impl Into<String>, program_id: Option<String>) -> Self {
        ScopeTag::Topic {
            topic_id: topic_id.into(),
            program_id: program_id.filter(|p| !p.trim().is_empty()),
        }
    }

    /// Scope from caller-supplied ids. A blank topic means `All`; a program
    /// needs a topic. `@` splits topic from program in the key and `:` splits
    /// store keys, so topic ids may hold neither and program ids no `:`.
    pub fn from_request(
        topic_id: Option<&str>,
        program_id: Option<&str>,
    ) -> Result<Self, SelectionError> {
        let topic_id = topic_id.map(str::trim).filter(|t| !t.is_empty());
        let program_id = program_id.map(str::trim).filter(|p| !p.is_empty());
        match (topic_id, program_id) {
            (None, None) => Ok(ScopeTag::All),
            (None, Some(_)) => Err(SelectionError::InvalidRequest(
                "programId requires topicId".to_string(),
            )),
            (Some(topic_id), program_id) => {
                reject_reserved("topicId", topic_id, &['@', ':'])?;
                if let Some(program_id) = program_id {
                    reject_reserved("programId", program_id, &[':'])?;
                }
                Ok(ScopeTag::topic(topic_id, program_id.map(str::to_string)))
            }
        }
    }

    /// Stable string form recorded on every attempt.
    pub fn as_key(&self) -> String {
        match self {
            ScopeTag::All => "*".to_string(),
            ScopeTag::Topic {
                topic_id,
                program_id: None,
            } => format!("topic.{topic_id}"),
            ScopeTag::Topic {
                topic_id,
                program_id: Some(program_id),
            } => format!("topic.{topic_id}@{program_id}"),
        }
    }
}

fn reject_reserved(name: &str, value: &str, reserved: &[char]) -> Result<(), SelectionError> {
    match value.chars().find(|c| reserved.contains(c)) {
        Some(c) => Err(SelectionError::InvalidRequest(format!(
            "{name} must not contain '{c}'"
        ))),
        None => Ok(()),
    }
}

impl fmt::Display for ScopeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_key())
    }
}

/// One list per difficulty bucket. Every bucket always exists, so callers
/// never have to handle a missing one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketMap<T> {
    pub easy: Vec<T>,
    pub medium: Vec<T>,
    pub hard: Vec<T>,
    pub extreme: Vec<T>,
}

impl<T> Default for BucketMap<T> {
    fn default() -> Self {
        Self {
            easy: Vec::new(),
            medium: Vec::new(),
            hard: Vec::new(),
            extreme: Vec::new(),
        }
    }
}

impl<T> BucketMap<T> {
    pub fn get(&self, bucket: DifficultyBucket) -> &[T] {
        match bucket {
            DifficultyBucket::Easy => &self.easy,
            DifficultyBucket::Medium => &self.medium,
            DifficultyBucket::Hard => &self.hard,
            DifficultyBucket::Extreme => &self.extreme,
        }
    }

    pub fn get_mut(&mut self, bucket: DifficultyBucket) -> &mut Vec<T> {
        match bucket {
            DifficultyBucket::Easy => &mut self.easy,
            DifficultyBucket::Medium => &mut self.medium,
            DifficultyBucket::Hard => &mut self.hard,
            DifficultyBucket::Extreme => &mut self.extreme,
        }
    }

    pub fn push(&mut self, bucket: DifficultyBucket, item: T) {
        self.get_mut(bucket).push(item);
    }

    pub fn len(&self) -> usize {
        self.easy.len() + self.medium.len() + self.hard.len() + self.extreme.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sizes(&self) -> BucketSizes {
        BucketSizes {
            easy: self.easy.len(),
            medium: self.medium.len(),
            hard: self.hard.len(),
            extreme: self.extreme.len(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (DifficultyBucket, &[T])> + '_ {
        DifficultyBucket::ALL
            .into_iter()
            .map(move |bucket| (bucket, self.get(bucket)))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketSizes {
    pub easy: usize,
    pub medium: usize,
    pub hard: usize,
    pub extreme: usize,
}
