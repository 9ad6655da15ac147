//! Question selection core.
//!
//! scope → pool → engine (+ catalog) → session runtime → adaptive controller.
//! Everything below `pool` is in-memory; only scope resolution, pool building
//! and classification touch the store.

pub mod adaptive;
pub mod catalog;
pub mod difficulty;
pub mod engine;
pub mod history;
pub mod policy;
pub mod pool;
pub mod scope;
pub mod session;
pub mod types;

use thiserror::Error;

use crate::store::StoreError;

pub use adaptive::{AdaptationEvent, AdaptationOutcome, AdaptiveController, ControllerState};
pub use catalog::AdaptiveCatalog;
pub use difficulty::{DifficultyClassifier, EffectiveDifficulty};
pub use engine::{SelectionOutcome, SelectionRequest, SelectionStatus};
pub use history::AttemptHistory;
pub use policy::SelectionPolicy;
pub use pool::CandidatePool;
pub use scope::ResolvedScope;
pub use session::PracticeSession;
pub use types::{BucketMap, Confidence, DifficultyBucket, ScopeTag, SelectionMode};

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("scope {scope} has no active questions")]
    EmptyScope { scope: String },

    #[error("topic not found: {topic_id}")]
    TopicNotFound { topic_id: String },

    /// History or catalog could not be read. Never downgraded to an empty pool.
    #[error("pool build failed: {reason}")]
    PoolBuildFailed { reason: String },

    #[error("invalid selection request: {0}")]
    InvalidRequest(String),
}

impl From<StoreError> for SelectionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(message) => SelectionError::InvalidRequest(message),
            other => SelectionError::PoolBuildFailed {
                reason: other.to_string(),
            },
        }
    }
}
