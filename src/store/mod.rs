pub mod keys;
pub mod migrate;
pub mod operations;
pub mod trees;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::Db;
use thiserror::Error;

#[derive(Debug)]
pub struct Store {
    db: Db,
    // Content catalog (read-only to selection)
    pub laws: sled::Tree,
    pub articles: sled::Tree,
    pub questions: sled::Tree,
    pub topics: sled::Tree,
    // Append-only answer history
    pub attempts: sled::Tree,
    pub first_attempts: sled::Tree,
    pub practice_sessions: sled::Tree,
    pub adaptation_events: sled::Tree,
    pub meta: sled::Tree,
    // Secondary index trees
    pub article_law_index: sled::Tree,
    pub question_article_index: sled::Tree,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("conflict: entity={entity}, key={key}")]
    Conflict { entity: String, key: String },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("migration error at version {version}: {message}")]
    Migration { version: u32, message: String },
}

impl Store {
    pub fn open(sled_path: &str) -> Result<Self, StoreError> {
        let db = sled::open(sled_path)?;
        let laws = db.open_tree(trees::LAWS)?;
        let articles = db.open_tree(trees::ARTICLES)?;
        let questions = db.open_tree(trees::QUESTIONS)?;
        let topics = db.open_tree(trees::TOPICS)?;
        let attempts = db.open_tree(trees::ATTEMPTS)?;
        let first_attempts = db.open_tree(trees::FIRST_ATTEMPTS)?;
        let practice_sessions = db.open_tree(trees::PRACTICE_SESSIONS)?;
        let adaptation_events = db.open_tree(trees::ADAPTATION_EVENTS)?;
        let meta = db.open_tree(trees::META)?;
        let article_law_index = db.open_tree(trees::ARTICLE_LAW_INDEX)?;
        let question_article_index = db.open_tree(trees::QUESTION_ARTICLE_INDEX)?;

        Ok(Self {
            db,
            laws,
            articles,
            questions,
            topics,
            attempts,
            first_attempts,
            practice_sessions,
            adaptation_events,
            meta,
            article_law_index,
            question_article_index,
        })
    }

    pub fn run_migrations(&self) -> Result<(), StoreError> {
        migrate::run(self)
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub(crate) fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(value)?)
    }

    pub(crate) fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

pub(crate) fn map_transaction_error(
    error: sled::transaction::TransactionError<StoreError>,
) -> StoreError {
    match error {
        sled::transaction::TransactionError::Abort(store_error) => store_error,
        sled::transaction::TransactionError::Storage(storage_error) => {
            StoreError::Sled(storage_error)
        }
    }
}
