//! Loads the read-only content catalog (laws, articles, questions, topics)
//! from a JSON snapshot exported by the content-management service.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::operations::content::{Article, Law, Question, Topic};
use crate::store::{Store, StoreError};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSnapshot {
    #[serde(default)]
    pub laws: Vec<Law>,
    #[serde(default)]
    pub articles: Vec<Article>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub topics: Vec<Topic>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSummary {
    pub laws: usize,
    pub articles: usize,
    pub questions: usize,
    pub topics: usize,
}

#[derive(Debug, Error)]
pub enum ContentSyncError {
    #[error("failed to read snapshot {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid snapshot: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Upserts every record; existing ids are overwritten, nothing is deleted.
pub fn apply_snapshot(
    store: &Store,
    snapshot: &ContentSnapshot,
) -> Result<ContentSummary, StoreError> {
    for law in &snapshot.laws {
        store.upsert_law(law)?;
    }
    for article in &snapshot.articles {
        store.upsert_article(article)?;
    }
    for question in &snapshot.questions {
        store.upsert_question(question)?;
    }
    for topic in &snapshot.topics {
        store.upsert_topic(topic)?;
    }
    store.flush()?;

    Ok(ContentSummary {
        laws: snapshot.laws.len(),
        articles: snapshot.articles.len(),
        questions: snapshot.questions.len(),
        topics: snapshot.topics.len(),
    })
}

pub async fn load_content_snapshot(
    store: &Store,
    path: &Path,
) -> Result<ContentSummary, ContentSyncError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ContentSyncError::Io {
            path: path.display().to_string(),
            source,
        })?;
    let snapshot: ContentSnapshot = serde_json::from_str(&raw)?;
    let summary = apply_snapshot(store, &snapshot)?;
    tracing::info!(
        path = %path.display(),
        laws = summary.laws,
        articles = summary.articles,
        questions = summary.questions,
        topics = summary.topics,
        "Content snapshot loaded"
    );
    Ok(summary)
}
