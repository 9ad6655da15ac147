use std::collections::HashSet;

use serde::Serialize;

use crate::selection::engine::SelectedQuestion;
use crate::selection::types::{BucketMap, BucketSizes, DifficultyBucket};

/// The whole candidate pool bucketed by effective difficulty, kept by one
/// session so adaptation never goes back to the store.
#[derive(Debug, Clone, Default)]
pub struct AdaptiveCatalog {
    pub never_seen: BucketMap<SelectedQuestion>,
    pub answered: BucketMap<SelectedQuestion>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSizes {
    pub never_seen: BucketSizes,
    pub answered: BucketSizes,
}

impl AdaptiveCatalog {
    /// Both inputs must already be in selection order; bucket order follows it.
    pub fn build(never_seen: &[SelectedQuestion], answered: &[SelectedQuestion]) -> Self {
        let mut catalog = Self::default();
        for item in never_seen {
            catalog.never_seen.push(item.difficulty, item.clone());
        }
        for item in answered {
            catalog.answered.push(item.difficulty, item.clone());
        }
        catalog
    }

    pub fn sizes(&self) -> CatalogSizes {
        CatalogSizes {
            never_seen: self.never_seen.sizes(),
            answered: self.answered.sizes(),
        }
    }

    pub fn len(&self) -> usize {
        self.never_seen.len() + self.answered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Up to `limit` questions, skipping anything in `exclude`. Never-seen
    /// questions from every bucket in `buckets` come before any answered one;
    /// within each pass buckets are walked in order.
    pub fn draw(
        &self,
        buckets: &[DifficultyBucket],
        exclude: &HashSet<String>,
        limit: usize,
    ) -> Vec<SelectedQuestion> {
        let mut drawn: Vec<SelectedQuestion> = Vec::new();
        let mut taken: HashSet<&str> = HashSet::new();
        let candidates = buckets
            .iter()
            .flat_map(|&bucket| self.never_seen.get(bucket).iter())
            .chain(
                buckets
                    .iter()
                    .flat_map(|&bucket| self.answered.get(bucket).iter()),
            );
        for candidate in candidates {
            if drawn.len() >= limit {
                break;
            }
            let id = candidate.question.id.as_str();
            if exclude.contains(id) || !taken.insert(id) {
                continue;
            }
            drawn.push(candidate.clone());
        }
        drawn
    }
}
