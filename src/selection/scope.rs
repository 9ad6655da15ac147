//! Topic scope resolution: topic → scope entries → articles → active questions.
//!
//! Content is curated elsewhere and can be inconsistent. Entries that point
//! at unknown source documents or missing articles are skipped and reported
//! as data-quality warnings; they never fail the request.

use std::collections::HashSet;

use serde::Serialize;

use crate::selection::types::ScopeTag;
use crate::selection::SelectionError;
use crate::store::operations::content::{Article, ArticleSelector, Question, ScopeEntry};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DataQualityWarning {
    #[serde(rename_all = "camelCase")]
    UnknownSourceDocument {
        entry_index: usize,
        source_document_id: String,
    },
    #[serde(rename_all = "camelCase")]
    DanglingArticles {
        entry_index: usize,
        article_ids: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    InvertedRange {
        entry_index: usize,
        from_ordinal: u32,
        to_ordinal: u32,
    },
    #[serde(rename_all = "camelCase")]
    OrphanQuestions { question_ids: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct ResolvedScope {
    pub tag: ScopeTag,
    /// Active questions in curated order: entry order, then article
    /// ordinal, then question id. Never empty.
    pub questions: Vec<Question>,
    pub warnings: Vec<DataQualityWarning>,
}

impl ResolvedScope {
    pub fn question_ids(&self) -> HashSet<&str> {
        self.questions.iter().map(|q| q.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

pub fn resolve_scope(store: &Store, scope: &ScopeTag) -> Result<ResolvedScope, SelectionError> {
    let (questions, warnings) = match scope {
        ScopeTag::All => resolve_all(store)?,
        ScopeTag::Topic {
            topic_id,
            program_id,
        } => resolve_topic(store, topic_id, program_id.as_deref())?,
    };

    for warning in &warnings {
        tracing::warn!(target: "data_quality", scope = %scope, ?warning, "Skipped inconsistent scope content");
    }

    if questions.is_empty() {
        return Err(SelectionError::EmptyScope {
            scope: scope.as_key(),
        });
    }

    tracing::debug!(scope = %scope, questions = questions.len(), "Scope resolved");
    Ok(ResolvedScope {
        tag: scope.clone(),
        questions,
        warnings,
    })
}

fn resolve_all(store: &Store) -> Result<(Vec<Question>, Vec<DataQualityWarning>), SelectionError> {
    let mut questions = Vec::new();
    let mut orphans = Vec::new();
    for question in store.list_active_questions()? {
        match store.get_article(&question.article_id)? {
            Some(article) if article.active => questions.push(question),
            _ => orphans.push(question.id),
        }
    }

    let warnings = if orphans.is_empty() {
        Vec::new()
    } else {
        vec![DataQualityWarning::OrphanQuestions {
            question_ids: orphans,
        }]
    };
    Ok((questions, warnings))
}

fn resolve_topic(
    store: &Store,
    topic_id: &str,
    program_id: Option<&str>,
) -> Result<(Vec<Question>, Vec<DataQualityWarning>), SelectionError> {
    let topic = store
        .get_topic(topic_id)?
        .ok_or_else(|| SelectionError::TopicNotFound {
            topic_id: topic_id.to_string(),
        })?;

    let mut questions = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut warnings = Vec::new();

    for (entry_index, entry) in topic.scope_entries.iter().enumerate() {
        if !entry.applies_to(program_id) {
            continue;
        }

        let Some(articles) = resolve_entry_articles(store, entry_index, entry, &mut warnings)?
        else {
            continue;
        };

        for article in articles {
            for question in store.list_article_questions(&article.id)? {
                if question.active && seen.insert(question.id.clone()) {
                    questions.push(question);
                }
            }
        }
    }

    Ok((questions, warnings))
}

/// `None` when the whole entry has to be skipped.
fn resolve_entry_articles(
    store: &Store,
    entry_index: usize,
    entry: &ScopeEntry,
    warnings: &mut Vec<DataQualityWarning>,
) -> Result<Option<Vec<Article>>, SelectionError> {
    let law_id = entry.source_document_id.as_str();
    let law_active = store.get_law(law_id)?.map(|law| law.active).unwrap_or(false);
    if !law_active {
        warnings.push(DataQualityWarning::UnknownSourceDocument {
            entry_index,
            source_document_id: law_id.to_string(),
        });
        return Ok(None);
    }

    match &entry.articles {
        ArticleSelector::Set { article_ids } => {
            let mut articles = Vec::with_capacity(article_ids.len());
            let mut dangling = Vec::new();
            for article_id in article_ids {
                match store.get_article(article_id)? {
                    Some(article) if article.active && article.law_id == law_id => {
                        articles.push(article)
                    }
                    _ => dangling.push(article_id.clone()),
                }
            }
            if !dangling.is_empty() {
                warnings.push(DataQualityWarning::DanglingArticles {
                    entry_index,
                    article_ids: dangling,
                });
            }
            articles.sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then(a.id.cmp(&b.id)));
            Ok(Some(articles))
        }
        ArticleSelector::Range {
            from_ordinal,
            to_ordinal,
        } => {
            if from_ordinal > to_ordinal {
                warnings.push(DataQualityWarning::InvertedRange {
                    entry_index,
                    from_ordinal: *from_ordinal,
                    to_ordinal: *to_ordinal,
                });
                return Ok(None);
            }
            let articles = store
                .list_law_articles_in_range(law_id, *from_ordinal, *to_ordinal)?
                .into_iter()
                .filter(|article| article.active)
                .collect();
            Ok(Some(articles))
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::tempdir;

    use super::*;
    use crate::selection::types::DifficultyBucket;
    use crate::store::operations::content::{Law, QuestionContent, Topic};

    fn open_store(name: &str) -> (tempfile::TempDir, Store) {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join(name).to_str().unwrap()).unwrap();
        (dir, store)
    }

    fn seed_law(store: &Store, law_id: &str, articles: u32, questions_per_article: u32) {
        store
            .upsert_law(&Law {
                id: law_id.to_string(),
                short_name: law_id.to_uppercase(),
                title: format!("Law {law_id}"),
                active: true,
            })
            .unwrap();
        for ordinal in 1..=articles {
            let article_id = format!("{law_id}-art{ordinal}");
            store
                .upsert_article(&Article {
                    id: article_id.clone(),
                    law_id: law_id.to_string(),
                    number: ordinal.to_string(),
                    ordinal,
                    title: None,
                    active: true,
                })
                .unwrap();
            for n in 0..questions_per_article {
                store
                    .upsert_question(&Question {
                        id: format!("{article_id}-q{n}"),
                        article_id: article_id.clone(),
                        content: QuestionContent {
                            statement: "?".to_string(),
                            options: vec![],
                            explanation: None,
                        },
                        static_difficulty: DifficultyBucket::Medium,
                        active: true,
                        created_at: Utc::now(),
                    })
                    .unwrap();
            }
        }
    }

    fn topic(id: &str, entries: Vec<ScopeEntry>) -> Topic {
        Topic {
            id: id.to_string(),
            title: id.to_string(),
            description: None,
            scope_entries: entries,
        }
    }

    fn range(law: &str, from: u32, to: u32) -> ScopeEntry {
        ScopeEntry {
            source_document_id: law.to_string(),
            articles: ArticleSelector::Range {
                from_ordinal: from,
                to_ordinal: to,
            },
            program_id: None,
        }
    }

    #[test]
    fn union_of_entries_is_deduplicated() {
        let (_dir, store) = open_store("scope-union");
        seed_law(&store, "ce", 5, 2);
        store
            .upsert_topic(&topic("t1", vec![range("ce", 1, 3), range("ce", 2, 4)]))
            .unwrap();

        let resolved = resolve_scope(&store, &ScopeTag::topic("t1", None)).unwrap();
        assert_eq!(resolved.len(), 8);
        assert_eq!(resolved.question_ids().len(), 8);
        assert!(resolved.warnings.is_empty());
        assert_eq!(resolved.questions[0].id, "ce-art1-q0");
    }

    #[test]
    fn dangling_article_is_skipped_with_one_warning() {
        let (_dir, store) = open_store("scope-dangling");
        seed_law(&store, "ce", 2, 1);
        store
            .upsert_topic(&topic(
                "t1",
                vec![
                    range("ce", 1, 2),
                    ScopeEntry {
                        source_document_id: "ce".to_string(),
                        articles: ArticleSelector::Set {
                            article_ids: vec!["ce-art99".to_string()],
                        },
                        program_id: None,
                    },
                ],
            ))
            .unwrap();

        let resolved = resolve_scope(&store, &ScopeTag::topic("t1", None)).unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(
            resolved.warnings,
            vec![DataQualityWarning::DanglingArticles {
                entry_index: 1,
                article_ids: vec!["ce-art99".to_string()],
            }]
        );
    }

    #[test]
    fn unknown_source_document_is_skipped() {
        let (_dir, store) = open_store("scope-unknown-law");
        seed_law(&store, "ce", 1, 1);
        store
            .upsert_topic(&topic("t1", vec![range("missing", 1, 9), range("ce", 1, 1)]))
            .unwrap();

        let resolved = resolve_scope(&store, &ScopeTag::topic("t1", None)).unwrap();
        assert_eq!(resolved.len(), 1);
        assert!(matches!(
            resolved.warnings[0],
            DataQualityWarning::UnknownSourceDocument { entry_index: 0, .. }
        ));
    }

    #[test]
    fn topic_without_content_is_empty_scope() {
        let (_dir, store) = open_store("scope-empty");
        seed_law(&store, "ce", 1, 0);
        store.upsert_topic(&topic("t1", vec![range("ce", 1, 1)])).unwrap();

        let err = resolve_scope(&store, &ScopeTag::topic("t1", None)).unwrap_err();
        assert!(matches!(err, SelectionError::EmptyScope { .. }));
    }

    #[test]
    fn missing_topic_is_reported() {
        let (_dir, store) = open_store("scope-missing-topic");
        let err = resolve_scope(&store, &ScopeTag::topic("nope", None)).unwrap_err();
        assert!(matches!(err, SelectionError::TopicNotFound { .. }));
    }

    #[test]
    fn program_entries_extend_the_shared_scope() {
        let (_dir, store) = open_store("scope-program");
        seed_law(&store, "ce", 4, 1);
        let mut notary_only = range("ce", 3, 4);
        notary_only.program_id = Some("notary".to_string());
        store
            .upsert_topic(&topic("t1", vec![range("ce", 1, 2), notary_only]))
            .unwrap();

        let shared = resolve_scope(&store, &ScopeTag::topic("t1", None)).unwrap();
        let notary =
            resolve_scope(&store, &ScopeTag::topic("t1", Some("notary".to_string()))).unwrap();
        assert_eq!(shared.len(), 2);
        assert_eq!(notary.len(), 4);
    }

    #[test]
    fn inactive_questions_do_not_participate() {
        let (_dir, store) = open_store("scope-inactive");
        seed_law(&store, "ce", 1, 2);
        let mut q = store.get_question("ce-art1-q0").unwrap().unwrap();
        q.active = false;
        store.upsert_question(&q).unwrap();
        store.upsert_topic(&topic("t1", vec![range("ce", 1, 1)])).unwrap();

        let resolved = resolve_scope(&store, &ScopeTag::topic("t1", None)).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved.questions[0].id, "ce-art1-q1");
    }
}
