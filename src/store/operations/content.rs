use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::Transactional;
use std::collections::HashMap;

use crate::selection::types::DifficultyBucket;
use crate::store::keys;
use crate::store::{map_transaction_error, Store, StoreError};

/// A source document (statute, code, regulation) questions are written against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Law {
    pub id: String,
    pub short_name: String,
    pub title: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub law_id: String,
    /// Display number, e.g. "14" or "14 bis".
    pub number: String,
    /// Position inside the law; article ranges are expressed in ordinals.
    pub ordinal: u32,
    pub title: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionContent {
    pub statement: String,
    pub options: Vec<String>,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub article_id: String,
    pub content: QuestionContent,
    /// Author-assigned label, the last fallback for effective difficulty.
    pub static_difficulty: DifficultyBucket,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ArticleSelector {
    #[serde(rename_all = "camelCase")]
    Set { article_ids: Vec<String> },
    /// Inclusive ordinal range inside the entry's source document.
    #[serde(rename_all = "camelCase")]
    Range { from_ordinal: u32, to_ordinal: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeEntry {
    pub source_document_id: String,
    pub articles: ArticleSelector,
    /// Entries tagged with a program only apply when practicing that program.
    #[serde(default)]
    pub program_id: Option<String>,
}

impl ScopeEntry {
    pub fn applies_to(&self, program_id: Option<&str>) -> bool {
        match self.program_id.as_deref() {
            None => true,
            Some(entry_program) => program_id == Some(entry_program),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub scope_entries: Vec<ScopeEntry>,
}

impl Store {
    pub fn upsert_law(&self, law: &Law) -> Result<(), StoreError> {
        let key = keys::law_key(&law.id)?;
        self.laws.insert(key.as_bytes(), Self::serialize(law)?)?;
        Ok(())
    }

    pub fn get_law(&self, law_id: &str) -> Result<Option<Law>, StoreError> {
        let key = keys::law_key(law_id)?;
        match self.laws.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn upsert_article(&self, article: &Article) -> Result<(), StoreError> {
        let key = keys::article_key(&article.id)?;
        let bytes = Self::serialize(article)?;
        let index_key = keys::article_law_index_key(&article.law_id, article.ordinal, &article.id)?;
        let previous_index_key = match self.get_article(&article.id)? {
            Some(old) => Some(keys::article_law_index_key(
                &old.law_id,
                old.ordinal,
                &old.id,
            )?),
            None => None,
        };

        (&self.articles, &self.article_law_index)
            .transaction(|(tx_articles, tx_index)| {
                if let Some(old_key) = &previous_index_key {
                    tx_index.remove(old_key.as_bytes())?;
                }
                tx_articles.insert(key.as_bytes(), bytes.as_slice())?;
                tx_index.insert(index_key.as_bytes(), article.id.as_bytes())?;
                Ok(())
            })
            .map_err(map_transaction_error)?;
        Ok(())
    }

    pub fn get_article(&self, article_id: &str) -> Result<Option<Article>, StoreError> {
        let key = keys::article_key(article_id)?;
        match self.articles.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// Articles of one law whose ordinal lies in `[from, to]`, in ordinal order.
    pub fn list_law_articles_in_range(
        &self,
        law_id: &str,
        from_ordinal: u32,
        to_ordinal: u32,
    ) -> Result<Vec<Article>, StoreError> {
        if from_ordinal > to_ordinal {
            return Ok(Vec::new());
        }
        let prefix = keys::article_law_prefix(law_id)?;
        let start = format!("{prefix}{:010}:", from_ordinal);
        let end = format!("{prefix}{:010}:", u64::from(to_ordinal) + 1);

        let mut articles = Vec::new();
        for item in self.article_law_index.range(start.as_bytes()..end.as_bytes()) {
            let (_, value) = item?;
            let article_id = String::from_utf8_lossy(&value).to_string();
            if let Some(article) = self.get_article(&article_id)? {
                articles.push(article);
            }
        }
        Ok(articles)
    }

    pub fn upsert_question(&self, question: &Question) -> Result<(), StoreError> {
        let key = keys::question_key(&question.id)?;
        let bytes = Self::serialize(question)?;
        let index_key = keys::question_article_index_key(&question.article_id, &question.id)?;
        let previous_index_key = match self.get_question(&question.id)? {
            Some(old) if old.article_id != question.article_id => Some(
                keys::question_article_index_key(&old.article_id, &old.id)?,
            ),
            _ => None,
        };

        (&self.questions, &self.question_article_index)
            .transaction(|(tx_questions, tx_index)| {
                if let Some(old_key) = &previous_index_key {
                    tx_index.remove(old_key.as_bytes())?;
                }
                tx_questions.insert(key.as_bytes(), bytes.as_slice())?;
                tx_index.insert(index_key.as_bytes(), question.id.as_bytes())?;
                Ok(())
            })
            .map_err(map_transaction_error)?;
        Ok(())
    }

    pub fn get_question(&self, question_id: &str) -> Result<Option<Question>, StoreError> {
        let key = keys::question_key(question_id)?;
        match self.questions.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// 批量获取题目（仅返回存在的题目）
    pub fn get_questions_by_ids(
        &self,
        question_ids: &[String],
    ) -> Result<HashMap<String, Question>, StoreError> {
        let mut questions = HashMap::with_capacity(question_ids.len());
        for question_id in question_ids {
            if questions.contains_key(question_id) {
                continue;
            }
            if let Some(question) = self.get_question(question_id)? {
                questions.insert(question_id.clone(), question);
            }
        }
        Ok(questions)
    }

    pub fn list_article_questions(&self, article_id: &str) -> Result<Vec<Question>, StoreError> {
        let prefix = keys::question_article_prefix(article_id)?;
        let mut questions = Vec::new();
        for item in self.question_article_index.scan_prefix(prefix.as_bytes()) {
            let (_, value) = item?;
            let question_id = String::from_utf8_lossy(&value).to_string();
            if let Some(question) = self.get_question(&question_id)? {
                questions.push(question);
            }
        }
        Ok(questions)
    }

    pub fn list_active_questions(&self) -> Result<Vec<Question>, StoreError> {
        let mut questions = Vec::new();
        for item in self.questions.iter() {
            let (_, value) = item?;
            let question: Question = Self::deserialize(&value)?;
            if question.active {
                questions.push(question);
            }
        }
        Ok(questions)
    }

    pub fn count_questions(&self) -> u64 {
        self.questions.len() as u64
    }

    pub fn upsert_topic(&self, topic: &Topic) -> Result<(), StoreError> {
        let key = keys::topic_key(&topic.id)?;
        self.topics.insert(key.as_bytes(), Self::serialize(topic)?)?;
        Ok(())
    }

    pub fn get_topic(&self, topic_id: &str) -> Result<Option<Topic>, StoreError> {
        let key = keys::topic_key(topic_id)?;
        match self.topics.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn article(id: &str, law_id: &str, ordinal: u32) -> Article {
        Article {
            id: id.to_string(),
            law_id: law_id.to_string(),
            number: ordinal.to_string(),
            ordinal,
            title: None,
            active: true,
        }
    }

    fn question(id: &str, article_id: &str) -> Question {
        Question {
            id: id.to_string(),
            article_id: article_id.to_string(),
            content: QuestionContent {
                statement: format!("statement {id}"),
                options: vec!["a".to_string(), "b".to_string()],
                explanation: None,
            },
            static_difficulty: DifficultyBucket::Medium,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn article_range_is_inclusive_and_law_scoped() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("content-db").to_str().unwrap()).unwrap();

        for ordinal in 1..=5 {
            store
                .upsert_article(&article(&format!("ce-{ordinal}"), "ce", ordinal))
                .unwrap();
        }
        store.upsert_article(&article("cc-3", "cc", 3)).unwrap();

        let ids: Vec<String> = store
            .list_law_articles_in_range("ce", 2, 4)
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec!["ce-2", "ce-3", "ce-4"]);
        assert!(store.list_law_articles_in_range("ce", 4, 2).unwrap().is_empty());
    }

    #[test]
    fn moving_an_article_rewrites_its_index_entry() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("content-move").to_str().unwrap()).unwrap();

        store.upsert_article(&article("a1", "ce", 1)).unwrap();
        store.upsert_article(&article("a1", "ce", 9)).unwrap();

        assert!(store.list_law_articles_in_range("ce", 1, 1).unwrap().is_empty());
        assert_eq!(store.list_law_articles_in_range("ce", 9, 9).unwrap().len(), 1);
    }

    #[test]
    fn relinking_a_question_moves_it_between_articles() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("content-relink").to_str().unwrap()).unwrap();

        store.upsert_question(&question("q1", "a1")).unwrap();
        store.upsert_question(&question("q1", "a2")).unwrap();

        assert!(store.list_article_questions("a1").unwrap().is_empty());
        assert_eq!(store.list_article_questions("a2").unwrap().len(), 1);
    }

    #[test]
    fn program_restricted_entries_only_apply_to_their_program() {
        let entry = ScopeEntry {
            source_document_id: "ce".to_string(),
            articles: ArticleSelector::Range {
                from_ordinal: 1,
                to_ordinal: 3,
            },
            program_id: Some("notary".to_string()),
        };
        assert!(entry.applies_to(Some("notary")));
        assert!(!entry.applies_to(Some("judge")));
        assert!(!entry.applies_to(None));
    }
}
