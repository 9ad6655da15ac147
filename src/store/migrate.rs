use std::collections::HashMap;

use crate::store::keys;
use crate::store::operations::attempts::{Attempt, FirstAttemptRecord};
use crate::store::operations::content::{Article, Question};
use crate::store::{Store, StoreError};

const VERSION_KEY: &str = "_meta:version";

type MigrationFn = fn(&Store) -> Result<(), StoreError>;

fn migrations() -> Vec<(&'static str, MigrationFn)> {
    vec![
        ("001_initial", m001_initial),
        ("002_content_indexes", m002_content_indexes),
        ("003_first_attempt_backfill", m003_first_attempt_backfill),
    ]
}

/// 执行所有未应用的数据库迁移。
///
/// 每个迁移必须幂等：进程可能在迁移完成后、版本号写入前崩溃，重启后会重跑。
/// 版本号只进不退。
pub fn run(store: &Store) -> Result<(), StoreError> {
    let current = get_current_version(store)?;

    for (index, (name, func)) in migrations().iter().enumerate() {
        let version = (index + 1) as u32;
        if version > current {
            tracing::info!(version, name, "Running migration");
            func(store)?;
            set_version(store, version)?;
            tracing::info!(version, name, "Migration complete");
        } else {
            tracing::debug!(version, name, "Migration already applied, skipping");
        }
    }

    Ok(())
}

pub fn get_current_version(store: &Store) -> Result<u32, StoreError> {
    match store.meta.get(VERSION_KEY.as_bytes())? {
        Some(raw) => {
            let bytes: [u8; 4] = raw.as_ref().try_into().map_err(|_| StoreError::Migration {
                version: 0,
                message: format!("unreadable version marker ({} bytes)", raw.len()),
            })?;
            Ok(u32::from_be_bytes(bytes))
        }
        None => Ok(0),
    }
}

pub fn set_version(store: &Store, version: u32) -> Result<(), StoreError> {
    let current = get_current_version(store)?;
    if version < current {
        return Err(StoreError::Migration {
            version,
            message: format!("Refuse to downgrade from {} to {}", current, version),
        });
    }

    store
        .meta
        .insert(VERSION_KEY.as_bytes(), &version.to_be_bytes())?;
    Ok(())
}

fn m001_initial(_store: &Store) -> Result<(), StoreError> {
    Ok(())
}

/// Rebuilds article→law and question→article indexes from the primary trees.
fn m002_content_indexes(store: &Store) -> Result<(), StoreError> {
    for item in store.articles.iter() {
        let (_, value) = item?;
        let article: Article = Store::deserialize(&value)?;
        let index_key = keys::article_law_index_key(&article.law_id, article.ordinal, &article.id)?;
        store
            .article_law_index
            .insert(index_key.as_bytes(), article.id.as_bytes())?;
    }

    for item in store.questions.iter() {
        let (_, value) = item?;
        let question: Question = Store::deserialize(&value)?;
        let index_key = keys::question_article_index_key(&question.article_id, &question.id)?;
        store
            .question_article_index
            .insert(index_key.as_bytes(), question.id.as_bytes())?;
    }

    Ok(())
}

/// Fills ledger rows for (learner, question) pairs that have attempts but no
/// ledger row, using the earliest attempt. Existing rows are never touched.
fn m003_first_attempt_backfill(store: &Store) -> Result<(), StoreError> {
    let mut earliest: HashMap<(String, String), Attempt> = HashMap::new();
    for item in store.attempts.iter() {
        let (_, value) = item?;
        let attempt: Attempt = Store::deserialize(&value)?;
        let pair = (attempt.learner_id.clone(), attempt.question_id.clone());
        let replace = match earliest.get(&pair) {
            Some(current) => (current.created_at, &current.id) > (attempt.created_at, &attempt.id),
            None => true,
        };
        if replace {
            earliest.insert(pair, attempt);
        }
    }

    let mut inserted = 0usize;
    for attempt in earliest.values() {
        let key = keys::first_attempt_key(&attempt.question_id, &attempt.learner_id)?;
        let record = FirstAttemptRecord {
            learner_id: attempt.learner_id.clone(),
            question_id: attempt.question_id.clone(),
            is_correct: attempt.is_correct,
            attempt_id: attempt.id.clone(),
            created_at: attempt.created_at,
        };
        let bytes = Store::serialize(&record)?;
        if store
            .first_attempts
            .compare_and_swap(key.as_bytes(), None as Option<&[u8]>, Some(bytes))?
            .is_ok()
        {
            inserted += 1;
        }
    }

    if inserted > 0 {
        tracing::info!(inserted, "Backfilled first-attempt ledger rows");
    }
    Ok(())
}
