use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::selection::types::{ScopeTag, SelectionMode};
use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSessionRecord {
    pub id: String,
    pub learner_id: String,
    pub scope: ScopeTag,
    pub mode: SelectionMode,
    pub requested_count: usize,
    pub delivered_count: usize,
    pub answered_count: usize,
    pub adaptations: u32,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Abandoned,
}

impl Store {
    pub fn create_practice_session(
        &self,
        session: &PracticeSessionRecord,
    ) -> Result<(), StoreError> {
        let key = keys::practice_session_key(&session.id)?;
        let index_key = keys::practice_session_learner_index(&session.learner_id, &session.id)?;
        let session_bytes = Self::serialize(session)?;

        self.practice_sessions
            .transaction(|tx| {
                tx.insert(key.as_bytes(), session_bytes.as_slice())?;
                tx.insert(index_key.as_bytes(), &[] as &[u8])?;
                Ok(())
            })
            .map_err(
                |e: sled::transaction::TransactionError<()>| match e {
                    sled::transaction::TransactionError::Abort(()) => StoreError::Sled(
                        sled::Error::Unsupported("transaction aborted".into()),
                    ),
                    sled::transaction::TransactionError::Storage(se) => StoreError::Sled(se),
                },
            )?;
        Ok(())
    }

    pub fn get_practice_session(
        &self,
        session_id: &str,
    ) -> Result<Option<PracticeSessionRecord>, StoreError> {
        let key = keys::practice_session_key(session_id)?;
        match self.practice_sessions.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn update_practice_session(
        &self,
        session: &PracticeSessionRecord,
    ) -> Result<(), StoreError> {
        let key = keys::practice_session_key(&session.id)?;
        self.practice_sessions
            .insert(key.as_bytes(), Self::serialize(session)?)?;
        Ok(())
    }

    pub fn list_learner_practice_sessions(
        &self,
        learner_id: &str,
    ) -> Result<Vec<PracticeSessionRecord>, StoreError> {
        let prefix = keys::practice_session_learner_prefix(learner_id)?;
        let mut sessions = Vec::new();
        for item in self.practice_sessions.scan_prefix(prefix.as_bytes()) {
            let (k, _) = item?;
            let key_str = String::from_utf8_lossy(&k).to_string();
            if let Some(session_id) = key_str.rsplit(':').next() {
                if let Some(session) = self.get_practice_session(session_id)? {
                    sessions.push(session);
                }
            }
        }
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    /// Marks a session as no longer active. Completed sessions stay completed.
    pub fn close_practice_session(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> Result<Option<PracticeSessionRecord>, StoreError> {
        let Some(mut session) = self.get_practice_session(session_id)? else {
            return Ok(None);
        };
        if session.status == SessionStatus::Active {
            session.status = status;
            session.updated_at = Utc::now();
            self.update_practice_session(&session)?;
        }
        Ok(Some(session))
    }
}
