use crate::store::StoreError;

const SEPARATOR: char = ':';

/// Key segments must be non-empty and must not contain the separator,
/// otherwise prefix scans would bleed into neighbouring entities.
fn segment<'a>(name: &str, value: &'a str) -> Result<&'a str, StoreError> {
    if value.is_empty() {
        return Err(StoreError::Validation(format!("{name} must not be empty")));
    }
    if value.contains(SEPARATOR) {
        return Err(StoreError::Validation(format!(
            "{name} must not contain '{SEPARATOR}': {value}"
        )));
    }
    Ok(value)
}

fn timestamp(timestamp_ms: i64) -> u64 {
    timestamp_ms.max(0) as u64
}

pub fn law_key(law_id: &str) -> Result<String, StoreError> {
    Ok(segment("law_id", law_id)?.to_string())
}

pub fn article_key(article_id: &str) -> Result<String, StoreError> {
    Ok(segment("article_id", article_id)?.to_string())
}

pub fn article_law_index_key(
    law_id: &str,
    ordinal: u32,
    article_id: &str,
) -> Result<String, StoreError> {
    Ok(format!(
        "{}:{:010}:{}",
        segment("law_id", law_id)?,
        ordinal,
        segment("article_id", article_id)?
    ))
}

pub fn article_law_prefix(law_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}:", segment("law_id", law_id)?))
}

pub fn question_key(question_id: &str) -> Result<String, StoreError> {
    Ok(segment("question_id", question_id)?.to_string())
}

pub fn question_article_index_key(
    article_id: &str,
    question_id: &str,
) -> Result<String, StoreError> {
    Ok(format!(
        "{}:{}",
        segment("article_id", article_id)?,
        segment("question_id", question_id)?
    ))
}

pub fn question_article_prefix(article_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}:", segment("article_id", article_id)?))
}

pub fn topic_key(topic_id: &str) -> Result<String, StoreError> {
    Ok(segment("topic_id", topic_id)?.to_string())
}

/// Attempts are keyed learner-first so that "everything this learner did in
/// this scope" is one prefix scan; within a question they sort oldest first.
pub fn attempt_key(
    learner_id: &str,
    scope: &str,
    question_id: &str,
    timestamp_ms: i64,
    attempt_id: &str,
) -> Result<String, StoreError> {
    Ok(format!(
        "{}:{}:{}:{:020}:{}",
        segment("learner_id", learner_id)?,
        segment("scope", scope)?,
        segment("question_id", question_id)?,
        timestamp(timestamp_ms),
        segment("attempt_id", attempt_id)?
    ))
}

pub fn attempt_learner_prefix(learner_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}:", segment("learner_id", learner_id)?))
}

pub fn attempt_scope_prefix(learner_id: &str, scope: &str) -> Result<String, StoreError> {
    Ok(format!(
        "{}:{}:",
        segment("learner_id", learner_id)?,
        segment("scope", scope)?
    ))
}

/// First-attempt ledger rows are keyed question-first: population difficulty
/// reads every learner's first answer to one question.
pub fn first_attempt_key(question_id: &str, learner_id: &str) -> Result<String, StoreError> {
    Ok(format!(
        "{}:{}",
        segment("question_id", question_id)?,
        segment("learner_id", learner_id)?
    ))
}

pub fn first_attempt_question_prefix(question_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}:", segment("question_id", question_id)?))
}

pub fn practice_session_key(session_id: &str) -> Result<String, StoreError> {
    Ok(segment("session_id", session_id)?.to_string())
}

pub fn practice_session_learner_index(
    learner_id: &str,
    session_id: &str,
) -> Result<String, StoreError> {
    Ok(format!(
        "learner:{}:{}",
        segment("learner_id", learner_id)?,
        segment("session_id", session_id)?
    ))
}

pub fn practice_session_learner_prefix(learner_id: &str) -> Result<String, StoreError> {
    Ok(format!("learner:{}:", segment("learner_id", learner_id)?))
}

pub fn adaptation_event_key(
    learner_id: &str,
    timestamp_ms: i64,
    event_id: &str,
) -> Result<String, StoreError> {
    let reverse_ts = u64::MAX - timestamp(timestamp_ms);
    Ok(format!(
        "{}:{:020}:{}",
        segment("learner_id", learner_id)?,
        reverse_ts,
        segment("event_id", event_id)?
    ))
}

pub fn adaptation_event_prefix(learner_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}:", segment("learner_id", learner_id)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_keys_sort_oldest_first_within_question() {
        let early = attempt_key("u1", "topic.t1", "q1", 1_000, "a1").unwrap();
        let late = attempt_key("u1", "topic.t1", "q1", 2_000, "a2").unwrap();
        assert!(early < late);
        assert!(early.starts_with(&attempt_scope_prefix("u1", "topic.t1").unwrap()));
    }

    #[test]
    fn adaptation_events_sort_newest_first() {
        let newer = adaptation_event_key("u1", 2_000, "e2").unwrap();
        let older = adaptation_event_key("u1", 1_000, "e1").unwrap();
        assert!(newer < older);
    }

    #[test]
    fn separator_in_segment_is_rejected() {
        let err = attempt_key("u:1", "topic.t1", "q1", 0, "a1").unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(question_key("").is_err());
    }

    #[test]
    fn learner_prefix_does_not_match_longer_ids() {
        let key = attempt_key("u10", "*", "q1", 0, "a1").unwrap();
        assert!(!key.starts_with(&attempt_learner_prefix("u1").unwrap()));
    }
}
