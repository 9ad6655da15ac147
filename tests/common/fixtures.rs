use chrono::{Duration, Utc};

use practice_backend::selection::types::DifficultyBucket;
use practice_backend::store::operations::attempts::Attempt;
use practice_backend::store::operations::content::{
    Article, ArticleSelector, Law, Question, QuestionContent, ScopeEntry, Topic,
};
use practice_backend::store::Store;

/// One active law with `count` articles, one question per article.
/// Question ids are `{law_id}-q{ordinal:02}`.
pub fn seed_law(store: &Store, law_id: &str, count: u32, bucket: DifficultyBucket) -> Vec<Question> {
    store
        .upsert_law(&Law {
            id: law_id.to_string(),
            short_name: law_id.to_uppercase(),
            title: format!("Law {law_id}"),
            active: true,
        })
        .expect("upsert law");

    let mut out = Vec::new();
    for ordinal in 1..=count {
        let article_id = format!("{law_id}-a{ordinal:02}");
        store
            .upsert_article(&Article {
                id: article_id.clone(),
                law_id: law_id.to_string(),
                number: ordinal.to_string(),
                ordinal,
                title: None,
                active: true,
            })
            .expect("upsert article");
        let question = Question {
            id: format!("{law_id}-q{ordinal:02}"),
            article_id,
            content: QuestionContent {
                statement: format!("Question on article {ordinal}"),
                options: vec!["a".to_string(), "b".to_string(), "c".to_string()],
                explanation: None,
            },
            static_difficulty: bucket,
            active: true,
            created_at: Utc::now(),
        };
        store.upsert_question(&question).expect("upsert question");
        out.push(question);
    }
    out
}

pub fn seed_topic(store: &Store, topic_id: &str, entries: Vec<ScopeEntry>) -> Topic {
    let topic = Topic {
        id: topic_id.to_string(),
        title: format!("Topic {topic_id}"),
        description: None,
        scope_entries: entries,
    };
    store.upsert_topic(&topic).expect("upsert topic");
    topic
}

pub fn range_entry(law_id: &str, from: u32, to: u32, program_id: Option<&str>) -> ScopeEntry {
    ScopeEntry {
        source_document_id: law_id.to_string(),
        articles: ArticleSelector::Range {
            from_ordinal: from,
            to_ordinal: to,
        },
        program_id: program_id.map(str::to_string),
    }
}

pub fn seed_attempt(
    store: &Store,
    learner_id: &str,
    question_id: &str,
    scope: &str,
    is_correct: bool,
    minutes_ago: i64,
) -> Attempt {
    let attempt = Attempt {
        id: uuid::Uuid::new_v4().to_string(),
        learner_id: learner_id.to_string(),
        question_id: question_id.to_string(),
        is_correct,
        scope: scope.to_string(),
        session_id: None,
        response_time_ms: Some(4_000),
        created_at: Utc::now() - Duration::minutes(minutes_ago),
    };
    store.record_attempt(&attempt).expect("record attempt");
    attempt
}
