pub const LAWS: &str = "laws";
pub const ARTICLES: &str = "articles";
pub const QUESTIONS: &str = "questions";
pub const TOPICS: &str = "topics";

pub const ATTEMPTS: &str = "attempts";
pub const FIRST_ATTEMPTS: &str = "first_attempts";

pub const PRACTICE_SESSIONS: &str = "practice_sessions";
pub const ADAPTATION_EVENTS: &str = "adaptation_events";
pub const META: &str = "meta";

// Secondary index trees
pub const ARTICLE_LAW_INDEX: &str = "article_law_index";
pub const QUESTION_ARTICLE_INDEX: &str = "question_article_index";
