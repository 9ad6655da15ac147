use practice_backend::auth::sign_learner_token;

use super::app::TestApp;

pub fn learner_token(app: &TestApp, learner_id: &str) -> String {
    sign_learner_token(learner_id, &app.config.jwt_secret, 1).expect("sign learner token")
}

pub fn auth_header(token: &str) -> String {
    format!("Bearer {token}")
}

/// Authorization header pair for a fresh learner id.
pub fn new_learner(app: &TestApp) -> (String, (&'static str, String)) {
    let learner_id = format!("learner-{}", uuid::Uuid::new_v4().simple());
    let token = learner_token(app, &learner_id);
    (learner_id, ("authorization", auth_header(&token)))
}
