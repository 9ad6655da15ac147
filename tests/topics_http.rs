mod common;

use axum::http::{Method, StatusCode};

use common::app::spawn_test_server;
use common::auth::new_learner;
use common::fixtures::{range_entry, seed_attempt, seed_law, seed_topic};
use common::http::{assert_json_error, call};
use practice_backend::selection::types::DifficultyBucket;

#[tokio::test]
async fn it_pool_counts_are_per_exact_scope() {
    let app = spawn_test_server().await;
    seed_law(app.store(), "ce", 6, DifficultyBucket::Medium);
    seed_topic(
        app.store(),
        "t1",
        vec![
            range_entry("ce", 1, 4, None),
            range_entry("ce", 5, 6, Some("p1")),
        ],
    );
    let (learner, auth) = new_learner(&app);
    seed_attempt(app.store(), &learner, "ce-q01", "topic.t1", true, 5);
    seed_attempt(app.store(), &learner, "ce-q02", "topic.t1@p1", true, 5);

    let (status, body) = call(&app.app, Method::GET, "/api/topics/t1/pool", None, &auth).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let data = &body["data"];
    assert_eq!(data["scopeKey"], "topic.t1");
    assert_eq!(data["total"], 4);
    assert_eq!(data["neverSeen"], 3);
    assert_eq!(data["answered"], 1);

    let (status, body) = call(
        &app.app,
        Method::GET,
        "/api/topics/t1/pool?programId=p1",
        None,
        &auth,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["scopeKey"], "topic.t1@p1");
    assert_eq!(data["total"], 6);
    assert_eq!(data["neverSeen"], 5);
    assert_eq!(data["answered"], 1);
    assert_eq!(data["buckets"]["neverSeen"]["medium"], 5);
}

#[tokio::test]
async fn it_pool_for_unknown_topic_is_404() {
    let app = spawn_test_server().await;
    let (_, auth) = new_learner(&app);
    let (status, body) = call(&app.app, Method::GET, "/api/topics/ghost/pool", None, &auth).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_json_error(&body, "TOPIC_NOT_FOUND");
}

#[tokio::test]
async fn it_pool_rejects_reserved_characters_in_topic_id() {
    let app = spawn_test_server().await;
    seed_law(app.store(), "ce", 2, DifficultyBucket::Medium);
    seed_topic(app.store(), "t1", vec![range_entry("ce", 1, 2, Some("p1"))]);
    let (_, auth) = new_learner(&app);

    let (status, body) = call(&app.app, Method::GET, "/api/topics/t1@p1/pool", None, &auth).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "VALIDATION_ERROR");
}

#[tokio::test]
async fn it_dangling_entries_are_skipped() {
    let app = spawn_test_server().await;
    seed_law(app.store(), "ce", 2, DifficultyBucket::Easy);
    seed_topic(
        app.store(),
        "t1",
        vec![range_entry("ce", 1, 2, None), range_entry("gone", 1, 9, None)],
    );
    let (_, auth) = new_learner(&app);

    let (status, body) = call(&app.app, Method::GET, "/api/topics/t1/pool", None, &auth).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["skippedEntries"], 1);
}
