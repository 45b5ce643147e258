mod common;

use std::time::Duration;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use common::app::{spawn_test_server, spawn_with, TestApp, TestOptions};
use common::auth::{login_and_get_token, setup_admin_and_get_token};
use common::fixtures::seed_questions;
use common::http::{assert_json_error, assert_status_ok_json, call};
use esg_quiz_backend::store::operations::questions::ExplanationSource;

async fn llm_app() -> TestApp {
    spawn_with(TestOptions {
        llm_enabled: true,
        ..TestOptions::default()
    })
    .await
}

/// 轮询直到后台任务结束。
async fn wait_for_job(app: &TestApp, token: &str, job_id: &str) -> Value {
    for _ in 0..200 {
        let (status, body) = call(
            &app.app,
            Method::GET,
            &format!("/api/admin/explanations/jobs/{job_id}"),
            token,
            None,
        )
        .await;
        assert_status_ok_json(status, &body);
        if body["data"]["status"] == "completed" {
            return body["data"].clone();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("explanation job {job_id} did not finish");
}

fn question_body(prompt: &str) -> Value {
    json!({
        "prompt": prompt,
        "options": ["Scope 1", "Scope 2", "Scope 3"],
        "correctAnswer": "B",
        "category": "climate",
        "difficulty": 2,
    })
}

#[tokio::test]
async fn it_admin_question_crud() {
    let app = spawn_test_server().await;
    let admin = setup_admin_and_get_token(&app.app).await;
    let learner = login_and_get_token(&app.app).await;

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/admin/questions",
        &admin,
        Some(question_body("Which scope covers purchased electricity?")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["correctAnswer"], "B");

    // 学员接口不暴露答案
    let (status, body) = call(
        &app.app,
        Method::GET,
        &format!("/api/questions/{id}"),
        &learner,
        None,
    )
    .await;
    assert_status_ok_json(status, &body);
    assert!(body["data"].get("correctAnswer").is_none());
    assert_eq!(body["data"]["options"].as_array().unwrap().len(), 3);

    let mut update = question_body("Which scope covers purchased heat and electricity?");
    update["explanation"] = json!("Scope 2 covers indirect energy emissions.");
    update["keyPoints"] = json!(["indirect", "energy"]);
    let (status, body) = call(
        &app.app,
        Method::PUT,
        &format!("/api/admin/questions/{id}"),
        &admin,
        Some(update),
    )
    .await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["explanationSource"], "human");

    let (_, body) = call(&app.app, Method::GET, "/api/questions/categories", &learner, None).await;
    assert_eq!(body["data"][0]["category"], "climate");
    assert_eq!(body["data"][0]["count"], 1);

    let (status, _) = call(
        &app.app,
        Method::DELETE,
        &format!("/api/admin/questions/{id}"),
        &admin,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
        &app.app,
        Method::DELETE,
        &format!("/api/admin/questions/{id}"),
        &admin,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn it_admin_question_validation() {
    let app = spawn_test_server().await;
    let admin = setup_admin_and_get_token(&app.app).await;

    let mut body = question_body("Answer outside options");
    body["correctAnswer"] = json!("D");
    let (status, resp) = call(&app.app, Method::POST, "/api/admin/questions", &admin, Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&resp, "VALIDATION_ERROR");

    let mut body = question_body("Difficulty out of range");
    body["difficulty"] = json!(9);
    let (status, resp) = call(&app.app, Method::POST, "/api/admin/questions", &admin, Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&resp, "VALIDATION_ERROR");
}

#[tokio::test]
async fn it_explanation_batch_generates_with_mock_llm() {
    let app = llm_app().await;
    let admin = setup_admin_and_get_token(&app.app).await;
    let questions = seed_questions(app.state.store(), 4, "climate");
    let ids: Vec<String> = questions.iter().map(|q| q.id.clone()).collect();

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/admin/explanations/batch",
        &admin,
        Some(json!({ "questionIds": ids })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED, "{body}");
    assert_eq!(body["data"]["status"], "running");
    let job_id = body["data"]["id"].as_str().unwrap().to_string();

    let job = wait_for_job(&app, &admin, &job_id).await;
    assert_eq!(job["processed"], 4);
    assert_eq!(job["succeeded"], 4);
    assert!(job["failures"].as_array().unwrap().is_empty());
    assert_eq!(job["alertRaised"], false);

    for id in &ids {
        let stored = app.state.store().get_question(id).unwrap().unwrap();
        assert_eq!(stored.explanation_source, Some(ExplanationSource::Ai));
        assert!(!stored.key_points.is_empty());
    }

    let (_, body) = call(&app.app, Method::GET, "/api/admin/explanations/stats", &admin, None).await;
    assert_eq!(body["data"]["missingExplanation"], 0);
    assert_eq!(body["data"]["withExplanation"], 4);
}

#[tokio::test]
async fn it_explanation_batch_only_missing_skips_explained() {
    let app = llm_app().await;
    let admin = setup_admin_and_get_token(&app.app).await;
    let questions = seed_questions(app.state.store(), 3, "governance");

    let store = app.state.store();
    store
        .set_question_explanation(
            &questions[0].id,
            "人工解析",
            &[],
            ExplanationSource::Human,
        )
        .unwrap();

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/admin/explanations/batch",
        &admin,
        Some(json!({ "onlyMissing": true })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["questionIds"].as_array().unwrap().len(), 2);

    let job_id = body["data"]["id"].as_str().unwrap().to_string();
    wait_for_job(&app, &admin, &job_id).await;

    let human = store.get_question(&questions[0].id).unwrap().unwrap();
    assert_eq!(human.explanation.as_deref(), Some("人工解析"));
    assert_eq!(human.explanation_source, Some(ExplanationSource::Human));
}

#[tokio::test]
async fn it_explanation_batch_reports_missing_questions_as_failures() {
    let app = llm_app().await;
    let admin = setup_admin_and_get_token(&app.app).await;

    let ids: Vec<String> = (0..4).map(|i| format!("ghost-{i}")).collect();
    let (_, body) = call(
        &app.app,
        Method::POST,
        "/api/admin/explanations/batch",
        &admin,
        Some(json!({ "questionIds": ids })),
    )
    .await;
    let job_id = body["data"]["id"].as_str().unwrap().to_string();

    let job = wait_for_job(&app, &admin, &job_id).await;
    assert_eq!(job["succeeded"], 0);
    assert_eq!(job["failures"].as_array().unwrap().len(), 4);
    assert_eq!(job["alertRaised"], true);

    let (_, body) = call(&app.app, Method::GET, "/api/admin/explanations/alerts", &admin, None).await;
    let alerts = body["data"].as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["jobId"], job_id.as_str());
    assert_eq!(alerts[0]["failed"], 4);

    let (status, body) = call(&app.app, Method::GET, "/api/admin/alerts?limit=5", &admin, None).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn it_explanation_batch_requires_enabled_llm_and_admin() {
    let app = spawn_test_server().await;
    let admin = setup_admin_and_get_token(&app.app).await;
    let learner = login_and_get_token(&app.app).await;

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/admin/explanations/batch",
        &admin,
        Some(json!({ "onlyMissing": true })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "EXPLAIN_DISABLED");

    let (status, _) = call(
        &app.app,
        Method::POST,
        "/api/admin/explanations/batch",
        &learner,
        Some(json!({ "onlyMissing": true })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn it_explanation_batch_rejects_empty_selection() {
    let app = llm_app().await;
    let admin = setup_admin_and_get_token(&app.app).await;

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/admin/explanations/batch",
        &admin,
        Some(json!({ "questionIds": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "EXPLAIN_EMPTY_BATCH");
}
