// tests/api_tests.rs

use std::sync::Arc;

use quizgate::{
    config::Config,
    routes,
    state::AppState,
    store::{DynStore, MemoryStore},
    utils::jwt::sign_jwt,
};
use serde_json::{Value, json};

const SECRET: &str = "test_secret_for_integration_tests";

struct TestApp {
    address: String,
    store: Arc<MemoryStore>,
    client: reqwest::Client,
}

/// Spawns the app on a random port, backed by a fresh in-memory store.
async fn spawn_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());

    let config = Config {
        database_url: None,
        jwt_secret: SECRET.to_string(),
        rust_log: "error".to_string(),
        port: 0,
        cors_origin: "http://localhost:3000".to_string(),
        log_dir: "logs".to_string(),
    };

    let dyn_store: DynStore = store.clone();
    let app = routes::create_router(AppState {
        store: dyn_store,
        config,
    });

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        store,
        client: reqwest::Client::new(),
    }
}

fn token(email: &str, role: &str) -> String {
    sign_jwt(email, Some("Test User"), role, SECRET, 600).unwrap()
}

fn admin_token() -> String {
    token("admin@example.com", "admin")
}

fn unique_email() -> String {
    format!("u_{}@example.com", &uuid::Uuid::new_v4().to_string()[..8])
}

fn quiz_body(keys: &[i32]) -> Value {
    let questions: Vec<Value> = keys
        .iter()
        .enumerate()
        .map(|(i, key)| {
            json!({
                "text": format!("Question {}", i),
                "options": ["A", "B", "C", "D"],
                "correct_answer": key,
                "time_limit_seconds": 20
            })
        })
        .collect();

    json!({
        "title": "General knowledge",
        "questions": questions,
        "feedback_link": "https://example.com/feedback"
    })
}

impl TestApp {
    async fn create_quiz(&self, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}/api/admin/quizzes", self.address))
            .bearer_auth(admin_token())
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    async fn create_quiz_id(&self, body: Value) -> i64 {
        let resp = self.create_quiz(body).await;
        assert_eq!(resp.status().as_u16(), 201);
        let quiz: Value = resp.json().await.unwrap();
        quiz["id"].as_i64().expect("quiz id")
    }

    async fn submit(&self, quiz_id: i64, bearer: Option<&str>, answers: Value) -> reqwest::Response {
        let mut req = self
            .client
            .post(format!("{}/api/quizzes/{}/submit", self.address, quiz_id))
            .json(&json!({ "answers": answers }));
        if let Some(t) = bearer {
            req = req.bearer_auth(t);
        }
        req.send().await.expect("Failed to execute request")
    }

    async fn view(&self, quiz_id: i64, bearer: Option<&str>) -> reqwest::Response {
        let mut req = self
            .client
            .get(format!("{}/api/quizzes/{}", self.address, quiz_id));
        if let Some(t) = bearer {
            req = req.bearer_auth(t);
        }
        req.send().await.expect("Failed to execute request")
    }

    async fn responses(&self, quiz_id: i64) -> Vec<Value> {
        self.client
            .get(format!("{}/api/admin/responses?quiz_id={}", self.address, quiz_id))
            .bearer_auth(admin_token())
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }
}

fn three_answers() -> Value {
    json!([
        {"question_index": 0, "selected_option": 1, "time_taken_seconds": 3},
        {"question_index": 1, "selected_option": 0, "time_taken_seconds": 4},
        {"question_index": 2, "selected_option": 1, "time_taken_seconds": 5}
    ])
}

#[tokio::test]
async fn health_check_404() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(format!("{}/random_path_that_does_not_exist", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn public_views_never_contain_the_answer_key() {
    let app = spawn_app().await;
    let id = app.create_quiz_id(quiz_body(&[1, 0, 2])).await;
    let taker = token(&unique_email(), "user");

    for bearer in [None, Some(taker.as_str())] {
        let resp = app.view(id, bearer).await;
        assert_eq!(resp.status().as_u16(), 200);
        let text = resp.text().await.unwrap();
        assert!(!text.contains("correct_answer"), "leaked key: {}", text);
        assert!(!text.contains("response_count"));
    }

    let list = app
        .client
        .get(format!("{}/api/quizzes", app.address))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(list.contains("General knowledge"));
    assert!(!list.contains("correct_answer"));
}

#[tokio::test]
async fn admin_listing_includes_key_and_counts() {
    let app = spawn_app().await;
    let id = app.create_quiz_id(quiz_body(&[1, 0, 2])).await;
    let taker = token(&unique_email(), "user");
    assert_eq!(app.submit(id, Some(&taker), three_answers()).await.status().as_u16(), 200);

    let rows: Vec<Value> = app
        .client
        .get(format!("{}/api/admin/quizzes", app.address))
        .bearer_auth(admin_token())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["response_count"], 1);
    assert_eq!(rows[0]["questions"][0]["correct_answer"], 1);
}

#[tokio::test]
async fn admin_listing_counts_each_quiz_separately() {
    let app = spawn_app().await;
    let busy = app.create_quiz_id(quiz_body(&[0])).await;
    let quiet = app.create_quiz_id(quiz_body(&[0])).await;

    for _ in 0..2 {
        let taker = token(&unique_email(), "user");
        assert_eq!(app.submit(busy, Some(&taker), json!([])).await.status().as_u16(), 200);
    }

    let rows: Vec<Value> = app
        .client
        .get(format!("{}/api/admin/quizzes", app.address))
        .bearer_auth(admin_token())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let count_of = |id: i64| {
        rows.iter()
            .find(|r| r["id"] == id)
            .map(|r| r["response_count"].clone())
            .unwrap()
    };
    assert_eq!(count_of(busy), 2);
    assert_eq!(count_of(quiet), 0);
}

#[tokio::test]
async fn create_rejects_invalid_answer_keys() {
    let app = spawn_app().await;

    for bad in [-1, 4] {
        let resp = app.create_quiz(quiz_body(&[0, bad])).await;
        assert_eq!(resp.status().as_u16(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["code"], "invalid_input");
    }
}

#[tokio::test]
async fn create_rejects_malformed_window_and_unknown_fields() {
    let app = spawn_app().await;

    let mut body = quiz_body(&[0]);
    body["available_until"] = json!("tomorrow-ish");
    assert_eq!(app.create_quiz(body).await.status().as_u16(), 400);

    let mut body = quiz_body(&[0]);
    body["surprise"] = json!(true);
    assert_eq!(app.create_quiz(body).await.status().as_u16(), 400);
}

#[tokio::test]
async fn malformed_admin_id_is_invalid_input() {
    let app = spawn_app().await;

    let resp = app
        .client
        .delete(format!("{}/api/admin/quizzes/not-a-number", app.address))
        .bearer_auth(admin_token())
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "invalid_input");
}

#[tokio::test]
async fn non_admin_cannot_reach_admin_routes() {
    let app = spawn_app().await;

    let anonymous = app
        .client
        .get(format!("{}/api/admin/responses", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status().as_u16(), 401);

    let user = app
        .client
        .get(format!("{}/api/admin/responses", app.address))
        .bearer_auth(token(&unique_email(), "user"))
        .send()
        .await
        .unwrap();
    assert_eq!(user.status().as_u16(), 403);
}

#[tokio::test]
async fn submission_is_scored_but_score_is_hidden() {
    let app = spawn_app().await;
    let id = app.create_quiz_id(quiz_body(&[1, 0, 2])).await;
    let email = unique_email();

    let resp = app.submit(id, Some(&token(&email, "user")), three_answers()).await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["feedback_link"], "https://example.com/feedback");
    assert!(body.get("score").is_none());

    let stored = app.responses(id).await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["score"], 2);
    assert_eq!(stored[0]["total_questions"], 3);
    assert_eq!(stored[0]["total_time_taken_seconds"], 12);
    assert_eq!(stored[0]["user_email"], email);
}

#[tokio::test]
async fn submission_requires_identity() {
    let app = spawn_app().await;
    let id = app.create_quiz_id(quiz_body(&[0])).await;

    let resp = app.submit(id, None, json!([])).await;
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn malformed_answers_are_invalid_input() {
    let app = spawn_app().await;
    let id = app.create_quiz_id(quiz_body(&[0])).await;
    let taker = token(&unique_email(), "user");

    let resp = app
        .submit(id, Some(&taker), json!([{"question_index": "zero"}]))
        .await;
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "invalid_input");

    let resp = app
        .submit(id, Some(&taker), json!([{"question_index": 0, "selected_option": 9}]))
        .await;
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn concurrent_submissions_admit_exactly_one() {
    let app = Arc::new(spawn_app().await);
    let id = app.create_quiz_id(quiz_body(&[1, 0, 2])).await;
    let taker = token(&unique_email(), "user");

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let app = app.clone();
            let taker = taker.clone();
            tokio::spawn(async move {
                app.submit(id, Some(&taker), three_answers()).await.status().as_u16()
            })
        })
        .collect();

    let mut statuses = Vec::new();
    for handle in handles {
        statuses.push(handle.await.unwrap());
    }

    assert_eq!(statuses.iter().filter(|&&s| s == 200).count(), 1);
    assert_eq!(statuses.iter().filter(|&&s| s == 409).count(), 9);
    assert_eq!(app.responses(id).await.len(), 1);
}

#[tokio::test]
async fn view_reports_prior_submission() {
    let app = spawn_app().await;
    let id = app.create_quiz_id(quiz_body(&[0])).await;
    let taker = token(&unique_email(), "user");

    let before: Value = app.view(id, Some(&taker)).await.json().await.unwrap();
    assert_eq!(before["already_submitted"], false);

    app.submit(id, Some(&taker), json!([{"question_index": 0, "selected_option": 0}]))
        .await;

    let after: Value = app.view(id, Some(&taker)).await.json().await.unwrap();
    assert_eq!(after["already_submitted"], true);

    let again = app.submit(id, Some(&taker), json!([])).await;
    assert_eq!(again.status().as_u16(), 409);
    let body: Value = again.json().await.unwrap();
    assert_eq!(body["code"], "already_submitted");
}

#[tokio::test]
async fn submission_after_window_closes_is_ended() {
    let app = spawn_app().await;
    let id = app.create_quiz_id(quiz_body(&[1, 0, 2])).await;
    let taker = token(&unique_email(), "user");

    // The taker loads the quiz while it is open...
    assert_eq!(app.view(id, Some(&taker)).await.status().as_u16(), 200);

    // ...and the window closes before they finish.
    let mut closed = quiz_body(&[1, 0, 2]);
    closed["available_until"] = json!((chrono::Utc::now() - chrono::Duration::seconds(1)).to_rfc3339());
    let update = app
        .client
        .put(format!("{}/api/admin/quizzes/{}", app.address, id))
        .bearer_auth(admin_token())
        .json(&closed)
        .send()
        .await
        .unwrap();
    assert_eq!(update.status().as_u16(), 200);

    let resp = app.submit(id, Some(&taker), three_answers()).await;
    assert_eq!(resp.status().as_u16(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "ended");
    assert!(app.responses(id).await.is_empty());
}

#[tokio::test]
async fn not_started_surfaces_opening_time() {
    let app = spawn_app().await;
    let opens = chrono::Utc::now() + chrono::Duration::hours(2);
    let mut body = quiz_body(&[0]);
    body["available_from"] = json!(opens.to_rfc3339());
    let id = app.create_quiz_id(body).await;

    let resp = app.view(id, None).await;
    assert_eq!(resp.status().as_u16(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "not_started");
    assert!(body["available_from"].is_string());

    // Admins bypass the window.
    assert_eq!(app.view(id, Some(&admin_token())).await.status().as_u16(), 200);
}

#[tokio::test]
async fn inactive_quiz_is_unreachable_for_takers() {
    let app = spawn_app().await;
    let id = app.create_quiz_id(quiz_body(&[0])).await;
    let taker = token(&unique_email(), "user");

    let toggle = app
        .client
        .patch(format!("{}/api/admin/quizzes/{}/active", app.address, id))
        .bearer_auth(admin_token())
        .json(&json!({"is_active": false}))
        .send()
        .await
        .unwrap();
    assert_eq!(toggle.status().as_u16(), 200);

    let view: Value = app.view(id, Some(&taker)).await.json().await.unwrap();
    assert_eq!(view["code"], "inactive");

    let list: Vec<Value> = app
        .client
        .get(format!("{}/api/quizzes", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(list.is_empty());

    let submit = app.submit(id, Some(&taker), json!([])).await;
    assert_eq!(submit.status().as_u16(), 403);
}

#[tokio::test]
async fn event_linked_quiz_requires_registration() {
    let app = spawn_app().await;
    let mut body = quiz_body(&[0]);
    body["linked_event_id"] = json!(77);
    let id = app.create_quiz_id(body).await;

    let registered = unique_email();
    app.store.register_attendee(77, &registered.to_uppercase()).unwrap();
    let outsider = token(&unique_email(), "user");

    assert_eq!(app.view(id, None).await.status().as_u16(), 401);

    let denied = app.view(id, Some(&outsider)).await;
    assert_eq!(denied.status().as_u16(), 403);
    let denied: Value = denied.json().await.unwrap();
    assert_eq!(denied["code"], "not_registered");

    let submit = app.submit(id, Some(&outsider), json!([])).await;
    assert_eq!(submit.status().as_u16(), 403);

    let member = token(&registered, "user");
    assert_eq!(app.view(id, Some(&member)).await.status().as_u16(), 200);
    let submit = app
        .submit(id, Some(&member), json!([{"question_index": 0, "selected_option": 0}]))
        .await;
    assert_eq!(submit.status().as_u16(), 200);
}

#[tokio::test]
async fn deleting_quiz_cascades_responses() {
    let app = spawn_app().await;
    let doomed = app.create_quiz_id(quiz_body(&[0])).await;
    let kept = app.create_quiz_id(quiz_body(&[0])).await;

    for _ in 0..3 {
        let taker = token(&unique_email(), "user");
        app.submit(doomed, Some(&taker), json!([{"question_index": 0, "selected_option": 0}]))
            .await;
    }
    let taker = token(&unique_email(), "user");
    app.submit(kept, Some(&taker), json!([])).await;
    assert_eq!(app.responses(doomed).await.len(), 3);

    let delete = app
        .client
        .delete(format!("{}/api/admin/quizzes/{}", app.address, doomed))
        .bearer_auth(admin_token())
        .send()
        .await
        .unwrap();
    assert_eq!(delete.status().as_u16(), 204);

    assert!(app.responses(doomed).await.is_empty());
    assert_eq!(app.responses(kept).await.len(), 1);
    assert_eq!(app.view(doomed, None).await.status().as_u16(), 404);
}

#[tokio::test]
async fn deleting_a_response_allows_a_retake() {
    let app = spawn_app().await;
    let id = app.create_quiz_id(quiz_body(&[0])).await;
    let taker = token(&unique_email(), "user");

    app.submit(id, Some(&taker), json!([])).await;
    let stored = app.responses(id).await;
    let response_id = stored[0]["id"].as_i64().unwrap();

    let delete = app
        .client
        .delete(format!("{}/api/admin/responses/{}", app.address, response_id))
        .bearer_auth(admin_token())
        .send()
        .await
        .unwrap();
    assert_eq!(delete.status().as_u16(), 204);

    let retake = app.submit(id, Some(&taker), json!([])).await;
    assert_eq!(retake.status().as_u16(), 200);
}
