// tests/api_tests.rs

use parkguide_backend::{config::Config, routes, state::AppState, utils::hash::hash_password};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

struct TestApp {
    address: String,
    pool: PgPool,
}

/// Spawns the app on a random port for testing.
///
/// Requires a running Postgres reachable through DATABASE_URL; returns None
/// (and the test skips) when the variable is not set, so the suite can run
/// in environments without a database.
async fn spawn_app() -> Option<TestApp> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping integration test");
        return None;
    };

    // 1. Create a pool
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing");

    // 2. Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    // 3. Create test configuration and state
    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
    };

    // 4. Create the router with the app state
    let app = routes::create_router(state);

    // 5. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 6. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Some(TestApp { address, pool })
}

fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().to_string()[..8])
}

/// Inserts an admin user directly and returns their token via the login API.
async fn admin_token(app: &TestApp, client: &reqwest::Client) -> String {
    let username = unique_name("adm");
    let password = "password123";
    let hashed = hash_password(password).unwrap();

    sqlx::query("INSERT INTO users (username, password, role) VALUES ($1, $2, 'admin')")
        .bind(&username)
        .bind(&hashed)
        .execute(&app.pool)
        .await
        .expect("Failed to seed admin user");

    login(app, client, &username, password).await.0
}

/// Registers and logs in a guide; returns (token, user_id).
async fn register_guide(app: &TestApp, client: &reqwest::Client) -> (String, i64) {
    let username = unique_name("g");
    let password = "password123";

    let response = client
        .post(format!("{}/api/auth/register", app.address))
        .json(&serde_json::json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(response.status().as_u16(), 201);

    login(app, client, &username, password).await
}

async fn login(
    app: &TestApp,
    client: &reqwest::Client,
    username: &str,
    password: &str,
) -> (String, i64) {
    let body: serde_json::Value = client
        .post(format!("{}/api/auth/login", app.address))
        .json(&serde_json::json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .expect("Failed to parse login json");

    (
        body["token"].as_str().expect("Token not found").to_string(),
        body["user_id"].as_i64().expect("user_id not found"),
    )
}

/// Creates a certificate with `topic_count` topics, each carrying a one
/// question quiz (correct answer 'A', passing score 70).
/// Returns (certificate_id, topic_ids).
async fn seed_certificate(
    app: &TestApp,
    client: &reqwest::Client,
    token: &str,
    topic_count: usize,
) -> (i64, Vec<i64>) {
    let response: serde_json::Value = client
        .post(format!("{}/api/admin/certificates", app.address))
        .bearer_auth(token)
        .json(&serde_json::json!({
            "name": unique_name("Junior Park Guide"),
            "category": "Wildlife",
            "description": "Entry level certification",
            "requirements": "None"
        }))
        .send()
        .await
        .expect("Create certificate failed")
        .json()
        .await
        .unwrap();
    let certificate_id = response["id"].as_i64().unwrap();

    let mut topic_ids = Vec::new();
    for i in 0..topic_count {
        let response: serde_json::Value = client
            .post(format!(
                "{}/api/admin/certificates/{}/topics",
                app.address, certificate_id
            ))
            .bearer_auth(token)
            .json(&serde_json::json!({ "title": format!("Topic {}", i + 1) }))
            .send()
            .await
            .expect("Create topic failed")
            .json()
            .await
            .unwrap();
        let topic_id = response["id"].as_i64().unwrap();
        topic_ids.push(topic_id);

        let status = client
            .post(format!("{}/api/admin/topics/{}/quiz", app.address, topic_id))
            .bearer_auth(token)
            .json(&serde_json::json!({
                "passing_score": 70,
                "time_limit_minutes": 10,
                "questions": [{
                    "text": "Which animal is a protected species here?",
                    "kind": "single",
                    "options": [
                        { "option_id": "A", "text": "Orangutan", "is_correct": true },
                        { "option_id": "B", "text": "Chicken", "is_correct": false }
                    ]
                }]
            }))
            .send()
            .await
            .expect("Create quiz failed")
            .status();
        assert_eq!(status.as_u16(), 201);
    }

    (certificate_id, topic_ids)
}

async fn submit_answer(
    app: &TestApp,
    client: &reqwest::Client,
    token: &str,
    topic_id: i64,
    answer: &str,
) -> serde_json::Value {
    // Look up the question id through the guide-facing quiz view.
    let quiz: serde_json::Value = client
        .get(format!("{}/api/topics/{}/quiz", app.address, topic_id))
        .bearer_auth(token)
        .send()
        .await
        .expect("Fetch quiz failed")
        .json()
        .await
        .unwrap();
    let question_id = quiz["questions"][0]["id"].as_i64().unwrap();

    let response = client
        .post(format!("{}/api/quiz-attempts", app.address))
        .bearer_auth(token)
        .json(&serde_json::json!({
            "topic_id": topic_id,
            "time_spent": 120,
            "answers": [{ "question_id": question_id, "answer": [answer] }]
        }))
        .send()
        .await
        .expect("Submit attempt failed");
    assert_eq!(response.status().as_u16(), 200);

    response.json().await.unwrap()
}

async fn progress_for(
    app: &TestApp,
    client: &reqwest::Client,
    certificate_id: i64,
    user_id: i64,
) -> serde_json::Value {
    client
        .get(format!(
            "{}/api/certificates/{}/progress?user_id={}",
            app.address, certificate_id, user_id
        ))
        .send()
        .await
        .expect("Fetch progress failed")
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_check_404() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_fails_validation() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    // Username too short
    let response = client
        .post(format!("{}/api/auth/register", app.address))
        .json(&serde_json::json!({ "username": "yo", "password": "password123" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn admin_routes_require_admin_role() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let (guide_token, _) = register_guide(&app, &client).await;

    let response = client
        .post(format!("{}/api/admin/certificates", app.address))
        .bearer_auth(&guide_token)
        .json(&serde_json::json!({ "name": "Nope", "category": "Nope" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn full_certification_flow() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    let admin = admin_token(&app, &client).await;
    let (certificate_id, topic_ids) = seed_certificate(&app, &client, &admin, 2).await;
    let (guide, guide_id) = register_guide(&app, &client).await;

    // 1. Apply
    let application: serde_json::Value = client
        .post(format!("{}/api/applications", app.address))
        .bearer_auth(&guide)
        .json(&serde_json::json!({ "certificate_id": certificate_id }))
        .send()
        .await
        .expect("Apply failed")
        .json()
        .await
        .unwrap();
    assert_eq!(application["status"], "Pending for Registration");
    let application_id = application["id"].as_i64().unwrap();

    // 2. Admin approves registration
    let application: serde_json::Value = client
        .patch(format!(
            "{}/api/admin/applications/{}/status",
            app.address, application_id
        ))
        .bearer_auth(&admin)
        .json(&serde_json::json!({ "status": "In Progress" }))
        .send()
        .await
        .expect("Approve failed")
        .json()
        .await
        .unwrap();
    assert_eq!(application["status"], "In Progress");
    assert!(!application["approval_register_date"].is_null());

    // 3. Requesting certification too early is a guard failure
    let response = client
        .post(format!("{}/api/applications/certified", app.address))
        .bearer_auth(&guide)
        .json(&serde_json::json!({ "certificate_id": certificate_id }))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status().as_u16(), 400);

    // 4. Pass topic 1: progress reaches 50%
    let outcome = submit_answer(&app, &client, &guide, topic_ids[0], "A").await;
    assert_eq!(outcome["results"]["passed"], true);
    assert_eq!(outcome["results"]["score"], 100);

    let progress = progress_for(&app, &client, certificate_id, guide_id).await;
    assert_eq!(progress["progress"], 50);
    assert_eq!(progress["topics_completed"], 1);

    // 5. Pass topic 2: progress reaches 100%
    submit_answer(&app, &client, &guide, topic_ids[1], "A").await;
    let progress = progress_for(&app, &client, certificate_id, guide_id).await;
    assert_eq!(progress["progress"], 100);

    // Recomputing with unchanged attempts yields the same percentage
    let again = progress_for(&app, &client, certificate_id, guide_id).await;
    assert_eq!(again["progress"], progress["progress"]);

    // 6. Guide requests certification
    let response = client
        .post(format!("{}/api/applications/certified", app.address))
        .bearer_auth(&guide)
        .json(&serde_json::json!({ "certificate_id": certificate_id }))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["application"]["status"], "Pending for Certified");

    // 7. Admin certifies; the expiry date is stamped
    let application: serde_json::Value = client
        .patch(format!(
            "{}/api/admin/applications/{}/status",
            app.address, application_id
        ))
        .bearer_auth(&admin)
        .json(&serde_json::json!({ "status": "Certified" }))
        .send()
        .await
        .expect("Certify failed")
        .json()
        .await
        .unwrap();
    assert_eq!(application["status"], "Certified");
    assert!(!application["approval_certified_date"].is_null());
    assert!(!application["expiry_date"].is_null());

    // 8. The certificate shows up in the guide's certified list
    let certified: serde_json::Value = client
        .get(format!("{}/api/applications/certified", app.address))
        .bearer_auth(&guide)
        .send()
        .await
        .expect("List certified failed")
        .json()
        .await
        .unwrap();
    assert_eq!(certified[0]["certificate_id"].as_i64(), Some(certificate_id));
}

#[tokio::test]
async fn failing_retake_never_erases_a_pass() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    let admin = admin_token(&app, &client).await;
    let (_certificate_id, topic_ids) = seed_certificate(&app, &client, &admin, 1).await;
    let (guide, _) = register_guide(&app, &client).await;
    let topic_id = topic_ids[0];

    // Pass first
    let outcome = submit_answer(&app, &client, &guide, topic_id, "A").await;
    assert_eq!(outcome["results"]["passed"], true);

    // Then fail a retake
    let outcome = submit_answer(&app, &client, &guide, topic_id, "B").await;
    assert_eq!(outcome["results"]["passed"], false);

    // The retained attempt is still the pass
    let attempt: serde_json::Value = client
        .get(format!("{}/api/topics/{}/attempt", app.address, topic_id))
        .bearer_auth(&guide)
        .send()
        .await
        .expect("Fetch attempt failed")
        .json()
        .await
        .unwrap();
    assert_eq!(attempt["passed"], true);
    assert_eq!(attempt["score"], 100);
}

#[tokio::test]
async fn failing_attempt_replaces_previous_fail() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    let admin = admin_token(&app, &client).await;
    let (_certificate_id, topic_ids) = seed_certificate(&app, &client, &admin, 1).await;
    let (guide, _) = register_guide(&app, &client).await;
    let topic_id = topic_ids[0];

    // Fail twice with different time spent; the second fail wins
    submit_answer(&app, &client, &guide, topic_id, "B").await;
    let quiz: serde_json::Value = client
        .get(format!("{}/api/topics/{}/quiz", app.address, topic_id))
        .bearer_auth(&guide)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let question_id = quiz["questions"][0]["id"].as_i64().unwrap();

    let response = client
        .post(format!("{}/api/quiz-attempts", app.address))
        .bearer_auth(&guide)
        .json(&serde_json::json!({
            "topic_id": topic_id,
            "time_spent": 777,
            "answers": [{ "question_id": question_id, "answer": ["B"] }]
        }))
        .send()
        .await
        .expect("Submit attempt failed");
    assert_eq!(response.status().as_u16(), 200);

    let attempt: serde_json::Value = client
        .get(format!("{}/api/topics/{}/attempt", app.address, topic_id))
        .bearer_auth(&guide)
        .send()
        .await
        .expect("Fetch attempt failed")
        .json()
        .await
        .unwrap();
    assert_eq!(attempt["passed"], false);
    assert_eq!(attempt["time_spent"], 777);
}
