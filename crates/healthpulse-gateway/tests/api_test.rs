use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use healthpulse_agents::{GenerateRequest, LlmProvider};
use healthpulse_common::{Error, Result};
use healthpulse_config::HealthPulseConfig;
use healthpulse_db::{ChatStore, HealthStore};
use healthpulse_gateway::{AppState, build_router};
use serde_json::{Value, json};

struct MockProvider {
    reply: &'static str,
    fail_with: Option<fn() -> Error>,
    last_prompt: Arc<Mutex<Option<String>>>,
}

impl MockProvider {
    fn ok(reply: &'static str) -> Self {
        Self {
            reply,
            fail_with: None,
            last_prompt: Arc::new(Mutex::new(None)),
        }
    }

    fn failing(fail_with: fn() -> Error) -> Self {
        Self {
            fail_with: Some(fail_with),
            ..Self::ok("")
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn provider_id(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        *self.last_prompt.lock().unwrap() = Some(request.prompt.clone());
        if let Some(fail) = self.fail_with {
            return Err(fail());
        }
        Ok(self.reply.to_string())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

struct TestApp {
    base: String,
    client: reqwest::Client,
}

impl TestApp {
    async fn spawn(provider: MockProvider) -> Self {
        let mut config = HealthPulseConfig::default();
        config.auth.jwt_secret = Some("test-secret".to_string());

        let state = Arc::new(
            AppState::new(
                config,
                HealthStore::in_memory().unwrap(),
                ChatStore::in_memory().unwrap(),
                Arc::new(provider),
            )
            .unwrap(),
        );
        let app = build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            base: format!("http://{addr}"),
            client: reqwest::Client::new(),
        }
    }

    async fn register(&self, email: &str, name: &str) -> String {
        let response = self
            .client
            .post(format!("{}/api/auth/register", self.base))
            .json(&json!({ "email": email, "password": "password", "name": name }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    async fn post_history(&self, token: &str, content: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/api/history", self.base))
            .bearer_auth(token)
            .json(&json!({ "content": content }))
            .send()
            .await
            .unwrap()
    }

    async fn get_history(&self, token: &str) -> Vec<Value> {
        let response = self
            .client
            .get(format!("{}/api/history", self.base))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        response.json().await.unwrap()
    }
}

#[tokio::test]
async fn ping_is_public() {
    let app = TestApp::spawn(MockProvider::ok("")).await;
    let response = app
        .client
        .get(format!("{}/api/ping", app.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn register_and_login_flow() {
    let app = TestApp::spawn(MockProvider::ok("")).await;
    let _token = app.register("user@test.com", "Test User").await;

    // Duplicate email is a client error, mirroring the registration contract.
    let dup = app
        .client
        .post(format!("{}/api/auth/register", app.base))
        .json(&json!({ "email": "user@test.com", "password": "other" }))
        .send()
        .await
        .unwrap();
    assert_eq!(dup.status(), 400);

    let login = app
        .client
        .post(format!("{}/api/auth/login", app.base))
        .json(&json!({ "email": "user@test.com", "password": "password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(login.status(), 200);
    let body: Value = login.json().await.unwrap();
    assert!(body["token"].as_str().is_some());
    assert_eq!(body["user"]["email"], "user@test.com");

    let wrong_password = app
        .client
        .post(format!("{}/api/auth/login", app.base))
        .json(&json!({ "email": "user@test.com", "password": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_password.status(), 401);

    let unknown = app
        .client
        .post(format!("{}/api/auth/login", app.base))
        .json(&json!({ "email": "ghost@test.com", "password": "password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), 404);
}

#[tokio::test]
async fn history_requires_a_valid_token() {
    let app = TestApp::spawn(MockProvider::ok("")).await;

    let missing = app
        .client
        .get(format!("{}/api/history", app.base))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 401);

    let garbage = app
        .client
        .get(format!("{}/api/history", app.base))
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(garbage.status(), 401);
}

#[tokio::test]
async fn post_history_creates_exactly_one_ordered_pair() {
    let provider = MockProvider::ok("Your heart rate looks steady, keep it up!");
    let last_prompt = Arc::clone(&provider.last_prompt);
    let app = TestApp::spawn(provider).await;
    let token = app.register("user@test.com", "Test User").await;

    let record = app
        .client
        .post(format!("{}/api/health", app.base))
        .bearer_auth(&token)
        .json(&json!({ "type": "BPM", "value": 72, "unit": "bpm" }))
        .send()
        .await
        .unwrap();
    assert_eq!(record.status(), 200);

    let response = app.post_history(&token, "How am I doing?").await;
    assert_eq!(response.status(), 200);
    let pair: Vec<Value> = response.json().await.unwrap();
    assert_eq!(pair.len(), 2);
    assert_eq!(pair[0]["role"], "user");
    assert_eq!(pair[0]["content"], "How am I doing?");
    assert_eq!(pair[1]["role"], "assistant");
    assert!(!pair[1]["content"].as_str().unwrap().is_empty());
    assert_eq!(pair[0]["userId"], pair[1]["userId"]);

    let asked_at: DateTime<Utc> =
        serde_json::from_value(pair[0]["createdAt"].clone()).unwrap();
    let answered_at: DateTime<Utc> =
        serde_json::from_value(pair[1]["createdAt"].clone()).unwrap();
    assert!(answered_at >= asked_at);

    let history = app.get_history(&token).await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["role"], "user");
    assert_eq!(history[1]["role"], "assistant");

    let prompt = last_prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.contains("BPM: 72 bpm"));
    assert!(prompt.contains("Test User (user@test.com)"));
}

#[tokio::test]
async fn prompt_renders_no_data_marker_without_measurements() {
    let provider = MockProvider::ok("Log some measurements first!");
    let last_prompt = Arc::clone(&provider.last_prompt);
    let app = TestApp::spawn(provider).await;
    let token = app.register("fresh@test.com", "Fresh").await;

    let response = app.post_history(&token, "Anything to report?").await;
    assert_eq!(response.status(), 200);

    let prompt = last_prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.contains("[no data]"));
}

#[tokio::test]
async fn provider_rate_limit_maps_to_429_and_writes_nothing() {
    let app = TestApp::spawn(MockProvider::failing(|| {
        Error::RateLimited("gemini API error: status=429".to_string())
    }))
    .await;
    let token = app.register("user@test.com", "Test User").await;

    let response = app.post_history(&token, "hello?").await;
    assert_eq!(response.status(), 429);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "The assistant is unavailable right now.");

    assert!(app.get_history(&token).await.is_empty());
}

#[tokio::test]
async fn provider_failure_maps_to_500_with_generic_message() {
    let app = TestApp::spawn(MockProvider::failing(|| {
        Error::Provider("gemini API error: status=503, body=overloaded".to_string())
    }))
    .await;
    let token = app.register("user@test.com", "Test User").await;

    let response = app.post_history(&token, "hello?").await;
    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    // Internal detail stays server-side.
    assert_eq!(body["error"], "The assistant is unavailable right now.");

    assert!(app.get_history(&token).await.is_empty());
}

#[tokio::test]
async fn empty_content_is_rejected() {
    let app = TestApp::spawn(MockProvider::ok("")).await;
    let token = app.register("user@test.com", "Test User").await;

    let response = app.post_history(&token, "   ").await;
    assert_eq!(response.status(), 400);
    assert!(app.get_history(&token).await.is_empty());
}

#[tokio::test]
async fn delete_history_removes_only_the_callers_turns() {
    let app = TestApp::spawn(MockProvider::ok("noted")).await;
    let alice = app.register("alice@test.com", "Alice").await;
    let bob = app.register("bob@test.com", "Bob").await;

    assert_eq!(app.post_history(&alice, "alice turn").await.status(), 200);
    assert_eq!(app.post_history(&bob, "bob turn").await.status(), 200);

    let response = app
        .client
        .delete(format!("{}/api/history", app.base))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["deleted"], 2);

    assert!(app.get_history(&alice).await.is_empty());
    assert_eq!(app.get_history(&bob).await.len(), 2);
}

#[tokio::test]
async fn measurements_are_scoped_to_their_owner() {
    let app = TestApp::spawn(MockProvider::ok("")).await;
    let alice = app.register("alice@test.com", "Alice").await;
    let bob = app.register("bob@test.com", "Bob").await;

    let created: Value = app
        .client
        .post(format!("{}/api/health", app.base))
        .bearer_auth(&alice)
        .json(&json!({ "type": "Weight", "value": 75.5, "unit": "kg" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let record_id = created["id"].as_i64().unwrap();

    // Bob can neither see nor delete Alice's record.
    let bob_list = app
        .client
        .get(format!("{}/api/health", app.base))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    let bob_records: Vec<Value> = bob_list.json().await.unwrap();
    assert!(bob_records.is_empty());

    let bob_delete = app
        .client
        .delete(format!("{}/api/health/{record_id}", app.base))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(bob_delete.status(), 404);

    let alice_delete = app
        .client
        .delete(format!("{}/api/health/{record_id}", app.base))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();
    assert_eq!(alice_delete.status(), 200);
}
