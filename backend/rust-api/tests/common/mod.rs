#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use gsat_quiz_api::{
    config::Config, create_router, services::gemini_client::LanguageModel, services::AppState,
    QuizError, QuizResult,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tower::ServiceExt;

pub const READING_QUESTION: &str = "\
Bees have shaped human farming for thousands of years.

1. What is the main idea of the passage?
(A) Farming (B) Bees (C) Honey (D) Weather
2. What can be inferred from the second paragraph?
(A) One (B) Two (C) Three (D) Four
3. Which title suits the passage best?
(A) Red (B) Blue (C) Green (D) Gold";

pub const READING_ANSWER: &str = "1. (A) 2. (C) 3. (B)\n解析：第一題主旨為蜜蜂與農業。";

pub fn generated(question: &str, answer: &str) -> String {
    format!("{}\n@@@答案與解析@@@\n{}", question, answer)
}

/// Holds a model call until the test releases it.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

/// Scripted language model: replies are consumed in order and every prompt
/// is recorded for later inspection.
pub struct FakeModel {
    configured: bool,
    text_replies: Mutex<VecDeque<QuizResult<String>>>,
    json_replies: Mutex<VecDeque<QuizResult<String>>>,
    pub text_prompts: Mutex<Vec<String>>,
    pub json_prompts: Mutex<Vec<String>>,
    pub gate: Option<Arc<Gate>>,
}

impl FakeModel {
    pub fn new() -> Self {
        Self {
            configured: true,
            text_replies: Mutex::new(VecDeque::new()),
            json_replies: Mutex::new(VecDeque::new()),
            text_prompts: Mutex::new(Vec::new()),
            json_prompts: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    pub fn gated(gate: Arc<Gate>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    pub fn with_text(self, reply: QuizResult<String>) -> Self {
        self.text_replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn with_json(self, reply: QuizResult<String>) -> Self {
        self.json_replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn text_calls(&self) -> usize {
        self.text_prompts.lock().unwrap().len()
    }

    pub fn json_calls(&self) -> usize {
        self.json_prompts.lock().unwrap().len()
    }

    fn missing_key() -> QuizError {
        QuizError::configuration("API_KEY is not set")
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn generate_text(&self, prompt: &str) -> QuizResult<String> {
        if !self.configured {
            return Err(Self::missing_key());
        }
        self.text_prompts.lock().unwrap().push(prompt.to_string());

        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        self.text_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(QuizError::transport("no scripted reply")))
    }

    async fn generate_json(&self, prompt: &str, _schema: &Value) -> QuizResult<String> {
        if !self.configured {
            return Err(Self::missing_key());
        }
        self.json_prompts.lock().unwrap().push(prompt.to_string());
        self.json_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(QuizError::transport("no scripted reply")))
    }

    fn is_configured(&self) -> bool {
        self.configured
    }
}

pub fn test_config() -> Config {
    Config {
        sse_max_stream_secs: 5,
        ..Config::default()
    }
}

pub fn create_test_app(model: Arc<FakeModel>) -> Router {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let state = Arc::new(AppState::with_model(test_config(), model));
    create_router(state)
}

pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, json)
}

/// Creates a session with `question_type` selected and returns its id.
pub async fn create_session(app: &Router, question_type: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/sessions",
        Some(serde_json::json!({ "question_type": question_type })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body: {}", body);
    body["session_id"].as_str().unwrap().to_string()
}
