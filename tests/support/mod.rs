//! Test support: a canned-response stand-in for the Gemini endpoint.
//! Note: Must be imported in each test file

#![allow(unused)] // For test support

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use saraia::{GeminiProvider, GeminiProviderBuilder};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::net::TcpListener;

pub const TEST_KEY: &str = "test-key";
pub const GENERATE_TARGET: &str =
    "/v1beta/models/gemini-2.5-flash-image:generateContent?key=test-key";

/// One request as the fixture saw it.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    /// Path plus query string.
    pub target: String,
    /// Parsed JSON body, `Null` when empty.
    pub body: Value,
}

#[derive(Debug, Clone)]
pub struct CannedReply {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl CannedReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

struct FixtureState {
    replies: Vec<CannedReply>,
    served: AtomicUsize,
    requests: Mutex<Vec<CapturedRequest>>,
}

/// Serves canned replies in order; the last one repeats.
pub struct FixtureServer {
    pub base_url: String,
    state: Arc<FixtureState>,
}

impl FixtureServer {
    pub async fn start(status: u16, body: impl Into<String>) -> Self {
        Self::start_sequence(vec![CannedReply::new(status, body)]).await
    }

    pub async fn start_sequence(replies: Vec<CannedReply>) -> Self {
        assert!(!replies.is_empty(), "fixture needs at least one reply");
        let state = Arc::new(FixtureState {
            replies,
            served: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .fallback(record)
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        Self {
            base_url: format!("http://{addr}/v1beta"),
            state,
        }
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Provider builder pointed at this fixture.
    pub fn provider_builder(&self) -> GeminiProviderBuilder {
        bypass_proxies();
        GeminiProvider::builder()
            .api_key(TEST_KEY)
            .base_url(&self.base_url)
            .timeout(Duration::from_secs(5))
    }

    pub fn provider(&self) -> GeminiProvider {
        self.provider_builder().build().unwrap()
    }
}

/// Keeps loopback traffic away from any proxy configured in the environment.
pub fn bypass_proxies() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
        std::env::set_var("no_proxy", "127.0.0.1,localhost");
    });
}

/// A base URL nothing is listening on.
pub async fn closed_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/v1beta")
}

pub fn success_body(data: &str) -> String {
    serde_json::json!({
        "candidates": [{
            "content": {
                "parts": [{ "inlineData": { "mimeType": "image/png", "data": data } }]
            },
            "finishReason": "STOP"
        }]
    })
    .to_string()
}

async fn record(
    State(state): State<Arc<FixtureState>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> impl IntoResponse {
    let served = state.served.fetch_add(1, Ordering::SeqCst);
    let reply = state.replies[served.min(state.replies.len() - 1)].clone();

    state.requests.lock().unwrap().push(CapturedRequest {
        method: method.to_string(),
        target: uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_default(),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }

    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, "application/json")], reply.body)
}
