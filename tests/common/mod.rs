// tests/common/mod.rs
// Shared helpers: in-process router with injected collaborators.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Request, Response},
    Router,
};
use serde_json::Value as Json;
use tower::ServiceExt as _;

use vibe_oracle::classifier::{Classification, DynClassifier, Label, MockClassifier, TextClassifier};
use vibe_oracle::config::HttpConfig;
use vibe_oracle::error::ClassifierError;
use vibe_oracle::lexicon::PolarityScorer;
use vibe_oracle::{api, AppState, HistoryLedger, ScoreAggregator};

pub const BODY_LIMIT: usize = 1024 * 1024;

pub struct FixedScorer(pub f64);

impl PolarityScorer for FixedScorer {
    fn compound(&self, _text: &str) -> f64 {
        self.0
    }
}

pub struct DownClassifier;

#[async_trait]
impl TextClassifier for DownClassifier {
    async fn classify(&self, _text: &str) -> Result<Classification, ClassifierError> {
        Err(ClassifierError::Status {
            status: 503,
            body: "model is loading".into(),
        })
    }
    fn provider_name(&self) -> &'static str {
        "down"
    }
}

pub fn state_with(lexicon: f64, classifier: DynClassifier, capacity: usize) -> AppState {
    let aggregator = ScoreAggregator::new(
        Arc::new(FixedScorer(lexicon)),
        classifier,
        Duration::from_secs(2),
    );
    AppState::new(
        aggregator,
        HistoryLedger::with_capacity(capacity),
        HttpConfig::default(),
    )
}

/// lexicon 0.5, classifier POSITIVE 0.9 → vibe 0.74, oracle 87
pub fn mock_state() -> AppState {
    state_with(0.5, Arc::new(MockClassifier::new(Label::Positive, 0.9)), 100)
}

pub fn mock_router() -> Router {
    api::router(mock_state())
}

pub fn post_json(uri: &str, body: &Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("build POST")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET")
}

pub async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
    app.clone().oneshot(req).await.expect("oneshot")
}

pub async fn body_json(resp: Response<Body>) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

pub async fn body_text(resp: Response<Body>) -> String {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf8")
}
