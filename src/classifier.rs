//! Text classifier: provider abstraction + remote inference + mock.
//!
//! The classifier is a black box that answers with a binary label and a
//! confidence. Providers are built once at startup and shared as
//! [`DynClassifier`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ClassifierConfig;
use crate::error::ClassifierError;

pub const ENV_CLASSIFIER_MODE: &str = "CLASSIFIER_MODE";

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Label {
    Positive,
    Negative,
}

impl Label {
    /// Anything but `POSITIVE` counts as non-positive.
    pub fn from_wire(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("positive") {
            Label::Positive
        } else {
            Label::Negative
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: Label,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

impl Classification {
    pub fn new(label: Label, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self { label, confidence }
    }

    /// `+confidence` for a positive label, `-confidence` otherwise.
    pub fn signed(&self) -> f64 {
        match self.label {
            Label::Positive => self.confidence,
            Label::Negative => -self.confidence,
        }
    }
}

#[async_trait]
pub trait TextClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Classification, ClassifierError>;

    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynClassifier = Arc<dyn TextClassifier>;

/// Build the classifier described by `config`.
///
/// * `CLASSIFIER_MODE=mock` forces the deterministic mock.
/// * `provider = "huggingface"` builds the remote inference client.
/// * `provider = "mock"` builds the mock.
pub fn build_classifier(config: &ClassifierConfig) -> anyhow::Result<DynClassifier> {
    let forced_mock = std::env::var(ENV_CLASSIFIER_MODE)
        .map(|v| v.eq_ignore_ascii_case("mock"))
        .unwrap_or(false);
    if forced_mock {
        return Ok(Arc::new(MockClassifier::default()));
    }

    match config.provider.as_str() {
        "huggingface" | "hf" => {
            let client = HfInferenceClassifier::new(config)
                .context("building huggingface inference client")?;
            Ok(Arc::new(client))
        }
        "mock" => Ok(Arc::new(MockClassifier::default())),
        other => bail!("unsupported classifier provider in config: {other}"),
    }
}

// ------------------------------------------------------------
// Remote inference provider
// ------------------------------------------------------------

/// Text-classification endpoint speaking the Hugging Face inference protocol:
/// `POST {"inputs": text}` answered by `[[{"label", "score"}, ...]]`.
pub struct HfInferenceClassifier {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    retries: u8,
}

#[derive(Serialize)]
struct HfRequest<'a> {
    inputs: &'a str,
}

#[derive(Debug, Deserialize)]
struct HfLabel {
    label: String,
    score: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HfResponse {
    Nested(Vec<Vec<HfLabel>>),
    Flat(Vec<HfLabel>),
}

impl HfInferenceClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        if config.endpoint.trim().is_empty() {
            return Err(ClassifierError::NotConfigured(
                "classifier.endpoint is empty".into(),
            ));
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("vibe-oracle/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            retries: config.retries,
        })
    }

    async fn fetch_once(&self, text: &str) -> Result<Classification, ClassifierError> {
        let mut req = self.http.post(&self.endpoint).json(&HfRequest { inputs: text });
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }
        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }
        let body: HfResponse = resp
            .json()
            .await
            .map_err(|e| ClassifierError::Malformed(e.to_string()))?;
        pick_top(body)
    }
}

/// Highest-scoring label wins.
fn pick_top(resp: HfResponse) -> Result<Classification, ClassifierError> {
    let labels = match resp {
        HfResponse::Nested(mut outer) => {
            if outer.is_empty() {
                Vec::new()
            } else {
                outer.swap_remove(0)
            }
        }
        HfResponse::Flat(v) => v,
    };
    labels
        .into_iter()
        .filter(|l| !l.score.is_nan())
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .map(|top| Classification::new(Label::from_wire(&top.label), top.score))
        .ok_or_else(|| ClassifierError::Malformed("no labels in response".into()))
}

fn backoff(attempt: u8) -> Duration {
    Duration::from_millis(200 * u64::from(attempt))
}

#[async_trait]
impl TextClassifier for HfInferenceClassifier {
    async fn classify(&self, text: &str) -> Result<Classification, ClassifierError> {
        let mut attempt: u8 = 0;
        loop {
            match self.fetch_once(text).await {
                Ok(c) => {
                    debug!(label = ?c.label, confidence = c.confidence, attempt, "classifier answered");
                    return Ok(c);
                }
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    warn!(error = %e, attempt, "transient classifier failure, retrying");
                    tokio::time::sleep(backoff(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "huggingface"
    }
}

// ------------------------------------------------------------
// Mock provider
// ------------------------------------------------------------

/// Returns the same classification for every input; used by tests and offline runs.
#[derive(Debug, Clone)]
pub struct MockClassifier {
    pub fixed: Classification,
}

impl MockClassifier {
    pub fn new(label: Label, confidence: f64) -> Self {
        Self {
            fixed: Classification::new(label, confidence),
        }
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new(Label::Positive, 0.5)
    }
}

#[async_trait]
impl TextClassifier for MockClassifier {
    async fn classify(&self, _text: &str) -> Result<Classification, ClassifierError> {
        Ok(self.fixed)
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{
            header::{AUTHORIZATION, CONTENT_TYPE},
            HeaderMap, StatusCode,
        },
        response::IntoResponse,
        routing::post,
        Router,
    };
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn parse(json: &str) -> Result<Classification, ClassifierError> {
        pick_top(serde_json::from_str::<HfResponse>(json).unwrap())
    }

    #[test]
    fn signed_confidence_follows_label() {
        assert_eq!(Classification::new(Label::Positive, 0.87).signed(), 0.87);
        assert_eq!(Classification::new(Label::Negative, 0.87).signed(), -0.87);
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(Classification::new(Label::Positive, 1.7).confidence, 1.0);
        assert_eq!(Classification::new(Label::Negative, -0.2).confidence, 0.0);
        assert_eq!(Classification::new(Label::Positive, f64::NAN).confidence, 0.0);
    }

    #[test]
    fn any_non_positive_label_is_negative() {
        assert_eq!(Label::from_wire("POSITIVE"), Label::Positive);
        assert_eq!(Label::from_wire("positive"), Label::Positive);
        assert_eq!(Label::from_wire("NEGATIVE"), Label::Negative);
        assert_eq!(Label::from_wire("NEUTRAL"), Label::Negative);
    }

    #[test]
    fn nested_response_picks_top_label() {
        let c = parse(
            r#"[[{"label":"NEGATIVE","score":0.0131},{"label":"POSITIVE","score":0.9869}]]"#,
        )
        .unwrap();
        assert_eq!(c.label, Label::Positive);
        assert!((c.confidence - 0.9869).abs() < 1e-12);
    }

    #[test]
    fn flat_response_is_accepted() {
        let c = parse(r#"[{"label":"NEGATIVE","score":0.91},{"label":"POSITIVE","score":0.09}]"#)
            .unwrap();
        assert_eq!(c.signed(), -0.91);
    }

    #[test]
    fn empty_response_is_malformed() {
        assert!(matches!(parse("[]"), Err(ClassifierError::Malformed(_))));
        assert!(matches!(parse("[[]]"), Err(ClassifierError::Malformed(_))));
    }

    #[test]
    fn empty_endpoint_is_not_configured() {
        let cfg = ClassifierConfig {
            endpoint: "  ".into(),
            ..ClassifierConfig::default()
        };
        assert!(matches!(
            HfInferenceClassifier::new(&cfg),
            Err(ClassifierError::NotConfigured(_))
        ));
    }

    #[serial_test::serial]
    #[test]
    fn factory_honours_provider_and_mock_override() {
        std::env::remove_var(ENV_CLASSIFIER_MODE);
        let mock_cfg = ClassifierConfig {
            provider: "mock".into(),
            ..ClassifierConfig::default()
        };
        assert_eq!(build_classifier(&mock_cfg).unwrap().provider_name(), "mock");

        let hf_cfg = ClassifierConfig::default();
        assert_eq!(
            build_classifier(&hf_cfg).unwrap().provider_name(),
            "huggingface"
        );

        let bogus = ClassifierConfig {
            provider: "carrier-pigeon".into(),
            ..ClassifierConfig::default()
        };
        assert!(build_classifier(&bogus).is_err());

        std::env::set_var(ENV_CLASSIFIER_MODE, "mock");
        assert_eq!(build_classifier(&hf_cfg).unwrap().provider_name(), "mock");
        std::env::remove_var(ENV_CLASSIFIER_MODE);
    }

    /// Local inference endpoint that answers `status` for the first `failures`
    /// calls and a POSITIVE 0.8 verdict afterwards.
    struct Stub {
        hits: Arc<AtomicUsize>,
        auth: Arc<Mutex<Option<String>>>,
        endpoint: String,
    }

    async fn stub_endpoint(failures: usize, status: StatusCode) -> Stub {
        let hits = Arc::new(AtomicUsize::new(0));
        let auth = Arc::new(Mutex::new(None));
        let (h, a) = (hits.clone(), auth.clone());
        let app = Router::new().route(
            "/infer",
            post(move |headers: HeaderMap| {
                let (h, a) = (h.clone(), a.clone());
                async move {
                    *a.lock() = headers
                        .get(AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    if h.fetch_add(1, Ordering::SeqCst) < failures {
                        (status, "model is loading").into_response()
                    } else {
                        (
                            StatusCode::OK,
                            [(CONTENT_TYPE, "application/json")],
                            r#"[[{"label":"NEGATIVE","score":0.2},{"label":"POSITIVE","score":0.8}]]"#,
                        )
                            .into_response()
                    }
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Stub {
            hits,
            auth,
            endpoint: format!("http://{addr}/infer"),
        }
    }

    fn client_for(stub: &Stub, retries: u8) -> HfInferenceClassifier {
        HfInferenceClassifier::new(&ClassifierConfig {
            endpoint: stub.endpoint.clone(),
            api_key: "test-token".into(),
            retries,
            ..ClassifierConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn one_unavailable_answer_is_retried() {
        let stub = stub_endpoint(1, StatusCode::SERVICE_UNAVAILABLE).await;
        let c = client_for(&stub, 1).classify("gm frens").await.unwrap();
        assert_eq!(c.label, Label::Positive);
        assert!((c.confidence - 0.8).abs() < 1e-12);
        assert_eq!(stub.hits.load(Ordering::SeqCst), 2);
        assert_eq!(stub.auth.lock().as_deref(), Some("Bearer test-token"));
    }

    #[tokio::test]
    async fn retries_cap_the_number_of_attempts() {
        let stub = stub_endpoint(usize::MAX, StatusCode::SERVICE_UNAVAILABLE).await;
        let err = client_for(&stub, 2).classify("gm").await.unwrap_err();
        assert!(matches!(err, ClassifierError::Status { status: 503, .. }));
        assert_eq!(stub.hits.load(Ordering::SeqCst), 3);

        let once = stub_endpoint(usize::MAX, StatusCode::SERVICE_UNAVAILABLE).await;
        assert!(client_for(&once, 0).classify("gm").await.is_err());
        assert_eq!(once.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let stub = stub_endpoint(usize::MAX, StatusCode::BAD_REQUEST).await;
        let err = client_for(&stub, 3).classify("gm").await.unwrap_err();
        assert!(matches!(err, ClassifierError::Status { status: 400, .. }));
        assert_eq!(stub.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn mock_is_deterministic() {
        let m = MockClassifier::new(Label::Negative, 0.25);
        let a = m.classify("anything").await.unwrap();
        let b = m.classify("something else").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.signed(), -0.25);
    }
}
