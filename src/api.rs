use std::num::{IntErrorKind, NonZeroUsize};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::aggregator::ScoreAggregator;
use crate::classifier::build_classifier;
use crate::config::{HttpConfig, OracleConfig};
use crate::error::ApiError;
use crate::history::{CurrentScore, HistoryLedger, HistoryRecord};
use crate::lexicon::LexiconScorer;
use crate::metrics;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<ScoreAggregator>,
    pub history: Arc<HistoryLedger>,
    pub http: Arc<HttpConfig>,
}

impl AppState {
    pub fn new(aggregator: ScoreAggregator, history: HistoryLedger, http: HttpConfig) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            history: Arc::new(history),
            http: Arc::new(http),
        }
    }

    /// Load both collaborators once; they live as long as the state.
    pub fn from_config(cfg: &OracleConfig) -> anyhow::Result<Self> {
        let classifier = build_classifier(&cfg.classifier)?;
        let aggregator = ScoreAggregator::new(
            Arc::new(LexiconScorer::new()),
            classifier,
            cfg.aggregator.timeout(),
        );
        info!(
            lexicon = aggregator.lexicon_name(),
            classifier = aggregator.classifier_name(),
            capacity = cfg.history.capacity,
            "collaborators ready"
        );
        Ok(Self::new(
            aggregator,
            HistoryLedger::with_capacity(cfg.history.capacity),
            cfg.http.clone(),
        ))
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.http.max_body_bytes;
    Router::new()
        .route("/", get(home))
        .route("/health", get(|| async { "OK" }))
        .route("/analyze", post(analyze))
        .route("/latest", get(latest))
        .route("/current", get(current))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// Short anonymized id for logs; raw text is never logged.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[derive(Serialize)]
struct HomeResp {
    message: String,
}

async fn home(State(state): State<AppState>) -> Json<HomeResp> {
    Json(HomeResp {
        message: state.http.banner.clone(),
    })
}

#[derive(Deserialize)]
struct AnalyzeReq {
    username: String,
    text: String,
}

async fn analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeReq>,
) -> Result<Json<HistoryRecord>, ApiError> {
    if body.username.trim().is_empty() {
        return Err(ApiError::validation("username must not be empty"));
    }
    if body.text.trim().is_empty() {
        return Err(ApiError::validation("text must not be empty"));
    }

    let id = anon_hash(&body.text);
    let started = Instant::now();
    let reading = match state.aggregator.analyze(&body.text).await {
        Ok(r) => r,
        Err(e) => {
            metrics::record_failure(e.kind());
            warn!(%id, error = %e, "analysis failed");
            return Err(e.into());
        }
    };

    let record = HistoryRecord::new(&body.username, &body.text, reading);
    let len = state.history.record(record.clone());

    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    metrics::record_analysis(elapsed_ms, reading.oracle_score, len);
    info!(
        %id,
        oracle = reading.oracle_score,
        vibe = reading.community_vibe_score,
        history_len = len,
        elapsed_ms,
        "analysis recorded"
    );
    Ok(Json(record))
}

#[derive(Deserialize)]
struct LatestQuery {
    // Parsed by hand so bad values get the same JSON error as other validation failures.
    limit: Option<String>,
}

#[derive(Serialize)]
struct LatestResp {
    scores: Vec<HistoryRecord>,
    count: usize,
    latest_oracle_score: u8,
}

/// The configured default when absent; an error for zero, negative, or non-numeric values.
/// Values too large for `usize` mean "everything".
fn parse_limit(raw: Option<&str>, default: usize) -> Result<NonZeroUsize, ApiError> {
    let invalid = || ApiError::validation("limit must be a positive integer");
    match raw {
        None => NonZeroUsize::new(default).ok_or_else(invalid),
        Some(s) => match s.trim().parse::<usize>() {
            Ok(n) => NonZeroUsize::new(n).ok_or_else(invalid),
            Err(e) if *e.kind() == IntErrorKind::PosOverflow => Ok(NonZeroUsize::MAX),
            Err(_) => Err(invalid()),
        },
    }
}

async fn latest(
    State(state): State<AppState>,
    Query(q): Query<LatestQuery>,
) -> Result<Json<LatestResp>, ApiError> {
    let limit = parse_limit(q.limit.as_deref(), state.http.default_limit)?;
    let w = state.history.window(Some(limit));
    Ok(Json(LatestResp {
        scores: w.records,
        count: w.total,
        latest_oracle_score: w.latest_oracle_score,
    }))
}

async fn current(State(state): State<AppState>) -> Json<CurrentScore> {
    Json(state.history.current())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_parsing() {
        assert_eq!(parse_limit(None, 10).unwrap().get(), 10);
        assert_eq!(parse_limit(Some("3"), 10).unwrap().get(), 3);
        assert_eq!(parse_limit(Some(" 7 "), 10).unwrap().get(), 7);
        assert!(parse_limit(Some("0"), 10).is_err());
        assert!(parse_limit(Some("-2"), 10).is_err());
        assert!(parse_limit(Some("ten"), 10).is_err());
        assert!(parse_limit(Some(""), 10).is_err());
    }

    #[test]
    fn oversized_limit_means_everything() {
        let huge = parse_limit(Some("99999999999999999999"), 10).unwrap();
        assert_eq!(huge, NonZeroUsize::MAX);
        assert!(parse_limit(Some("-99999999999999999999"), 10).is_err());
    }

    #[test]
    fn anon_hash_is_short_and_stable() {
        let a = anon_hash("to the moon");
        assert_eq!(a.len(), 12);
        assert_eq!(a, anon_hash("to the moon"));
        assert_ne!(a, anon_hash("to the mooon"));
    }
}
