// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregator;
pub mod api;
pub mod classifier;
pub mod config;
pub mod error;
pub mod history;
pub mod lexicon;
pub mod metrics;

// ---- Re-exports for stable public API ----
pub use crate::aggregator::{ScoreAggregator, SentimentReading};
pub use crate::api::{router, AppState};
pub use crate::config::OracleConfig;
pub use crate::history::{CurrentScore, HistoryLedger, HistoryRecord};

use axum::Router;

/// Build the full application from `$ORACLE_CONFIG_PATH` (or defaults).
pub async fn app() -> anyhow::Result<Router> {
    let cfg = OracleConfig::from_env()?;
    build_app(&cfg)
}

/// Build the full application from an explicit config: collaborators, ledger,
/// routes, and `/metrics` when `METRICS_ROUTES=1`.
pub fn build_app(cfg: &OracleConfig) -> anyhow::Result<Router> {
    let prometheus = crate::metrics::Metrics::init()?;
    let state = AppState::from_config(cfg)?;
    let mut app = router(state);
    if crate::metrics::routes_enabled() {
        app = app.merge(prometheus.router());
    }
    Ok(app)
}
