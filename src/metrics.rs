use axum::{routing::get, Router};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const ENV_METRICS_ROUTES: &str = "METRICS_ROUTES";

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder once per process; later calls reuse it.
    pub fn init() -> anyhow::Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                let handle = PrometheusBuilder::new().install_recorder()?;
                // Seed series so a fresh scrape lists them.
                counter!("oracle_analyze_total").absolute(0);
                gauge!("oracle_history_len").set(0.0);
                Ok::<_, anyhow::Error>(handle)
            })?
            .clone();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// `/metrics` is only mounted when `METRICS_ROUTES=1`.
pub fn routes_enabled() -> bool {
    std::env::var(ENV_METRICS_ROUTES).ok().as_deref() == Some("1")
}

pub fn record_analysis(duration_ms: f64, oracle_score: u8, history_len: usize) {
    counter!("oracle_analyze_total").increment(1);
    histogram!("oracle_analyze_duration_ms").record(duration_ms);
    gauge!("oracle_last_score").set(f64::from(oracle_score));
    gauge!("oracle_history_len").set(history_len as f64);
}

pub fn record_failure(reason: &'static str) {
    counter!("oracle_analyze_failures_total", "reason" => reason).increment(1);
}
