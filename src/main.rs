//! Vibe Oracle binary entrypoint.
//! Boots the Axum HTTP server with both collaborators loaded up front.

use shuttle_axum::ShuttleAxum;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs filtered by `RUST_LOG` (default `vibe_oracle=info,warn`).
/// Shuttle may have installed a subscriber already; then this is a no-op.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vibe_oracle=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    info!("loading sentiment collaborators");
    let router = vibe_oracle::app().await?;
    info!("oracle ready");

    Ok(router.into())
}
