// src/config/oracle.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, time::Duration};
use tracing::{info, warn};

// --- env defaults & names ---
pub const DEFAULT_ORACLE_CONFIG_PATH: &str = "config/oracle.toml";
pub const ENV_ORACLE_CONFIG_PATH: &str = "ORACLE_CONFIG_PATH";
pub const ENV_HF_API_TOKEN: &str = "HF_API_TOKEN";

pub const DEFAULT_HF_ENDPOINT: &str =
    "https://api-inference.huggingface.co/models/distilbert-base-uncased-finetuned-sst-2-english";

fn default_banner() -> String {
    "Sentiment Oracle Backend Running 🚀".to_string()
}
fn default_max_body_bytes() -> usize {
    64 * 1024
}
fn default_limit() -> usize {
    10
}
fn default_capacity() -> usize {
    100
}
fn default_provider() -> String {
    "huggingface".to_string()
}
fn default_endpoint() -> String {
    DEFAULT_HF_ENDPOINT.to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_classifier_timeout_ms() -> u64 {
    8_000
}
fn default_connect_timeout_ms() -> u64 {
    3_000
}
fn default_retries() -> u8 {
    1
}
fn default_aggregator_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Message returned by `GET /`.
    #[serde(default = "default_banner")]
    pub banner: String,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// `limit` used by `GET /latest` when the query omits it.
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            banner: default_banner(),
            max_body_bytes: default_max_body_bytes(),
            default_limit: default_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// "huggingface" | "mock" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// "ENV" means: read from HF_API_TOKEN. Empty means anonymous access.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_classifier_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Extra attempts after a transient failure.
    #[serde(default = "default_retries")]
    pub retries: u8,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            endpoint: default_endpoint(),
            api_key: default_api_key(),
            timeout_ms: default_classifier_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            retries: default_retries(),
        }
    }
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Upper bound for one classifier invocation, retries included.
    #[serde(default = "default_aggregator_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_aggregator_timeout_ms(),
        }
    }
}

impl AggregatorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
}

impl OracleConfig {
    /// Load using `$ORACLE_CONFIG_PATH`, falling back to `config/oracle.toml`.
    /// A missing file yields defaults; an unreadable or malformed one is an error.
    pub fn from_env() -> Result<Self> {
        let path = env::var(ENV_ORACLE_CONFIG_PATH)
            .unwrap_or_else(|_| DEFAULT_ORACLE_CONFIG_PATH.to_string());
        let path = Path::new(&path);
        if !path.exists() {
            info!(path = %path.display(), "oracle config not found, using defaults");
            let mut cfg = Self::default();
            cfg.normalize();
            return Ok(cfg);
        }
        Self::load_from_file(path)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading oracle config from {}", path.display()))?;
        let cfg = Self::from_toml_str(&data)
            .with_context(|| format!("parsing oracle config {}", path.display()))?;
        info!(
            path = %path.display(),
            provider = %cfg.classifier.provider,
            capacity = cfg.history.capacity,
            key_len = cfg.classifier.api_key.len(),
            "oracle config loaded"
        );
        Ok(cfg)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: OracleConfig = toml::from_str(s)?;
        cfg.normalize();
        Ok(cfg)
    }

    /// Normalize provider, resolve the API key and clamp out-of-range values.
    fn normalize(&mut self) {
        let c = &mut self.classifier;
        c.provider = c.provider.trim().to_ascii_lowercase();

        if c.api_key.trim().eq_ignore_ascii_case("env") {
            c.api_key = env::var(ENV_HF_API_TOKEN).unwrap_or_default();
        }

        if c.timeout_ms == 0 {
            warn!("classifier.timeout_ms must be positive; using default");
            c.timeout_ms = default_classifier_timeout_ms();
        }
        if c.connect_timeout_ms == 0 {
            warn!("classifier.connect_timeout_ms must be positive; using default");
            c.connect_timeout_ms = default_connect_timeout_ms();
        }
        if self.aggregator.timeout_ms == 0 {
            warn!("aggregator.timeout_ms must be positive; using default");
            self.aggregator.timeout_ms = default_aggregator_timeout_ms();
        }
        if self.history.capacity == 0 {
            warn!("history.capacity must be at least 1; using default");
            self.history.capacity = default_capacity();
        }
        if self.http.default_limit == 0 {
            warn!("http.default_limit must be at least 1; using default");
            self.http.default_limit = default_limit();
        }
    }
}
