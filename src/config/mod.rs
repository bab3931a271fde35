// src/config/mod.rs
//! Runtime configuration.

pub mod oracle;

pub use oracle::{
    AggregatorConfig, ClassifierConfig, HistoryConfig, HttpConfig, OracleConfig,
    DEFAULT_ORACLE_CONFIG_PATH, ENV_ORACLE_CONFIG_PATH,
};
