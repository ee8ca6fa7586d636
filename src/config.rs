//! Layered configuration: a `rule_engine.toml` base, an optional
//! `rule_engine.local.toml` override, and a `RULE_ENGINE_`-prefixed
//! environment overlay (double underscore for nesting).

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Which [`crate::cache::Cache`] backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheBackendKind {
    InMemory,
    #[serde(rename = "CAFFEINE-like")]
    CaffeineLike,
    Adaptive,
    Remote,
    NoOp,
}

impl Default for CacheBackendKind {
    fn default() -> Self {
        CacheBackendKind::CaffeineLike
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackendKind,
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "default_true")]
    pub record_stats: bool,
    #[serde(default = "default_low_threshold")]
    pub low_threshold: f64,
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,
    #[serde(default = "default_tuning_interval")]
    pub tuning_interval_seconds: u64,
    #[serde(default = "default_min_size")]
    pub min_size: usize,
}

fn default_max_size() -> usize {
    100_000
}
fn default_ttl_seconds() -> u64 {
    300
}
fn default_true() -> bool {
    true
}
fn default_low_threshold() -> f64 {
    0.3
}
fn default_high_threshold() -> f64 {
    0.9
}
fn default_tuning_interval() -> u64 {
    60
}
fn default_min_size() -> usize {
    1_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::default(),
            max_size: default_max_size(),
            ttl_seconds: default_ttl_seconds(),
            record_stats: default_true(),
            low_threshold: default_low_threshold(),
            high_threshold: default_high_threshold(),
            tuning_interval_seconds: default_tuning_interval(),
            min_size: default_min_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_rule_source_path")]
    pub rule_source_path: PathBuf,
    #[serde(default = "default_watch_interval")]
    pub watch_interval_seconds: u64,
}

fn default_rule_source_path() -> PathBuf {
    PathBuf::from("rules.json")
}
fn default_watch_interval() -> u64 {
    10
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            rule_source_path: default_rule_source_path(),
            watch_interval_seconds: default_watch_interval(),
        }
    }
}

/// Trace Collector (C14) verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TraceLevel {
    None,
    RuleOnly,
    Standard,
    Full,
}

impl Default for TraceLevel {
    fn default() -> Self {
        TraceLevel::None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default = "default_intersection_threshold")]
    pub intersection_cardinality_threshold: u32,
    #[serde(default)]
    pub trace_level: TraceLevel,
    #[serde(default)]
    pub truncate_matches: Option<usize>,
}

fn default_intersection_threshold() -> u32 {
    128
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            intersection_cardinality_threshold: default_intersection_threshold(),
            trace_level: TraceLevel::default(),
            truncate_matches: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Top-level engine configuration, loaded via [`EngineConfig::load`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            model: ModelConfig::default(),
            evaluation: EvaluationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from `rule_engine.toml`, overlaid by
    /// `rule_engine.local.toml` if present, overlaid by `RULE_ENGINE_`
    /// prefixed environment variables (`__` separates nested keys).
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("rule_engine.toml"))
            .merge(Toml::file("rule_engine.local.toml"))
            .merge(Env::prefixed("RULE_ENGINE_").split("__"))
            .extract()
    }

    /// Loads configuration from an explicit file path, without the
    /// `.local.toml` override.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("RULE_ENGINE_").split("__"))
            .extract()
    }
}
