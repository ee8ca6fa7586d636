//! A high-throughput rule evaluation engine: compiles declarative
//! conditions into a compact, bitmap-indexed model and matches incoming
//! events against it with sub-millisecond latency.
//!
//! The pipeline is: parse and validate a JSON rule source
//! ([`rule`]), factor and expand it into physical combinations
//! ([`factorizer`], [`combination`]), profile and compile it into an
//! immutable [`model::EngineModel`] ([`model`]), then evaluate events
//! against the live model via the base-condition evaluator
//! ([`eligibility`]) and rule evaluator ([`evaluator`]). [`manager`]
//! owns the model's lifecycle and hot-swaps it on recompile.

pub mod base_condition;
pub mod bitmap;
pub mod cache;
pub mod combination;
pub mod config;
pub mod dictionary;
pub mod eligibility;
pub mod error;
pub mod event;
pub mod evaluator;
pub mod factorizer;
pub mod hashing;
pub mod logging;
pub mod manager;
pub mod model;
pub mod pool;
pub mod predicate;
pub mod rule;
pub mod selectivity;
pub mod trace;
pub mod value;

pub use config::EngineConfig;
pub use error::EngineError;
pub use evaluator::{evaluate_event, MatchResult, MatchedRule};
pub use event::{encode_event, Event};
pub use manager::ModelManager;
pub use model::{compile_model, EngineModel, ModelStats};
