//! Error types for the rule evaluation engine.

use thiserror::Error;

/// Errors raised while compiling a rule source into an [`crate::model::EngineModel`].
///
/// Fatal to the recompile attempt in progress; the model manager retains the
/// last-good model on any of these.
#[derive(Error, Debug, Clone)]
pub enum CompileError {
    #[error("rule '{rule_code}' has no conditions")]
    EmptyConditions { rule_code: String },

    #[error("rule '{rule_code}' field '{field}' has an empty disjunction value list")]
    EmptyDisjunctionValues { rule_code: String, field: String },

    #[error("rule '{rule_code}' uses unknown operator '{operator}'")]
    UnknownOperator { rule_code: String, operator: String },

    #[error("rule '{rule_code}' field '{field}' BETWEEN range must have exactly two elements")]
    InvalidRange { rule_code: String, field: String },

    #[error("rule '{rule_code}' field '{field}' operator '{operator}' requires a string value")]
    NonStringValue {
        rule_code: String,
        field: String,
        operator: String,
    },

    #[error("rule '{rule_code}' field '{field}' has an invalid regex pattern: {message}")]
    InvalidRegex {
        rule_code: String,
        field: String,
        message: String,
    },

    #[error("duplicate rule code '{rule_code}'")]
    DuplicateRuleCode { rule_code: String },

    #[error("rule source I/O error: {0}")]
    Io(String),

    #[error("rule source parse error: {0}")]
    Parse(String),
}

/// Non-fatal advisories surfaced alongside a successful compile.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub rule_code: String,
    pub message: String,
}

/// Errors raised while evaluating a single event. These never cross the
/// evaluator's public boundary as a `Result::Err`; they are embedded in the
/// `MatchResult` and leave the compiled model untouched.
#[derive(Error, Debug, Clone)]
pub enum EvaluationError {
    #[error("event '{event_id}': regex evaluation panicked")]
    RegexPanic { event_id: String },

    #[error("event '{event_id}': type coercion failed for field '{field}'")]
    TypeCoercionFailure { event_id: String, field: String },

    #[error("event '{event_id}': internal invariant violated: {message}")]
    InternalInvariant { event_id: String, message: String },
}

/// Errors raised by a [`crate::cache::Cache`] backend. Always degrade to a
/// cache miss on the caller's side; never propagated to the hot path caller
/// as a hard failure.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    #[error("cache backend unavailable: {message}")]
    BackendUnavailable { message: String },

    #[error("cache operation timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("cache (de)serialization failed: {message}")]
    SerializationFailure { message: String },
}

/// Raised when the initial compile fails at process startup. The process
/// must not start with no model.
#[derive(Error, Debug, Clone)]
pub enum ModelLoadError {
    #[error("initial model compile failed: {0}")]
    Compile(#[from] CompileError),

    #[error("rule source I/O error: {0}")]
    Io(String),
}

/// Aggregated error type for embedders that want a single error at their
/// boundary rather than one per subsystem.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),
}
