//! Rich diagnostic error types for the credence pipeline.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so callers know exactly what went wrong.
//!
//! Most pipeline outcomes are *soft*: an empty source list or a low confidence
//! score is reported through `Option`/[`IngestOutcome`](crate::integrator::IngestOutcome)
//! rather than an error. The only hard failure inside the ingestion path is a
//! graph invariant violation ([`GraphError::NodeNotFound`]).

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the crate.
#[derive(Debug, Error, Diagnostic)]
pub enum CredenceError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Trigger(#[from] TriggerError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for top-level operations.
pub type CredenceResult<T> = std::result::Result<T, CredenceError>;

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("node not found: \"{node_id}\"")]
    #[diagnostic(
        code(credence::graph::node_not_found),
        help(
            "Edges may only connect nodes that already exist. \
             Add both endpoints with `add_node()` before calling `add_edge()`."
        )
    )]
    NodeNotFound { node_id: String },

    #[error("graph snapshot error: {message}")]
    #[diagnostic(
        code(credence::graph::snapshot),
        help(
            "The snapshot could not be encoded or decoded. \
             Check that the JSON was produced by `KnowledgeGraph::to_json()`."
        )
    )]
    Snapshot { message: String },
}

/// Result type for graph operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

// ---------------------------------------------------------------------------
// Trigger errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum TriggerError {
    #[error("trigger \"{id}\" is already registered")]
    #[diagnostic(
        code(credence::trigger::duplicate),
        help("Trigger ids must be unique. Unregister the existing trigger first or pick another id.")
    )]
    Duplicate { id: String },

    #[error("trigger not found: \"{id}\"")]
    #[diagnostic(
        code(credence::trigger::not_found),
        help("List registered triggers with `TriggerManager::list()`.")
    )]
    NotFound { id: String },

    #[error("condition for trigger \"{id}\" failed: {message}")]
    #[diagnostic(
        code(credence::trigger::condition),
        help("The condition could not be evaluated against the supplied context. Check the context keys it reads.")
    )]
    Condition { id: String, message: String },

    #[error("action for trigger \"{id}\" failed: {message}")]
    #[diagnostic(
        code(credence::trigger::action),
        help("The trigger action returned an error. The execution is recorded as failed.")
    )]
    Action { id: String, message: String },

    #[error("context key \"{key}\" is missing or has the wrong type")]
    #[diagnostic(
        code(credence::trigger::context_key),
        help("Populate the context with the detector fragments this condition expects.")
    )]
    ContextKey { key: String },
}

/// Result type for trigger operations.
pub type TriggerResult<T> = std::result::Result<T, TriggerError>;

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(credence::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {message}")]
    #[diagnostic(
        code(credence::config::parse),
        help("Check the TOML syntax and field names in the config file.")
    )]
    Parse { message: String },

    #[error("invalid config value for {field}: {message}")]
    #[diagnostic(
        code(credence::config::invalid),
        help("Thresholds and weights must lie in [0.0, 1.0]; window sizes must be > 0.")
    )]
    Invalid { field: String, message: String },
}

/// Result type for config operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
