//! Error types for runtime construction and execution.
//!
//! Construction-time errors (IR validation, factory creation) fail fast and
//! reject the whole graph; per-tick node errors are non-fatal and surface in
//! [`TickResult::errors`](crate::scheduler::TickResult). All variants carry
//! enough context to identify the offending node by key and type tag.

use thiserror::Error;
use tickgraph_ir::IrError;
use tickgraph_telem::TelemError;

/// Convenience result type using [`RuntimeError`].
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// All errors the execution core can produce.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// An unknown node, function, or channel key was referenced.
    #[error("not found: {0}")]
    NotFound(String),

    /// The IR failed structural validation.
    #[error("invalid graph: {0}")]
    Validation(#[from] IrError),

    /// A node's config lacks a required field or carries a wrong type.
    #[error("invalid config for node '{node}': {message}")]
    InvalidConfig {
        /// Key of the misconfigured node.
        node: String,
        /// What is missing or malformed.
        message: String,
    },

    /// A `next()` call reported an error during a tick.
    #[error("node '{node}' failed: {message}")]
    NodeFailure {
        /// Key of the failing node.
        node: String,
        /// Error message from the node.
        message: String,
    },

    /// A factory error, decorated with the node being created.
    #[error("{source} (while creating node '{node}' of type '{type_tag}')")]
    Create {
        /// Key of the node under construction.
        node: String,
        /// Type tag of the node under construction.
        type_tag: String,
        /// The underlying factory error.
        #[source]
        source: Box<RuntimeError>,
    },

    /// A typed series operation failed.
    #[error(transparent)]
    Telem(#[from] TelemError),
}

impl RuntimeError {
    /// A [`RuntimeError::NotFound`] from anything printable.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// An [`RuntimeError::InvalidConfig`] with node context.
    pub fn invalid_config(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            node: node.into(),
            message: message.into(),
        }
    }

    /// A [`RuntimeError::NodeFailure`] with node context.
    pub fn node_failure(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NodeFailure {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Decorate a factory error with the node it was creating.
    pub fn while_creating(self, node: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self::Create {
            node: node.into(),
            type_tag: type_tag.into(),
            source: Box::new(self),
        }
    }
}
