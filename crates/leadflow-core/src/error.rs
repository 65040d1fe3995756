//! Error taxonomy for the automation engine
//!
//! - `LeadflowError` covers flow loading, configuration and I/O.
//! - `PortError` is what an external collaborator returns from a port call.
//! - `NodeExecutionError` is a branch-local failure reported by an executor.
//!
//! Run-level guard trips (cycle, step limit) are not errors: they are
//! terminal statuses of a run, see `leadflow_runtime::RunStatus`.

use std::time::Duration;

use thiserror::Error;

/// Engine-level errors
#[derive(Debug, Error)]
pub enum LeadflowError {
    /// Invalid flow document or engine configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A port call failed outside of node execution (e.g. listing flows)
    #[error("Port error: {0}")]
    Port(#[from] PortError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl LeadflowError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// True for errors that exclude a flow from matching
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

pub type LeadflowResult<T> = Result<T, LeadflowError>;

/// Failure reported by a side-effect port implementation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PortError {
    /// Backend unreachable (network down, pool exhausted, session closed)
    #[error("port unavailable: {0}")]
    Unavailable(String),

    /// Backend answered but refused the request
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl PortError {
    /// Whether a retry has a chance of succeeding
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Why a node could not complete
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NodeFailure {
    #[error(transparent)]
    Port(#[from] PortError),

    #[error("port call timed out after {0:?}")]
    Timeout(Duration),

    #[error("lead '{0}' not found")]
    LeadNotFound(String),

    #[error("lead '{0}' has no address to send to")]
    MissingAddress(String),

    /// The message went out but the outbound record could not be written
    #[error("message delivered to {address} but not recorded: {cause}")]
    Unrecorded {
        address: String,
        cause: Box<NodeFailure>,
    },
}

/// A node failed; aborts only the branch it sits on
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("node '{node_id}' failed: {cause}")]
pub struct NodeExecutionError {
    pub node_id: String,
    #[source]
    pub cause: NodeFailure,
}

impl NodeExecutionError {
    pub fn new(node_id: impl Into<String>, cause: impl Into<NodeFailure>) -> Self {
        Self {
            node_id: node_id.into(),
            cause: cause.into(),
        }
    }
}
