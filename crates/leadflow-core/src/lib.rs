// Leadflow Core - Foundation types and traits for the automation engine
//
// This crate holds the flow graph model, the per-run execution context, the
// side-effect port traits the engine calls into, and the error taxonomy.
// It performs no I/O of its own beyond reading flow and config files.

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod flow;
pub mod graph;
pub mod ports;

// Re-export core types
pub use config::{
    EngineConfig, RetryConfig, DEFAULT_MAX_STEPS, DEFAULT_PORT_TIMEOUT_MS, MAX_STEPS_LIMIT,
};
pub use context::{ExecutionContext, Visit, VisitedSet};
pub use error::{
    LeadflowError, LeadflowResult, NodeExecutionError, NodeFailure, PortError,
};
pub use event::InboundMessage;
pub use flow::{read_record, Flow, FlowDocument, FlowRecord, RawEdge, RawNode};
pub use graph::{
    ActionKind, BranchLabel, ConditionSpec, Edge, Graph, Node, NodeKind, TriggerRule,
};
pub use ports::{
    decode_tags, FlowStore, LeadLookup, LeadMutation, LeadSnapshot, MessageLog, MessageSender,
    Ports,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
