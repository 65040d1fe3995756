//! Node executors
//!
//! One executor per node kind. Each decides an `Effect` and an optional branch
//! label from the node configuration and the execution context, realising the
//! effect through the injected ports. Every port call runs under the
//! configured timeout; failures come back as `NodeExecutionError` and end only
//! the branch that hit them.

pub mod action;
pub mod condition;
pub mod message;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use leadflow_core::{
    BranchLabel, EngineConfig, ExecutionContext, LeadSnapshot, Node, NodeExecutionError,
    NodeFailure, NodeKind, PortError, Ports,
};
use serde::Serialize;
use tracing::debug;

use crate::locks::LeadLocks;

/// Observable outcome of one node execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    MessageSent { address: String, text: String },
    ConditionEvaluated { field: String, matched: bool },
    TagAdded { tag: String },
    /// `add_tag` on a lead that already carries the tag
    TagAlreadyPresent { tag: String },
    /// Node passed through without doing anything
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeOutcome {
    pub effect: Effect,
    /// Set only by Condition nodes; restricts which outgoing edges are followed
    pub branch: Option<BranchLabel>,
}

impl NodeOutcome {
    pub fn done(effect: Effect) -> Self {
        Self {
            effect,
            branch: None,
        }
    }

    pub fn branch(effect: Effect, branch: BranchLabel) -> Self {
        Self {
            effect,
            branch: Some(branch),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::done(Effect::Skipped {
            reason: reason.into(),
        })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.effect, Effect::Skipped { .. })
    }
}

/// Routes a node to the executor for its kind
#[derive(Debug, Clone)]
pub struct NodeDispatcher {
    ports: Ports,
    locks: Arc<LeadLocks>,
    port_timeout: Duration,
}

impl NodeDispatcher {
    pub fn new(ports: Ports, config: &EngineConfig) -> Self {
        Self {
            ports,
            locks: Arc::new(LeadLocks::new()),
            port_timeout: config.port_timeout(),
        }
    }

    /// Share lead locks with other dispatchers in the same process
    pub fn with_locks(mut self, locks: Arc<LeadLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn locks(&self) -> &Arc<LeadLocks> {
        &self.locks
    }

    pub fn port_timeout(&self) -> Duration {
        self.port_timeout
    }

    /// Execute a node against the context
    pub async fn dispatch(
        &self,
        node: &Node,
        ctx: &ExecutionContext,
    ) -> Result<NodeOutcome, NodeExecutionError> {
        debug!("Dispatching node {} ({})", node.id, node.kind.name());

        match &node.kind {
            NodeKind::Message { text } => message::execute(self, &node.id, text, ctx).await,
            NodeKind::Condition(spec) => condition::execute(self, &node.id, spec, ctx).await,
            NodeKind::Action(action) => action::execute(self, &node.id, action, ctx).await,
            NodeKind::Trigger(_) => Ok(NodeOutcome::skipped("trigger node reached mid-flow")),
            NodeKind::Unknown { kind } => {
                Ok(NodeOutcome::skipped(format!("unknown node kind '{}'", kind)))
            }
        }
    }

    /// Await a port call under the per-call timeout
    pub(crate) async fn call_port<T, F>(&self, node_id: &str, call: F) -> Result<T, NodeExecutionError>
    where
        F: Future<Output = Result<T, PortError>>,
    {
        match tokio::time::timeout(self.port_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(NodeExecutionError::new(node_id, e)),
            Err(_) => Err(NodeExecutionError::new(
                node_id,
                NodeFailure::Timeout(self.port_timeout),
            )),
        }
    }

    /// Fetch the context's lead, `None` when it does not exist
    pub(crate) async fn lookup_lead(
        &self,
        node_id: &str,
        ctx: &ExecutionContext,
    ) -> Result<Option<LeadSnapshot>, NodeExecutionError> {
        self.call_port(node_id, self.ports.leads.get_lead(ctx.lead_id()))
            .await
    }

    pub(crate) fn ports(&self) -> &Ports {
        &self.ports
    }
}
