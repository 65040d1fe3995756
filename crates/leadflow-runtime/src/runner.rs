//! Flow runner
//!
//! Walks a flow from a matched entry node with an explicit stack instead of
//! recursion. Every node of a run is executed at most once: reaching a node
//! that is already in the run's visited set stops the run with
//! `RunStatus::CycleDetected`, and the step cap stops it with
//! `RunStatus::StepLimitExceeded`. A failed node ends only its own branch.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use leadflow_core::{
    BranchLabel, EngineConfig, ExecutionContext, Flow, InboundMessage, NodeExecutionError, Visit,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::executor::{Effect, NodeDispatcher};

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every branch reached a node without followable edges (or failed)
    Completed,
    /// A node was reached a second time in the same run, whether through a
    /// loop or through two branches that re-converge on it
    CycleDetected { node_id: String },
    /// The run executed `limit` nodes and had more pending
    StepLimitExceeded { limit: usize },
    /// The entry node is not part of the flow
    InvalidEntry { node_id: String },
}

impl RunStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Cycle or step guard tripped
    pub fn is_guard_trip(&self) -> bool {
        matches!(
            self,
            Self::CycleDetected { .. } | Self::StepLimitExceeded { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Completed,
    Skipped,
    Failed,
}

/// Record of one executed node
#[derive(Debug, Clone, Serialize)]
pub struct NodeResult {
    pub node_id: String,
    pub kind: String,
    pub status: NodeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect: Option<Effect>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<BranchLabel>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run_id: String,
    pub flow_id: String,
    pub tenant_id: String,
    pub lead_id: String,
    pub entry_node: String,
    #[serde(flatten)]
    pub status: RunStatus,
    /// Executed nodes, including skipped and failed ones
    pub steps: usize,
    pub nodes: Vec<NodeResult>,
    #[serde(skip)]
    pub errors: Vec<NodeExecutionError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    pub fn node(&self, node_id: &str) -> Option<&NodeResult> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }

    /// Effects of the nodes that completed, in execution order
    pub fn effects(&self) -> impl Iterator<Item = &Effect> {
        self.nodes
            .iter()
            .filter(|n| n.status == NodeStatus::Completed)
            .filter_map(|n| n.effect.as_ref())
    }

    pub fn failed_nodes(&self) -> usize {
        self.errors.len()
    }
}

/// Progress events for monitoring a run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    Started {
        run_id: String,
        flow_id: String,
        entry_node: String,
    },
    NodeStarted {
        run_id: String,
        node_id: String,
        kind: String,
    },
    NodeCompleted {
        run_id: String,
        node_id: String,
        duration_ms: u64,
        effect: Effect,
    },
    NodeSkipped {
        run_id: String,
        node_id: String,
        reason: String,
    },
    NodeFailed {
        run_id: String,
        node_id: String,
        error: String,
    },
    GuardTripped {
        run_id: String,
        status: RunStatus,
    },
    Completed {
        run_id: String,
        status: RunStatus,
        steps: usize,
    },
}

/// Executes flows node by node through a `NodeDispatcher`
#[derive(Debug, Clone)]
pub struct FlowRunner {
    dispatcher: Arc<NodeDispatcher>,
    max_steps: usize,
    event_tx: Option<mpsc::Sender<RunEvent>>,
}

impl FlowRunner {
    pub fn new(dispatcher: Arc<NodeDispatcher>, config: &EngineConfig) -> Self {
        Self {
            dispatcher,
            max_steps: config.max_steps,
            event_tx: None,
        }
    }

    /// Set event channel for monitoring
    pub fn with_event_channel(mut self, tx: mpsc::Sender<RunEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn dispatcher(&self) -> &Arc<NodeDispatcher> {
        &self.dispatcher
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Fresh context for one run of `event`; the entry node takes one slot
    pub fn context_for(&self, event: Arc<InboundMessage>) -> ExecutionContext {
        ExecutionContext::new(event, self.max_steps.saturating_add(1))
    }

    /// Run `flow` from `entry_node`
    pub async fn run(&self, flow: &Flow, entry_node: &str, mut ctx: ExecutionContext) -> RunResult {
        let started_at = Utc::now();
        let run_id = ctx.run_id.clone();
        let graph = &flow.graph;

        let mut nodes = Vec::new();
        let mut errors = Vec::new();
        let mut steps = 0usize;

        info!(
            "Run {} started: flow {} from {} (lead {})",
            run_id,
            flow.id,
            entry_node,
            ctx.lead_id()
        );
        self.emit_event(RunEvent::Started {
            run_id: run_id.clone(),
            flow_id: flow.id.clone(),
            entry_node: entry_node.to_string(),
        });

        let status = if !graph.contains(entry_node) {
            warn!("Run {}: entry node {} not in flow {}", run_id, entry_node, flow.id);
            RunStatus::InvalidEntry {
                node_id: entry_node.to_string(),
            }
        } else {
            ctx.visited.visit(entry_node);
            let mut pending: Vec<&str> = graph
                .outgoing(entry_node)
                .iter()
                .rev()
                .map(|e| e.target.as_str())
                .collect();

            let mut status = RunStatus::Completed;
            while let Some(node_id) = pending.pop() {
                if steps >= self.max_steps {
                    status = RunStatus::StepLimitExceeded {
                        limit: self.max_steps,
                    };
                    break;
                }
                match ctx.visited.visit(node_id) {
                    Visit::New => {}
                    Visit::Revisit => {
                        status = RunStatus::CycleDetected {
                            node_id: node_id.to_string(),
                        };
                        break;
                    }
                    Visit::Full => {
                        status = RunStatus::StepLimitExceeded {
                            limit: self.max_steps,
                        };
                        break;
                    }
                }

                // Edges are validated at load time
                let Some(node) = graph.node(node_id) else {
                    continue;
                };

                steps += 1;
                self.emit_event(RunEvent::NodeStarted {
                    run_id: run_id.clone(),
                    node_id: node.id.clone(),
                    kind: node.kind.name().to_string(),
                });

                let start = Instant::now();
                let outcome = self.dispatcher.dispatch(node, &ctx).await;
                let duration_ms = start.elapsed().as_millis() as u64;

                match outcome {
                    Ok(outcome) => {
                        let node_status = if outcome.is_skipped() {
                            NodeStatus::Skipped
                        } else {
                            NodeStatus::Completed
                        };
                        match &outcome.effect {
                            Effect::Skipped { reason } => {
                                debug!("Run {}: node {} skipped: {}", run_id, node.id, reason);
                                self.emit_event(RunEvent::NodeSkipped {
                                    run_id: run_id.clone(),
                                    node_id: node.id.clone(),
                                    reason: reason.clone(),
                                });
                            }
                            effect => self.emit_event(RunEvent::NodeCompleted {
                                run_id: run_id.clone(),
                                node_id: node.id.clone(),
                                duration_ms,
                                effect: effect.clone(),
                            }),
                        }

                        let branch = outcome.branch;
                        let next = graph
                            .outgoing(node_id)
                            .iter()
                            .filter(|e| branch.map_or(true, |b| e.branch == Some(b)))
                            .rev()
                            .map(|e| e.target.as_str());
                        pending.extend(next);

                        nodes.push(NodeResult {
                            node_id: node.id.clone(),
                            kind: node.kind.name().to_string(),
                            status: node_status,
                            effect: Some(outcome.effect),
                            branch,
                            duration_ms,
                            error: None,
                        });
                    }
                    Err(e) => {
                        error!("Run {}: {}", run_id, e);
                        self.emit_event(RunEvent::NodeFailed {
                            run_id: run_id.clone(),
                            node_id: node.id.clone(),
                            error: e.to_string(),
                        });
                        nodes.push(NodeResult {
                            node_id: node.id.clone(),
                            kind: node.kind.name().to_string(),
                            status: NodeStatus::Failed,
                            effect: None,
                            branch: None,
                            duration_ms,
                            error: Some(e.cause.to_string()),
                        });
                        errors.push(e);
                    }
                }
            }
            status
        };

        if status.is_guard_trip() {
            warn!(
                "Run {} of flow {} stopped after {} steps: {:?}",
                run_id, flow.id, steps, status
            );
            self.emit_event(RunEvent::GuardTripped {
                run_id: run_id.clone(),
                status: status.clone(),
            });
        } else {
            info!(
                "Run {} of flow {} finished: {} steps, {} failed",
                run_id,
                flow.id,
                steps,
                errors.len()
            );
        }
        self.emit_event(RunEvent::Completed {
            run_id: run_id.clone(),
            status: status.clone(),
            steps,
        });

        RunResult {
            run_id,
            flow_id: flow.id.clone(),
            tenant_id: ctx.tenant_id().to_string(),
            lead_id: ctx.lead_id().to_string(),
            entry_node: entry_node.to_string(),
            status,
            steps,
            nodes,
            errors,
            started_at,
            finished_at: Utc::now(),
        }
    }

    fn emit_event(&self, event: RunEvent) {
        if let Some(ref tx) = self.event_tx {
            if let Err(e) = tx.try_send(event) {
                warn!("Dropped run event: {}", e);
            }
        }
    }
}
