//! InboundHandler - entry point for inbound chat messages
//!
//! One call per received message. The handler never fails because a flow is
//! broken or a node failed: broken flows are excluded and reported, node
//! failures live in the run results. The only error it returns is the flow
//! store itself being unreachable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use leadflow_core::{
    EngineConfig, Flow, FlowRecord, FlowStore, InboundMessage, LeadflowError, LeadflowResult,
    PortError, Ports,
};
use leadflow_runtime::{FlowRunner, NodeDispatcher, RetryingSender, RunResult};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::matcher::TriggerMatcher;

/// Counters for operational tooling
#[derive(Debug, Default)]
pub struct HandlerStats {
    events: AtomicU64,
    matched_runs: AtomicU64,
    completed_runs: AtomicU64,
    node_failures: AtomicU64,
    guard_trips: AtomicU64,
    excluded_flows: AtomicU64,
}

/// Point-in-time copy of `HandlerStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub events: u64,
    pub matched_runs: u64,
    pub completed_runs: u64,
    pub node_failures: u64,
    pub guard_trips: u64,
    pub excluded_flows: u64,
}

impl HandlerStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            events: self.events.load(Ordering::Relaxed),
            matched_runs: self.matched_runs.load(Ordering::Relaxed),
            completed_runs: self.completed_runs.load(Ordering::Relaxed),
            node_failures: self.node_failures.load(Ordering::Relaxed),
            guard_trips: self.guard_trips.load(Ordering::Relaxed),
            excluded_flows: self.excluded_flows.load(Ordering::Relaxed),
        }
    }

    fn record_run(&self, result: &RunResult) {
        if result.status.is_completed() {
            self.completed_runs.fetch_add(1, Ordering::Relaxed);
        }
        if result.status.is_guard_trip() {
            self.guard_trips.fetch_add(1, Ordering::Relaxed);
        }
        self.node_failures
            .fetch_add(result.failed_nodes() as u64, Ordering::Relaxed);
    }
}

/// A stored flow that failed validation
#[derive(Debug, Clone, Serialize)]
pub struct ExcludedFlow {
    pub flow_id: String,
    pub error: String,
}

/// What happened to one inbound message
#[derive(Debug, Clone, Serialize)]
pub struct InboundReport {
    pub tenant_id: String,
    pub lead_id: String,
    /// Enabled flows listed for the tenant
    pub flows_considered: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub excluded: Vec<ExcludedFlow>,
    pub runs: Vec<RunResult>,
}

impl InboundReport {
    /// No flow fired for the message
    pub fn is_ignored(&self) -> bool {
        self.runs.is_empty()
    }
}

pub struct InboundHandler {
    store: Arc<dyn FlowStore>,
    runner: FlowRunner,
    matcher: TriggerMatcher,
    stats: HandlerStats,
}

impl InboundHandler {
    pub fn new(store: Arc<dyn FlowStore>, runner: FlowRunner) -> Self {
        Self {
            store,
            runner,
            matcher: TriggerMatcher::new(),
            stats: HandlerStats::default(),
        }
    }

    /// Wire a handler from ports and engine configuration
    ///
    /// When `config.retry` is set the send port is wrapped in a
    /// `RetryingSender`.
    pub fn from_ports(
        store: Arc<dyn FlowStore>,
        mut ports: Ports,
        config: &EngineConfig,
    ) -> LeadflowResult<Self> {
        config.validate()?;

        if let Some(ref retry) = config.retry {
            ports.sender = Arc::new(RetryingSender::new(ports.sender, retry.clone()));
        }

        let dispatcher = Arc::new(NodeDispatcher::new(ports, config));
        Ok(Self::new(store, FlowRunner::new(dispatcher, config)))
    }

    pub fn runner(&self) -> &FlowRunner {
        &self.runner
    }

    pub fn stats(&self) -> &HandlerStats {
        &self.stats
    }

    /// Match an inbound message and run every fired flow
    pub async fn on_inbound_message(&self, event: InboundMessage) -> LeadflowResult<InboundReport> {
        self.stats.events.fetch_add(1, Ordering::Relaxed);
        let event = Arc::new(event);

        debug!(
            "Inbound message for tenant {} lead {} on {}",
            event.tenant_id, event.lead_id, event.channel_id
        );

        let records = self.list_flows(&event.tenant_id).await?;
        let flows_considered = records.len();

        let mut flows = Vec::with_capacity(records.len());
        let mut excluded = Vec::new();
        for record in &records {
            match Flow::from_record(record) {
                Ok(flow) => flows.push(Arc::new(flow)),
                Err(e) => {
                    warn!("Excluding flow {} from matching: {}", record.id, e);
                    self.stats.excluded_flows.fetch_add(1, Ordering::Relaxed);
                    excluded.push(ExcludedFlow {
                        flow_id: record.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let matches = self.matcher.route(&event, &flows);
        if matches.is_empty() {
            debug!(
                "No flow matched message from lead {} (tenant {})",
                event.lead_id, event.tenant_id
            );
        } else {
            info!(
                "{} flow run(s) matched for lead {} (tenant {})",
                matches.len(),
                event.lead_id,
                event.tenant_id
            );
        }
        self.stats
            .matched_runs
            .fetch_add(matches.len() as u64, Ordering::Relaxed);

        let runs = join_all(matches.iter().map(|m| {
            debug!("Flow {} fired by {:?}", m.flow.id, m.reason);
            let ctx = self.runner.context_for(event.clone());
            self.runner.run(&m.flow, &m.entry_node, ctx)
        }))
        .await;

        for run in &runs {
            self.stats.record_run(run);
        }

        Ok(InboundReport {
            tenant_id: event.tenant_id.clone(),
            lead_id: event.lead_id.clone(),
            flows_considered,
            excluded,
            runs,
        })
    }

    async fn list_flows(&self, tenant_id: &str) -> LeadflowResult<Vec<FlowRecord>> {
        let timeout = self.runner.dispatcher().port_timeout();
        match tokio::time::timeout(timeout, self.store.list_enabled_flows(tenant_id)).await {
            Ok(result) => result.map_err(LeadflowError::from),
            Err(_) => Err(LeadflowError::from(PortError::Unavailable(format!(
                "listing flows for tenant {} timed out after {:?}",
                tenant_id, timeout
            )))),
        }
    }
}
