// Leadflow Core - Per-run execution context
//
// One ExecutionContext is created for each (flow, entry node) run of an
// inbound event and dropped when the run ends. The inbound event itself is
// shared read-only between every run the event fired.

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::event::InboundMessage;

/// Result of recording a node visit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// First visit in this run
    New,
    /// Node already visited in this run
    Revisit,
    /// Capacity reached; the node was not recorded
    Full,
}

/// Bounded set of node ids visited during a run
#[derive(Debug, Clone)]
pub struct VisitedSet {
    ids: HashSet<String>,
    capacity: usize,
}

impl VisitedSet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: HashSet::new(),
            capacity,
        }
    }

    /// Record a visit; revisits are reported before capacity is checked
    pub fn visit(&mut self, node_id: &str) -> Visit {
        if self.ids.contains(node_id) {
            return Visit::Revisit;
        }
        if self.ids.len() >= self.capacity {
            return Visit::Full;
        }
        self.ids.insert(node_id.to_string());
        Visit::New
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.ids.contains(node_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Data passed through one run
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub run_id: String,
    pub event: Arc<InboundMessage>,
    pub visited: VisitedSet,
}

impl ExecutionContext {
    pub fn new(event: Arc<InboundMessage>, max_visited: usize) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            event,
            visited: VisitedSet::with_capacity(max_visited),
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.event.tenant_id
    }

    pub fn lead_id(&self) -> &str {
        &self.event.lead_id
    }

    pub fn channel_id(&self) -> &str {
        &self.event.channel_id
    }

    pub fn text(&self) -> &str {
        &self.event.text
    }
}
