//! TriggerMatcher - selects the flows an inbound message fires
//!
//! A flow fires once per Trigger node whose rule matches the event; the
//! trigger node becomes the entry of that run. Zero matches is the normal
//! "event ignored" outcome.

use std::sync::Arc;

use leadflow_core::{Flow, InboundMessage, TriggerRule};
use tracing::debug;

/// A flow selected for execution
#[derive(Debug, Clone)]
pub struct FlowMatch {
    pub flow: Arc<Flow>,

    /// Trigger node the run starts from
    pub entry_node: String,

    pub reason: MatchReason,
}

/// Why a trigger fired
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchReason {
    /// Keyword found in the inbound text
    Keyword(String),

    /// First contact of a lead
    NewLead,
}

/// Case-insensitive substring test; an empty keyword never matches
pub fn keyword_matches(keyword: &str, text: &str) -> bool {
    if keyword.is_empty() {
        return false;
    }
    text.to_lowercase().contains(&keyword.to_lowercase())
}

#[derive(Debug, Clone, Default)]
pub struct TriggerMatcher;

impl TriggerMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Match an event against a tenant's flows
    pub fn route(&self, event: &InboundMessage, flows: &[Arc<Flow>]) -> Vec<FlowMatch> {
        let mut matches = Vec::new();

        for flow in flows {
            if !flow.enabled || flow.tenant_id != event.tenant_id {
                continue;
            }

            let before = matches.len();
            for (node, rule) in flow.triggers() {
                if let Some(reason) = Self::check_rule(rule, event) {
                    matches.push(FlowMatch {
                        flow: flow.clone(),
                        entry_node: node.id.clone(),
                        reason,
                    });
                }
            }

            if matches.len() == before {
                debug!("Flow {} did not match event for lead {}", flow.id, event.lead_id);
            }
        }

        matches
    }

    fn check_rule(rule: &TriggerRule, event: &InboundMessage) -> Option<MatchReason> {
        match rule {
            TriggerRule::Keyword { keyword } if keyword_matches(keyword, &event.text) => {
                Some(MatchReason::Keyword(keyword.clone()))
            }
            TriggerRule::NewLead if event.first_contact => Some(MatchReason::NewLead),
            _ => None,
        }
    }
}
