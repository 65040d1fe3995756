//! Port backends

pub mod leads;
pub mod messages;

use std::sync::Arc;

use leadflow_core::Ports;

use self::leads::InMemoryLeadStore;
use self::messages::{InMemoryMessageLog, RecordingSender};

/// All in-memory backends wired together
#[derive(Debug, Clone, Default)]
pub struct InMemoryPorts {
    pub leads: Arc<InMemoryLeadStore>,
    pub sender: Arc<RecordingSender>,
    pub message_log: Arc<InMemoryMessageLog>,
}

impl InMemoryPorts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_leads(leads: InMemoryLeadStore) -> Self {
        Self {
            leads: Arc::new(leads),
            ..Default::default()
        }
    }

    /// Port bundle for the runtime
    pub fn ports(&self) -> Ports {
        Ports::new(
            self.sender.clone(),
            self.leads.clone(),
            self.leads.clone(),
            self.message_log.clone(),
        )
    }
}
