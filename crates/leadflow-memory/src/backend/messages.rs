//! Outbound message capture: a recording sender and an in-memory message log

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leadflow_core::{MessageLog, MessageSender, PortError};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A message handed to the sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    pub channel_id: String,
    pub address: String,
    pub text: String,
}

/// Sender that records instead of delivering
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<SentMessage>>,
    failing_texts: Mutex<HashSet<String>>,
    fail_next: AtomicUsize,
    attempts: AtomicUsize,
    delay: RwLock<Option<Duration>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every send of exactly this text
    pub fn fail_on(&self, text: impl Into<String>) {
        self.failing_texts.lock().insert(text.into());
    }

    /// Fail the next `count` sends with a transient error
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Delay each send before it completes
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write() = delay;
    }

    /// Successfully delivered messages, in order
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|m| m.text.clone()).collect()
    }

    /// Every call, including failed ones
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, channel_id: &str, address: &str, text: &str) -> Result<(), PortError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let pending_failures = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending_failures.is_ok() {
            return Err(PortError::Unavailable("channel session not ready".to_string()));
        }

        if self.failing_texts.lock().contains(text) {
            return Err(PortError::Rejected(format!("send refused for '{}'", text)));
        }

        debug!("Sent to {} via {}: {}", address, channel_id, text);
        self.sent.lock().push(SentMessage {
            channel_id: channel_id.to_string(),
            address: address.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}

/// Row of the outbound message history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundRecord {
    pub channel_id: String,
    pub lead_id: String,
    pub text: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct InMemoryMessageLog {
    records: Mutex<Vec<OutboundRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryMessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<OutboundRecord> {
        self.records.lock().clone()
    }

    pub fn records_for(&self, lead_id: &str) -> Vec<OutboundRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.lead_id == lead_id)
            .cloned()
            .collect()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageLog for InMemoryMessageLog {
    async fn record_outbound_message(
        &self,
        channel_id: &str,
        lead_id: &str,
        text: &str,
    ) -> Result<(), PortError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PortError::Unavailable("message log offline".to_string()));
        }
        self.records.lock().push(OutboundRecord {
            channel_id: channel_id.to_string(),
            lead_id: lead_id.to_string(),
            text: text.to_string(),
            recorded_at: Utc::now(),
        });
        Ok(())
    }
}
