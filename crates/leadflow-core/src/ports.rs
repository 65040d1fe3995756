//! Side-effect ports
//!
//! The engine never talks to the messaging channel or the database directly.
//! Every I/O goes through one of these traits, implemented by the host
//! application (or by `leadflow-memory` in tests and simulations).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::PortError;
use crate::flow::FlowRecord;

/// Point-in-time view of a lead
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadSnapshot {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Phone number / chat address used by the messaging channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    /// Free-form attributes (status, source, ...)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,

    /// Tag set; accepts a list, a JSON-encoded list or a comma-separated string
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
}

impl LeadSnapshot {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Value of a named field; `name` and `phone` resolve to the typed fields
    pub fn attribute(&self, field: &str) -> Option<&str> {
        match field {
            "id" => Some(self.id.as_str()),
            "name" => self.name.as_deref(),
            "phone" => self.phone.as_deref(),
            _ => self.attributes.get(field).map(String::as_str),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Decode a stored tag set
pub fn decode_tags(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if trimmed.starts_with('[') {
        if let Ok(tags) = serde_json::from_str::<Vec<String>>(trimmed) {
            return tags;
        }
        tracing::warn!("Malformed JSON tag list, falling back to comma split: {}", trimmed);
    }
    trimmed
        .trim_matches(|c| c == '[' || c == ']')
        .split(',')
        .map(|t| t.trim().trim_matches('"').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tags {
        List(Vec<String>),
        Encoded(String),
        Missing(()),
    }

    Ok(match Tags::deserialize(deserializer)? {
        Tags::List(tags) => tags,
        Tags::Encoded(raw) => decode_tags(&raw),
        Tags::Missing(()) => Vec::new(),
    })
}

/// Read side of the flow store
#[async_trait]
pub trait FlowStore: Send + Sync {
    /// Enabled flows of a tenant, as stored
    async fn list_enabled_flows(&self, tenant_id: &str) -> Result<Vec<FlowRecord>, PortError>;
}

/// Delivers text over the messaging channel
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, channel_id: &str, address: &str, text: &str) -> Result<(), PortError>;
}

#[async_trait]
impl<T: MessageSender + ?Sized> MessageSender for Arc<T> {
    async fn send(&self, channel_id: &str, address: &str, text: &str) -> Result<(), PortError> {
        (**self).send(channel_id, address, text).await
    }
}

#[async_trait]
pub trait LeadLookup: Send + Sync {
    /// `Ok(None)` when the lead does not exist
    async fn get_lead(&self, lead_id: &str) -> Result<Option<LeadSnapshot>, PortError>;
}

#[async_trait]
pub trait LeadMutation: Send + Sync {
    /// Replace the lead's tag set
    async fn set_tags(&self, lead_id: &str, tags: &[String]) -> Result<(), PortError>;
}

/// Persists outbound messages into the conversation history
#[async_trait]
pub trait MessageLog: Send + Sync {
    async fn record_outbound_message(
        &self,
        channel_id: &str,
        lead_id: &str,
        text: &str,
    ) -> Result<(), PortError>;
}

/// Bundle of ports injected into the runtime
#[derive(Clone)]
pub struct Ports {
    pub sender: Arc<dyn MessageSender>,
    pub leads: Arc<dyn LeadLookup>,
    pub mutations: Arc<dyn LeadMutation>,
    pub message_log: Arc<dyn MessageLog>,
}

impl Ports {
    pub fn new(
        sender: Arc<dyn MessageSender>,
        leads: Arc<dyn LeadLookup>,
        mutations: Arc<dyn LeadMutation>,
        message_log: Arc<dyn MessageLog>,
    ) -> Self {
        Self {
            sender,
            leads,
            mutations,
            message_log,
        }
    }
}

impl fmt::Debug for Ports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ports").finish_non_exhaustive()
    }
}
