//! Inbound chat events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat message received on a tenant's messaging channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub tenant_id: String,

    /// Channel/session the message arrived on; replies go out on the same one
    pub channel_id: String,

    pub lead_id: String,

    /// Free-form message text
    pub text: String,

    /// Set by the intake layer when this is the lead's first message
    #[serde(default)]
    pub first_contact: bool,

    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(
        tenant_id: impl Into<String>,
        channel_id: impl Into<String>,
        lead_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            channel_id: channel_id.into(),
            lead_id: lead_id.into(),
            text: text.into(),
            first_contact: false,
            received_at: Utc::now(),
        }
    }

    /// Mark the message as the lead's first contact
    pub fn with_first_contact(mut self, first_contact: bool) -> Self {
        self.first_contact = first_contact;
        self
    }
}
