//! In-memory lead store

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use leadflow_core::{
    LeadLookup, LeadMutation, LeadSnapshot, LeadflowError, LeadflowResult, PortError,
};
use parking_lot::RwLock;
use tracing::debug;

/// Leads keyed by id
#[derive(Debug, Default)]
pub struct InMemoryLeadStore {
    leads: DashMap<String, LeadSnapshot>,
    tag_writes: AtomicUsize,
    unavailable: AtomicBool,
    lookup_delay: RwLock<Option<Duration>>,
}

impl InMemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load leads from a YAML (or JSON) list
    pub fn from_yaml(content: &str) -> LeadflowResult<Self> {
        let leads: Vec<LeadSnapshot> = serde_yaml::from_str(content)
            .map_err(|e| LeadflowError::config(format!("Failed to parse leads: {}", e)))?;
        let store = Self::new();
        for lead in leads {
            store.insert(lead);
        }
        Ok(store)
    }

    pub fn from_file(path: impl AsRef<Path>) -> LeadflowResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LeadflowError::config(format!("Failed to read leads file {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn insert(&self, lead: LeadSnapshot) {
        self.leads.insert(lead.id.clone(), lead);
    }

    pub fn get(&self, lead_id: &str) -> Option<LeadSnapshot> {
        self.leads.get(lead_id).map(|r| r.value().clone())
    }

    pub fn tags(&self, lead_id: &str) -> Vec<String> {
        self.get(lead_id).map(|l| l.tags).unwrap_or_default()
    }

    /// Number of successful `set_tags` calls
    pub fn tag_writes(&self) -> usize {
        self.tag_writes.load(Ordering::SeqCst)
    }

    /// Make every call fail with `PortError::Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every lookup, to widen race windows or trip timeouts
    pub fn set_lookup_delay(&self, delay: Option<Duration>) {
        *self.lookup_delay.write() = delay;
    }

    pub fn len(&self) -> usize {
        self.leads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leads.is_empty()
    }

    fn check_available(&self) -> Result<(), PortError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PortError::Unavailable("lead store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LeadLookup for InMemoryLeadStore {
    async fn get_lead(&self, lead_id: &str) -> Result<Option<LeadSnapshot>, PortError> {
        self.check_available()?;
        let delay = *self.lookup_delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.get(lead_id))
    }
}

#[async_trait]
impl LeadMutation for InMemoryLeadStore {
    async fn set_tags(&self, lead_id: &str, tags: &[String]) -> Result<(), PortError> {
        self.check_available()?;
        let mut lead = self
            .leads
            .get_mut(lead_id)
            .ok_or_else(|| PortError::NotFound(format!("lead {}", lead_id)))?;
        lead.tags = tags.to_vec();
        self.tag_writes.fetch_add(1, Ordering::SeqCst);
        debug!("Lead {} tags set to {:?}", lead_id, tags);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEADS: &str = r#"
- id: lead-1
  phone: "+5511999990001"
  attributes:
    status: novo
- id: lead-2
  phone: "+5511999990002"
  tags: "vip,recorrente"
"#;

    #[tokio::test]
    async fn test_load_and_lookup() {
        let store = InMemoryLeadStore::from_yaml(LEADS).unwrap();
        assert_eq!(store.len(), 2);

        let lead = store.get_lead("lead-1").await.unwrap().unwrap();
        assert_eq!(lead.attribute("status"), Some("novo"));
        assert_eq!(store.tags("lead-2"), vec!["vip", "recorrente"]);
        assert!(store.get_lead("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_tags() {
        let store = InMemoryLeadStore::from_yaml(LEADS).unwrap();
        store
            .set_tags("lead-1", &["novo-cliente".to_string()])
            .await
            .unwrap();
        assert_eq!(store.tags("lead-1"), vec!["novo-cliente"]);
        assert_eq!(store.tag_writes(), 1);

        let err = store.set_tags("ghost", &[]).await.unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unavailable() {
        let store = InMemoryLeadStore::new();
        store.set_unavailable(true);
        assert!(store.get_lead("x").await.unwrap_err().is_transient());
        store.set_unavailable(false);
        assert!(store.get_lead("x").await.is_ok());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leads.yaml");
        std::fs::write(&path, LEADS).unwrap();
        assert_eq!(InMemoryLeadStore::from_file(&path).unwrap().len(), 2);
    }
}
