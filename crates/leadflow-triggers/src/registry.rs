//! FlowRegistry - file-backed flow store
//!
//! Holds flow records exactly as authored. Graph validation happens when the
//! inbound handler loads a record, so a broken document stays listed here and
//! is excluded from matching there.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use leadflow_core::{read_record, FlowRecord, FlowStore, LeadflowError, LeadflowResult, PortError};
use tracing::{info, warn};

/// Flow records keyed by flow id
#[derive(Debug, Default)]
pub struct FlowRegistry {
    flows: DashMap<String, FlowRecord>,

    /// Flows directory (for reloading)
    flows_dir: Option<PathBuf>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create registry and load flows from a directory
    pub fn from_directory(dir: impl AsRef<Path>) -> LeadflowResult<Self> {
        let dir = dir.as_ref();
        let registry = Self {
            flows: DashMap::new(),
            flows_dir: Some(dir.to_path_buf()),
        };
        registry.load_directory(dir)?;
        Ok(registry)
    }

    /// Load every `.json`, `.yaml` and `.yml` file in a directory
    pub fn load_directory(&self, dir: impl AsRef<Path>) -> LeadflowResult<usize> {
        let dir = dir.as_ref();

        if !dir.is_dir() {
            return Err(LeadflowError::config(format!(
                "Flows directory does not exist: {}",
                dir.display()
            )));
        }

        let entries = std::fs::read_dir(dir).map_err(|e| {
            LeadflowError::config(format!("Failed to read flows directory: {}", e))
        })?;

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| matches!(ext, "json" | "yaml" | "yml"))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            match self.load_file(&path) {
                Ok(flow_id) => {
                    info!("Loaded flow: {} from {}", flow_id, path.display());
                    loaded += 1;
                }
                Err(e) => {
                    warn!("Failed to load flow from {}: {}", path.display(), e);
                }
            }
        }

        info!("Loaded {} flows from {}", loaded, dir.display());
        Ok(loaded)
    }

    /// Load a single flow file
    pub fn load_file(&self, path: impl AsRef<Path>) -> LeadflowResult<String> {
        let record = read_record(path.as_ref())?;
        Ok(self.register(record))
    }

    /// Register a record directly, replacing any flow with the same id
    pub fn register(&self, record: FlowRecord) -> String {
        let id = record.id.clone();
        self.flows.insert(id.clone(), record);
        id
    }

    pub fn get(&self, flow_id: &str) -> Option<FlowRecord> {
        self.flows.get(flow_id).map(|r| r.value().clone())
    }

    pub fn remove(&self, flow_id: &str) -> Option<FlowRecord> {
        self.flows.remove(flow_id).map(|(_, record)| record)
    }

    /// Flow ids, sorted
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.flows.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Drop everything and load the flows directory again
    pub fn reload(&self) -> LeadflowResult<usize> {
        match self.flows_dir {
            Some(ref dir) => {
                self.flows.clear();
                self.load_directory(dir)
            }
            None => Err(LeadflowError::config("No flows directory configured")),
        }
    }
}

#[async_trait]
impl FlowStore for FlowRegistry {
    async fn list_enabled_flows(&self, tenant_id: &str) -> Result<Vec<FlowRecord>, PortError> {
        let mut records: Vec<FlowRecord> = self
            .flows
            .iter()
            .filter(|r| r.enabled && r.tenant_id == tenant_id)
            .map(|r| r.value().clone())
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }
}
