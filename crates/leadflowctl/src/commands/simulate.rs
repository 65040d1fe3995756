//! `leadflowctl simulate` - replay one inbound message against fixtures
//!
//! Flows come from a directory, leads from a fixture file; every port is the
//! in-memory one, so nothing leaves the process. Sent messages are captured
//! by the recording sender and printed with the report.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use leadflow_core::{EngineConfig, InboundMessage};
use leadflow_memory::{InMemoryLeadStore, InMemoryPorts, SentMessage};
use leadflow_runtime::{Effect, NodeStatus, RunStatus};
use leadflow_triggers::{FlowRegistry, InboundHandler, InboundReport, StatsSnapshot};
use serde::Serialize;
use tracing::info;

use crate::output::{render_structured, OutputFormat};

#[derive(Debug, Clone)]
pub struct SimulateRequest {
    pub flows_dir: PathBuf,
    pub leads_file: PathBuf,
    pub tenant_id: String,
    pub lead_id: String,
    pub channel_id: String,
    pub text: String,
    pub first_contact: bool,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    #[serde(flatten)]
    pub inbound: InboundReport,
    pub sent: Vec<SentMessage>,
    /// Lead tags after the simulation
    pub tags: Vec<String>,
    pub stats: StatsSnapshot,
}

pub async fn simulate(request: SimulateRequest, config: &EngineConfig) -> Result<SimulationReport> {
    let registry = FlowRegistry::from_directory(&request.flows_dir)
        .with_context(|| format!("Failed to load flows from {}", request.flows_dir.display()))?;
    let leads = InMemoryLeadStore::from_file(&request.leads_file)
        .with_context(|| format!("Failed to load leads from {}", request.leads_file.display()))?;
    info!(
        "Simulating with {} flow(s) and {} lead(s)",
        registry.len(),
        leads.len()
    );

    let ports = InMemoryPorts::with_leads(leads);
    let handler = InboundHandler::from_ports(Arc::new(registry), ports.ports(), config)?;

    let event = InboundMessage::new(
        request.tenant_id,
        request.channel_id,
        request.lead_id.clone(),
        request.text,
    )
    .with_first_contact(request.first_contact);

    let inbound = handler.on_inbound_message(event).await?;

    Ok(SimulationReport {
        inbound,
        sent: ports.sender.sent(),
        tags: ports.leads.tags(&request.lead_id),
        stats: handler.stats().snapshot(),
    })
}

pub async fn execute(
    request: SimulateRequest,
    config: &EngineConfig,
    output: OutputFormat,
) -> Result<()> {
    let report = simulate(request, config).await?;

    match render_structured(&report, output)? {
        Some(rendered) => println!("{}", rendered),
        None => print_text(&report),
    }
    Ok(())
}

fn status_label(status: &RunStatus) -> String {
    match status {
        RunStatus::Completed => "completed".green().to_string(),
        RunStatus::CycleDetected { node_id } => {
            format!("cycle detected at '{}'", node_id).yellow().to_string()
        }
        RunStatus::StepLimitExceeded { limit } => {
            format!("step limit {} exceeded", limit).yellow().to_string()
        }
        RunStatus::InvalidEntry { node_id } => {
            format!("invalid entry '{}'", node_id).red().to_string()
        }
    }
}

fn effect_label(effect: &Effect) -> String {
    match effect {
        Effect::MessageSent { address, text } => format!("sent to {}: {}", address, text),
        Effect::ConditionEvaluated { field, matched } => format!("{} -> {}", field, matched),
        Effect::TagAdded { tag } => format!("tag '{}' added", tag),
        Effect::TagAlreadyPresent { tag } => format!("tag '{}' already present", tag),
        Effect::Skipped { reason } => format!("skipped: {}", reason),
    }
}

fn print_text(report: &SimulationReport) {
    let inbound = &report.inbound;

    for excluded in &inbound.excluded {
        println!(
            "{} flow {} excluded: {}",
            "!".yellow().bold(),
            excluded.flow_id,
            excluded.error
        );
    }

    if inbound.is_ignored() {
        println!(
            "No flow matched ({} enabled flow(s) for tenant {})",
            inbound.flows_considered, inbound.tenant_id
        );
        return;
    }

    for run in &inbound.runs {
        println!(
            "{} {} from {} [{}] {} step(s)",
            "flow".bold(),
            run.flow_id.cyan(),
            run.entry_node,
            status_label(&run.status),
            run.steps
        );
        for node in &run.nodes {
            let line = match (&node.status, &node.effect, &node.error) {
                (NodeStatus::Failed, _, Some(error)) => format!("failed: {}", error).red().to_string(),
                (_, Some(effect), _) => effect_label(effect),
                _ => String::new(),
            };
            println!("  {} {} ({}) {}", "-".dimmed(), node.node_id, node.kind, line);
        }
    }

    println!();
    println!("{} message(s) sent", report.sent.len());
    for sent in &report.sent {
        println!("  {} [{}] {}", sent.address, sent.channel_id, sent.text);
    }
    println!("lead {} tags: [{}]", inbound.lead_id, report.tags.join(", "));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixtures() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let flows = dir.path().join("flows");
        std::fs::create_dir(&flows).unwrap();
        std::fs::write(
            flows.join("promo.yaml"),
            r#"
id: promo
tenantId: acme
graph:
  nodes:
    - { id: start, type: trigger, data: { keyword: promo } }
    - { id: is-new, type: condition, data: { field: status, equals: novo } }
    - { id: welcome, type: message, data: { text: "Bem-vindo!" } }
    - { id: tag, type: action, data: { actionType: add_tag, tag: recorrente } }
  edges:
    - { source: start, target: is-new }
    - { source: is-new, target: welcome, sourceHandle: "true" }
    - { source: is-new, target: tag, sourceHandle: "false" }
"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("leads.yaml"),
            r#"
- id: lead-1
  phone: "+5511999990001"
  attributes: { status: novo }
- id: lead-2
  phone: "+5511999990002"
  attributes: { status: cliente }
  tags: '["vip"]'
"#,
        )
        .unwrap();
        dir
    }

    fn request(dir: &tempfile::TempDir, lead: &str) -> SimulateRequest {
        SimulateRequest {
            flows_dir: dir.path().join("flows"),
            leads_file: dir.path().join("leads.yaml"),
            tenant_id: "acme".into(),
            lead_id: lead.into(),
            channel_id: "wa-1".into(),
            text: "tem promo?".into(),
            first_contact: false,
        }
    }

    #[tokio::test]
    async fn test_simulate_branches() {
        let dir = fixtures();

        let report = simulate(request(&dir, "lead-1"), &EngineConfig::default())
            .await
            .unwrap();
        assert_eq!(report.sent.len(), 1);
        assert_eq!(report.sent[0].text, "Bem-vindo!");
        assert!(report.tags.is_empty());

        let report = simulate(request(&dir, "lead-2"), &EngineConfig::default())
            .await
            .unwrap();
        assert!(report.sent.is_empty());
        assert_eq!(report.tags, vec!["vip", "recorrente"]);
        assert_eq!(report.stats.matched_runs, 1);
    }

    #[tokio::test]
    async fn test_missing_fixtures() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(&dir, "lead-1");
        req.flows_dir = dir.path().join("missing");
        let err = simulate(req, &EngineConfig::default()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to load flows"));
    }
}
