//! `leadflowctl validate` - load flow files and report their structure

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use leadflow_core::{Flow, TriggerRule};
use serde::Serialize;

use crate::output::{render_structured, OutputFormat};

#[derive(Debug, Serialize)]
struct FlowSummary {
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    flow_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant_id: Option<String>,
    valid: bool,
    enabled: bool,
    nodes: usize,
    edges: usize,
    triggers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn describe_trigger(node_id: &str, rule: &TriggerRule) -> String {
    match rule {
        TriggerRule::Keyword { keyword } if keyword.is_empty() => {
            format!("{}: keyword (empty, never fires)", node_id)
        }
        TriggerRule::Keyword { keyword } => format!("{}: keyword '{}'", node_id, keyword),
        TriggerRule::NewLead => format!("{}: new lead", node_id),
        TriggerRule::Unknown { rule } => format!("{}: unknown rule '{}'", node_id, rule),
    }
}

fn summarize(path: &Path) -> FlowSummary {
    let file = path.display().to_string();
    match Flow::from_file(path) {
        Ok(flow) => FlowSummary {
            file,
            flow_id: Some(flow.id.clone()),
            tenant_id: Some(flow.tenant_id.clone()),
            valid: true,
            enabled: flow.enabled,
            nodes: flow.graph.len(),
            edges: flow.graph.edge_count(),
            triggers: flow
                .triggers()
                .map(|(node, rule)| describe_trigger(&node.id, rule))
                .collect(),
            error: None,
        },
        Err(e) => FlowSummary {
            file,
            flow_id: None,
            tenant_id: None,
            valid: false,
            enabled: false,
            nodes: 0,
            edges: 0,
            triggers: Vec::new(),
            error: Some(e.to_string()),
        },
    }
}

pub fn execute(files: &[PathBuf], output: OutputFormat) -> Result<()> {
    let summaries: Vec<FlowSummary> = files.iter().map(|f| summarize(f)).collect();

    match render_structured(&summaries, output)? {
        Some(rendered) => println!("{}", rendered),
        None => print_table(&summaries),
    }

    let failed = summaries.iter().filter(|s| !s.valid).count();
    if failed > 0 {
        bail!("{} of {} flow file(s) failed validation", failed, summaries.len());
    }
    Ok(())
}

fn print_table(summaries: &[FlowSummary]) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["FILE", "FLOW", "TENANT", "NODES", "EDGES", "TRIGGERS", "STATUS"]);

    for s in summaries {
        let status = match (&s.error, s.enabled) {
            (Some(_), _) => "invalid".red().to_string(),
            (None, true) => "valid".green().to_string(),
            (None, false) => "valid (disabled)".yellow().to_string(),
        };
        table.add_row(vec![
            s.file.clone(),
            s.flow_id.clone().unwrap_or_default(),
            s.tenant_id.clone().unwrap_or_default(),
            s.nodes.to_string(),
            s.edges.to_string(),
            s.triggers.join("\n"),
            status,
        ]);
    }
    println!("{}", table);

    for s in summaries {
        if let Some(ref error) = s.error {
            eprintln!("{} {}: {}", "error:".red().bold(), s.file, error);
        }
    }
}
