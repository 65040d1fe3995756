use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use leadflow_core::EngineConfig;

use crate::commands;
use crate::output::OutputFormat;

/// leadflowctl - validate automation flows and replay inbound messages
#[derive(Parser, Debug)]
#[command(name = "leadflowctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Engine configuration file (YAML)
    #[arg(long, short = 'c', global = true, env = "LEADFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load flow files and report their structure or configuration errors
    Validate {
        /// Flow files (JSON or YAML)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// Run an inbound message against flows and leads fixtures with in-memory ports
    Simulate {
        /// Directory of flow files
        #[arg(long)]
        flows: PathBuf,

        /// Leads fixture (YAML or JSON list)
        #[arg(long)]
        leads: PathBuf,

        #[arg(long)]
        tenant: String,

        #[arg(long)]
        lead: String,

        #[arg(long, default_value = "default")]
        channel: String,

        /// Inbound message text
        #[arg(long)]
        text: String,

        /// Mark the message as the lead's first contact
        #[arg(long)]
        first_contact: bool,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },
}

impl Cli {
    pub async fn execute(self) -> anyhow::Result<()> {
        match self.command {
            Commands::Validate { files, output } => commands::validate::execute(&files, output),
            Commands::Simulate {
                flows,
                leads,
                tenant,
                lead,
                channel,
                text,
                first_contact,
                output,
            } => {
                let config = load_config(self.config.as_deref())?;
                let request = commands::simulate::SimulateRequest {
                    flows_dir: flows,
                    leads_file: leads,
                    tenant_id: tenant,
                    lead_id: lead,
                    channel_id: channel,
                    text,
                    first_contact,
                };
                commands::simulate::execute(request, &config, output).await
            }
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load engine config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}
