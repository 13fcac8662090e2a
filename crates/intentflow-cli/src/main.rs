//! CLI entry point for intentflow.
//!
//! This binary provides the `intentflow` command with subcommands for
//! serving the HTTP API and for one-shot generate / classify / decompose
//! runs that print the response envelope as JSON.

mod helpers;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use intentflow_agent::{LlmClient, ServiceConfig};
use intentflow_intent::{Pipeline, WorkflowRequest};
use intentflow_web::WebServer;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// intentflow -- natural-language descriptions to structured workflow plans.
#[derive(Parser)]
#[command(
    name = "intentflow",
    version,
    about = "Turn natural-language descriptions into structured workflow plans",
    long_about = "Classifies whether a description asks for an automated workflow and, \
                  if so, decomposes it into typed variables and ordered steps using an \
                  OpenAI-compatible completion endpoint."
)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines instead of the compact format.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    Serve,

    /// Classify a description and decompose it when it is a workflow request.
    Generate {
        description: String,
        /// Correlation id to use instead of a generated one.
        #[arg(long)]
        request_id: Option<String>,
        /// Caller identity, logged with the request.
        #[arg(long)]
        user_id: Option<String>,
    },

    /// Only classify a description.
    Classify { description: String },

    /// Only decompose a description, skipping classification.
    Decompose { description: String },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    helpers::init_tracing("info", cli.json_logs);
    let config = helpers::load_config(cli.config.as_deref())?;

    let ok = match cli.command {
        Commands::Serve => {
            cmd_serve(config).await?;
            true
        }
        Commands::Generate {
            description,
            request_id,
            user_id,
        } => {
            let request = WorkflowRequest {
                description,
                user_id,
                request_id,
            };
            let envelope = pipeline(&config)?.generate(&request).await;
            helpers::print_envelope(&envelope)?
        }
        Commands::Classify { description } => {
            let envelope = pipeline(&config)?.classify_only(&description).await;
            helpers::print_envelope(&envelope)?
        }
        Commands::Decompose { description } => {
            let envelope = pipeline(&config)?.decompose_only(&description).await;
            helpers::print_envelope(&envelope)?
        }
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Build the pipeline over an HTTP client, reporting whether the client holds
/// a usable credential.
fn connect(config: &ServiceConfig) -> Result<(Pipeline, bool)> {
    let client =
        LlmClient::new(config.llm.clone()).context("failed to build completion client")?;
    let configured = client.is_configured();
    Ok((Pipeline::from_config(config, Arc::new(client)), configured))
}

fn pipeline(config: &ServiceConfig) -> Result<Pipeline> {
    connect(config).map(|(pipeline, _)| pipeline)
}

// ---------------------------------------------------------------------------
// Subcommand: serve
// ---------------------------------------------------------------------------

async fn cmd_serve(config: ServiceConfig) -> Result<()> {
    let (pipeline, gateway_configured) = connect(&config)?;
    let server = WebServer::new(
        config.server.clone().into(),
        Arc::new(pipeline),
        gateway_configured,
    );

    info!(addr = %server.addr(), "intentflow ready");
    server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("web server failed")
}
