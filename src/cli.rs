//! Command-line interface for dify-upload.
//!
//! This module owns argument parsing and the async [`run`] entrypoint shared
//! by `main` and the integration tests. Business logic lives in
//! [`crate::upload`]; this layer resolves configuration, builds the HTTP
//! client and prints results.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::client::DifyClient;
use crate::contract::{DocLanguage, Provider};
use crate::load_config::{load_config, resolve_base_url, resolve_timeout, resolve_token};
use crate::progress::TerminalProgress;
use crate::upload::{cleanup_datasets, upload_directory};

/// CLI for dify-upload: push a directory into a Dify knowledge base.
#[derive(Parser)]
#[clap(
    name = "dify-upload",
    version,
    about = "Upload a code directory to a Dify knowledge base"
)]
pub struct Cli {
    /// Enable debug logging
    #[clap(short, long, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a dataset and upload every file under a directory into it
    Upload(UploadArgs),
    /// Delete every dataset whose name starts with a prefix
    Cleanup(CleanupArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct UploadArgs {
    /// Directory to upload
    #[clap(short, long)]
    pub dir: PathBuf,

    /// Dify API token (or DIFY_API_TOKEN)
    #[clap(short, long)]
    pub token: Option<String>,

    /// Knowledge provider of the new dataset
    #[clap(short, long, value_enum)]
    pub provider: Option<Provider>,

    /// Dify API base URL (or DIFY_BASE_URL) [default: https://api.dify.ai/v1]
    #[clap(short, long)]
    pub base_url: Option<String>,

    /// Dataset name [default: the directory name]
    #[clap(short, long)]
    pub name: Option<String>,

    /// Path to a YAML file with dataset and document settings
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Skip files whose relative path matches this regex (repeatable)
    #[clap(long)]
    pub exclude: Vec<String>,

    /// Document language
    #[clap(long, value_enum)]
    pub language: Option<DocLanguage>,

    #[clap(long)]
    pub external_knowledge_api_id: Option<String>,

    #[clap(long)]
    pub external_knowledge_id: Option<String>,

    /// HTTP request timeout in seconds [default: 120]
    #[clap(long)]
    pub timeout_secs: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct CleanupArgs {
    /// Name prefix of the datasets to delete
    #[clap(long)]
    pub prefix: String,

    #[clap(short, long)]
    pub token: Option<String>,

    #[clap(short, long)]
    pub base_url: Option<String>,

    #[clap(long)]
    pub timeout_secs: Option<u64>,
}

/// Async CLI entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Upload(args) => {
            let options = load_config(&args)?;
            options.trace_loaded();
            let client = DifyClient::from_options(&options)?;
            let progress = TerminalProgress::new();
            let report = upload_directory(&client, &options, &progress).await?;
            tracing::info!(
                command = "upload",
                dataset_id = %report.dataset.id,
                attempted = report.attempted(),
                failed = report.failed(),
                "Upload complete"
            );
            Ok(())
        }
        Commands::Cleanup(args) => {
            let token = resolve_token(args.token.as_deref())?;
            let base_url = resolve_base_url(args.base_url.as_deref(), None)?;
            let timeout: Duration = resolve_timeout(args.timeout_secs, None);
            let client = DifyClient::new(&base_url, &token, timeout)?;
            let deleted = cleanup_datasets(&client, &args.prefix).await?;
            tracing::info!(command = "cleanup", count = deleted.len(), "Cleanup complete");
            println!("Deleted {} datasets", deleted.len());
            Ok(())
        }
    }
}
