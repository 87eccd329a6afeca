//! CLI command definitions.
//!
//! Each subcommand maps to one way of driving the report pipeline. The
//! helpers at the bottom assemble the pipeline from settings, environment and
//! flags.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tracing::info;

use featsum_chat::{CompletionClient, HttpBackend, ReportGenerator, Settings};
use featsum_data::{Row, RowProvider, SpreadsheetReader};
use featsum_prompts::PromptLoader;

pub mod categories;
pub mod chat;
pub mod report;

/// featsum - feature-test report generator
#[derive(Parser)]
#[command(name = "featsum")]
#[command(version, about = "featsum - aggregate feature-test results into LLM-written reports")]
#[command(long_about = r#"
featsum reads feature-test results from a spreadsheet and asks a language
model for aggregated findings and a detailed summary on a chosen topic.

COMMANDS:
  categories  → List selectable categories with row counts
  report      → Generate one report and print it
  chat        → Interactive topic → categories → report dialogue

ENVIRONMENT:
  OPENAI_API_KEY / ANTHROPIC_API_KEY  Completion backend credentials
  EXCEL_PATH                          Spreadsheet with the test results
  FEATSUM_MODEL                       Model override
  FEATSUM_PROMPTS_DIR                 Directory with prompt overrides (*.md)

EXIT CODES:
  0 - Success
  1 - General error
  2 - Configuration error
  3 - Data error
  4 - Prompt template error
  5 - Completion error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Settings file (YAML)
    #[arg(long, global = true, default_value = ".featsum/settings.yaml")]
    pub config: PathBuf,

    /// Spreadsheet with the test results
    #[arg(long, global = true, env = "EXCEL_PATH")]
    pub excel_path: Option<PathBuf>,

    /// Directory with prompt template overrides
    #[arg(long, global = true, env = "FEATSUM_PROMPTS_DIR")]
    pub prompts_dir: Option<PathBuf>,

    /// Model override
    #[arg(long, global = true, env = "FEATSUM_MODEL")]
    pub model: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List categories and their row counts
    Categories(categories::CategoriesArgs),

    /// Generate a report for a topic and category selection
    Report(report::ReportArgs),

    /// Run the interactive dialogue on stdin
    Chat(chat::ChatArgs),
}

/// Startup configuration problems.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Spreadsheet path not set. Pass --excel-path or set EXCEL_PATH")]
    MissingExcelPath,
}

impl GlobalArgs {
    /// Settings file merged with command-line overrides.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::load_or_default(&self.config)?;
        if let Some(model) = &self.model {
            settings.llm.model = Some(model.clone());
        }
        Ok(settings)
    }

    pub fn spreadsheet(&self) -> Result<SpreadsheetReader> {
        let path = self
            .excel_path
            .clone()
            .ok_or(ConfigError::MissingExcelPath)?;
        Ok(SpreadsheetReader::new(path))
    }

    pub fn prompts(&self) -> PromptLoader {
        match &self.prompts_dir {
            Some(dir) => PromptLoader::with_overrides(dir),
            None => PromptLoader::builtin(),
        }
    }

    /// Report generator backed by the configured LLM provider.
    pub fn report_generator(&self, settings: &Settings) -> Result<ReportGenerator> {
        let backend = HttpBackend::from_env(&settings.llm)?;
        info!(
            provider = ?backend.provider(),
            model = backend.model(),
            "Completion backend configured"
        );

        let client = CompletionClient::new(Arc::new(backend)).with_policy(settings.retry.clone());
        Ok(ReportGenerator::new(client, self.prompts()).with_limits(settings.limits.clone()))
    }
}

/// Load rows off the async runtime.
pub async fn load_rows(reader: Arc<SpreadsheetReader>) -> Result<Arc<Vec<Row>>> {
    let path = reader.path().display().to_string();
    let rows = tokio::task::spawn_blocking(move || reader.rows())
        .await
        .context("Spreadsheet loading task failed")??;
    info!(path = %path, rows = rows.len(), "Rows ready");
    Ok(rows)
}
