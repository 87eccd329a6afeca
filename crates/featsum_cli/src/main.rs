//! featsum CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Configuration error
//! - 3: Data error
//! - 4: Prompt template error
//! - 5: Completion error

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use featsum_chat::{ChatError, CompletionError, ReportError};
use featsum_data::DataError;
use featsum_prompts::PromptError;

mod commands;

use commands::{Cli, Commands, ConfigError};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const CONFIG_ERROR: u8 = 2;
    pub const DATA_ERROR: u8 = 3;
    pub const PROMPT_ERROR: u8 = 4;
    pub const COMPLETION_ERROR: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(&cli);

    let result = match cli.command {
        Commands::Categories(args) => commands::categories::execute(args, &cli.global).await,
        Commands::Report(args) => commands::report::execute(args, &cli.global).await,
        Commands::Chat(args) => commands::chat::execute(args, &cli.global).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    let mut filter = EnvFilter::from_default_env();
    for directive in [format!("featsum={}", level), "warn".to_string()] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    let (json, plain) = if cli.global.log_json {
        (
            Some(fmt::layer().json().with_writer(std::io::stderr)),
            None,
        )
    } else {
        (
            None,
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            ),
        )
    };

    // Already initialized is fine
    let _ = tracing_subscriber::registry()
        .with(json)
        .with(plain)
        .with(filter)
        .try_init();
}

/// Pick the exit code from the typed error at the root of `e`.
fn categorize_error(e: &anyhow::Error) -> u8 {
    if e.downcast_ref::<ConfigError>().is_some() {
        return ExitCodes::CONFIG_ERROR;
    }
    if let Some(err) = e.downcast_ref::<ChatError>() {
        return match err {
            ChatError::Data(_) => ExitCodes::DATA_ERROR,
            ChatError::Report(report) => report_exit_code(report),
            ChatError::Settings { .. } => ExitCodes::CONFIG_ERROR,
            ChatError::Task(_) | ChatError::Io(_) => ExitCodes::GENERAL_ERROR,
        };
    }
    if let Some(err) = e.downcast_ref::<ReportError>() {
        return report_exit_code(err);
    }
    if let Some(err) = e.downcast_ref::<CompletionError>() {
        return completion_exit_code(err);
    }
    if e.downcast_ref::<DataError>().is_some() {
        return ExitCodes::DATA_ERROR;
    }
    if e.downcast_ref::<PromptError>().is_some() {
        return ExitCodes::PROMPT_ERROR;
    }
    ExitCodes::GENERAL_ERROR
}

fn report_exit_code(err: &ReportError) -> u8 {
    match err {
        ReportError::NoData(_) => ExitCodes::DATA_ERROR,
        ReportError::Prompt(_) => ExitCodes::PROMPT_ERROR,
        ReportError::Completion(completion) => completion_exit_code(completion),
    }
}

fn completion_exit_code(err: &CompletionError) -> u8 {
    match err {
        CompletionError::NotConfigured => ExitCodes::CONFIG_ERROR,
        _ => ExitCodes::COMPLETION_ERROR,
    }
}
