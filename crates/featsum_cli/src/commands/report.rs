//! Report command - Generate one report.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tracing::info;

use featsum_chat::ReportRequest;

use super::{load_rows, GlobalArgs};

#[derive(Args)]
pub struct ReportArgs {
    /// Topic to aggregate on
    #[arg(short, long)]
    topic: String,

    /// Category to include (repeatable); none selects every row
    #[arg(short, long = "category")]
    categories: Vec<String>,

    /// Print the full result as JSON
    #[arg(long)]
    json: bool,
}

pub async fn execute(args: ReportArgs, global: &GlobalArgs) -> Result<()> {
    let topic = args.topic.trim();
    if topic.is_empty() {
        anyhow::bail!("Topic must not be empty");
    }

    let settings = global.settings()?;
    let generator = global.report_generator(&settings)?;
    let rows = load_rows(Arc::new(global.spreadsheet()?)).await?;

    info!(topic, categories = ?args.categories, "Generating report");
    if !args.json {
        eprintln!("⏳ Generating report...");
    }

    let result = generator
        .generate_report(ReportRequest {
            topic,
            selected_categories: &args.categories,
            rows: &rows,
        })
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.content);
        eprintln!(
            "✅ Report {} ({})",
            result.request_id,
            if result.used_chunking {
                format!("{} chunks aggregated", result.chunk_count)
            } else {
                "single request".to_string()
            }
        );
    }

    Ok(())
}
