//! Categories command - List selectable categories.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use featsum_data::{category_counts, list_categories};

use super::{load_rows, GlobalArgs};

#[derive(Args)]
pub struct CategoriesArgs {
    /// Print as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct CategoryCount<'a> {
    category: &'a str,
    rows: usize,
}

#[derive(Serialize)]
struct CategoryListing<'a> {
    /// What the dialogue offers for selection.
    selectable: &'a [String],
    /// Rows per category, falling back to product per row.
    counts: Vec<CategoryCount<'a>>,
}

pub async fn execute(args: CategoriesArgs, global: &GlobalArgs) -> Result<()> {
    let reader = Arc::new(global.spreadsheet()?);
    let rows = load_rows(reader).await?;
    let selectable = list_categories(&rows);
    let counts = category_counts(&rows);

    if args.json {
        let listing = CategoryListing {
            selectable: &selectable,
            counts: counts
                .iter()
                .map(|(category, rows)| CategoryCount {
                    category,
                    rows: *rows,
                })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    print!("{}", render_listing(&selectable, &counts, rows.len()));
    Ok(())
}

/// Selectable categories first, then row counts per label.
fn render_listing(selectable: &[String], counts: &[(String, usize)], total_rows: usize) -> String {
    if selectable.is_empty() {
        return "⚠️  No categories found (neither 'Категория' nor 'Продукт' has values)\n".to_string();
    }

    let mut out = format!("📋 {} selectable categories:\n", selectable.len());
    for (i, category) in selectable.iter().enumerate() {
        out.push_str(&format!("   {:>3}. {}\n", i + 1, category));
    }

    out.push_str(&format!(
        "\n📊 Rows per category or product ({} rows):\n",
        total_rows
    ));
    let width = counts.iter().map(|(c, _)| c.chars().count()).max().unwrap_or(0);
    for (category, count) in counts {
        let padding = width - category.chars().count();
        out.push_str(&format!(
            "   {}{}  {:>6}\n",
            category,
            " ".repeat(padding),
            count
        ));
    }
    out
}
