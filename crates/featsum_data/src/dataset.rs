//! Filtered datasets and their compact text serialization.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{info, warn};

use crate::category::filter_by_categories;
use crate::models::Row;
use crate::reader::{
    COL_CATEGORY, COL_FEATURE, COL_METRIC, COL_PRODUCT, COL_PROJECT, COL_RANK, COL_VALUE,
    COL_YEAR,
};

/// Rows narrowed to a category selection, with summary statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FilteredDataset {
    /// Matching rows in source order.
    pub rows: Vec<Row>,
    /// Distinct project names, sorted.
    pub projects: Vec<String>,
    /// Distinct numeric years, ascending.
    pub years: Vec<i64>,
    pub total_rows: usize,
}

impl FilteredDataset {
    /// Filter `rows` by `selection` and collect project/year statistics.
    pub fn prepare(rows: &[Row], selection: &[String]) -> Self {
        let filtered = filter_by_categories(rows, selection);

        if filtered.is_empty() {
            warn!(?selection, "No data found for selected categories");
            return Self::default();
        }

        let projects: BTreeSet<&str> = filtered
            .iter()
            .map(|row| row.project.as_str())
            .filter(|p| !p.is_empty())
            .collect();
        let years: BTreeSet<i64> = filtered.iter().filter_map(|row| row.year.as_number()).collect();

        info!(
            rows = filtered.len(),
            projects = projects.len(),
            years = years.len(),
            "Data prepared for LLM"
        );

        Self {
            projects: projects.into_iter().map(str::to_string).collect(),
            years: years.into_iter().collect(),
            total_rows: filtered.len(),
            rows: filtered,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Serialize rows to tab-separated text with a header line.
///
/// Product and category columns are only emitted when at least one row
/// carries them. Tabs and newlines inside values become single spaces so
/// every record stays on one line.
pub fn serialize_rows(rows: &[Row]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let with_product = rows.iter().any(|r| r.product.as_deref().is_some_and(|p| !p.is_empty()));
    let with_category = rows.iter().any(|r| r.category.as_deref().is_some_and(|c| !c.is_empty()));

    let mut columns = vec![
        COL_FEATURE,
        COL_YEAR,
        COL_METRIC,
        COL_VALUE,
        COL_RANK,
        COL_PROJECT,
    ];
    if with_product {
        columns.push(COL_PRODUCT);
    }
    if with_category {
        columns.push(COL_CATEGORY);
    }

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(columns.join("\t"));

    for row in rows {
        let mut values = vec![
            sanitize(&row.feature),
            sanitize(&row.year.to_string()),
            sanitize(&row.metric),
            sanitize(&row.value.to_string()),
            sanitize(&row.rank.to_string()),
            sanitize(&row.project),
        ];
        if with_product {
            values.push(sanitize(row.product.as_deref().unwrap_or("")));
        }
        if with_category {
            values.push(sanitize(row.category.as_deref().unwrap_or("")));
        }
        lines.push(values.join("\t"));
    }

    lines.join("\n")
}

fn sanitize(value: &str) -> String {
    value.replace(['\n', '\t'], " ")
}
