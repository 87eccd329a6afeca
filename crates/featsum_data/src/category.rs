//! Category index: selectable labels and selection filtering.

use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

use crate::models::Row;

/// Label a row is filtered by: its category, or its product when the
/// category is absent or empty.
pub fn row_label(row: &Row) -> Option<&str> {
    row.category
        .as_deref()
        .filter(|c| !c.is_empty())
        .or(row.product.as_deref())
        .map(str::trim)
        .filter(|label| !label.is_empty())
}

/// Distinct, sorted category labels.
///
/// Uses the category field when at least one row carries a non-empty
/// category; otherwise falls back to products. Returns an empty list when
/// neither field has values.
pub fn list_categories(rows: &[Row]) -> Vec<String> {
    let non_empty = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let has_category = rows.iter().any(|row| non_empty(&row.category).is_some());

    let categories: BTreeSet<String> = if has_category {
        rows.iter().filter_map(|row| non_empty(&row.category)).collect()
    } else {
        rows.iter().filter_map(|row| non_empty(&row.product)).collect()
    };

    info!(
        count = categories.len(),
        source = if has_category { "category" } else { "product" },
        "Categories extracted"
    );

    categories.into_iter().collect()
}

/// Rows whose label is in `selection`. An empty selection keeps every row.
pub fn filter_by_categories(rows: &[Row], selection: &[String]) -> Vec<Row> {
    if selection.is_empty() {
        return rows.to_vec();
    }

    let filtered: Vec<Row> = rows
        .iter()
        .filter(|row| {
            row_label(row)
                .map(|label| selection.iter().any(|s| s == label))
                .unwrap_or(false)
        })
        .cloned()
        .collect();

    info!(
        selected = selection.len(),
        total_rows = rows.len(),
        filtered_rows = filtered.len(),
        "Data filtered by categories"
    );

    filtered
}

/// Row count per label, sorted by label. Rows without any label are skipped.
pub fn category_counts(rows: &[Row]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for label in rows.iter().filter_map(row_label) {
        *counts.entry(label.to_string()).or_default() += 1;
    }
    counts.into_iter().collect()
}
