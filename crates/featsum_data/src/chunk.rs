//! Project-aligned partitioning of rows into request-sized chunks.

use std::collections::HashMap;

use crate::models::Row;

/// A contiguous group of whole projects' rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Zero-based position in the partition.
    pub index: usize,
    pub rows: Vec<Row>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Partition rows into chunks of at most `max_rows` rows without ever
/// splitting a project.
///
/// Projects are grouped in first-seen order and packed greedily: a new chunk
/// starts whenever the next whole group would overflow the ceiling. A single
/// project larger than the ceiling forms its own oversized chunk.
pub fn partition_by_project(rows: &[Row], max_rows: usize) -> Vec<Chunk> {
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut current: Vec<Row> = Vec::new();

    for group in group_by_project(rows) {
        if !current.is_empty() && current.len() + group.len() > max_rows {
            let index = chunks.len();
            chunks.push(Chunk {
                index,
                rows: std::mem::take(&mut current),
            });
        }
        current.extend(group);
    }

    if !current.is_empty() {
        let index = chunks.len();
        chunks.push(Chunk {
            index,
            rows: current,
        });
    }

    chunks
}

/// Rows grouped by project, groups in first-seen project order.
fn group_by_project(rows: &[Row]) -> Vec<Vec<Row>> {
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Vec<Row>> = Vec::new();

    for row in rows {
        let slot = match position.get(row.project.as_str()) {
            Some(&slot) => slot,
            None => {
                groups.push(Vec::new());
                position.insert(row.project.as_str(), groups.len() - 1);
                groups.len() - 1
            }
        };
        groups[slot].push(row.clone());
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Year;
    use std::collections::HashSet;

    fn rows_for(projects: &[(&str, usize)]) -> Vec<Row> {
        let mut rows = Vec::new();
        for (project, count) in projects {
            for i in 0..*count {
                rows.push(Row::new(
                    format!("F{i}"),
                    Year::Numeric(2023),
                    "MOS",
                    "1",
                    1.0,
                    *project,
                ));
            }
        }
        rows
    }

    #[test]
    fn test_greedy_packing() {
        let rows = rows_for(&[("A", 3), ("B", 4), ("C", 2), ("D", 5)]);
        let chunks = partition_by_project(&rows, 7);

        let sizes: Vec<usize> = chunks.iter().map(Chunk::len).collect();
        assert_eq!(sizes, vec![7, 7]);
        assert_eq!(chunks[1].index, 1);
        assert_eq!(chunks[1].rows[0].project, "C");
    }

    #[test]
    fn test_oversized_project_kept_whole() {
        let rows = rows_for(&[("A", 2), ("Huge", 10), ("B", 1)]);
        let chunks = partition_by_project(&rows, 5);

        let sizes: Vec<usize> = chunks.iter().map(Chunk::len).collect();
        assert_eq!(sizes, vec![2, 10, 1]);
        assert!(chunks[1].rows.iter().all(|r| r.project == "Huge"));
    }

    #[test]
    fn test_interleaved_projects_grouped_in_first_seen_order() {
        let mut rows = rows_for(&[("B", 1), ("A", 1), ("B", 1), ("C", 1), ("A", 1)]);
        rows[2].feature = "B-second".to_string();

        let chunks = partition_by_project(&rows, 100);
        assert_eq!(chunks.len(), 1);

        let order: Vec<&str> = chunks[0].rows.iter().map(|r| r.project.as_str()).collect();
        assert_eq!(order, vec!["B", "B", "A", "A", "C"]);
        assert_eq!(chunks[0].rows[1].feature, "B-second");
    }

    #[test]
    fn test_projects_never_split_and_rows_preserved() {
        let projects: Vec<(String, usize)> =
            (0..25).map(|i| (format!("P{i:02}"), 20 + (i % 7) * 5)).collect();
        let layout: Vec<(&str, usize)> = projects.iter().map(|(p, n)| (p.as_str(), *n)).collect();
        let rows = rows_for(&layout);

        let chunks = partition_by_project(&rows, 120);

        let mut seen_in: std::collections::HashMap<&str, usize> = Default::default();
        for chunk in &chunks {
            assert!(chunk.len() <= 120);
            for row in &chunk.rows {
                let owner = *seen_in.entry(row.project.as_str()).or_insert(chunk.index);
                assert_eq!(owner, chunk.index, "project {} split", row.project);
            }
        }

        let total: usize = chunks.iter().map(Chunk::len).sum();
        assert_eq!(total, rows.len());
        let before: HashSet<String> = rows.iter().map(|r| format!("{}/{}", r.project, r.feature)).collect();
        let after: HashSet<String> = chunks
            .iter()
            .flat_map(|c| c.rows.iter())
            .map(|r| format!("{}/{}", r.project, r.feature))
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_empty_input() {
        assert!(partition_by_project(&[], 10).is_empty());
    }
}
