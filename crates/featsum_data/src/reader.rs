//! Spreadsheet ingestion.
//!
//! Reads the first worksheet of a workbook (or a delimited text file),
//! validates the header row and normalizes every record into a [`Row`].

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use calamine::{open_workbook_auto, DataType, Reader};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::error::{DataError, DataResult};
use crate::models::{Row, Scalar, Year};

pub const COL_FEATURE: &str = "Фича";
pub const COL_YEAR: &str = "Год";
pub const COL_METRIC: &str = "Показатель";
pub const COL_VALUE: &str = "Значение";
pub const COL_RANK: &str = "Ранг";
pub const COL_PROJECT: &str = "Проект";
pub const COL_PRODUCT: &str = "Продукт";
pub const COL_CATEGORY: &str = "Категория";

/// Columns that must be present in the header row.
pub const REQUIRED_COLUMNS: &[&str] = &[
    COL_FEATURE,
    COL_YEAR,
    COL_METRIC,
    COL_VALUE,
    COL_RANK,
    COL_PROJECT,
    COL_PRODUCT,
];

/// Source of normalized rows.
pub trait RowProvider: Send + Sync {
    /// Get all rows, loading them if necessary.
    fn rows(&self) -> DataResult<Arc<Vec<Row>>>;
}

/// Rows that are already in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticRows {
    rows: Arc<Vec<Row>>,
}

impl StaticRows {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: Arc::new(rows),
        }
    }
}

impl RowProvider for StaticRows {
    fn rows(&self) -> DataResult<Arc<Vec<Row>>> {
        Ok(Arc::clone(&self.rows))
    }
}

/// Reader for the feature-test spreadsheet.
///
/// The file is parsed on first access and cached until [`clear_cache`] is
/// called.
///
/// [`clear_cache`]: SpreadsheetReader::clear_cache
pub struct SpreadsheetReader {
    path: PathBuf,
    cache: Mutex<Option<Arc<Vec<Row>>>>,
}

impl SpreadsheetReader {
    /// Create a reader for the given file. Nothing is read until [`RowProvider::rows`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drop cached rows so the next access re-reads the file.
    pub fn clear_cache(&self) {
        *self.cache.lock() = None;
    }

    /// Read and normalize the file, bypassing the cache.
    pub fn load(&self) -> DataResult<Vec<Row>> {
        info!(path = %self.path.display(), "Loading spreadsheet");

        let (headers, records) = read_table(&self.path).map_err(|e| {
            error!(path = %self.path.display(), error = %e, "Failed to load spreadsheet");
            e
        })?;
        info!(rows = records.len(), "Spreadsheet loaded");

        if records.is_empty() {
            return Err(DataError::Empty(self.path.clone()));
        }
        validate_columns(&headers)?;

        let rows = normalize(&headers, &records);
        info!(rows = rows.len(), "Spreadsheet normalized");
        Ok(rows)
    }
}

impl RowProvider for SpreadsheetReader {
    fn rows(&self) -> DataResult<Arc<Vec<Row>>> {
        let mut cache = self.cache.lock();
        if let Some(rows) = cache.as_ref() {
            return Ok(Arc::clone(rows));
        }
        let rows = Arc::new(self.load()?);
        *cache = Some(Arc::clone(&rows));
        Ok(rows)
    }
}

fn read_table(path: &Path) -> DataResult<(Vec<String>, Vec<Vec<String>>)> {
    if !path.exists() {
        return Err(DataError::NotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => read_workbook(path),
        "csv" | "tsv" | "txt" => read_delimited(path),
        other => Err(DataError::UnsupportedFormat(other.to_string())),
    }
}

fn read_workbook(path: &Path) -> DataResult<(Vec<String>, Vec<Vec<String>>)> {
    let workbook_error = |message: String| DataError::Workbook {
        path: path.to_path_buf(),
        message,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| workbook_error(e.to_string()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| workbook_error("workbook has no worksheets".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .ok_or_else(|| workbook_error(format!("sheet \"{}\" not found", sheet_name)))?
        .map_err(|e| workbook_error(e.to_string()))?;
    debug!(sheet = %sheet_name, "Reading worksheet");

    let mut rows_iter = range.rows();
    let headers: Vec<String> = match rows_iter.next() {
        Some(header_row) => header_row.iter().map(cell_to_string).collect(),
        None => return Err(DataError::Empty(path.to_path_buf())),
    };

    let records = rows_iter
        .map(|row| row.iter().map(cell_to_string).collect::<Vec<_>>())
        .filter(|values| values.iter().any(|v| !v.is_empty()))
        .collect();

    Ok((headers, records))
}

fn read_delimited(path: &Path) -> DataResult<(Vec<String>, Vec<Vec<String>>)> {
    let delimiter = detect_delimiter(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|value| value.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for record in reader.records() {
        let values: Vec<String> = record?.iter().map(|v| v.trim().to_string()).collect();
        if values.iter().all(|v| v.is_empty()) {
            continue;
        }
        records.push(values);
    }

    Ok((headers, records))
}

fn detect_delimiter(path: &Path) -> DataResult<u8> {
    let mut first_line = String::new();
    BufReader::new(File::open(path)?).read_line(&mut first_line)?;

    let candidates = [b'\t', b';', b','];
    let best = candidates
        .iter()
        .copied()
        .max_by_key(|d| first_line.bytes().filter(|b| b == d).count())
        .unwrap_or(b',');

    if first_line.bytes().any(|b| b == best) {
        Ok(best)
    } else {
        Ok(b',')
    }
}

fn cell_to_string(cell: &DataType) -> String {
    match cell {
        DataType::Empty => String::new(),
        _ => cell.to_string().trim().to_string(),
    }
}

fn validate_columns(headers: &[String]) -> DataResult<()> {
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|required| !headers.iter().any(|h| h == *required))
        .map(|s| s.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DataError::MissingColumns {
            missing,
            found: headers.iter().filter(|h| !h.is_empty()).cloned().collect(),
        })
    }
}

fn normalize(headers: &[String], records: &[Vec<String>]) -> Vec<Row> {
    let index: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.as_str(), i))
        .collect();

    let cell = |record: &[String], column: &str| -> String {
        index
            .get(column)
            .and_then(|&i| record.get(i))
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    };
    let optional = |value: String| if value.is_empty() { None } else { Some(value) };

    let mut rows = Vec::with_capacity(records.len());
    let mut dropped = 0usize;

    for record in records {
        let feature = cell(record, COL_FEATURE);
        let project = cell(record, COL_PROJECT);
        if feature.is_empty() || project.is_empty() {
            dropped += 1;
            continue;
        }

        rows.push(Row {
            feature,
            year: Year::parse(&cell(record, COL_YEAR)),
            metric: cell(record, COL_METRIC),
            value: Scalar::Text(cell(record, COL_VALUE)),
            rank: Scalar::parse_rank(&cell(record, COL_RANK)),
            project,
            product: optional(cell(record, COL_PRODUCT)),
            category: optional(cell(record, COL_CATEGORY)),
        });
    }

    if dropped > 0 {
        debug!(dropped, "Dropped rows without feature or project");
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const HEADER: &str = "Фича\tГод\tПоказатель\tЗначение\tРанг\tПроект\tПродукт\tКатегория";

    #[test]
    fn test_load_tsv() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("data.tsv");
        fs::write(
            &path,
            format!(
                "{HEADER}\nANC\t2023\tMOS\t4.1\t1\tAlpha\tBuds\tAudio\n\
                 \t2023\tMOS\t3.9\t2\tBeta\tBuds\tAudio\n\
                 Sleep\tH1\tScore\t88\tn/a\tGamma\t\t\n"
            ),
        )
        .unwrap();

        let reader = SpreadsheetReader::new(&path);
        let rows = reader.rows().unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].year, Year::Numeric(2023));
        assert_eq!(rows[0].rank, Scalar::Number(1.0));
        assert_eq!(rows[0].category.as_deref(), Some("Audio"));
        assert_eq!(rows[1].year, Year::Text("H1".to_string()));
        assert_eq!(rows[1].rank, Scalar::Text("n/a".to_string()));
        assert!(rows[1].product.is_none());
    }

    #[test]
    fn test_missing_columns() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("data.csv");
        fs::write(&path, "Фича,Год,Проект\nANC,2023,Alpha\n").unwrap();

        let err = SpreadsheetReader::new(&path).load().unwrap_err();
        match err {
            DataError::MissingColumns { missing, found } => {
                assert!(missing.contains(&"Показатель".to_string()));
                assert!(missing.contains(&"Продукт".to_string()));
                assert_eq!(found, vec!["Фича", "Год", "Проект"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_file_and_missing_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("empty.csv");
        fs::write(&path, "Фича,Год,Показатель,Значение,Ранг,Проект,Продукт\n").unwrap();

        assert!(matches!(
            SpreadsheetReader::new(&path).load(),
            Err(DataError::Empty(_))
        ));
        assert!(matches!(
            SpreadsheetReader::new(temp.path().join("nope.xlsx")).load(),
            Err(DataError::NotFound(_))
        ));
    }

    #[test]
    fn test_cache_and_clear() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("data.csv");
        fs::write(
            &path,
            "Фича;Год;Показатель;Значение;Ранг;Проект;Продукт\nANC;2023;MOS;4;1;Alpha;Buds\n",
        )
        .unwrap();

        let reader = SpreadsheetReader::new(&path);
        assert_eq!(reader.rows().unwrap().len(), 1);

        fs::remove_file(&path).unwrap();
        assert_eq!(reader.rows().unwrap().len(), 1);

        reader.clear_cache();
        assert!(reader.rows().is_err());
    }
}
