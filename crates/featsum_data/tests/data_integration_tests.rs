//! Integration tests for ingestion through serialization.

use std::fs;
use tempfile::tempdir;

use featsum_data::{
    category_counts, list_categories, partition_by_project, serialize_rows, FilteredDataset,
    RowProvider, SpreadsheetReader,
};

fn write_sheet(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("features.csv");
    let mut content = String::from("Фича,Год,Показатель,Значение,Ранг,Проект,Продукт,Категория\n");
    for project in ["Alpha", "Beta", "Gamma"] {
        for year in [2022, 2023] {
            content.push_str(&format!("ANC,{year},MOS,4.{year},1,{project},Buds,Audio\n"));
        }
    }
    content.push_str("Sleep score,2023,Score,88,2,Delta,Watch,Wellbeing\n");
    content.push_str(",2023,Score,10,3,Orphan,Watch,Wellbeing\n");
    fs::write(&path, content).unwrap();
    path
}

/// Test loading a sheet, picking categories and preparing prompt text.
#[test]
fn test_sheet_to_prompt_text() {
    let temp = tempdir().unwrap();
    let reader = SpreadsheetReader::new(write_sheet(temp.path()));
    let rows = reader.rows().unwrap();

    assert_eq!(rows.len(), 7);
    assert_eq!(list_categories(&rows), vec!["Audio", "Wellbeing"]);
    assert_eq!(
        category_counts(&rows),
        vec![("Audio".to_string(), 6), ("Wellbeing".to_string(), 1)]
    );

    let dataset = FilteredDataset::prepare(&rows, &["Audio".to_string()]);
    assert_eq!(dataset.total_rows, 6);
    assert_eq!(dataset.projects, vec!["Alpha", "Beta", "Gamma"]);
    assert_eq!(dataset.years, vec![2022, 2023]);

    let text = serialize_rows(&dataset.rows);
    assert_eq!(text.lines().count(), 7);
    assert!(text.starts_with("Фича\tГод\tПоказатель\tЗначение\tРанг\tПроект\tПродукт\tКатегория"));

    let chunks = partition_by_project(&dataset.rows, 4);
    let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
    assert_eq!(sizes, vec![4, 2]);
}
