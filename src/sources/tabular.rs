//! CSV exports of the ranking tables.

use super::rows::TableKind;
use super::{file_name, latest_csv_export, RankingMeta, SourceError};
use crate::row::FieldRow;
use crate::store::JournalStore;
use std::path::Path;
use tracing::{info, warn};

/// Read a CSV file into rows. The UTF-8 byte-order mark some exports carry is
/// dropped from the first header; malformed records are skipped.
pub fn read_csv(path: &Path) -> Result<Vec<FieldRow>, SourceError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        match record {
            Ok(record) => rows.push(FieldRow::new(
                headers.clone(),
                record.iter().map(str::to_string).collect(),
            )),
            Err(err) => warn!(path = %path.display(), line = line + 2, error = %err, "skipping CSV record"),
        }
    }
    Ok(rows)
}

/// Merge every row of one export file, returning how many rows resolved to a journal.
pub fn load_csv_file(
    store: &mut JournalStore,
    path: &Path,
    kind: TableKind,
    year: &str,
) -> Result<usize, SourceError> {
    let label = format!("csv:{}", file_name(path));
    let merged = read_csv(path)?
        .iter()
        .filter_map(|row| kind.ingest(store, row, year, &label))
        .count();
    info!(file = %label, rows = merged, "ranking export merged");
    Ok(merged)
}

/// Load the latest classification export, then the latest impact-factor export.
pub fn load_csv_exports(store: &mut JournalStore, dir: &Path) -> Result<RankingMeta, SourceError> {
    let mut meta = RankingMeta {
        source: "csv".to_string(),
        ..Default::default()
    };

    if let Some((path, year)) = latest_csv_export(dir, "FQBJCR") {
        load_csv_file(store, &path, TableKind::Classification, &year)?;
        meta.classification_tables.push(file_name(&path));
        meta.classification_years.push(year);
    }
    if let Some((path, year)) = latest_csv_export(dir, "JCR") {
        load_csv_file(store, &path, TableKind::ImpactFactor, &year)?;
        meta.impact_factor_tables.push(file_name(&path));
        meta.impact_factor_years.push(year);
    }

    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::RawRow;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_read_csv_strips_bom() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("JCR2023-UTF8.csv");
        fs::write(&path, "\u{feff}Journal,ISSN,IF(2023)\nActa Test,1234-5678,3.5\n").unwrap();

        let rows = read_csv(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("Journal"), "Acta Test");
        assert_eq!(rows[0].get("IF(2023)"), "3.5");
    }

    #[test]
    fn test_load_csv_exports_in_order() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("FQBJCR2025-UTF8.csv"),
            "Journal,ISSN/EISSN,大类分区,Top\nActa Test,1234-5678/,1,是\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("JCR2023-UTF8.csv"),
            "Journal,ISSN,eISSN,IF(2023),IF Quartile(2023)\nActa Test,1234-5678,,3.5,Q2\n",
        )
        .unwrap();

        let mut store = JournalStore::new();
        let meta = load_csv_exports(&mut store, dir.path()).unwrap();
        assert_eq!(meta.source, "csv");
        assert_eq!(meta.classification_years, vec!["2025"]);
        assert_eq!(meta.impact_factor_tables, vec!["JCR2023-UTF8.csv"]);

        assert_eq!(store.len(), 1);
        let j = store.journals().next().unwrap();
        assert_eq!(j.classification, "1区");
        assert_eq!(j.impact_factor, Some(3.5));
        assert_eq!(
            j.provenance,
            vec!["csv:FQBJCR2025-UTF8.csv", "csv:JCR2023-UTF8.csv"]
        );
    }
}
