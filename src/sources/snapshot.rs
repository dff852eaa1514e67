//! SQLite snapshot holding every ranking table.

use super::rows::TableKind;
use super::{file_name, RankingMeta, SourceError};
use crate::normalize::year_value;
use crate::row::FieldRow;
use crate::store::JournalStore;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use tracing::{info, warn};

/// Names of all tables in the database, sorted.
pub fn table_names(conn: &Connection) -> Result<Vec<String>, SourceError> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
    let mut names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    names.sort();
    Ok(names)
}

/// Every row of `table` with all values rendered as text.
pub fn read_table(conn: &Connection, table: &str) -> Result<Vec<FieldRow>, SourceError> {
    let sql = format!("SELECT * FROM \"{}\"", table.replace('"', "\"\""));
    let mut stmt = conn.prepare(&sql)?;
    let headers: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = headers.len();

    let rows = stmt
        .query_map([], |row| {
            (0..width)
                .map(|i| row.get_ref(i).map(value_text))
                .collect::<rusqlite::Result<Vec<String>>>()
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows
        .into_iter()
        .map(|values| FieldRow::new(headers.clone(), values))
        .collect())
}

fn value_text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) if f.is_finite() && f.fract() == 0.0 => format!("{:.0}", f),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Load all recognised tables: impact factor, classification and warning
/// tables in ascending year, then the two CCF tables. A table that fails to
/// read is logged and skipped.
pub fn load_snapshot(store: &mut JournalStore, path: &Path) -> Result<RankingMeta, SourceError> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

    let mut tables: Vec<(TableKind, String, String)> = table_names(&conn)?
        .into_iter()
        .filter_map(|name| TableKind::from_table_name(&name).map(|(kind, year)| (kind, year, name)))
        .collect();
    tables.sort_by_key(|(kind, year, name)| (*kind, year_value(year), name.clone()));

    let mut meta = RankingMeta {
        source: "snapshot".to_string(),
        snapshot_file: file_name(path),
        snapshot_path: path.display().to_string(),
        ..Default::default()
    };

    for (kind, year, table) in tables {
        let rows = match read_table(&conn, &table) {
            Ok(rows) => rows,
            Err(err) => {
                warn!(table = %table, error = %err, "skipping unreadable snapshot table");
                continue;
            }
        };
        let label = format!("snapshot:{}", table);
        let merged = rows
            .iter()
            .filter_map(|row| kind.ingest(store, row, &year, &label))
            .count();
        info!(table = %table, rows = rows.len(), merged, "snapshot table merged");

        match kind {
            TableKind::ImpactFactor => {
                meta.impact_factor_tables.push(table);
                meta.impact_factor_years.push(year);
            }
            TableKind::Classification => {
                meta.classification_tables.push(table);
                meta.classification_years.push(year);
            }
            TableKind::Warning => {
                meta.warning_tables.push(table);
                meta.warning_years.push(year);
            }
            TableKind::Ccf => meta.ccf_table = table,
            TableKind::Ccft => meta.ccft_table = table,
        }
    }

    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn build_snapshot(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE "JCR2023" ("Journal" TEXT, "ISSN" TEXT, "eISSN" TEXT, "IF(2023)" REAL, "IF Quartile(2023)" TEXT);
            INSERT INTO "JCR2023" VALUES ('Acta Test', '1234-5678', NULL, 3.5, 'Q2');
            CREATE TABLE "JCR2022" ("Journal" TEXT, "ISSN" TEXT, "eISSN" TEXT, "IF(2022)" REAL, "IF Quartile(2022)" TEXT);
            INSERT INTO "JCR2022" VALUES ('Acta Test', '1234-5678', NULL, 2.0, 'Q3');
            CREATE TABLE "FQBJCR2025" ("Journal" TEXT, "ISSN/EISSN" TEXT, "大类分区" INTEGER, "Top" TEXT);
            INSERT INTO "FQBJCR2025" VALUES ('Acta Test', '1234-5678/', 2, '否');
            CREATE TABLE "GJQKYJMD2024" ("Journal" TEXT, "预警等级" TEXT);
            INSERT INTO "GJQKYJMD2024" VALUES ('Acta Test', '低');
            CREATE TABLE "notes" ("text" TEXT);
            "#,
        )
        .unwrap();
    }

    #[test]
    fn test_load_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jcr.db");
        build_snapshot(&path);

        let mut store = JournalStore::new();
        let meta = load_snapshot(&mut store, &path).unwrap();

        assert_eq!(meta.source, "snapshot");
        assert_eq!(meta.impact_factor_tables, vec!["JCR2022", "JCR2023"]);
        assert_eq!(meta.classification_years, vec!["2025"]);
        assert_eq!(meta.warning_tables, vec!["GJQKYJMD2024"]);
        assert!(meta.ccf_table.is_empty());

        assert_eq!(store.len(), 1);
        let j = store.journals().next().unwrap();
        assert_eq!(j.impact_factor, Some(3.5));
        assert_eq!(j.if_year, "2023");
        assert_eq!(j.jcr_quartile, "Q2");
        assert_eq!(j.classification, "2区");
        assert_eq!(j.is_top, Some(false));
        assert_eq!(j.warning_latest, "低");
    }

    #[test]
    fn test_value_text() {
        assert_eq!(value_text(ValueRef::Null), "");
        assert_eq!(value_text(ValueRef::Real(2.0)), "2");
        assert_eq!(value_text(ValueRef::Real(3.25)), "3.25");
        assert_eq!(value_text(ValueRef::Text("中".as_bytes())), "中");
    }
}
