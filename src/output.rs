//! JSON artifacts written at the end of a build.

use crate::catalog::FieldStats;
use crate::record::JournalRecord;
use crate::report::RunMeta;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const JOURNALS_FILE: &str = "journals.json";
pub const SEARCH_INDEX_FILE: &str = "search_index.json";
pub const FIELD_STATS_FILE: &str = "hq_field_stats.json";

const INDEX_FIELDS: [&str; 16] = [
    "id",
    "title",
    "issn",
    "eissn",
    "cn_number",
    "if_2023",
    "if_year",
    "jcr_quartile",
    "cas_2025",
    "is_top",
    "hq_level",
    "pku_core",
    "cssci_type",
    "cscd_type",
    "warning_latest",
    "tags",
];

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct Dataset<'a> {
    meta: &'a RunMeta,
    journals: &'a [JournalRecord],
}

#[derive(Serialize)]
struct SearchIndexMeta<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    generated_at: Option<&'a str>,
    total_journals: usize,
    source_file: &'a str,
    index_fields: &'a [&'a str],
}

/// Compact per-journal row of the search index.
#[derive(Debug, Serialize, PartialEq)]
pub struct SearchIndexRow<'a> {
    pub id: u64,
    pub title: &'a str,
    pub issn: &'a str,
    pub eissn: &'a str,
    pub cn_number: &'a str,
    pub if_2023: Option<f64>,
    pub if_year: &'a str,
    pub jcr_quartile: &'a str,
    pub cas_2025: &'a str,
    pub is_top: Option<bool>,
    pub hq_level: &'a str,
    pub pku_core: bool,
    pub cssci_type: &'a str,
    pub cscd_type: &'a str,
    pub warning_latest: &'a str,
    pub tags: &'a [String],
}

impl<'a> From<&'a JournalRecord> for SearchIndexRow<'a> {
    fn from(j: &'a JournalRecord) -> Self {
        Self {
            id: j.id,
            title: &j.title,
            issn: &j.issn,
            eissn: &j.eissn,
            cn_number: &j.cn_number,
            if_2023: j.impact_factor,
            if_year: &j.if_year,
            jcr_quartile: &j.jcr_quartile,
            cas_2025: &j.classification,
            is_top: j.is_top,
            hq_level: &j.hq_level,
            pku_core: j.pku_core,
            cssci_type: &j.cssci_type,
            cscd_type: &j.cscd_type,
            warning_latest: &j.warning_latest,
            tags: &j.tags,
        }
    }
}

#[derive(Serialize)]
struct SearchIndex<'a> {
    meta: SearchIndexMeta<'a>,
    journals: Vec<SearchIndexRow<'a>>,
}

/// Write the three artifacts into `out_dir`, creating it if needed.
/// Returns the paths written.
pub fn write_outputs(
    out_dir: &Path,
    meta: &RunMeta,
    journals: &[JournalRecord],
    field_stats: &[FieldStats],
) -> Result<Vec<PathBuf>, OutputError> {
    fs::create_dir_all(out_dir).map_err(|source| OutputError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let dataset = serde_json::to_string_pretty(&Dataset { meta, journals })?;

    let index = SearchIndex {
        meta: SearchIndexMeta {
            generated_at: meta.generated_at.as_deref(),
            total_journals: journals.len(),
            source_file: JOURNALS_FILE,
            index_fields: &INDEX_FIELDS,
        },
        journals: journals.iter().map(SearchIndexRow::from).collect(),
    };
    let index = serde_json::to_string(&index)?;

    let stats = serde_json::to_string_pretty(field_stats)?;

    let mut written = Vec::new();
    for (name, body) in [
        (JOURNALS_FILE, dataset),
        (SEARCH_INDEX_FILE, index),
        (FIELD_STATS_FILE, stats),
    ] {
        let path = out_dir.join(name);
        fs::write(&path, body).map_err(|source| OutputError::Io {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "wrote output");
        written.push(path);
    }
    Ok(written)
}
