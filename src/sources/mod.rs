pub use async_trait::async_trait;

pub mod cscd;
pub mod feed;
pub mod rows;
pub mod snapshot;
pub mod tabular;

use crate::catalog::{self, FieldStats};
use crate::store::JournalStore;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Directory name of the ranking exports inside the data directory.
pub const RANKING_SUBDIR: &str = "中科院分区表及JCR原始数据文件";
const RANKING_REPO_DIR: &str = "showjcr_repo";
const SNAPSHOT_FILE: &str = "jcr.db";

static CSV_EXPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(FQBJCR|JCR)([0-9]{4})-UTF8\.csv$").expect("valid regex"));

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

/// Which ranking tables were loaded, and from where.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingMeta {
    /// `snapshot`, `csv`, or empty when no ranking data was found
    pub source: String,
    pub data_dir: String,
    pub snapshot_file: String,
    pub snapshot_path: String,
    pub impact_factor_tables: Vec<String>,
    pub impact_factor_years: Vec<String>,
    pub classification_tables: Vec<String>,
    pub classification_years: Vec<String>,
    pub warning_tables: Vec<String>,
    pub warning_years: Vec<String>,
    pub ccf_table: String,
    pub ccft_table: String,
}

/// Locate the ranking export directory under `data_dir`.
pub fn find_ranking_dir(data_dir: &Path) -> Option<PathBuf> {
    let direct = data_dir.join(RANKING_SUBDIR);
    if direct.is_dir() {
        return Some(direct);
    }
    let in_repo = data_dir.join(RANKING_REPO_DIR).join(RANKING_SUBDIR);
    if in_repo.is_dir() {
        return Some(in_repo);
    }
    walk_files(data_dir)
        .into_iter()
        .find(|p| {
            file_name(p)
                .to_uppercase()
                .strip_prefix("FQBJCR")
                .is_some_and(|rest| rest.ends_with("-UTF8.CSV"))
        })
        .and_then(|p| p.parent().map(Path::to_path_buf))
}

/// The snapshot database: `jcr.db` in the ranking directory, else any `*.db`
/// there, else a `jcr.db` anywhere under `data_dir` (repository copies first).
pub fn find_snapshot(ranking_dir: &Path, data_dir: &Path) -> Option<PathBuf> {
    let direct = ranking_dir.join(SNAPSHOT_FILE);
    if direct.is_file() {
        return Some(direct);
    }
    let mut candidates: Vec<PathBuf> = list_files(ranking_dir)
        .into_iter()
        .filter(|p| p.extension().is_some_and(|e| e == "db"))
        .collect();
    if !candidates.is_empty() {
        return candidates.into_iter().next();
    }
    candidates = walk_files(data_dir)
        .into_iter()
        .filter(|p| file_name(p) == SNAPSHOT_FILE)
        .collect();
    candidates.sort_by_key(|p| {
        let shown = p.to_string_lossy().into_owned();
        (!shown.contains(RANKING_REPO_DIR), shown.len())
    });
    candidates.into_iter().next()
}

/// Latest `<prefix><year>-UTF8.csv` in `dir`, with its year.
pub fn latest_csv_export(dir: &Path, prefix: &str) -> Option<(PathBuf, String)> {
    list_files(dir)
        .into_iter()
        .filter_map(|p| {
            let name = file_name(&p);
            let caps = CSV_EXPORT_RE.captures(&name)?;
            if !caps[1].eq_ignore_ascii_case(prefix) {
                return None;
            }
            let year: u32 = caps[2].parse().ok()?;
            Some((year, p))
        })
        .max_by_key(|(year, _)| *year)
        .map(|(year, p)| (p, year.to_string()))
}

/// First markdown file in `data_dir` whose name mentions CSCD.
pub fn find_cscd_file(data_dir: &Path) -> Option<PathBuf> {
    markdown_files(data_dir)
        .into_iter()
        .find(|p| file_name(p).contains("CSCD"))
}

/// The catalog document: the largest markdown file whose name marks it as
/// the high-quality catalog, else the largest other markdown file.
pub fn find_catalog_file(data_dir: &Path) -> Option<PathBuf> {
    let files = markdown_files(data_dir);
    let largest = |paths: Vec<&PathBuf>| {
        paths
            .into_iter()
            .max_by_key(|p| fs::metadata(p).map(|m| m.len()).unwrap_or(0))
            .cloned()
    };
    let preferred: Vec<&PathBuf> = files
        .iter()
        .filter(|p| {
            let name = file_name(p);
            name.contains("高质量") && (name.contains("目录") || name.contains("分级"))
        })
        .collect();
    if !preferred.is_empty() {
        return largest(preferred);
    }
    largest(
        files
            .iter()
            .filter(|p| !file_name(p).contains("CSCD"))
            .collect(),
    )
}

/// Load ranking data: the snapshot when present, else the CSV exports.
pub fn load_ranking(store: &mut JournalStore, data_dir: &Path) -> Result<RankingMeta, SourceError> {
    let Some(ranking_dir) = find_ranking_dir(data_dir) else {
        info!(data_dir = %data_dir.display(), "no ranking data found");
        return Ok(RankingMeta::default());
    };

    let mut meta = match find_snapshot(&ranking_dir, data_dir) {
        Some(db) => snapshot::load_snapshot(store, &db)?,
        None => tabular::load_csv_exports(store, &ranking_dir)?,
    };
    meta.data_dir = ranking_dir.display().to_string();
    Ok(meta)
}

/// Read and merge the catalog document at `path`.
pub fn load_catalog(store: &mut JournalStore, path: &Path) -> Result<Vec<FieldStats>, SourceError> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    debug!(path = %path.display(), bytes = bytes.len(), "catalog document read");
    Ok(catalog::ingest_catalog(store, &text, &file_name(path)))
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Regular files directly inside `dir`, sorted by path.
fn list_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Regular files anywhere under `dir`, in sorted traversal order.
fn walk_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

fn markdown_files(dir: &Path) -> Vec<PathBuf> {
    list_files(dir)
        .into_iter()
        .filter(|p| p.extension().is_some_and(|e| e == "md"))
        .collect()
}
