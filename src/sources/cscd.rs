//! CSCD source-journal list (a markdown file holding one HTML table).

use super::{file_name, SourceError};
use crate::store::{Candidate, JournalStore};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::info;

static CSCD_ROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<tr><td>(.*?)</td><td>(.*?)</td><td>(.*?)</td><td>(.*?)</td></tr>")
        .expect("valid regex")
});

/// Merge `<tr><td>no</td><td>title</td><td>issn</td><td>type</td></tr>` rows.
/// Returns the number of rows merged.
pub fn ingest_cscd(store: &mut JournalStore, text: &str, source_name: &str) -> usize {
    let label = format!("md:{}", source_name);
    let mut merged = 0;
    for caps in CSCD_ROW_RE.captures_iter(text) {
        if caps[1].trim() == "序号" {
            continue;
        }
        let title = caps[2].trim();
        let cscd_type = caps[4].trim();
        let candidate = Candidate {
            title,
            issn: &caps[3],
            eissn: "",
            cn_number: "",
        };
        let hit = store.ingest(&candidate, &label, |journal| {
            if !cscd_type.is_empty() {
                journal.cscd_type = cscd_type.to_string();
            }
        });
        if hit.is_some() {
            merged += 1;
        }
    }
    merged
}

pub fn load_cscd(store: &mut JournalStore, path: &Path) -> Result<usize, SourceError> {
    let bytes = fs::read(path)?;
    let merged = ingest_cscd(store, &String::from_utf8_lossy(&bytes), &file_name(path));
    info!(file = %path.display(), rows = merged, "CSCD list merged");
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_cscd_rows() {
        let text = "<table><tr><td>序号</td><td>期刊名称</td><td>ISSN</td><td>备注</td></tr>\
                    <tr><td>1</td><td>物理学报</td><td>1000-3290</td><td>核心库</td></tr>\
                    <tr><td>2</td><td>光学学报</td><td>0253-2239</td><td>扩展库</td></tr></table>";
        let mut store = JournalStore::new();
        assert_eq!(ingest_cscd(&mut store, text, "CSCD.md"), 2);

        let physics = store.journals().find(|j| j.title == "物理学报").unwrap();
        assert_eq!(physics.issn, "1000-3290");
        assert_eq!(physics.cscd_type, "核心库");
        assert_eq!(physics.provenance, vec!["md:CSCD.md"]);
    }
}
