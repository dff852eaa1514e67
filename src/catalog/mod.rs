//! High-quality journal catalog document.
//!
//! The document is a long markdown export: a table of contents listing each
//! field with its declared journal count, then one section per field holding
//! HTML tables or numbered lists of journals.

pub mod lines;
pub mod rules;
pub mod sections;
pub mod table;
pub mod toc;

use crate::normalize::{normalize_cn, normalize_issn, normalize_title};
use crate::store::{Candidate, JournalStore};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

static TABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<table\b[^>]*>.*?</table>").expect("valid regex"));
static SOCIETY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"编制单位[:：]\s*([^\n<]+)").expect("valid regex"));

/// One journal listed under a catalog field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogEntry {
    pub title: String,
    pub issn: String,
    pub cn_number: String,
    pub level: String,
    pub subfield: String,
}

/// Reconciliation of one field's declared count against what was parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldStats {
    pub index: u32,
    pub field: String,
    pub society: String,
    pub declared_count: usize,
    pub parsed_count: usize,
    pub parsed_unique_count: usize,
    pub match_by_parsed_count: bool,
    pub match_by_unique_count: bool,
    pub match_declared: bool,
    pub found_heading: bool,
}

impl FieldStats {
    fn reconcile(&mut self, entries: &[CatalogEntry]) {
        self.parsed_count = entries.len();
        self.parsed_unique_count = entries
            .iter()
            .map(identity_key)
            .filter(|k| !k.is_empty())
            .collect::<HashSet<_>>()
            .len();
        self.match_by_parsed_count = self.declared_count == self.parsed_count;
        self.match_by_unique_count = self.declared_count == self.parsed_unique_count;
        self.match_declared = self.match_by_parsed_count || self.match_by_unique_count;
    }
}

fn identity_key(entry: &CatalogEntry) -> String {
    let issn = normalize_issn(&entry.issn);
    if !issn.is_empty() {
        return issn;
    }
    let cn = normalize_cn(&entry.cn_number);
    if !cn.is_empty() {
        return cn;
    }
    normalize_title(&entry.title)
}

/// A field's entries together with its reconciliation line.
#[derive(Debug, Clone)]
pub struct ParsedField {
    pub stats: FieldStats,
    pub entries: Vec<CatalogEntry>,
}

enum Block<'a> {
    Table(&'a str),
    Text(&'a str),
}

fn split_blocks(section: &str) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut last = 0;
    for m in TABLE_RE.find_iter(section) {
        if m.start() > last {
            blocks.push(Block::Text(&section[last..m.start()]));
        }
        blocks.push(Block::Table(m.as_str()));
        last = m.end();
    }
    if last < section.len() {
        blocks.push(Block::Text(&section[last..]));
    }
    blocks
}

fn extract_society(section: &str) -> String {
    SOCIETY_RE
        .captures(section)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_default()
}

/// Extract every field of the catalog, in table-of-contents order.
pub fn parse_catalog(text: &str) -> Vec<ParsedField> {
    let headings = toc::find_headings(text);
    let toc = toc::parse_toc(text, &headings);
    if toc.is_empty() {
        warn!(headings = headings.len(), "catalog has no table of contents");
    }

    sections::split_sections(text, &headings, &toc)
        .into_iter()
        .map(|section| {
            let entry = section.entry;
            let mut stats = FieldStats {
                index: entry.index,
                field: entry.field.clone(),
                declared_count: entry.declared_count,
                found_heading: section.text.is_some(),
                ..Default::default()
            };

            let body = match section.text {
                Some(body) if !body.trim().is_empty() => body,
                _ => {
                    warn!(field = %entry.field, "catalog section heading not found");
                    return ParsedField {
                        stats,
                        entries: Vec::new(),
                    };
                }
            };

            stats.society = extract_society(body);
            let blocks = split_blocks(body);
            let has_table = blocks.iter().any(|b| matches!(b, Block::Table(_)));

            let mut level = String::new();
            let mut entries = Vec::new();
            for block in blocks {
                match block {
                    Block::Table(html) => {
                        let (found, next) = table::parse_table(html, &level);
                        entries.extend(found);
                        level = next;
                    }
                    // List text only counts when the section has no tables.
                    Block::Text(text) if !has_table && !text.trim().is_empty() => {
                        let (found, next) = lines::parse_lines(text, &level);
                        entries.extend(found);
                        level = next;
                    }
                    Block::Text(_) => {}
                }
            }

            let entries = rules::postprocess(&entry.field, entries, entry.declared_count);
            stats.reconcile(&entries);
            debug!(
                field = %stats.field,
                declared = stats.declared_count,
                parsed = stats.parsed_count,
                unique = stats.parsed_unique_count,
                "catalog section parsed"
            );
            ParsedField { stats, entries }
        })
        .collect()
}

/// Parse the catalog and merge every entry into the store.
///
/// `source_name` is the document's file name, used in provenance labels.
pub fn ingest_catalog(store: &mut JournalStore, text: &str, source_name: &str) -> Vec<FieldStats> {
    let fields = parse_catalog(text);
    let mut merged = 0usize;

    for field in &fields {
        let label = format!("md:{}:{}", source_name, field.stats.field);
        for entry in &field.entries {
            let candidate = Candidate {
                title: &entry.title,
                issn: &entry.issn,
                eissn: "",
                cn_number: &entry.cn_number,
            };
            let attached = store.ingest(&candidate, &label, |journal| {
                journal.attach_catalog(
                    &field.stats.field,
                    &field.stats.society,
                    &entry.level,
                    &entry.subfield,
                );
            });
            if attached.is_some() {
                merged += 1;
            }
        }
    }

    info!(fields = fields.len(), entries = merged, source = source_name, "catalog merged");
    let mut stats: Vec<FieldStats> = fields.into_iter().map(|f| f.stats).collect();
    stats.sort_by_key(|s| s.index);
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "# 高质量科技期刊分级目录\n\
        # 目录\n\
        1. 数学领域（2种）\n\
        2. 物理领域（1种）\n\
        3. 天文领域（1种）\n\
        # 数学领域\n\
        编制单位：中国数学会\n\
        <table><tr><td>序号</td><td>期刊名称</td><td>级别</td></tr>\
        <tr><td>1</td><td>数学学报</td><td rowspan=\"2\">T1</td></tr>\
        <tr><td>2</td><td>Acta Mathematica Sinica</td></tr></table>\n\
        1. 这一行不会被解析\n\
        # 物理领域\n\
        编制单位：中国物理学会\n\
        T2\n\
        1. 物理学报 1000-3290 CN11-1958/O4\n";

    #[test]
    fn test_parse_catalog_fields() {
        let fields = parse_catalog(DOC);
        assert_eq!(fields.len(), 3);

        let math = &fields[0];
        assert_eq!(math.stats.society, "中国数学会");
        assert_eq!(math.entries.len(), 2);
        assert!(math.entries.iter().all(|e| e.level == "T1"));
        assert!(math.stats.match_declared);

        let physics = &fields[1];
        assert_eq!(physics.entries.len(), 1);
        assert_eq!(physics.entries[0].issn, "1000-3290");
        assert_eq!(physics.entries[0].level, "T2");

        let astronomy = &fields[2];
        assert!(!astronomy.stats.found_heading);
        assert_eq!(astronomy.stats.parsed_count, 0);
        assert!(!astronomy.stats.match_declared);
    }

    #[test]
    fn test_ingest_catalog_attaches_membership() {
        let mut store = JournalStore::new();
        let stats = ingest_catalog(&mut store, DOC, "catalog.md");
        assert_eq!(stats.len(), 3);
        assert_eq!(store.len(), 3);

        let physics = store
            .journals()
            .find(|j| j.title == "物理学报")
            .expect("physics journal");
        assert_eq!(physics.issn, "1000-3290");
        assert_eq!(physics.hq_level, "T2");
        assert_eq!(physics.hq_records[0].society, "中国物理学会");
        assert_eq!(physics.provenance, vec!["md:catalog.md:物理领域"]);
    }

    #[test]
    fn test_unique_count_uses_identifiers() {
        let mut stats = FieldStats {
            declared_count: 1,
            ..Default::default()
        };
        let entries = vec![
            CatalogEntry {
                title: "Acta A".into(),
                issn: "1234-5678".into(),
                ..Default::default()
            },
            CatalogEntry {
                title: "Acta A (English)".into(),
                issn: "12345678".into(),
                ..Default::default()
            },
        ];
        stats.reconcile(&entries);
        assert_eq!(stats.parsed_count, 2);
        assert_eq!(stats.parsed_unique_count, 1);
        assert!(!stats.match_by_parsed_count);
        assert!(stats.match_by_unique_count);
        assert!(stats.match_declared);
    }

    #[test]
    fn test_document_without_catalog() {
        let mut store = JournalStore::new();
        assert!(ingest_catalog(&mut store, "plain text", "x.md").is_empty());
        assert!(store.is_empty());
    }
}
