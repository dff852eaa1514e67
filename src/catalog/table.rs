//! HTML table blocks embedded in the catalog document.

use super::CatalogEntry;
use crate::normalize::{
    collapse_whitespace, normalize_cn, normalize_issn, normalize_title, parse_level_token,
    parse_quality_level,
};
use once_cell::sync::Lazy;
use quick_xml::events::{BytesText, Event};
use quick_xml::Reader;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

static ROW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").expect("valid regex"));
static CELL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<t[dh]\b[^>]*>(.*?)</t[dh]>").expect("valid regex"));
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static ENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("valid regex")
});
static ISSN_HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^issn(?:/eissn)?$").expect("valid regex"));
static CN_HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^cn号?$").expect("valid regex"));
static TOTAL_COUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"共\s*[0-9]+\s*[种本]").expect("valid regex"));

const HEADER_CELLS: [&str; 12] = [
    "序号", "期刊名称", "期刊", "刊名", "级别", "分级", "学科领域", "备注", "ISSN", "CN", "CN号",
    "ISSN/EISSN",
];
const HEADER_FRAGMENTS: [&str; 4] = ["期刊名称", "级别", "分级", "学科领域"];
const NON_TITLE_CELLS: [&str; 9] = [
    "级别", "分级", "期刊名称", "期刊", "ISSN", "CN", "CN号", "序号", "备注",
];
const APPENDIX_MARKERS: (&str, &str) = ("其他学会已列入分级目录", "参选期刊");
const MAX_TITLE_CHARS: usize = 220;

/// Column positions inferred from a table's leading rows.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ColumnRoles {
    pub title: BTreeSet<usize>,
    pub level: BTreeSet<usize>,
    pub issn: BTreeSet<usize>,
    pub cn: BTreeSet<usize>,
    pub subfield: BTreeSet<usize>,
}

impl ColumnRoles {
    /// Keyword-match the cells of the first three rows.
    pub fn infer(rows: &[Vec<String>]) -> Self {
        let mut roles = Self::default();
        for row in rows.iter().take(3) {
            for (i, cell) in row.iter().enumerate() {
                let c = cell.trim();
                if c.contains("期刊名称") || c.contains("刊名") {
                    roles.title.insert(i);
                }
                if c.contains("级别") || c.contains("分级") {
                    roles.level.insert(i);
                }
                if c.to_lowercase().contains("issn") {
                    roles.issn.insert(i);
                }
                if c.to_uppercase() == "CN" || c.contains("CN号") || c.contains("刊号") {
                    roles.cn.insert(i);
                }
                if c.contains("学科领域") || c == "领域" {
                    roles.subfield.insert(i);
                }
            }
        }
        roles
    }

    fn is_identifier_column(&self, i: usize) -> bool {
        self.level.contains(&i)
            || self.issn.contains(&i)
            || self.cn.contains(&i)
            || self.subfield.contains(&i)
    }
}

/// Rows of cells from an HTML table. Entities are decoded, inner markup is
/// dropped and whitespace collapsed.
pub fn table_rows(html: &str) -> Vec<Vec<String>> {
    match read_rows(html) {
        Ok(rows) => rows,
        Err(err) => {
            debug!(error = %err, "table markup rejected, using pattern scan");
            scan_rows(html)
        }
    }
}

fn read_rows(html: &str) -> Result<Vec<Vec<String>>, quick_xml::Error> {
    let mut reader = Reader::from_str(html);
    reader.config_mut().check_end_names = false;

    let mut buf = Vec::new();
    let mut rows = Vec::new();
    let mut row: Option<Vec<String>> = None;
    let mut cell: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match tag_name(e.name().as_ref()).as_str() {
                "tr" => {
                    flush_row(&mut rows, &mut row, &mut cell);
                    row = Some(Vec::new());
                }
                "td" | "th" => {
                    if let Some(r) = row.as_mut() {
                        if let Some(c) = cell.take() {
                            r.push(collapse_whitespace(&c));
                        }
                        cell = Some(String::new());
                    }
                }
                "br" | "p" | "div" => {
                    if let Some(c) = cell.as_mut() {
                        c.push(' ');
                    }
                }
                _ => {}
            },
            Event::Empty(e) => {
                if tag_name(e.name().as_ref()) == "br" {
                    if let Some(c) = cell.as_mut() {
                        c.push(' ');
                    }
                }
            }
            Event::End(e) => match tag_name(e.name().as_ref()).as_str() {
                "td" | "th" => {
                    if let (Some(r), Some(c)) = (row.as_mut(), cell.take()) {
                        r.push(collapse_whitespace(&c));
                    }
                }
                "tr" => flush_row(&mut rows, &mut row, &mut cell),
                _ => {}
            },
            Event::Text(t) => {
                if let Some(c) = cell.as_mut() {
                    c.push_str(&text_of(&t));
                }
            }
            Event::CData(t) => {
                if let Some(c) = cell.as_mut() {
                    c.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    flush_row(&mut rows, &mut row, &mut cell);

    Ok(rows)
}

fn flush_row(
    rows: &mut Vec<Vec<String>>,
    row: &mut Option<Vec<String>>,
    cell: &mut Option<String>,
) {
    if let Some(mut r) = row.take() {
        if let Some(c) = cell.take() {
            r.push(collapse_whitespace(&c));
        }
        if !r.is_empty() {
            rows.push(r);
        }
    }
}

fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

fn text_of(t: &BytesText<'_>) -> String {
    match t.unescape() {
        Ok(text) => text.into_owned(),
        Err(_) => decode_entities(&String::from_utf8_lossy(t)),
    }
}

/// Pattern-based row scan for markup the XML reader cannot follow.
fn scan_rows(html: &str) -> Vec<Vec<String>> {
    ROW_RE
        .captures_iter(html)
        .map(|row| {
            CELL_RE
                .captures_iter(&row[1])
                .map(|cell| {
                    let stripped = TAG_RE.replace_all(&cell[1], " ");
                    collapse_whitespace(&decode_entities(&stripped))
                })
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect()
}

/// Decode HTML character references, including the named ones XML lacks.
pub fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            let decoded = if let Some(hex) = name.strip_prefix("#x").or(name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match name {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some('\u{a0}'),
                    "middot" => Some('·'),
                    "mdash" => Some('—'),
                    "ndash" => Some('–'),
                    _ => None,
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

/// True when at least two cells are header vocabulary.
pub fn is_header_row(cells: &[String]) -> bool {
    cells
        .iter()
        .map(|c| c.trim())
        .filter(|s| !s.is_empty())
        .filter(|s| {
            HEADER_CELLS.contains(s)
                || HEADER_FRAGMENTS.iter().any(|f| s.contains(f))
                || ISSN_HEADER_RE.is_match(&s.to_lowercase())
                || CN_HEADER_RE.is_match(s)
        })
        .count()
        >= 2
}

/// Heuristic for cells that hold a journal title rather than a level,
/// identifier, counter or header word.
pub fn is_probably_journal_title(text: &str) -> bool {
    let s = text.trim();
    if s.is_empty() || NON_TITLE_CELLS.contains(&s) {
        return false;
    }
    if s.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    if !parse_level_token(s).is_empty() {
        return false;
    }
    if !normalize_issn(s).is_empty() || !normalize_cn(s).is_empty() {
        return false;
    }
    if TOTAL_COUNT_RE.is_match(s) || s.chars().count() > MAX_TITLE_CHARS {
        return false;
    }
    s.chars().any(char::is_alphabetic)
}

/// Extract catalog entries from one table. `inherited_level` is the level in
/// force before the table; the level in force after it is returned alongside.
pub fn parse_table(html: &str, inherited_level: &str) -> (Vec<CatalogEntry>, String) {
    let rows = table_rows(html);
    let mut current_level = inherited_level.to_string();
    if rows.is_empty() {
        return (Vec::new(), current_level);
    }

    let preview = rows
        .iter()
        .take(3)
        .map(|r| r.join(" | "))
        .collect::<Vec<_>>()
        .join(" | ");
    if preview.contains(APPENDIX_MARKERS.0) && preview.contains(APPENDIX_MARKERS.1) {
        debug!("skipping appendix table");
        return (Vec::new(), current_level);
    }

    let roles = ColumnRoles::infer(&rows);
    let expected_cols = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut entries = Vec::new();

    for row in rows {
        let mut cells: Vec<String> = row.iter().map(|c| collapse_whitespace(c)).collect();
        // Continuation rows under a rowspan level cell come up one cell short.
        if let Some(&level_idx) = roles.level.iter().next() {
            while cells.len() < expected_cols {
                cells.insert(level_idx.min(cells.len()), String::new());
            }
        }
        if cells.iter().all(String::is_empty) {
            continue;
        }

        // Outside a level column only a cell that is wholly a level counts.
        let found_level = roles
            .level
            .iter()
            .filter_map(|&i| cells.get(i))
            .map(|c| parse_quality_level(c))
            .chain(cells.iter().map(|c| parse_level_token(c)))
            .find(|v| !v.is_empty())
            .unwrap_or_default();
        if !found_level.is_empty() {
            current_level = found_level;
        }

        if is_header_row(&cells) {
            continue;
        }
        let non_empty: Vec<&String> = cells.iter().filter(|c| !c.is_empty()).collect();
        if non_empty.len() == 1 && !parse_level_token(non_empty[0]).is_empty() {
            continue;
        }

        let issn = first_value(&cells, &roles.issn, |c| normalize_issn(c));
        let cn_number = first_value(&cells, &roles.cn, |c| normalize_cn(c));
        let subfield = roles
            .subfield
            .iter()
            .filter_map(|&i| cells.get(i))
            .map(|c| c.trim())
            .find(|c| !c.is_empty() && !is_header_row(&[c.to_string()]))
            .unwrap_or_default()
            .to_string();

        let titles: Vec<&String> = if roles.title.is_empty() {
            cells
                .iter()
                .enumerate()
                .filter(|(i, _)| !roles.is_identifier_column(*i))
                .map(|(_, c)| c)
                .filter(|c| is_probably_journal_title(c))
                .collect()
        } else {
            roles
                .title
                .iter()
                .filter_map(|&i| cells.get(i))
                .filter(|c| is_probably_journal_title(c))
                .collect()
        };

        let mut seen = HashSet::new();
        for title in titles {
            let key = normalize_title(title);
            if key.is_empty() || !seen.insert(key) {
                continue;
            }
            entries.push(CatalogEntry {
                title: title.trim().to_string(),
                issn: issn.clone(),
                cn_number: cn_number.clone(),
                level: current_level.clone(),
                subfield: subfield.clone(),
            });
        }
    }

    (entries, current_level)
}

/// First non-empty parse from the preferred columns, else from any cell.
fn first_value(
    cells: &[String],
    preferred: &BTreeSet<usize>,
    parse: impl Fn(&str) -> String,
) -> String {
    preferred
        .iter()
        .filter_map(|&i| cells.get(i))
        .map(|c| parse(c.as_str()))
        .find(|v| !v.is_empty())
        .or_else(|| cells.iter().map(|c| parse(c.as_str())).find(|v| !v.is_empty()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles(entries: &[CatalogEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.title.as_str()).collect()
    }

    #[test]
    fn test_table_rows_decode_and_strip() {
        let html = "<table><tr><th>序号</th><th>期刊名称</th></tr>\
                    <tr><td>1</td><td><b>Science&nbsp;China</b> &amp; Tech</td></tr></table>";
        let rows = table_rows(html);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][1], "Science China & Tech");
    }

    #[test]
    fn test_scan_rows_fallback() {
        let html = "<table><tr><td>1</td><td>Acta <i>Mathematica</i></td></tr>";
        let rows = scan_rows(html);
        assert_eq!(rows, vec![vec!["1".to_string(), "Acta Mathematica".to_string()]]);
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a&lt;b &#x4E2D;&#25991; &unknown;"), "a<b 中文 &unknown;");
    }

    #[test]
    fn test_rowspan_level_is_inherited() {
        let html = "<table>\
            <tr><td>序号</td><td>期刊名称</td><td>级别</td></tr>\
            <tr><td>1</td><td>Acta Alpha</td><td rowspan=\"2\">T1</td></tr>\
            <tr><td>2</td><td>Acta Beta</td></tr>\
            </table>";
        let (entries, level) = parse_table(html, "");
        assert_eq!(titles(&entries), vec!["Acta Alpha", "Acta Beta"]);
        assert_eq!(entries[1].level, "T1");
        assert_eq!(level, "T1");
    }

    #[test]
    fn test_rowspan_level_without_header_row() {
        let html = "<table>\
            <tr><td>1</td><td>Acta Alpha</td><td rowspan=\"2\">T2</td></tr>\
            <tr><td>2</td><td>Acta Beta</td></tr>\
            </table>";
        let (entries, _) = parse_table(html, "");
        assert_eq!(titles(&entries), vec!["Acta Alpha", "Acta Beta"]);
        assert!(entries.iter().all(|e| e.level == "T2"));
    }

    #[test]
    fn test_level_only_rows_and_identifiers() {
        let html = "<table>\
            <tr><th>期刊名称</th><th>ISSN</th><th>CN</th></tr>\
            <tr><td>T3</td><td></td><td></td></tr>\
            <tr><td>中国激光</td><td>0258-7025</td><td>31-1339/TN</td></tr>\
            </table>";
        let (entries, level) = parse_table(html, "T1");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, "T3");
        assert_eq!(entries[0].issn, "0258-7025");
        assert_eq!(entries[0].cn_number, "31-1339/TN");
        assert_eq!(level, "T3");
    }

    #[test]
    fn test_level_like_titles_keep_inherited_level() {
        let html = "<table>\
            <tr><th>序号</th><th>期刊名称</th></tr>\
            <tr><td>1</td><td>Acta Test 2</td></tr>\
            <tr><td>2</td><td>测试C类研究</td></tr>\
            </table>";
        let (entries, level) = parse_table(html, "T1");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "Acta Test 2");
        assert!(entries.iter().all(|e| e.level == "T1"));
        assert_eq!(level, "T1");
    }

    #[test]
    fn test_appendix_table_is_skipped() {
        let html = "<table><tr><td>其他学会已列入分级目录的参选期刊</td></tr>\
                    <tr><td>Acta Gamma</td></tr></table>";
        let (entries, level) = parse_table(html, "T2");
        assert!(entries.is_empty());
        assert_eq!(level, "T2");
    }

    #[test]
    fn test_duplicate_titles_in_row_collapse() {
        let html = "<table><tr><td>Acta Delta</td><td>ACTA  delta</td><td>T4</td></tr></table>";
        let (entries, _) = parse_table(html, "");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, "T4");
    }

    #[test]
    fn test_is_probably_journal_title() {
        assert!(is_probably_journal_title("计算机学报"));
        assert!(is_probably_journal_title("Nature Photonics"));
        assert!(!is_probably_journal_title("12"));
        assert!(!is_probably_journal_title("T1"));
        assert!(!is_probably_journal_title("中文T2级"));
        assert!(is_probably_journal_title("Acta Test 2"));
        assert!(is_probably_journal_title("测试C类研究"));
        assert!(!is_probably_journal_title("1234-5678"));
        assert!(!is_probably_journal_title("共 12 种"));
        assert!(!is_probably_journal_title("期刊名称"));
    }

    #[test]
    fn test_header_row() {
        let cells = vec!["序号".to_string(), "期刊名称".to_string(), "Acta".to_string()];
        assert!(is_header_row(&cells));
        assert!(is_header_row(&["ISSN/eISSN".to_string(), "cn号".to_string()]));
        assert!(!is_header_row(&["级别".to_string()]));
    }
}
