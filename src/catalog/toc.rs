use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#\s*(.+)$").expect("valid regex"));
static TOC_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9]+)\.").expect("valid regex"));
static TOC_COUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]+)\s*[种本]").expect("valid regex"));

/// A `# ...` heading line with its byte span in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// One field listed in the table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    pub index: u32,
    pub field: String,
    pub declared_count: usize,
}

pub fn find_headings(text: &str) -> Vec<Heading> {
    HEADING_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(Heading {
                start: whole.start(),
                end: whole.end(),
                text: caps[1].trim().to_string(),
            })
        })
        .collect()
}

/// Read the table of contents.
///
/// The contents sit between two headings: either the first and second (a
/// document that opens with its contents) or the second and third (a
/// document that opens with a title heading). Both regions are scanned and
/// the one listing more fields wins.
pub fn parse_toc(text: &str, headings: &[Heading]) -> Vec<TocEntry> {
    let mut best: Vec<TocEntry> = Vec::new();
    for pair in headings.windows(2).take(2) {
        let (from, to) = (pair[0].end, pair[1].start);
        if from >= to {
            continue;
        }
        let entries = parse_toc_region(&text[from..to]);
        if entries.len() > best.len() {
            best = entries;
        }
    }
    best
}

/// Parse `"<N>. <field>（<count>种）"` lines, keeping the first entry per index.
pub fn parse_toc_region(region: &str) -> Vec<TocEntry> {
    let mut by_index: BTreeMap<u32, TocEntry> = BTreeMap::new();

    for line in region.lines() {
        let s = line.trim();
        if s.is_empty() {
            continue;
        }
        let Some(number) = TOC_NUMBER_RE.captures(s) else {
            continue;
        };
        let Some(count) = TOC_COUNT_RE.captures(s) else {
            continue;
        };
        let (Some(number_match), Some(count_match)) = (number.get(0), count.get(0)) else {
            continue;
        };
        let (Ok(index), Ok(declared_count)) = (number[1].parse::<u32>(), count[1].parse::<usize>())
        else {
            continue;
        };

        let start = number_match.end();
        let count_start = count_match.start();
        if count_start < start {
            continue;
        }
        let between = &s[start..count_start];
        let open = [between.rfind('（'), between.rfind('(')]
            .into_iter()
            .flatten()
            .max();
        let field = match open {
            Some(pos) => &between[..pos],
            None => between,
        }
        .trim()
        .trim_matches(|c: char| c == ' ' || c == '.')
        .to_string();
        if field.is_empty() {
            continue;
        }

        by_index.entry(index).or_insert(TocEntry {
            index,
            field,
            declared_count,
        });
    }

    by_index.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_headings() {
        let doc = "# 目录\n1. 数学领域（10种）\n#  数学领域 \ntext\n";
        let headings = find_headings(doc);
        assert_eq!(headings.len(), 2);
        assert_eq!(headings[0].text, "目录");
        assert_eq!(headings[1].text, "数学领域");
        assert_eq!(&doc[headings[1].start..headings[1].start + 1], "#");
    }

    #[test]
    fn test_parse_toc_region() {
        let region = "\n1. 数学领域（10种）\n2. 材料-综合领域 (25 本)\n说明文字\n1. 重复条目（3种）\n3. 没有数量\n";
        let entries = parse_toc_region(region);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].field, "数学领域");
        assert_eq!(entries[0].declared_count, 10);
        assert_eq!(entries[1].field, "材料-综合领域");
        assert_eq!(entries[1].declared_count, 25);
    }

    #[test]
    fn test_toc_after_title_heading() {
        let doc = "# 高质量科技期刊分级目录\n前言\n# 目录\n1. 数学领域（10种）\n2. 物理领域（8种）\n# 数学领域\n";
        let headings = find_headings(doc);
        let toc = parse_toc(doc, &headings);
        assert_eq!(toc.len(), 2);
        assert_eq!(toc[1].index, 2);
    }

    #[test]
    fn test_toc_at_document_start() {
        let doc = "# 目录\n1. 测试领域（1种）\n# 测试领域\n";
        let toc = parse_toc(doc, &find_headings(doc));
        assert_eq!(toc.len(), 1);
        assert_eq!(toc[0].field, "测试领域");
        assert_eq!(toc[0].declared_count, 1);
    }
}
