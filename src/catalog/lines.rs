use super::table::is_probably_journal_title;
use super::CatalogEntry;
use crate::normalize::{
    collapse_whitespace, find_cn, find_issn, normalize_cn, normalize_issn, parse_level_token,
    strip_identifiers,
};
use once_cell::sync::Lazy;
use regex::Regex;

static NUMBERED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+[.、]\s*(.+)$").expect("valid regex"));

/// Parse a plain-text list block (`1. Title ISSN CN` lines).
///
/// Returns the entries and the level in force at the end of the block.
pub fn parse_lines(block: &str, inherited_level: &str) -> (Vec<CatalogEntry>, String) {
    let mut current_level = inherited_level.to_string();
    let mut entries = Vec::new();

    for raw in block.lines() {
        let collapsed = collapse_whitespace(raw);
        let line = collapsed.trim_start_matches(['-', '*', '•', ' ']);
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.contains("编制单位") || line.contains("发布时间") {
            continue;
        }

        let Some(caps) = NUMBERED_RE.captures(line) else {
            let level = parse_level_token(line);
            if !level.is_empty() {
                current_level = level;
            }
            continue;
        };
        let body = caps[1].trim();
        let title = strip_identifiers(body);
        let title = title.trim_matches([' ', ',', ';', '，', '；']);
        if !is_probably_journal_title(title) {
            continue;
        }

        entries.push(CatalogEntry {
            title: collapse_whitespace(title),
            issn: find_issn(body)
                .and_then(|c| c.get(0))
                .map(|m| normalize_issn(m.as_str()))
                .unwrap_or_default(),
            cn_number: find_cn(body)
                .and_then(|c| c.get(0))
                .map(|m| normalize_cn(m.as_str()))
                .unwrap_or_default(),
            level: current_level.clone(),
            subfield: String::new(),
        });
    }

    (entries, current_level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_lines_with_identifiers() {
        let block = "编制单位：中国数学会\nT1级\n1. 数学学报 0583-1431 CN11-2038/O1\n2、Acta Test\n\n- T2\n3. 应用数学学报\n";
        let (entries, level) = parse_lines(block, "");
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].title, "数学学报");
        assert_eq!(entries[0].issn, "0583-1431");
        assert_eq!(entries[0].cn_number, "11-2038/O1");
        assert_eq!(entries[0].level, "T1");
        assert_eq!(entries[1].title, "Acta Test");
        assert_eq!(entries[2].level, "T2");
        assert_eq!(level, "T2");
    }

    #[test]
    fn test_level_like_text_in_titles_keeps_level() {
        let block = "T1\n1. Acta Test 2\n2. Beta Journal\n3. 测试C类研究\n";
        let (entries, level) = parse_lines(block, "");
        let titles: Vec<_> = entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Acta Test 2", "Beta Journal", "测试C类研究"]);
        assert!(entries.iter().all(|e| e.level == "T1"));
        assert_eq!(level, "T1");
    }

    #[test]
    fn test_decorated_level_lines() {
        let block = "- 中文T2级\n1. 计算机学报\n外文 T3：\n2. Acta Test\nC类\n3. 软件学报\nAbout T4 journals\n4. 数学学报\n";
        let (entries, level) = parse_lines(block, "T1");
        let levels: Vec<_> = entries
            .iter()
            .map(|e| (e.title.as_str(), e.level.as_str()))
            .collect();
        assert_eq!(
            levels,
            vec![
                ("计算机学报", "T2"),
                ("Acta Test", "T3"),
                ("软件学报", "C类"),
                ("数学学报", "C类"),
            ]
        );
        assert_eq!(level, "C类");
    }

    #[test]
    fn test_unnumbered_and_heading_lines_ignored() {
        let block = "# 数学领域\n说明文字\n发布时间：2023年\n1. 12345\n";
        let (entries, level) = parse_lines(block, "T3");
        assert!(entries.is_empty());
        assert_eq!(level, "T3");
    }
}
