//! Corrections for known quirks of the published catalog document.

use super::CatalogEntry;
use std::collections::HashSet;

/// Titles known to be mis-parsed under a given field.
const FIELD_EXCLUSIONS: &[(&str, &[&str])] = &[
    ("数学领域", &["理论与应用分析通讯(英文)", "数学与统计通讯(英文)"]),
    ("材料-综合领域", &["Materials矿物冶金与材料学报", "for Corrosion and Protection"]),
    ("图学领域", &["Engineering"]),
    ("仪器仪表领域", &["Instrumentation仪器仪表学报(英文版)"]),
    (
        "管理科学领域",
        &[
            "南方经济",
            "国际经贸探索",
            "金融经济学研究",
            "信息资源管理学报",
            "会计与经济研究",
            "公共管理评论",
            "经济学报",
            "电子政务",
            "管理学研究",
            "信息系统学报",
            "金融学季刊",
            "珞珈管理评论",
            "数量经济研究",
        ],
    ),
];

/// Fields that list the same journal under several subfields.
const CROSS_LISTED_FIELDS: &[&str] = &["地理资源领域"];

const STAR: char = '☆';

fn is_caption(title: &str) -> bool {
    (title.starts_with('《') && title.contains("目录"))
        || (title.contains("领域")
            && title.contains("期刊")
            && ["排序", "排名", "水平"].iter().any(|k| title.contains(k)))
}

fn is_excluded(field: &str, title: &str) -> bool {
    FIELD_EXCLUSIONS
        .iter()
        .any(|(name, titles)| field.contains(name) && titles.contains(&title))
}

/// Apply the per-field correction rules to one section's entries.
pub fn postprocess(field: &str, entries: Vec<CatalogEntry>, declared_count: usize) -> Vec<CatalogEntry> {
    let mut out: Vec<CatalogEntry> = entries
        .into_iter()
        .map(|mut e| {
            e.title = e.title.trim().to_string();
            e
        })
        .filter(|e| !e.title.is_empty())
        .filter(|e| !is_caption(&e.title) && !is_excluded(field, &e.title))
        .collect();

    if CROSS_LISTED_FIELDS.iter().any(|f| field.contains(f)) {
        let mut seen = HashSet::new();
        out.retain(|e| {
            let key: String = e.title.split_whitespace().collect::<String>().to_lowercase();
            seen.insert(key)
        });

        if out.len() > declared_count {
            let titles: HashSet<String> = out.iter().map(|e| e.title.clone()).collect();
            let starred = out.iter().position(|e| {
                let base = e.title.trim_end_matches(STAR).trim();
                base != e.title && titles.contains(base)
            });
            if let Some(pos) = starred {
                out.remove(pos);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str) -> CatalogEntry {
        CatalogEntry {
            title: title.to_string(),
            level: "T1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_captions_dropped() {
        let entries = vec![
            entry("《高质量科技期刊分级目录》"),
            entry("数学领域期刊水平排序"),
            entry("数学学报"),
        ];
        let out = postprocess("数学领域", entries, 1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "数学学报");
    }

    #[test]
    fn test_field_exclusions() {
        let entries = vec![entry("Engineering"), entry("工程图学学报")];
        assert_eq!(postprocess("图学领域", entries.clone(), 2).len(), 1);
        assert_eq!(postprocess("数学领域", entries, 2).len(), 2);
    }

    #[test]
    fn test_cross_listed_dedupe_and_star() {
        let entries = vec![
            entry("地理学报"),
            entry("地理 学报"),
            entry("资源科学"),
            entry("资源科学☆"),
            entry("自然资源学报"),
        ];
        let out = postprocess("地理资源领域", entries, 3);
        let titles: Vec<&str> = out.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["地理学报", "资源科学", "自然资源学报"]);
    }

    #[test]
    fn test_star_kept_when_within_declared() {
        let entries = vec![entry("资源科学"), entry("资源科学☆")];
        assert_eq!(postprocess("地理资源领域", entries, 2).len(), 2);
    }
}
