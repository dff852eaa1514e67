use crate::normalize::{
    classification_rank_value, compare_levels, normalize_cn, parse_rank, parse_year_token,
    year_value,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Sequential identity assigned by the store. Never reused.
pub type JournalId = u64;

/// Title given to journals created from rows that carried no title.
pub const PLACEHOLDER_PREFIX: &str = "Unknown-";

/// One impact-factor observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactFactorRow {
    pub year: String,
    pub if_value: Option<f64>,
    pub quartile: String,
    pub rank: String,
}

/// Subfield entry nested in a classification row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subcategory {
    pub name: String,
    pub rank: String,
}

/// One classification-table observation (major category rank plus subfields)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassificationRow {
    pub year: String,
    pub rank: String,
    /// `"是"`, `"否"` or empty when the source did not say
    pub top: String,
    pub oa_status: String,
    pub review: String,
    pub wos: String,
    pub category: String,
    pub subcategories: Vec<Subcategory>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WarningRow {
    pub year: String,
    pub value: String,
}

/// CCF recommended venue entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CcfRecord {
    pub year: String,
    pub area: String,
    pub category: String,
    pub level: String,
}

/// CCF-T Chinese journal tier entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CcftRecord {
    pub year: String,
    pub tier: String,
    pub category: String,
    pub cn_number: String,
    pub zh_title: String,
}

/// Membership in one field of the high-quality journal catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogMembership {
    pub field: String,
    pub society: String,
    pub level: String,
    pub subfield: String,
}

/// Raw facts from one classification row, before cleaning.
#[derive(Debug, Clone, Default)]
pub struct ClassificationFacts {
    pub year: String,
    pub rank: String,
    pub top: Option<bool>,
    pub oa_status: String,
    pub review: String,
    pub wos: String,
    pub category: String,
    pub subcategories: Vec<Subcategory>,
}

/// The canonical record for one real-world journal.
///
/// Identity fields are filled once and never overwritten; the `current`
/// projections (impact factor, classification, warning) follow the newest
/// year seen; the history vectors are append-only until finalization.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    pub id: JournalId,
    pub title: String,
    pub issn: String,
    pub eissn: String,
    pub cn_number: String,
    pub publisher: String,
    pub official_url: String,

    pub impact_factor: Option<f64>,
    pub if_year: String,
    pub jcr_quartile: String,

    pub classification: String,
    pub classification_2023: String,
    pub classification_year: String,
    pub is_top: Option<bool>,
    pub oa_status: String,

    pub warning_latest: String,
    pub warning_latest_year: String,

    /// `核心库` or `扩展库`
    pub cscd_type: String,
    pub pku_core: bool,
    /// `来源版` or `扩展版`
    pub cssci_type: String,
    pub ei_indexed: bool,
    /// Citation-index tokens (SCI, SCIE, ESCI, SSCI, EI)
    pub index_tokens: BTreeSet<String>,

    pub if_history: Vec<ImpactFactorRow>,
    pub classification_history: Vec<ClassificationRow>,
    pub warning_history: Vec<WarningRow>,
    pub ccf_records: Vec<CcfRecord>,
    pub ccft_records: Vec<CcftRecord>,

    pub hq_catalog: bool,
    pub hq_level: String,
    pub hq_records: Vec<CatalogMembership>,

    /// Source label of every row merged into this journal
    pub provenance: Vec<String>,
}

impl Journal {
    pub fn new(id: JournalId, title: &str) -> Self {
        let title = title.trim();
        Self {
            id,
            title: if title.is_empty() {
                format!("{}{}", PLACEHOLDER_PREFIX, id)
            } else {
                title.to_string()
            },
            ..Default::default()
        }
    }

    pub fn has_placeholder_title(&self) -> bool {
        self.title.is_empty() || self.title.starts_with(PLACEHOLDER_PREFIX)
    }

    /// Fill identity fields the journal does not have yet. Existing values win.
    pub fn adopt_identity(&mut self, title: &str, issn: &str, eissn: &str, cn_number: &str) {
        let title = title.trim();
        if !title.is_empty() && self.has_placeholder_title() {
            self.title = title.to_string();
        }
        fill_if_empty(&mut self.issn, issn);
        fill_if_empty(&mut self.eissn, eissn);
        fill_if_empty(&mut self.cn_number, cn_number);
    }

    pub fn fill_publisher(&mut self, publisher: &str) {
        fill_if_empty(&mut self.publisher, publisher);
    }

    pub fn fill_official_url(&mut self, url: &str) {
        fill_if_empty(&mut self.official_url, url);
    }

    /// Record an impact factor. The current value follows the newest year;
    /// equal years overwrite.
    pub fn append_impact_factor(
        &mut self,
        year: &str,
        if_value: Option<f64>,
        quartile: &str,
        rank: &str,
    ) {
        let year = parse_year_token(year);
        if year.is_empty() {
            return;
        }
        let quartile = quartile.trim();
        self.if_history.push(ImpactFactorRow {
            year: year.clone(),
            if_value,
            quartile: quartile.to_string(),
            rank: rank.trim().to_string(),
        });

        let newer_or_same = year_value(&year) >= year_value(&self.if_year);
        if if_value.is_some() && newer_or_same {
            self.impact_factor = if_value;
            self.if_year = year;
            if !quartile.is_empty() {
                self.jcr_quartile = quartile.to_string();
            }
        } else if !quartile.is_empty() && self.jcr_quartile.is_empty() && newer_or_same {
            self.jcr_quartile = quartile.to_string();
        }
    }

    /// Record a classification row. Only rows with a recognisable rank move
    /// the current projection.
    pub fn append_classification(&mut self, facts: ClassificationFacts) {
        let year = parse_year_token(&facts.year);
        if year.is_empty() {
            return;
        }
        let rank = parse_rank(&facts.rank);
        let oa_status = facts.oa_status.trim().to_string();
        self.classification_history.push(ClassificationRow {
            year: year.clone(),
            rank: rank.clone(),
            top: match facts.top {
                Some(true) => "是".to_string(),
                Some(false) => "否".to_string(),
                None => String::new(),
            },
            oa_status: oa_status.clone(),
            review: facts.review.trim().to_string(),
            wos: facts.wos.trim().to_string(),
            category: facts.category.trim().to_string(),
            subcategories: clean_subcategories(facts.subcategories),
        });

        if !rank.is_empty() && year_value(&year) >= year_value(&self.classification_year) {
            self.classification = rank.clone();
            self.classification_year = year.clone();
            if facts.top.is_some() {
                self.is_top = facts.top;
            }
            if !oa_status.is_empty() {
                self.oa_status = oa_status;
            }
        }
        if year == "2023" && !rank.is_empty() {
            self.classification_2023 = rank;
        }
    }

    /// Record an early-warning listing. Rows without a value are ignored.
    pub fn append_warning(&mut self, year: &str, value: &str) {
        let year = parse_year_token(year);
        let value = value.trim();
        if year.is_empty() || value.is_empty() {
            return;
        }
        self.warning_history.push(WarningRow {
            year: year.clone(),
            value: value.to_string(),
        });
        if year_value(&year) >= year_value(&self.warning_latest_year) {
            self.warning_latest_year = year;
            self.warning_latest = value.to_string();
        }
    }

    pub fn append_ccf(&mut self, year: &str, area: &str, category: &str, level: &str) {
        let year = parse_year_token(year);
        if year.is_empty() {
            return;
        }
        self.ccf_records.push(CcfRecord {
            year,
            area: area.trim().to_string(),
            category: category.trim().to_string(),
            level: level.trim().to_string(),
        });
    }

    pub fn append_ccft(
        &mut self,
        year: &str,
        tier: &str,
        category: &str,
        cn_number: &str,
        zh_title: &str,
    ) {
        let year = parse_year_token(year);
        if year.is_empty() {
            return;
        }
        self.ccft_records.push(CcftRecord {
            year,
            tier: tier.trim().to_string(),
            category: category.trim().to_string(),
            cn_number: normalize_cn(cn_number),
            zh_title: zh_title.trim().to_string(),
        });
    }

    /// Attach a catalog membership; the journal keeps the best level it has seen.
    pub fn attach_catalog(&mut self, field: &str, society: &str, level: &str, subfield: &str) {
        self.hq_catalog = true;
        let level = level.trim();
        if !level.is_empty()
            && (self.hq_level.is_empty() || compare_levels(level, &self.hq_level).is_lt())
        {
            self.hq_level = level.to_string();
        }
        self.hq_records.push(CatalogMembership {
            field: field.trim().to_string(),
            society: society.trim().to_string(),
            level: level.to_string(),
            subfield: subfield.trim().to_string(),
        });
    }

    pub fn mark_source(&mut self, label: impl Into<String>) {
        self.provenance.push(label.into());
    }
}

fn fill_if_empty(slot: &mut String, value: &str) {
    let value = value.trim();
    if slot.is_empty() && !value.is_empty() {
        *slot = value.to_string();
    }
}

/// Drop empty and repeated (name, rank) pairs, then order by rank and name.
pub fn clean_subcategories(raw: Vec<Subcategory>) -> Vec<Subcategory> {
    let mut seen = HashSet::new();
    let mut out: Vec<Subcategory> = raw
        .into_iter()
        .map(|sub| Subcategory {
            name: sub.name.trim().to_string(),
            rank: parse_rank(&sub.rank),
        })
        .filter(|sub| !(sub.name.is_empty() && sub.rank.is_empty()))
        .filter(|sub| seen.insert((sub.name.clone(), sub.rank.clone())))
        .collect();
    out.sort_by(|a, b| {
        classification_rank_value(&a.rank)
            .cmp(&classification_rank_value(&b.rank))
            .then_with(|| a.name.cmp(&b.name))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classification(year: &str, rank: &str) -> ClassificationFacts {
        ClassificationFacts {
            year: year.to_string(),
            rank: rank.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_placeholder_title() {
        let j = Journal::new(7, "  ");
        assert_eq!(j.title, "Unknown-7");
        assert!(j.has_placeholder_title());

        let mut j = j;
        j.adopt_identity("Real Title", "1234-5678", "", "");
        assert_eq!(j.title, "Real Title");
        j.adopt_identity("Other Title", "9999-9999", "", "");
        assert_eq!(j.title, "Real Title");
        assert_eq!(j.issn, "1234-5678");
    }

    #[test]
    fn test_classification_latest_year_wins() {
        let mut j = Journal::new(1, "Acta Test");
        j.append_classification(classification("2021", "3区"));
        j.append_classification(classification("2023", "1区"));
        j.append_classification(classification("2022", "2区"));

        assert_eq!(j.classification_year, "2023");
        assert_eq!(j.classification, "1区");
        assert_eq!(j.classification_2023, "1区");
        assert_eq!(j.classification_history.len(), 3);
    }

    #[test]
    fn test_same_year_overwrites() {
        let mut j = Journal::new(1, "Acta Test");
        j.append_impact_factor("2023", Some(2.0), "Q3", "");
        j.append_impact_factor("2023", Some(2.5), "Q2", "");
        assert_eq!(j.impact_factor, Some(2.5));
        assert_eq!(j.jcr_quartile, "Q2");

        j.append_impact_factor("2022", Some(9.0), "Q1", "");
        assert_eq!(j.impact_factor, Some(2.5));
        assert_eq!(j.if_history.len(), 3);
    }

    #[test]
    fn test_unparseable_year_is_dropped() {
        let mut j = Journal::new(1, "Acta Test");
        j.append_impact_factor("n/a", Some(1.0), "Q1", "");
        j.append_classification(classification("", "1区"));
        j.append_warning("1999", "high");
        assert!(j.if_history.is_empty());
        assert!(j.classification_history.is_empty());
        assert!(j.warning_history.is_empty());
        assert_eq!(j.impact_factor, None);
    }

    #[test]
    fn test_quartile_only_row_fills_empty_quartile() {
        let mut j = Journal::new(1, "Acta Test");
        j.append_impact_factor("2023", None, "Q4", "");
        assert_eq!(j.jcr_quartile, "Q4");
        assert_eq!(j.impact_factor, None);
        assert_eq!(j.if_year, "");
    }

    #[test]
    fn test_rankless_classification_keeps_projection() {
        let mut j = Journal::new(1, "Acta Test");
        j.append_classification(ClassificationFacts {
            top: Some(true),
            ..classification("2022", "2区")
        });
        j.append_classification(ClassificationFacts {
            top: Some(false),
            ..classification("2024", "")
        });
        assert_eq!(j.classification, "2区");
        assert_eq!(j.is_top, Some(true));
        assert_eq!(j.classification_history[1].top, "否");
    }

    #[test]
    fn test_catalog_keeps_best_level() {
        let mut j = Journal::new(1, "Acta Test");
        j.attach_catalog("数学领域", "数学会", "T3", "");
        j.attach_catalog("物理领域", "物理学会", "T1", "");
        j.attach_catalog("化学领域", "化学会", "T2", "");
        assert!(j.hq_catalog);
        assert_eq!(j.hq_level, "T1");
        assert_eq!(j.hq_records.len(), 3);
    }

    #[test]
    fn test_clean_subcategories() {
        let raw = vec![
            Subcategory { name: "Optics".into(), rank: "3".into() },
            Subcategory { name: "Physics".into(), rank: "1区".into() },
            Subcategory { name: "Optics".into(), rank: "3区".into() },
            Subcategory { name: "".into(), rank: "".into() },
        ];
        let cleaned = clean_subcategories(raw);
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned[0].name, "Physics");
        assert_eq!(cleaned[1].rank, "3区");
    }
}
