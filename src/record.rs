//! Finalized, serializable form of a [`Journal`].

use crate::journal::{
    CatalogMembership, CcfRecord, CcftRecord, ClassificationRow, ImpactFactorRow, Journal,
    JournalId, WarningRow,
};
use crate::normalize::{best_level, compare_levels, level_rank, year_value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::hash::Hash;

/// One journal as written to the output dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub id: JournalId,
    pub title: String,
    pub issn: String,
    pub eissn: String,
    pub cn_number: String,
    pub publisher: String,
    pub official_url: String,
    #[serde(rename = "if_2023")]
    pub impact_factor: Option<f64>,
    pub if_year: String,
    pub jcr_quartile: String,
    #[serde(rename = "cas_2025")]
    pub classification: String,
    #[serde(rename = "cas_2023")]
    pub classification_2023: String,
    #[serde(rename = "cas_year")]
    pub classification_year: String,
    pub is_top: Option<bool>,
    pub oa_status: String,
    pub warning_latest: String,
    pub warning_latest_year: String,
    pub cscd_type: String,
    pub pku_core: bool,
    pub cssci_type: String,
    pub ei_indexed: bool,
    pub if_history: Vec<ImpactFactorRow>,
    #[serde(rename = "cas_history")]
    pub classification_history: Vec<ClassificationRow>,
    pub warning_history: Vec<WarningRow>,
    pub ccf_records: Vec<CcfRecord>,
    pub ccft_records: Vec<CcftRecord>,
    pub hq_catalog: bool,
    pub hq_level: String,
    pub hq_fields: Vec<String>,
    pub hq_societies: Vec<String>,
    pub hq_levels: Vec<String>,
    pub hq_records: Vec<CatalogMembership>,
    pub tags: Vec<String>,
    pub sources: Vec<String>,
}

impl Journal {
    /// Settle catalog state from the membership records: any record means the
    /// journal is in the catalog, and a missing level falls back to the best
    /// recorded one.
    pub fn settle_catalog(&mut self) {
        if self.hq_records.is_empty() {
            return;
        }
        self.hq_catalog = true;
        if self.hq_level.is_empty() {
            self.hq_level = best_level(self.hq_records.iter().map(|r| r.level.as_str()));
        }
    }

    /// Tags derived from the authoritative fields.
    pub fn derive_tags(&self) -> BTreeSet<String> {
        let mut tags = BTreeSet::new();
        if !self.jcr_quartile.is_empty() {
            tags.insert(self.jcr_quartile.clone());
        }
        if !self.classification.is_empty() {
            tags.insert(self.classification.clone());
        }
        if !self.cscd_type.is_empty() {
            tags.insert(format!("CSCD-{}", self.cscd_type));
        }
        if self.pku_core {
            tags.insert("北大核心".to_string());
        }
        if !self.cssci_type.is_empty() {
            let tag = if self.cssci_type == "来源版" { "CSSCI" } else { "CSSCI(扩展)" };
            tags.insert(tag.to_string());
        }
        if self.ei_indexed {
            tags.insert("EI".to_string());
        }
        if self.hq_catalog {
            tags.insert("高质量目录".to_string());
        }
        if !self.hq_level.is_empty() {
            tags.insert(format!("HQ-{}", self.hq_level));
        }
        if self.is_top == Some(true) {
            tags.insert("中科院Top".to_string());
        }
        if !self.warning_latest.is_empty() {
            tags.insert("期刊预警".to_string());
        }
        if let Some(level) = self
            .ccf_records
            .iter()
            .map(|r| r.level.trim())
            .filter(|l| !l.is_empty())
            .min()
        {
            tags.insert(format!("CCF-{}", level));
        }
        if let Some(tier) = self
            .ccft_records
            .iter()
            .map(|r| r.tier.trim())
            .filter(|t| !t.is_empty())
            .min_by(|a, b| compare_levels(a, b))
        {
            tags.insert(format!("CCFT-{}", tier));
        }
        tags.extend(self.index_tokens.iter().cloned());
        tags
    }

    /// Consume the journal into its output form: histories deduplicated and
    /// ordered newest first, catalog records deduplicated and ordered by level.
    pub fn into_record(mut self) -> JournalRecord {
        self.settle_catalog();
        let tags = self.derive_tags().into_iter().collect();
        let sources = self
            .provenance
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut if_history = dedupe_by_key(self.if_history, |r| {
            (
                r.year.clone(),
                r.if_value.map(f64::to_bits),
                r.quartile.clone(),
                r.rank.clone(),
            )
        });
        if_history.sort_by(|a, b| year_value(&b.year).cmp(&year_value(&a.year)));

        let mut classification_history = dedupe_by_key(self.classification_history, Clone::clone);
        classification_history.sort_by(|a, b| year_value(&b.year).cmp(&year_value(&a.year)));

        let mut warning_history = dedupe_by_key(self.warning_history, Clone::clone);
        warning_history.sort_by(|a, b| year_value(&b.year).cmp(&year_value(&a.year)));

        let mut ccf_records = dedupe_by_key(self.ccf_records, Clone::clone);
        ccf_records.sort_by(|a, b| {
            year_value(&b.year)
                .cmp(&year_value(&a.year))
                .then_with(|| b.level.cmp(&a.level))
        });

        let mut ccft_records = dedupe_by_key(self.ccft_records, Clone::clone);
        ccft_records.sort_by(|a, b| {
            year_value(&b.year)
                .cmp(&year_value(&a.year))
                .then_with(|| b.tier.cmp(&a.tier))
        });

        let mut hq_records = dedupe_by_key(self.hq_records, Clone::clone);
        hq_records.sort_by(|a, b| {
            level_rank(&a.level)
                .cmp(&level_rank(&b.level))
                .then_with(|| a.field.cmp(&b.field))
                .then_with(|| a.society.cmp(&b.society))
                .then_with(|| a.subfield.cmp(&b.subfield))
        });

        let hq_fields = distinct_sorted(hq_records.iter().map(|r| r.field.as_str()));
        let hq_societies = distinct_sorted(hq_records.iter().map(|r| r.society.as_str()));
        let mut hq_levels = distinct_sorted(hq_records.iter().map(|r| r.level.as_str()));
        hq_levels.sort_by(|a, b| compare_levels(a, b));

        JournalRecord {
            id: self.id,
            title: self.title,
            issn: self.issn,
            eissn: self.eissn,
            cn_number: self.cn_number,
            publisher: self.publisher,
            official_url: self.official_url,
            impact_factor: self.impact_factor,
            if_year: self.if_year,
            jcr_quartile: self.jcr_quartile,
            classification: self.classification,
            classification_2023: self.classification_2023,
            classification_year: self.classification_year,
            is_top: self.is_top,
            oa_status: self.oa_status,
            warning_latest: self.warning_latest,
            warning_latest_year: self.warning_latest_year,
            cscd_type: self.cscd_type,
            pku_core: self.pku_core,
            cssci_type: self.cssci_type,
            ei_indexed: self.ei_indexed,
            if_history,
            classification_history,
            warning_history,
            ccf_records,
            ccft_records,
            hq_catalog: self.hq_catalog,
            hq_level: self.hq_level,
            hq_fields,
            hq_societies,
            hq_levels,
            hq_records,
            tags,
            sources,
        }
    }
}

/// Keep the first row for every key, preserving order.
fn dedupe_by_key<T, K, F>(rows: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    rows.into_iter().filter(|row| seen.insert(key(row))).collect()
}

fn distinct_sorted<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
