//! Row ingestion shared by the snapshot and CSV loaders.

use crate::journal::{ClassificationFacts, JournalId, Subcategory};
use crate::normalize::{
    normalize_issn, parse_bool_zh, parse_impact_factor, parse_issn_pair, parse_quartile,
    parse_year_token,
};
use crate::row::RawRow;
use crate::store::{Candidate, JournalStore};
use once_cell::sync::Lazy;
use regex::Regex;

static IF_COLUMN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^IF\([0-9]{4}\)$").expect("valid regex"));
static TABLE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(JCR|FQBJCR|GJQKYJMD)([0-9]{4})$|^(CCF|CCFT)2022$").expect("valid regex")
});

const CCF_CATEGORY_COLUMN: &str = "CCF推荐类别（国际学术刊物/会议）";
const CCF_DEFAULT_YEAR: &str = "2022";
const SUBCATEGORY_SLOTS: usize = 6;

/// The kinds of ranking table the loaders understand. Declaration order is
/// the order in which a snapshot processes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TableKind {
    /// `JCR<year>`: impact factor, quartile and rank
    ImpactFactor,
    /// `FQBJCR<year>`: classification rank with subfields
    Classification,
    /// `GJQKYJMD<year>`: early-warning list
    Warning,
    /// `CCF2022`: recommended venues
    Ccf,
    /// `CCFT2022`: Chinese journal tiers
    Ccft,
}

impl TableKind {
    /// Classify a table name, returning the kind and the year it encodes.
    pub fn from_table_name(name: &str) -> Option<(Self, String)> {
        let caps = TABLE_NAME_RE.captures(name.trim())?;
        if let (Some(prefix), Some(year)) = (caps.get(1), caps.get(2)) {
            let kind = match prefix.as_str() {
                "JCR" => Self::ImpactFactor,
                "FQBJCR" => Self::Classification,
                _ => Self::Warning,
            };
            return Some((kind, year.as_str().to_string()));
        }
        match caps.get(3)?.as_str() {
            "CCF" => Some((Self::Ccf, CCF_DEFAULT_YEAR.to_string())),
            _ => Some((Self::Ccft, CCF_DEFAULT_YEAR.to_string())),
        }
    }

    /// Merge one row of this kind into the store.
    pub fn ingest(
        self,
        store: &mut JournalStore,
        row: &dyn RawRow,
        year: &str,
        label: &str,
    ) -> Option<JournalId> {
        match self {
            Self::ImpactFactor => ingest_impact_factor(store, row, year, label),
            Self::Classification => ingest_classification(store, row, year, label),
            Self::Warning => ingest_warning(store, row, year, label),
            Self::Ccf => ingest_ccf(store, row, label),
            Self::Ccft => ingest_ccft(store, row, label),
        }
    }
}

/// Impact-factor row. The IF column is found by its `IF(YYYY)` name; when
/// `year` is empty the year comes from that column name.
pub fn ingest_impact_factor(
    store: &mut JournalStore,
    row: &dyn RawRow,
    year: &str,
    label: &str,
) -> Option<JournalId> {
    let title = row.get("Journal");
    let issn = row.get("ISSN");
    let eissn = row.get("eISSN");

    let if_col = row.find_field(&|f| IF_COLUMN_RE.is_match(f));
    let quartile_col = row.find_field(&|f| f.to_lowercase().contains("quartile"));
    let rank_col = row.find_field(&|f| f.to_lowercase().contains("rank"));

    let year = match parse_year_token(year) {
        y if y.is_empty() => parse_year_token(&if_col),
        y => y,
    };
    let if_value = if if_col.is_empty() {
        None
    } else {
        parse_impact_factor(&row.get(&if_col))
    };
    let quartile = if quartile_col.is_empty() {
        String::new()
    } else {
        parse_quartile(&row.get(&quartile_col))
    };
    let rank = if rank_col.is_empty() {
        String::new()
    } else {
        row.get(&rank_col)
    };

    let candidate = Candidate {
        title: &title,
        issn: &issn,
        eissn: &eissn,
        cn_number: "",
    };
    store.ingest(&candidate, label, |journal| {
        if !if_col.is_empty() {
            journal.append_impact_factor(&year, if_value, &quartile, &rank);
        }
        if !quartile.is_empty() && journal.jcr_quartile.is_empty() {
            journal.jcr_quartile = quartile.clone();
        }
    })
}

/// Classification row with up to six subfield/rank pairs.
pub fn ingest_classification(
    store: &mut JournalStore,
    row: &dyn RawRow,
    year: &str,
    label: &str,
) -> Option<JournalId> {
    let title = row.get("Journal");
    let (issn, eissn) = if row.has("ISSN/EISSN") {
        parse_issn_pair(&row.get("ISSN/EISSN"))
    } else {
        (normalize_issn(&row.get("ISSN")), String::new())
    };

    let year = if year.trim().is_empty() {
        row.get("年份")
    } else {
        year.to_string()
    };
    let subcategories = (1..=SUBCATEGORY_SLOTS)
        .map(|i| Subcategory {
            name: row.get(&format!("小类{}", i)),
            rank: row.get(&format!("小类{}分区", i)),
        })
        .collect();
    let facts = ClassificationFacts {
        year,
        rank: row.get("大类分区"),
        top: parse_bool_zh(&row.get("Top")),
        oa_status: row.get("Open Access"),
        review: row.get("Review"),
        wos: row.get("Web of Science"),
        category: row.get("大类"),
        subcategories,
    };

    let candidate = Candidate {
        title: &title,
        issn: &issn,
        eissn: &eissn,
        cn_number: "",
    };
    store.ingest(&candidate, label, |journal| journal.append_classification(facts))
}

/// Warning-list row: the journal title plus the first other column.
pub fn ingest_warning(
    store: &mut JournalStore,
    row: &dyn RawRow,
    year: &str,
    label: &str,
) -> Option<JournalId> {
    let title = row.get("Journal");
    if title.is_empty() {
        return None;
    }
    let value_col = row.find_field(&|f| f != "Journal");
    let value = if value_col.is_empty() {
        String::new()
    } else {
        row.get(&value_col)
    };
    if value.is_empty() {
        return None;
    }
    store.ingest(&Candidate::titled(&title), label, |journal| {
        journal.append_warning(year, &value)
    })
}

pub fn ingest_ccf(store: &mut JournalStore, row: &dyn RawRow, label: &str) -> Option<JournalId> {
    let title = row.get("Journal");
    if title.is_empty() {
        return None;
    }
    let year = match row.get("年份") {
        y if y.is_empty() => CCF_DEFAULT_YEAR.to_string(),
        y => y,
    };
    store.ingest(&Candidate::titled(&title), label, |journal| {
        journal.fill_publisher(&row.get("出版社"));
        journal.fill_official_url(&row.get("网址"));
        journal.append_ccf(
            &year,
            &row.get("领域"),
            &row.get(CCF_CATEGORY_COLUMN),
            &row.get("CCF推荐类型"),
        );
    })
}

/// CCF-T row. Rows may carry only a Chinese title and a CN number.
pub fn ingest_ccft(store: &mut JournalStore, row: &dyn RawRow, label: &str) -> Option<JournalId> {
    let title = row.get("Journal");
    let zh_title = row.get("中文刊名");
    let cn_number = row.get("CN号");
    let seed_title = if title.is_empty() { &zh_title } else { &title };

    let candidate = Candidate {
        title: seed_title,
        issn: "",
        eissn: "",
        cn_number: &cn_number,
    };
    store.ingest(&candidate, label, |journal| {
        journal.fill_publisher(&row.get("主办单位"));
        journal.append_ccft(
            CCF_DEFAULT_YEAR,
            &row.get("T分区"),
            &row.get("CCF推荐类别"),
            &cn_number,
            &zh_title,
        );
    })
}
