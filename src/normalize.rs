use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::cmp::Ordering;

static ISSN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]{4})-?([0-9Xx]{4})").expect("valid regex"));
static ISSN_LOOSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]{4}-?[0-9Xx]{4}").expect("valid regex"));
static CN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:CN\s*)?([0-9]{2})-?([0-9]{4})/([A-Za-z0-9]{1,4})").expect("valid regex")
});
static TITLE_STRIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\x{4e00}-\x{9fff}]").expect("valid regex"));
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static RANK_ZONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([1-4])\s*区").expect("valid regex"));
static RANK_BRACKET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([1-4])\s*(?:\[|$)").expect("valid regex"));
static LEVEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:中文|外文)?\s*(?:[CE]\s*)?(T\s*[1-4])(?:\s*级)?").expect("valid regex")
});
static ABC_LEVEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([ABC])\s*类").expect("valid regex"));
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(20[0-9]{2})").expect("valid regex"));
static QUARTILE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Q([1-4])").expect("valid regex"));
static CLASS_RANK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([1-4])区$").expect("valid regex"));
static NON_ALNUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Z0-9]+").expect("valid regex"));
static NON_ALPHA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Z]").expect("valid regex"));
static SCI_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bSCI\b").expect("valid regex"));
static EI_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bEI\b").expect("valid regex"));

/// Citation-index tokens recognised in free-text index columns.
pub const INDEX_TOKENS: [&str; 5] = ["SCI", "SCIE", "ESCI", "SSCI", "EI"];

/// Normalize a journal title into its identity key: lowercase, whitespace and
/// punctuation removed, CJK kept.
pub fn normalize_title(title: &str) -> String {
    let lowered = title.trim().to_lowercase();
    let collapsed = WS_RE.replace_all(&lowered, " ");
    TITLE_STRIP_RE.replace_all(&collapsed, "").into_owned()
}

/// Normalize an ISSN or eISSN to `NNNN-NNNN` (check digit upper-cased).
/// Returns an empty string when no ISSN-shaped token is present.
pub fn normalize_issn(raw: &str) -> String {
    let compact: String = raw.trim().to_uppercase().replace(' ', "");
    match find_issn(&compact) {
        Some(caps) => format!("{}-{}", &caps[1], caps[2].to_uppercase()),
        None => String::new(),
    }
}

/// Normalize a CN serial number to `NN-NNNN/X`.
pub fn normalize_cn(raw: &str) -> String {
    let compact: String = raw.trim().to_uppercase().replace(' ', "");
    let compact = compact.strip_prefix("CN").unwrap_or(&compact);
    match find_cn(compact) {
        Some(caps) => format!("{}-{}/{}", &caps[1], &caps[2], caps[3].to_uppercase()),
        None => String::new(),
    }
}

/// Locate the first ISSN token that is not glued to neighbouring word
/// characters. CJK characters count as word characters, so `期刊0583-1431`
/// carries no ISSN.
pub(crate) fn find_issn(s: &str) -> Option<Captures<'_>> {
    find_bounded(&ISSN_RE, s)
}

pub(crate) fn find_cn(s: &str) -> Option<Captures<'_>> {
    find_bounded(&CN_RE, s)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Remove every bounded ISSN and CN token from `text`.
pub(crate) fn strip_identifiers(text: &str) -> String {
    let mut out = text.to_string();
    while let Some(range) = find_issn(&out).and_then(|c| c.get(0)).map(|m| m.range()) {
        out.replace_range(range, "");
    }
    while let Some(range) = find_cn(&out).and_then(|c| c.get(0)).map(|m| m.range()) {
        out.replace_range(range, "");
    }
    out
}

/// Regex search that rejects hits touching a word character on either side,
/// retrying one character further on.
fn find_bounded<'a>(re: &Regex, s: &'a str) -> Option<Captures<'a>> {
    let mut start = 0;
    while start <= s.len() {
        let caps = re.captures_at(s, start)?;
        let whole = caps.get(0)?;
        let before = s[..whole.start()].chars().next_back();
        let after = s[whole.end()..].chars().next();
        if !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char) {
            return Some(caps);
        }
        let step = s[whole.start()..].chars().next().map_or(1, char::len_utf8);
        start = whole.start() + step;
    }
    None
}

/// Parse a classification rank such as `"2区"`, `"1 [3/120]"` or `"3"` into `"{n}区"`.
pub fn parse_rank(raw: &str) -> String {
    let s = raw.trim();
    if s.is_empty() {
        return String::new();
    }
    if let Some(caps) = RANK_ZONE_RE.captures(s) {
        return format!("{}区", &caps[1]);
    }
    if let Some(caps) = RANK_BRACKET_RE.captures(s) {
        return format!("{}区", &caps[1]);
    }
    if matches!(s, "1" | "2" | "3" | "4") {
        return format!("{}区", s);
    }
    String::new()
}

/// Parse a catalog quality level (`T1`..`T4`, `A+`..`D`, `A类`..`C类`).
pub fn parse_quality_level(raw: &str) -> String {
    let s = raw.trim();
    if s.is_empty() {
        return String::new();
    }
    let compact: String = s.split_whitespace().collect::<String>().to_uppercase();
    if matches!(compact.as_str(), "A+" | "A" | "B" | "C" | "D") {
        return compact;
    }
    if let Some(caps) = LEVEL_RE.captures(s) {
        return caps[1].split_whitespace().collect::<String>().to_uppercase();
    }
    if let Some(caps) = ABC_LEVEL_RE.captures(s) {
        return format!("{}类", caps[1].to_uppercase());
    }
    String::new()
}

/// Like [`parse_quality_level`], but only for text that holds nothing except
/// the level token. A leading `中文`/`外文`, a `C`/`E` marker, a `级` suffix and
/// a trailing colon are allowed. Returns an empty string otherwise.
pub fn parse_level_token(raw: &str) -> String {
    let bare = raw.trim().trim_end_matches([':', '：']).trim_end();
    let bare = bare.strip_suffix('级').unwrap_or(bare);
    let bare = ["中文", "外文"]
        .iter()
        .find_map(|p| bare.strip_prefix(p))
        .unwrap_or(bare);
    let compact: String = bare.split_whitespace().collect::<String>().to_uppercase();
    let level = parse_quality_level(&compact);
    if level.is_empty() {
        return level;
    }
    let token = compact
        .strip_prefix(['C', 'E'])
        .filter(|rest| *rest == level)
        .unwrap_or(&compact);
    if token == level {
        level
    } else {
        String::new()
    }
}

/// Sort key for quality levels. Lower is better; unknown levels rank 99 and
/// fall back to their literal text.
pub fn level_rank(level: &str) -> (u32, String) {
    let s: String = level.trim().to_uppercase().replace(' ', "");
    let rank = match s.as_str() {
        "T1" => 1,
        "T2" => 2,
        "T3" => 3,
        "T4" => 4,
        "A类" => 10,
        "B类" => 11,
        "C类" => 12,
        "A+" => 20,
        "A" => 21,
        "B" => 22,
        "C" => 23,
        "D" => 24,
        _ => 99,
    };
    (rank, s)
}

pub fn compare_levels(a: &str, b: &str) -> Ordering {
    level_rank(a).cmp(&level_rank(b))
}

/// The best (lowest ranked) non-empty level, or an empty string.
pub fn best_level<'a>(levels: impl IntoIterator<Item = &'a str>) -> String {
    levels
        .into_iter()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .min_by(|a, b| compare_levels(a, b))
        .unwrap_or_default()
        .to_string()
}

/// First `20xx` year in a noisy token such as `"JCR2023"` or `"2022年"`.
pub fn parse_year_token(raw: &str) -> String {
    YEAR_RE
        .captures(raw.trim())
        .map(|caps| caps[1].to_string())
        .unwrap_or_default()
}

pub fn year_value(raw: &str) -> u32 {
    parse_year_token(raw).parse().unwrap_or(0)
}

/// Parse an impact factor, tolerating thousands separators and `<0.1` style values.
pub fn parse_impact_factor(raw: &str) -> Option<f64> {
    let s = raw.trim().replace(',', "");
    let s = s.strip_prefix('<').unwrap_or(&s);
    if s.is_empty() {
        return None;
    }
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Split an `ISSN/EISSN` cell into (ISSN, eISSN), skipping repeats.
pub fn parse_issn_pair(raw: &str) -> (String, String) {
    let mut values: Vec<String> = Vec::new();
    for hit in ISSN_LOOSE_RE.find_iter(raw) {
        let normalized = normalize_issn(hit.as_str());
        if !normalized.is_empty() && !values.contains(&normalized) {
            values.push(normalized);
        }
    }
    let mut values = values.into_iter();
    let issn = values.next().unwrap_or_default();
    let eissn = values.next().unwrap_or_default();
    (issn, eissn)
}

pub fn parse_quartile(raw: &str) -> String {
    QUARTILE_RE
        .captures(&raw.trim().to_uppercase())
        .map(|caps| format!("Q{}", &caps[1]))
        .unwrap_or_default()
}

pub fn classification_rank_value(rank: &str) -> u32 {
    CLASS_RANK_RE
        .captures(rank.trim())
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(99)
}

/// Yes/no cells in either Chinese or English. `None` when the cell says neither.
pub fn parse_bool_zh(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "是" | "y" | "yes" | "true" | "1" => Some(true),
        "否" | "n" | "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// Citation-index tokens mentioned in a free-text index column, sorted.
pub fn extract_index_tokens(raw: &str) -> Vec<String> {
    let s = raw.trim().to_uppercase();
    if s.is_empty() {
        return Vec::new();
    }
    let mut found = std::collections::BTreeSet::new();
    for token in NON_ALNUM_RE.split(&s).filter(|t| !t.is_empty()) {
        if INDEX_TOKENS.contains(&token) || token == "AHCI" {
            found.insert(token.to_string());
        }
        for embedded in ["SSCI", "SCIE", "ESCI"] {
            if token.contains(embedded) {
                found.insert(embedded.to_string());
            }
        }
    }
    let letters_only = NON_ALPHA_RE.replace_all(&s, " ");
    if SCI_WORD_RE.is_match(&letters_only) {
        found.insert("SCI".to_string());
    }
    if EI_WORD_RE.is_match(&letters_only) {
        found.insert("EI".to_string());
    }
    found.into_iter().collect()
}

/// Normalize a feed tag: full-width parentheses to ASCII, whitespace removed.
pub fn normalize_tag_text(raw: &str) -> String {
    raw.trim()
        .replace('（', "(")
        .replace('）', ")")
        .split_whitespace()
        .collect()
}

/// Heading comparison key: full-width parentheses folded, whitespace removed.
pub fn norm_key(raw: &str) -> String {
    normalize_tag_text(raw)
}

/// Looser heading key: [`norm_key`] lower-cased with everything but word and
/// CJK characters removed.
pub fn soft_key(raw: &str) -> String {
    let lowered = norm_key(raw).to_lowercase();
    TITLE_STRIP_RE.replace_all(&lowered, "").into_owned()
}

pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
