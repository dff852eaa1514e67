//! Remote supplemental feed of Chinese core-index tags.

use super::{async_trait, SourceError};
use crate::cache::Cache;
use crate::journal::JournalId;
use crate::normalize::{extract_index_tokens, normalize_tag_text, normalize_title, INDEX_TOKENS};
use crate::store::JournalStore;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_FEED_URL: &str =
    "https://gitee.com/kailangge/cnki-journals/raw/main/cnki_journals.json";
const USER_AGENT: &str = "journalscout/0.1.0";
const FEED_TIMEOUT_SECS: u64 = 45;
const FEED_LABEL: &str = "cnki-scholar";
const FEED_CACHE_SOURCE: &str = "feed";

/// Error code recorded when the feed could not be fetched or was not a JSON array.
pub const FEED_ERROR_CODE: &str = "fetch_failed_or_invalid_payload";

/// Source of the supplemental feed payload.
#[async_trait]
pub trait FeedClient: Send + Sync {
    /// Fetch the feed rows
    async fn fetch(&self) -> Result<Vec<Value>, SourceError>;

    /// Where the rows come from, recorded in run metadata
    fn source_url(&self) -> &str;

    /// Get the name of this client
    fn name(&self) -> &'static str;
}

pub struct HttpFeedClient {
    client: Client,
    url: String,
}

impl HttpFeedClient {
    pub fn new(url: impl Into<String>) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(FEED_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl FeedClient for HttpFeedClient {
    async fn fetch(&self) -> Result<Vec<Value>, SourceError> {
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SourceError::InvalidPayload(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }
        let bytes = response.bytes().await?;
        match serde_json::from_slice::<Value>(&bytes)? {
            Value::Array(rows) => Ok(rows),
            other => Err(SourceError::InvalidPayload(format!(
                "expected a JSON array, got {}",
                json_kind(&other)
            ))),
        }
    }

    fn source_url(&self) -> &str {
        &self.url
    }

    fn name(&self) -> &'static str {
        "HTTP"
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Outcome of merging the feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedMeta {
    pub source_url: String,
    pub total_rows: usize,
    pub matched_rows: usize,
    pub updated_journals: usize,
    pub ambiguous_rows: usize,
    /// Empty on success, otherwise [`FEED_ERROR_CODE`]
    pub error: String,
}

impl FeedMeta {
    pub fn failed(source_url: &str) -> Self {
        Self {
            source_url: source_url.to_string(),
            error: FEED_ERROR_CODE.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeedRow {
    #[serde(default, deserialize_with = "lenient_text")]
    title: Option<String>,
    #[serde(default)]
    tags: Option<FeedTags>,
    #[serde(default, rename = "WOS")]
    wos: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedTags {
    One(String),
    Many(Vec<Value>),
    Other(Value),
}

/// Strings pass through and numbers are rendered. Anything else reads as absent.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

impl FeedTags {
    fn normalized(&self) -> HashSet<String> {
        let raw: Vec<&str> = match self {
            FeedTags::One(tag) => vec![tag.as_str()],
            FeedTags::Many(tags) => tags.iter().filter_map(Value::as_str).collect(),
            FeedTags::Other(_) => Vec::new(),
        };
        raw.into_iter()
            .map(normalize_tag_text)
            .filter(|t| !t.is_empty())
            .collect()
    }
}

fn cssci_from_tags(tags: &HashSet<String>) -> &'static str {
    if tags.contains("CSSCI(扩展)") || tags.contains("CSSCI扩展") {
        "扩展版"
    } else if tags.contains("CSSCI") {
        "来源版"
    } else {
        ""
    }
}

fn cscd_from_tags(tags: &HashSet<String>) -> &'static str {
    if tags.contains("CSCD(核心)") || tags.contains("CSCD核心") {
        "核心库"
    } else if tags.contains("CSCD(扩展)") || tags.contains("CSCD扩展") {
        "扩展库"
    } else if tags.contains("CSCD") {
        "核心库"
    } else {
        ""
    }
}

/// Keep the better of two index types according to `order` (best first).
/// Unknown values lose to known ones; an empty candidate never replaces.
fn pick_type(current: &str, candidate: &str, order: &[&str]) -> String {
    let rank = |v: &str| order.iter().position(|o| *o == v).unwrap_or(usize::MAX);
    if candidate.is_empty() {
        return current.to_string();
    }
    if current.is_empty() || rank(candidate) < rank(current) {
        candidate.to_string()
    } else {
        current.to_string()
    }
}

/// Merge feed rows into the store by exact normalized title.
///
/// Titles are grouped once before the merge. A row whose title maps to no
/// journal is ignored; one that maps to several is counted as ambiguous and
/// ignored.
pub fn merge_feed(store: &mut JournalStore, rows: &[Value], source_url: &str) -> FeedMeta {
    let mut meta = FeedMeta {
        source_url: source_url.to_string(),
        total_rows: rows.len(),
        ..Default::default()
    };
    let groups = store.title_groups();
    let mut updated: BTreeSet<JournalId> = BTreeSet::new();

    for (index, value) in rows.iter().enumerate() {
        let row = match serde_json::from_value::<FeedRow>(value.clone()) {
            Ok(row) => row,
            Err(err) => {
                warn!(row = index, error = %err, "skipping malformed feed row");
                continue;
            }
        };
        let key = normalize_title(row.title.as_deref().unwrap_or_default());
        if key.is_empty() {
            continue;
        }
        let id = match groups.get(&key).map(Vec::as_slice) {
            Some([id]) => *id,
            Some(ids) if ids.len() > 1 => {
                meta.ambiguous_rows += 1;
                continue;
            }
            _ => continue,
        };
        let Some(journal) = store.get_mut(id) else {
            continue;
        };
        meta.matched_rows += 1;

        let tags = row.tags.as_ref().map(FeedTags::normalized).unwrap_or_default();
        let wos = match &row.wos {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        let wos_tokens: HashSet<String> = extract_index_tokens(&wos).into_iter().collect();

        let before = (
            journal.pku_core,
            journal.cssci_type.clone(),
            journal.cscd_type.clone(),
            journal.ei_indexed,
            journal.index_tokens.len(),
        );

        if tags.contains("北大核心") {
            journal.pku_core = true;
        }
        journal.cssci_type = pick_type(
            &journal.cssci_type,
            cssci_from_tags(&tags),
            &["来源版", "扩展版"],
        );
        journal.cscd_type = pick_type(
            &journal.cscd_type,
            cscd_from_tags(&tags),
            &["核心库", "扩展库"],
        );
        if tags.contains("EI") || wos_tokens.contains("EI") {
            journal.ei_indexed = true;
        }
        for token in INDEX_TOKENS {
            if tags.contains(token) || wos_tokens.contains(token) {
                journal.index_tokens.insert(token.to_string());
            }
        }

        let after = (
            journal.pku_core,
            journal.cssci_type.clone(),
            journal.cscd_type.clone(),
            journal.ei_indexed,
            journal.index_tokens.len(),
        );
        if before != after {
            updated.insert(id);
        }
        journal.mark_source(FEED_LABEL);
        store.register_keys(id);
    }

    meta.updated_journals = updated.len();
    info!(
        total = meta.total_rows,
        matched = meta.matched_rows,
        updated = meta.updated_journals,
        ambiguous = meta.ambiguous_rows,
        "feed merged"
    );
    meta
}

/// Fetch with `client` (through `cache`) and merge. A failed fetch degrades
/// to an empty merge carrying [`FEED_ERROR_CODE`].
pub async fn load_feed(store: &mut JournalStore, client: &dyn FeedClient, cache: &Cache) -> FeedMeta {
    let url = client.source_url();
    if let Some(rows) = cache.get::<Vec<Value>>(FEED_CACHE_SOURCE, url) {
        debug!(url, rows = rows.len(), "feed served from cache");
        return merge_feed(store, &rows, url);
    }

    match client.fetch().await {
        Ok(rows) => {
            if let Err(err) = cache.set(FEED_CACHE_SOURCE, url, &rows) {
                warn!(error = %err, "failed to cache feed payload");
            }
            merge_feed(store, &rows, url)
        }
        Err(err) => {
            warn!(client = client.name(), url, error = %err, "feed unavailable");
            FeedMeta::failed(url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Candidate;
    use serde_json::json;

    struct StaticFeed(Result<Vec<Value>, String>);

    #[async_trait]
    impl FeedClient for StaticFeed {
        async fn fetch(&self) -> Result<Vec<Value>, SourceError> {
            self.0.clone().map_err(SourceError::InvalidPayload)
        }

        fn source_url(&self) -> &str {
            "memory://feed"
        }

        fn name(&self) -> &'static str {
            "static"
        }
    }

    fn store_with(titles: &[&str]) -> JournalStore {
        let mut store = JournalStore::new();
        for title in titles {
            store.ingest(&Candidate::titled(title), "seed", |_| {});
        }
        store
    }

    #[test]
    fn test_merge_sets_flags_and_tokens() {
        let mut store = store_with(&["计算机学报", "软件学报"]);
        let rows = vec![
            json!({"title": "计算机学报", "tags": ["北大核心", "CSSCI（扩展）", "CSCD"], "WOS": "SCIE; EI"}),
            json!({"title": "软件学报", "tags": "EI"}),
            json!({"title": "不存在的期刊", "tags": ["北大核心"]}),
            json!("not an object"),
        ];
        let meta = merge_feed(&mut store, &rows, "memory://feed");

        assert_eq!(meta.total_rows, 4);
        assert_eq!(meta.matched_rows, 2);
        assert_eq!(meta.updated_journals, 2);
        assert_eq!(meta.ambiguous_rows, 0);

        let j = store.journals().find(|j| j.title == "计算机学报").unwrap();
        assert!(j.pku_core);
        assert_eq!(j.cssci_type, "扩展版");
        assert_eq!(j.cscd_type, "核心库");
        assert!(j.ei_indexed);
        assert!(j.index_tokens.contains("SCIE"));
        assert!(j.provenance.contains(&"cnki-scholar".to_string()));
    }

    #[test]
    fn test_rows_with_unexpected_field_types() {
        let mut store = store_with(&["计算机学报", "1843"]);
        let rows = vec![
            json!({"title": "计算机学报", "tags": 42, "WOS": ["SCIE"]}),
            json!({"title": 1843, "tags": ["北大核心"]}),
            json!({"title": {"zh": "软件学报"}, "tags": ["CSSCI"]}),
            json!(17),
        ];
        let meta = merge_feed(&mut store, &rows, "memory://feed");

        assert_eq!(meta.total_rows, 4);
        assert_eq!(meta.matched_rows, 2);
        assert_eq!(meta.updated_journals, 2);
        let numeric = store.journals().find(|j| j.title == "1843").unwrap();
        assert!(numeric.pku_core);
        let j = store.journals().find(|j| j.title == "计算机学报").unwrap();
        assert!(!j.pku_core);
        assert!(j.index_tokens.contains("SCIE"));
    }

    #[test]
    fn test_ambiguous_titles_are_not_merged() {
        let mut store = store_with(&["Acta Test"]);
        store.ingest(
            &Candidate {
                title: "Acta Test",
                cn_number: "11-1111/N",
                ..Default::default()
            },
            "seed",
            |_| {},
        );
        assert_eq!(store.len(), 2);

        let rows = vec![json!({"title": "acta test", "tags": ["北大核心"]})];
        let meta = merge_feed(&mut store, &rows, "memory://feed");
        assert_eq!(meta.ambiguous_rows, 1);
        assert_eq!(meta.matched_rows, 0);
        assert!(store.journals().all(|j| !j.pku_core));
    }

    #[test]
    fn test_better_type_wins() {
        assert_eq!(pick_type("扩展版", "来源版", &["来源版", "扩展版"]), "来源版");
        assert_eq!(pick_type("来源版", "扩展版", &["来源版", "扩展版"]), "来源版");
        assert_eq!(pick_type("核心库", "", &["核心库", "扩展库"]), "核心库");
    }

    #[tokio::test]
    async fn test_failed_fetch_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::in_dir(dir.path(), true).unwrap();
        let mut store = store_with(&["Acta Test"]);
        let client = StaticFeed(Err("boom".to_string()));
        let meta = load_feed(&mut store, &client, &cache).await;
        assert_eq!(meta.error, FEED_ERROR_CODE);
        assert_eq!(meta.total_rows, 0);
        assert_eq!(meta.source_url, "memory://feed");
    }

    #[tokio::test]
    async fn test_payload_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::in_dir(dir.path(), true).unwrap();
        let rows = vec![json!({"title": "Acta Test", "tags": ["北大核心"]})];

        let mut store = store_with(&["Acta Test"]);
        let meta = load_feed(&mut store, &StaticFeed(Ok(rows)), &cache).await;
        assert_eq!(meta.matched_rows, 1);

        // A failing client is not consulted while the cached payload is fresh.
        let mut again = store_with(&["Acta Test"]);
        let meta = load_feed(&mut again, &StaticFeed(Err("down".into())), &cache).await;
        assert!(meta.error.is_empty());
        assert_eq!(meta.matched_rows, 1);
        assert!(again.journals().all(|j| j.pku_core));
    }
}
