use crate::journal::{Journal, JournalId};
use crate::normalize::{normalize_cn, normalize_issn, normalize_title};
use crate::record::JournalRecord;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Identity columns carried by an incoming row. Values may be raw; the store
/// normalizes them.
#[derive(Debug, Clone, Copy, Default)]
pub struct Candidate<'a> {
    pub title: &'a str,
    pub issn: &'a str,
    pub eissn: &'a str,
    pub cn_number: &'a str,
}

impl<'a> Candidate<'a> {
    pub fn titled(title: &'a str) -> Self {
        Self {
            title,
            ..Default::default()
        }
    }

    /// True when the row carries no identity at all and must be skipped.
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty()
            && normalize_issn(self.issn).is_empty()
            && normalize_issn(self.eissn).is_empty()
            && normalize_cn(self.cn_number).is_empty()
    }
}

/// Arena of journals plus the identity index used to resolve incoming rows.
///
/// Keys are owned by the journal that registered them last. Two journals that
/// turn out to share a key are never merged after the fact.
#[derive(Debug)]
pub struct JournalStore {
    items: BTreeMap<JournalId, Journal>,
    by_issn: HashMap<String, JournalId>,
    by_eissn: HashMap<String, JournalId>,
    by_cn: HashMap<String, JournalId>,
    by_title: HashMap<String, JournalId>,
    next_id: JournalId,
}

impl JournalStore {
    pub fn new() -> Self {
        Self {
            items: BTreeMap::new(),
            by_issn: HashMap::new(),
            by_eissn: HashMap::new(),
            by_cn: HashMap::new(),
            by_title: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: JournalId) -> Option<&Journal> {
        self.items.get(&id)
    }

    pub fn get_mut(&mut self, id: JournalId) -> Option<&mut Journal> {
        self.items.get_mut(&id)
    }

    pub fn journals(&self) -> impl Iterator<Item = &Journal> {
        self.items.values()
    }

    /// Resolve identity columns to a journal, creating one when nothing matches.
    ///
    /// Lookup order is ISSN, eISSN, CN. A CN number that matches nothing
    /// always creates a new journal: catalog documents reuse short titles
    /// across distinct CN-numbered journals, so title matching is only used
    /// for rows without a CN.
    pub fn resolve_or_create(&mut self, candidate: &Candidate<'_>) -> JournalId {
        let issn_key = normalize_issn(candidate.issn);
        let eissn_key = normalize_issn(candidate.eissn);
        let cn_key = normalize_cn(candidate.cn_number);

        for (key, index) in [
            (&issn_key, &self.by_issn),
            (&eissn_key, &self.by_eissn),
            (&cn_key, &self.by_cn),
        ] {
            if key.is_empty() {
                continue;
            }
            if let Some(&id) = index.get(key.as_str()) {
                return id;
            }
        }

        if cn_key.is_empty() {
            let title_key = normalize_title(candidate.title);
            if !title_key.is_empty() {
                if let Some(&id) = self.by_title.get(&title_key) {
                    return id;
                }
            }
        }

        self.create(candidate.title)
    }

    fn create(&mut self, title: &str) -> JournalId {
        let id = self.next_id;
        self.next_id += 1;
        self.items.insert(id, Journal::new(id, title));
        id
    }

    /// Re-insert a journal's current keys, taking ownership of each from any
    /// previous holder.
    pub fn register_keys(&mut self, id: JournalId) {
        let Some(journal) = self.items.get(&id) else {
            return;
        };
        let issn = normalize_issn(&journal.issn);
        let eissn = normalize_issn(&journal.eissn);
        let cn = normalize_cn(&journal.cn_number);
        let title = normalize_title(&journal.title);

        for (key, index) in [
            (issn, &mut self.by_issn),
            (eissn, &mut self.by_eissn),
            (cn, &mut self.by_cn),
            (title, &mut self.by_title),
        ] {
            if key.is_empty() {
                continue;
            }
            if let Some(previous) = index.insert(key, id) {
                if previous != id {
                    debug!(journal = id, previous, "identity key changed owner");
                }
            }
        }
    }

    /// Run one row through the resolve, adopt, mutate, register cycle.
    ///
    /// Returns `None` when the candidate carries no identity at all.
    pub fn ingest<F>(
        &mut self,
        candidate: &Candidate<'_>,
        source: &str,
        mutate: F,
    ) -> Option<JournalId>
    where
        F: FnOnce(&mut Journal),
    {
        if candidate.is_empty() {
            return None;
        }
        let id = self.resolve_or_create(candidate);
        let journal = self.items.get_mut(&id)?;
        journal.adopt_identity(
            candidate.title,
            &normalize_issn(candidate.issn),
            &normalize_issn(candidate.eissn),
            &normalize_cn(candidate.cn_number),
        );
        mutate(journal);
        journal.mark_source(source);
        self.register_keys(id);
        Some(id)
    }

    /// Every journal id grouped by normalized title, including titles shared
    /// by several journals.
    pub fn title_groups(&self) -> HashMap<String, Vec<JournalId>> {
        let mut groups: HashMap<String, Vec<JournalId>> = HashMap::new();
        for journal in self.items.values() {
            let key = normalize_title(&journal.title);
            if !key.is_empty() {
                groups.entry(key).or_default().push(journal.id);
            }
        }
        groups
    }

    /// Consume the store into output records: journals with an impact factor
    /// first (highest first), then by title.
    pub fn finalize(self) -> Vec<JournalRecord> {
        let mut rows: Vec<JournalRecord> =
            self.items.into_values().map(Journal::into_record).collect();
        rows.sort_by(|a, b| match (a.impact_factor, b.impact_factor) {
            (Some(x), Some(y)) => y.total_cmp(&x).then_with(|| a.title.cmp(&b.title)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.title.cmp(&b.title),
        });
        rows
    }
}

impl Default for JournalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate<'a>(title: &'a str, issn: &'a str, cn: &'a str) -> Candidate<'a> {
        Candidate {
            title,
            issn,
            eissn: "",
            cn_number: cn,
        }
    }

    #[test]
    fn test_issn_hit_wins_over_title() {
        let mut store = JournalStore::new();
        let first = store
            .ingest(&candidate("Acta Test", "1234-5678", ""), "a", |_| {})
            .unwrap();
        let second = store
            .ingest(&candidate("Completely Different", "12345678", ""), "b", |_| {})
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(first).unwrap().title, "Acta Test");
    }

    #[test]
    fn test_new_cn_never_merges_by_title() {
        let mut store = JournalStore::new();
        let existing = store
            .ingest(&candidate("Journal of Testing", "", ""), "a", |_| {})
            .unwrap();
        let with_cn = store
            .ingest(&candidate("Journal of Testing", "", "CN11-1234/N"), "b", |_| {})
            .unwrap();
        assert_ne!(existing, with_cn);
        assert_eq!(store.len(), 2);

        // The known CN now resolves to the CN-bearing journal.
        let again = store
            .ingest(&candidate("", "", "11-1234/n"), "c", |_| {})
            .unwrap();
        assert_eq!(again, with_cn);
    }

    #[test]
    fn test_title_match_without_identifiers() {
        let mut store = JournalStore::new();
        let a = store.ingest(&candidate("Acta  Test.", "", ""), "a", |_| {}).unwrap();
        let b = store.ingest(&candidate("acta test", "", ""), "b", |_| {}).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_ownership_is_last_writer_wins() {
        let mut store = JournalStore::new();
        let a = store.ingest(&candidate("Alpha", "1111-1111", ""), "a", |_| {}).unwrap();
        let b = store.ingest(&candidate("Beta", "2222-2222", ""), "b", |_| {}).unwrap();

        // Beta later turns out to carry Alpha's ISSN.
        store.get_mut(b).unwrap().issn = "1111-1111".to_string();
        store.register_keys(b);

        assert_eq!(store.len(), 2);
        let hit = store.resolve_or_create(&candidate("", "1111-1111", ""));
        assert_eq!(hit, b);
        assert_ne!(hit, a);
    }

    #[test]
    fn test_ids_are_sequential_and_placeholder_titles() {
        let mut store = JournalStore::new();
        let a = store.ingest(&candidate("", "1111-1111", ""), "a", |_| {}).unwrap();
        let b = store.ingest(&candidate("", "2222-2222", ""), "b", |_| {}).unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(store.get(a).unwrap().title, "Unknown-1");

        store.ingest(&candidate("Named Later", "1111-1111", ""), "c", |_| {});
        assert_eq!(store.get(a).unwrap().title, "Named Later");
    }

    #[test]
    fn test_empty_candidate_is_skipped() {
        let mut store = JournalStore::new();
        assert!(store.ingest(&candidate(" ", "n/a", ""), "a", |_| {}).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_finalize_order() {
        let mut store = JournalStore::new();
        store.ingest(&candidate("Zeta", "", ""), "s", |_| {});
        store.ingest(&candidate("Low", "", ""), "s", |j| {
            j.append_impact_factor("2023", Some(1.5), "Q3", "")
        });
        store.ingest(&candidate("Alpha", "", ""), "s", |_| {});
        store.ingest(&candidate("High", "", ""), "s", |j| {
            j.append_impact_factor("2023", Some(9.0), "Q1", "")
        });

        let titles: Vec<String> = store.finalize().into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["High", "Low", "Alpha", "Zeta"]);
    }
}
