use super::toc::{Heading, TocEntry};
use crate::normalize::{norm_key, soft_key};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static LEADING_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[0-9]+\s*[.、．]\s*").expect("valid regex"));
static TRAILING_COUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[（(]\s*[0-9]+\s*[种本]\s*[）)]\s*$").expect("valid regex"));

/// The slice of the document belonging to one TOC entry.
#[derive(Debug, Clone)]
pub struct Section<'a> {
    pub entry: TocEntry,
    /// `None` when no heading matched the entry.
    pub text: Option<&'a str>,
}

impl Section<'_> {
    pub fn found_heading(&self) -> bool {
        self.text.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Keys {
    norm: String,
    soft: String,
}

impl Keys {
    fn of(text: &str) -> Self {
        let stripped = LEADING_NUMBER_RE.replace(text, "");
        let stripped = TRAILING_COUNT_RE.replace(&stripped, "");
        Self {
            norm: norm_key(text),
            soft: soft_key(&stripped),
        }
    }

    fn matches(&self, target: &Keys) -> bool {
        (!self.norm.is_empty() && self.norm == target.norm)
            || (!self.soft.is_empty() && self.soft == target.soft)
    }
}

struct HeadingIndex<'h> {
    headings: &'h [Heading],
    single: Vec<Keys>,
    /// Keys of heading `i` joined with heading `i + 1`.
    joined: Vec<Option<Keys>>,
}

impl<'h> HeadingIndex<'h> {
    fn new(headings: &'h [Heading]) -> Self {
        let single = headings.iter().map(|h| Keys::of(&h.text)).collect();
        let joined = (0..headings.len())
            .map(|i| {
                headings
                    .get(i + 1)
                    .map(|next| Keys::of(&format!("{}{}", headings[i].text, next.text)))
            })
            .collect();
        Self {
            headings,
            single,
            joined,
        }
    }

    /// Heading index and how many heading lines the match spans.
    fn match_at(&self, i: usize, target: &Keys) -> Option<(usize, usize)> {
        if self.single[i].matches(target) {
            return Some((i, 1));
        }
        match &self.joined[i] {
            Some(keys) if keys.matches(target) => Some((i, 2)),
            _ => None,
        }
    }

    fn find(&self, target: &Keys, start_from: usize) -> Option<(usize, usize)> {
        (start_from..self.headings.len())
            .chain(0..self.headings.len())
            .find_map(|i| self.match_at(i, target))
    }

    fn is_toc_heading(&self, i: usize, norms: &HashSet<String>, softs: &HashSet<String>) -> bool {
        let hit = |keys: &Keys| norms.contains(&keys.norm) || softs.contains(&keys.soft);
        hit(&self.single[i]) || self.joined[i].as_ref().is_some_and(hit)
    }
}

/// Cut the document into one section per TOC entry.
///
/// A section starts at its matching heading and runs until the next heading
/// that matches any TOC entry. Matching is tried forward from the previous
/// hit first so repeated field names resolve in document order.
pub fn split_sections<'a>(
    text: &'a str,
    headings: &[Heading],
    toc: &[TocEntry],
) -> Vec<Section<'a>> {
    let index = HeadingIndex::new(headings);
    let targets: Vec<Keys> = toc.iter().map(|e| Keys::of(&e.field)).collect();
    let norms: HashSet<String> = targets
        .iter()
        .map(|k| k.norm.clone())
        .filter(|k| !k.is_empty())
        .collect();
    let softs: HashSet<String> = targets
        .iter()
        .map(|k| k.soft.clone())
        .filter(|k| !k.is_empty())
        .collect();

    let mut sections = Vec::with_capacity(toc.len());
    let mut search_from = 0;
    for (entry, target) in toc.iter().zip(&targets) {
        let Some((hit, span)) = index.find(target, search_from) else {
            sections.push(Section {
                entry: entry.clone(),
                text: None,
            });
            continue;
        };

        let start = headings[hit].start;
        let end = (hit + span..headings.len())
            .find(|&j| index.is_toc_heading(j, &norms, &softs))
            .map_or(text.len(), |j| headings[j].start);

        sections.push(Section {
            entry: entry.clone(),
            text: Some(&text[start..end]),
        });
        search_from = hit + span.max(1);
    }
    sections
}
