use crate::catalog::FieldStats;
use crate::record::JournalRecord;
use crate::sources::feed::FeedMeta;
use crate::sources::RankingMeta;
use colored::Colorize;
use serde::{Deserialize, Serialize};

/// Metadata describing one build run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    /// RFC 3339 timestamp; absent for reproducible runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    pub data_dir: String,
    pub ranking: RankingMeta,
    pub feed: FeedMeta,
    pub total_journals: usize,
    pub hq_catalog_journals: usize,
    pub hq_field_count: usize,
    pub hq_field_match_count: usize,
    pub hq_field_stats: Vec<FieldStats>,
    /// One line per loader that failed and was skipped
    pub source_errors: Vec<String>,
}

impl RunMeta {
    /// Fill the totals from the finalized journals and catalog statistics.
    pub fn summarize(&mut self, journals: &[JournalRecord], field_stats: &[FieldStats]) {
        self.total_journals = journals.len();
        self.hq_catalog_journals = journals.iter().filter(|j| j.hq_catalog).count();
        self.hq_field_count = field_stats.len();
        self.hq_field_match_count = field_stats.iter().filter(|s| s.match_declared).count();
        self.hq_field_stats = field_stats.to_vec();
    }

    pub fn mismatched_fields(&self) -> impl Iterator<Item = &FieldStats> {
        self.hq_field_stats.iter().filter(|s| !s.match_declared)
    }

    /// Print the run summary to stdout with colors
    pub fn print(&self) {
        println!();
        println!("{}", "journalscout build".bold());
        println!("{}", "=".repeat(50));
        println!();

        println!("Journals: {}", self.total_journals.to_string().green());
        if self.ranking.source.is_empty() {
            println!("  ranking data: {}", "not found".yellow());
        } else {
            println!(
                "  ranking data: {} ({} IF, {} classification, {} warning tables)",
                self.ranking.source.cyan(),
                self.ranking.impact_factor_tables.len(),
                self.ranking.classification_tables.len(),
                self.ranking.warning_tables.len()
            );
        }
        println!(
            "  catalog journals: {}",
            self.hq_catalog_journals.to_string().green()
        );
        println!();

        self.print_fields();
        self.print_feed();

        if !self.source_errors.is_empty() {
            println!(
                "{}",
                format!("SOURCE ERRORS ({})", self.source_errors.len())
                    .red()
                    .bold()
            );
            for err in &self.source_errors {
                println!("  {}", err);
            }
            println!();
        }
    }

    fn print_fields(&self) {
        if self.hq_field_stats.is_empty() {
            println!("{}", "No catalog fields parsed.".dimmed());
            println!();
            return;
        }

        let matched = self.hq_field_match_count;
        let total = self.hq_field_count;
        let header = format!("CATALOG FIELDS ({}/{} reconciled)", matched, total);
        if matched == total {
            println!("{}", header.green().bold());
        } else {
            println!("{}", header.yellow().bold());
        }

        for stats in &self.hq_field_stats {
            let line = format!(
                "{:>3}. {} declared {} parsed {} unique {}",
                stats.index,
                truncate(&stats.field, 24),
                stats.declared_count,
                stats.parsed_count,
                stats.parsed_unique_count
            );
            if stats.match_declared {
                println!("  {}", line.dimmed());
            } else {
                println!("  {}", line.red());
            }
            if !stats.found_heading {
                println!("       {}", "section heading not found".yellow());
            }
        }
        println!();
    }

    fn print_feed(&self) {
        let feed = &self.feed;
        if feed.source_url.is_empty() {
            println!("Feed: {}", "skipped".dimmed());
        } else if !feed.error.is_empty() {
            println!("Feed: {} ({})", "unavailable".red(), feed.error);
        } else {
            println!(
                "Feed: {} rows, {} matched, {} updated, {} ambiguous",
                feed.total_rows,
                feed.matched_rows.to_string().green(),
                feed.updated_journals.to_string().green(),
                feed.ambiguous_rows.to_string().yellow()
            );
        }
        println!();
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars - 1).collect();
        format!("{}…", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(field: &str, declared: usize, parsed: usize) -> FieldStats {
        FieldStats {
            field: field.to_string(),
            declared_count: declared,
            parsed_count: parsed,
            parsed_unique_count: parsed,
            match_declared: declared == parsed,
            found_heading: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_summarize_counts_matches() {
        let mut meta = RunMeta::default();
        let fields = vec![stats("计算机", 3, 3), stats("数学", 5, 4)];
        meta.summarize(&[], &fields);

        assert_eq!(meta.hq_field_count, 2);
        assert_eq!(meta.hq_field_match_count, 1);
        let mismatched: Vec<_> = meta.mismatched_fields().map(|s| s.field.as_str()).collect();
        assert_eq!(mismatched, vec!["数学"]);
    }

    #[test]
    fn test_generated_at_omitted_when_absent() {
        let meta = RunMeta::default();
        let json = serde_json::to_value(&meta).unwrap();
        assert!(json.get("generated_at").is_none());
        assert_eq!(json["feed"]["error"], "");
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("计算机科学", 10), "计算机科学");
        assert_eq!(truncate("计算机科学与技术", 4), "计算机…");
    }
}
