pub mod cache;
pub mod catalog;
pub mod journal;
pub mod normalize;
pub mod output;
pub mod record;
pub mod report;
pub mod row;
pub mod sources;
pub mod store;

use cache::{Cache, CacheError};
use catalog::FieldStats;
use record::JournalRecord;
use report::RunMeta;
use sources::feed::{self, FeedClient, FeedMeta, HttpFeedClient, DEFAULT_FEED_URL};
use sources::SourceError;
use store::JournalStore;

use chrono::{SecondsFormat, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Pipeline stages, in the order they run
const STAGES: [&str; 5] = ["ranking", "cscd", "catalog", "feed", "finalize"];

/// Configuration for a build run
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub data_dir: PathBuf,
    /// Catalog document to use instead of the one discovered in `data_dir`
    pub catalog_path: Option<PathBuf>,
    pub feed_url: String,
    pub fetch_feed: bool,
    pub cache_enabled: bool,
    pub show_progress: bool,
    /// Omit the run timestamp so identical inputs give identical output
    pub reproducible: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            catalog_path: None,
            feed_url: DEFAULT_FEED_URL.to_string(),
            fetch_feed: true,
            cache_enabled: true,
            show_progress: true,
            reproducible: false,
        }
    }
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Data directory not found: {}", .0.display())]
    MissingDataDir(PathBuf),
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Everything a build produces
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub meta: RunMeta,
    pub journals: Vec<JournalRecord>,
    pub field_stats: Vec<FieldStats>,
}

/// Runs every source against one journal store and finalizes it
pub struct JournalBuilder {
    config: BuildConfig,
    cache: Cache,
    feed_client: Option<Box<dyn FeedClient>>,
}

impl JournalBuilder {
    pub fn new(config: BuildConfig) -> Result<Self, BuildError> {
        let cache = Cache::new(config.cache_enabled)?;
        Ok(Self {
            config,
            cache,
            feed_client: None,
        })
    }

    /// Use `client` for the remote feed instead of the HTTP client
    pub fn with_feed_client(mut self, client: impl FeedClient + 'static) -> Self {
        self.feed_client = Some(Box::new(client));
        self
    }

    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = cache;
        self
    }

    /// Load ranking data, the CSCD list, the catalog and the feed, in that
    /// order, then finalize.
    pub async fn build(&self) -> Result<BuildOutput, BuildError> {
        let data_dir = &self.config.data_dir;
        if !data_dir.is_dir() {
            return Err(BuildError::MissingDataDir(data_dir.clone()));
        }

        let pb = self.progress_bar();
        let mut store = JournalStore::new();
        let mut meta = RunMeta {
            data_dir: data_dir.display().to_string(),
            ..Default::default()
        };

        pb.set_message(STAGES[0]);
        match sources::load_ranking(&mut store, data_dir) {
            Ok(ranking) => meta.ranking = ranking,
            Err(err) => record_source_error(&mut meta, "ranking", &err),
        }
        pb.inc(1);

        pb.set_message(STAGES[1]);
        if let Some(path) = sources::find_cscd_file(data_dir) {
            if let Err(err) = sources::cscd::load_cscd(&mut store, &path) {
                record_source_error(&mut meta, "cscd", &err);
            }
        }
        pb.inc(1);

        pb.set_message(STAGES[2]);
        let field_stats = self.load_catalog(&mut store, data_dir, &mut meta);
        pb.inc(1);

        pb.set_message(STAGES[3]);
        let feed_meta = self.load_feed(&mut store, &mut meta).await;
        meta.feed = feed_meta;
        pb.inc(1);

        pb.set_message(STAGES[4]);
        let journals = store.finalize();
        meta.summarize(&journals, &field_stats);
        if !self.config.reproducible {
            meta.generated_at = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        }
        pb.inc(1);
        pb.finish_with_message("Done!");

        info!(
            journals = meta.total_journals,
            catalog_journals = meta.hq_catalog_journals,
            "build finished"
        );
        Ok(BuildOutput {
            meta,
            journals,
            field_stats,
        })
    }

    fn load_catalog(
        &self,
        store: &mut JournalStore,
        data_dir: &Path,
        meta: &mut RunMeta,
    ) -> Vec<FieldStats> {
        let path = match &self.config.catalog_path {
            Some(path) => Some(path.clone()),
            None => sources::find_catalog_file(data_dir),
        };
        let Some(path) = path else {
            info!("no catalog document found");
            return Vec::new();
        };
        match sources::load_catalog(store, &path) {
            Ok(stats) => stats,
            Err(err) => {
                record_source_error(meta, "catalog", &err);
                Vec::new()
            }
        }
    }

    async fn load_feed(&self, store: &mut JournalStore, meta: &mut RunMeta) -> FeedMeta {
        if !self.config.fetch_feed {
            return FeedMeta::default();
        }
        if let Some(client) = &self.feed_client {
            return feed::load_feed(store, client.as_ref(), &self.cache).await;
        }
        match HttpFeedClient::new(self.config.feed_url.as_str()) {
            Ok(client) => feed::load_feed(store, &client, &self.cache).await,
            Err(err) => {
                record_source_error(meta, "feed", &err);
                FeedMeta::failed(&self.config.feed_url)
            }
        }
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(STAGES.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

fn record_source_error(meta: &mut RunMeta, source: &str, err: &SourceError) {
    warn!(source, error = %err, "source skipped");
    meta.source_errors.push(format!("{}: {}", source, err));
}
