use clap::Parser;
use colored::Colorize;
use journalscout::cache::Cache;
use journalscout::output::write_outputs;
use journalscout::sources::feed::DEFAULT_FEED_URL;
use journalscout::{BuildConfig, JournalBuilder};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "journalscout")]
#[command(version = "0.1.0")]
#[command(about = "Merge journal ranking sources into one record per journal", long_about = None)]
struct Args {
    /// Directory holding the ranking exports, CSCD list and catalog document
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Directory the JSON outputs are written to
    #[arg(long, default_value = "public/data")]
    out_dir: PathBuf,

    /// Catalog document to parse instead of the one found in the data directory
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// URL of the supplemental journal feed
    #[arg(long, default_value = DEFAULT_FEED_URL)]
    feed_url: String,

    /// Skip the remote feed
    #[arg(long)]
    no_feed: bool,

    /// Disable caching of the feed payload
    #[arg(long)]
    no_cache: bool,

    /// Delete cached feed payloads before building
    #[arg(long)]
    clear_cache: bool,

    /// Omit the run timestamp so identical inputs give identical output
    #[arg(long)]
    reproducible: bool,

    /// Verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("journalscout=debug")
            .init();
    }

    if args.clear_cache {
        let cleared = Cache::new(true).and_then(|cache| cache.clear().map(|()| cache));
        match cleared {
            Ok(cache) => println!(
                "Cleared cache at {}",
                cache.dir().display().to_string().cyan()
            ),
            Err(e) => {
                eprintln!("{} Failed to clear cache: {}", "Error:".red().bold(), e);
                return ExitCode::FAILURE;
            }
        }
    }

    let config = BuildConfig {
        data_dir: args.data_dir,
        catalog_path: args.catalog,
        feed_url: args.feed_url,
        fetch_feed: !args.no_feed,
        cache_enabled: !args.no_cache,
        show_progress: !args.verbose,
        reproducible: args.reproducible,
    };

    println!(
        "Building journal dataset from {}...",
        config.data_dir.display().to_string().cyan()
    );

    let builder = match JournalBuilder::new(config) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("{} Failed to initialize builder: {}", "Error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let output = match builder.build().await {
        Ok(output) => output,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    output.meta.print();

    match write_outputs(&args.out_dir, &output.meta, &output.journals, &output.field_stats) {
        Ok(paths) => {
            for path in paths {
                println!("Wrote {}", path.display().to_string().cyan());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
