mod error;
mod index;
mod input;
mod logging;
mod parser;
mod pipeline;
mod record;
mod render;
mod retriever;
mod settings;
mod store;
mod summary;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use index::SeenIndex;
use pipeline::RunOptions;
use render::webdriver::{DriverProcess, WebDriverSession};
use retriever::Retriever;
use settings::{Overrides, Settings};
use store::OrderedStore;

#[derive(Parser)]
#[command(name = "magnet_scraper", about = "Forum thread scraper with deduplicated CSV output")]
struct Cli {
    /// Settings file (default: ./magnet_scraper.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Input CSV with a URL column
    #[arg(long, global = true)]
    input: Option<PathBuf>,

    /// Output store CSV
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Processed-URL index
    #[arg(long, global = true)]
    index: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, extract and store every unseen URL from the input list
    Run {
        /// Only consider the first N input URLs
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Records per store write
        #[arg(short, long)]
        batch_size: Option<usize>,
        /// Load attempts per URL
        #[arg(short = 'r', long)]
        max_attempts: Option<u32>,
    },
    /// Extract a record from a saved HTML page and print it as JSON
    Extract {
        file: PathBuf,
        /// Source URL to record
        #[arg(short, long, default_value = "unknown")]
        url: String,
    },
    /// Show store and index statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut overrides = Overrides {
        config_file: cli.config,
        input: cli.input,
        output: cli.output,
        index: cli.index,
        ..Overrides::default()
    };
    if let Commands::Run { batch_size, max_attempts, .. } = &cli.command {
        overrides.batch_size = *batch_size;
        overrides.max_attempts = *max_attempts;
    }

    let settings = match Settings::load(&overrides) {
        Ok(s) => s,
        Err(e) => {
            logging::init(None)?;
            return Err(e).context("Invalid configuration");
        }
    };
    let _log_guard = logging::init(settings.log_path())?;

    let result = match cli.command {
        Commands::Run { limit, .. } => run(&settings, limit).await,
        Commands::Extract { file, url } => {
            let markup = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {:?}", file))?;
            let record = parser::extract_record(&markup, &url)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Commands::Stats => {
            let store = OrderedStore::new(&settings.output);
            let index = SeenIndex::load(&settings.index)?;
            let s = summary::summarize(&store.load()?);
            let fmt_date = |d: Option<chrono::NaiveDateTime>| {
                d.map(|d| d.to_string()).unwrap_or_else(|| "-".into())
            };
            println!("Records:      {}", s.records);
            println!("Indexed URLs: {}", index.len());
            println!("Oldest post:  {}", fmt_date(s.oldest));
            println!("Newest post:  {}", fmt_date(s.newest));
            println!("Undated:      {}", s.undated);
            println!("No magnet:    {}", s.unknown_keys);
            println!("No title:     {}", s.unknown_titles);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn run(settings: &Settings, limit: Option<usize>) -> anyhow::Result<()> {
    let mut index = SeenIndex::load(&settings.index)?;
    let store = OrderedStore::new(&settings.output);
    let existing = store.load()?.len();
    let insert_mode = existing > 0;
    info!(records = existing, insert_mode, "Store loaded");

    let mut urls = input::read_urls(&settings.input)?;
    if let Some(n) = limit {
        urls.truncate(n);
    }
    if urls.is_empty() {
        warn!("No URLs found in {:?}", settings.input);
        return Ok(());
    }

    let driver = match &settings.chromedriver {
        Some(path) => Some(DriverProcess::spawn(path, &settings.webdriver_url).await?),
        None => None,
    };
    let session = match WebDriverSession::start(&settings.driver_options()).await {
        Ok(s) => s,
        Err(e) => {
            if let Some(d) = driver {
                d.shutdown().await;
            }
            return Err(e).context("Failed to start browser session");
        }
    };

    println!("Processing {} URLs...", urls.len());
    let mut retriever = Retriever::new(session, settings.retry_policy());
    let opts = RunOptions {
        batch_size: settings.batch_size,
        insert_mode,
        progress: true,
    };
    let stats = pipeline::run(&urls, &mut retriever, &mut index, &store, &opts).await;

    if let Err(e) = retriever.into_session().quit().await {
        warn!("Failed to close browser session: {}", e);
    }
    if let Some(d) = driver {
        d.shutdown().await;
    }

    stats.print();
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
