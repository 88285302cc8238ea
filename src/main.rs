use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::info;

use dailyread::db::{Database, NewSource, Store};
use dailyread::environment::Config;
use dailyread::logging::configure_logging;
use dailyread::rss::{is_valid_url, FeedAliases, Fetcher};
use dailyread::workers::Scheduler;

#[derive(Parser)]
#[clap(name = "dailyread", about = "Collect posts from RSS and Atom feeds")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape due sources on a fixed interval until terminated
    Run {
        /// Sources fetched in parallel per cycle (overrides SCRAPE_CONCURRENCY)
        #[clap(short, long)]
        concurrency: Option<usize>,

        /// Seconds between cycles (overrides SCRAPE_INTERVAL_SECS)
        #[clap(short, long)]
        interval_secs: Option<u64>,
    },

    /// Register a feed to scrape
    AddSource {
        #[clap(short, long)]
        name: String,

        #[clap(short, long)]
        url: String,

        /// Free-form tag stored with the source
        #[clap(short = 't', long, default_value = "rss")]
        source_type: String,
    },

    /// List registered sources as JSON
    Sources,

    /// List the newest posts as JSON
    Posts {
        #[clap(short, long, default_value = "20")]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    configure_logging();

    let config = Config::from_env().context("invalid configuration")?;
    let db = Database::new(&config.database_path)
        .await
        .with_context(|| format!("failed to open database {}", config.database_path))?;

    match cli.command {
        Commands::Run {
            concurrency,
            interval_secs,
        } => {
            let concurrency = concurrency.unwrap_or(config.concurrency);
            let interval = interval_secs
                .map(Duration::from_secs)
                .unwrap_or(config.interval);
            if concurrency == 0 || interval.is_zero() {
                anyhow::bail!("concurrency and interval must be greater than zero");
            }

            let aliases = match &config.aliases_path {
                Some(path) => FeedAliases::load(path)?,
                None => FeedAliases::default(),
            };
            let fetcher = Fetcher::new(aliases).context("failed to build HTTP client")?;

            info!("Starting dailyread scraper on {}", config.database_path);
            Scheduler::new(Arc::new(db), Arc::new(fetcher), concurrency, interval)
                .run()
                .await;
        }
        Commands::AddSource {
            name,
            url,
            source_type,
        } => {
            if !is_valid_url(url.trim()) {
                anyhow::bail!("not an http(s) URL: {}", url);
            }
            let source = db
                .create_source(NewSource {
                    name,
                    url,
                    source_type,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&source)?);
        }
        Commands::Sources => {
            let sources = db.list_sources().await?;
            println!("{}", serde_json::to_string_pretty(&sources)?);
        }
        Commands::Posts { limit } => {
            let posts = db.list_posts(limit).await?;
            println!("{}", serde_json::to_string_pretty(&posts)?);
        }
    }

    Ok(())
}
