mod batch;
mod db;
mod error;
mod ranking;
mod repository;
mod settings;
mod stats;
mod top_pages;

#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};

use crate::db::SqliteStore;
use crate::ranking::{score_page, ScoreInput};
use crate::settings::Settings;

#[derive(Parser)]
#[command(
    name = "page_ranker",
    about = "Score, categorize and flag the top pages of crawled websites"
)]
struct Cli {
    /// SQLite database with websites and pages (overrides RANKER_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Recompute every page score, flag top pages, print stats (default)
    Rank(RankArgs),
    /// Flag top pages from the scores already stored
    Select(SelectArgs),
    /// Show ranking statistics
    Stats,
    /// List the flagged top pages of one website
    Top {
        /// Website id
        website_id: i64,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "20")]
        limit: i64,
    },
    /// Score a single page without touching the database
    Score {
        url: String,
        #[arg(long)]
        title: Option<String>,
        /// Sitemap priority in [0, 1]
        #[arg(long)]
        priority: Option<f64>,
        /// Last modified timestamp (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        last_modified: Option<String>,
        /// Website domain used to strip the URL down to its path
        #[arg(long, default_value = "")]
        domain: String,
    },
}

#[derive(Args, Default)]
struct RankArgs {
    /// Pages per window (default 1000)
    #[arg(long)]
    window: Option<i64>,
    /// Tries per page update before it counts as failed
    #[arg(long)]
    attempts: Option<u32>,
    /// Record failed updates and continue instead of aborting the run
    #[arg(long)]
    keep_going: bool,
    #[command(flatten)]
    select: SelectArgs,
}

#[derive(Args, Default)]
struct SelectArgs {
    /// Top pages per website (default 20)
    #[arg(long)]
    top: Option<i64>,
    /// Only set flags; keep flags on pages that left the top set
    #[arg(long)]
    additive_flags: bool,
}

impl SelectArgs {
    fn apply(&self, settings: &mut Settings) {
        if let Some(n) = self.top {
            settings.top_n = n;
        }
        settings.additive_flags |= self.additive_flags;
    }
}

impl RankArgs {
    fn apply(&self, settings: &mut Settings) {
        if let Some(n) = self.window {
            settings.window_size = n;
        }
        if let Some(n) = self.attempts {
            settings.update_attempts = n;
        }
        settings.keep_going |= self.keep_going;
        self.select.apply(settings);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load()?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }

    let command = cli.command.unwrap_or(Commands::Rank(RankArgs::default()));
    let result = match command {
        Commands::Rank(args) => {
            args.apply(&mut settings);
            settings.validate()?;
            let store = SqliteStore::open(&settings.db_path)?;

            let run_clock = Utc::now();
            println!("Ranking pages in {:?}...", settings.db_path);
            let report = batch::rank_all_pages(&store, &settings.batch_options(), run_clock)
                .await
                .context("ranking run aborted")?;
            report.print();

            let selection = top_pages::flag_top_pages(&store, &settings.selection_options())
                .await
                .context("top page selection aborted")?;
            println!(
                "Flagged {} top pages across {} websites.",
                selection.flagged, selection.groups
            );

            println!();
            stats::collect(&store).await?.print();
            Ok(())
        }
        Commands::Select(args) => {
            args.apply(&mut settings);
            settings.validate()?;
            let store = SqliteStore::open(&settings.db_path)?;
            let selection = top_pages::flag_top_pages(&store, &settings.selection_options())
                .await
                .context("top page selection aborted")?;
            println!(
                "Flagged {} top pages across {} websites.",
                selection.flagged, selection.groups
            );
            Ok(())
        }
        Commands::Stats => {
            let store = SqliteStore::open(&settings.db_path)?;
            stats::collect(&store).await?.print();
            Ok(())
        }
        Commands::Top { website_id, limit } => {
            let store = SqliteStore::open(&settings.db_path)?;
            let rows = store.fetch_top_pages(website_id, limit).await?;
            if rows.is_empty() {
                println!("No top pages for website {}. Run 'rank' first.", website_id);
                return Ok(());
            }

            println!(
                "{:>3} | {:>8} | {:>5} | {:<14} | {:<32} | {:<40}",
                "#", "Page", "Score", "Category", "Title", "URL"
            );
            println!("{}", "-".repeat(117));
            for (i, r) in rows.iter().enumerate() {
                println!(
                    "{:>3} | {:>8} | {:>5} | {:<14} | {:<32} | {:<40}",
                    i + 1,
                    r.page_id,
                    r.importance_score,
                    r.category,
                    truncate(&r.title, 32),
                    truncate(&r.url, 40)
                );
            }
            Ok(())
        }
        Commands::Score {
            url,
            title,
            priority,
            last_modified,
            domain,
        } => {
            let input = ScoreInput {
                url: &url,
                title: title.as_deref(),
                sitemap_priority: priority,
                last_modified: last_modified.as_deref(),
                domain: &domain,
            };
            let score = score_page(&input, Utc::now());
            println!("{}", serde_json::to_string_pretty(&score)?);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
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
