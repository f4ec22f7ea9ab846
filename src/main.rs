use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn};

use mangabind::config::Config;
use mangabind::models::{ChapterSelection, RangeReport};
use mangabind::pipeline::ChapterPipeline;
use mangabind::progress::TerminalProgress;
use mangabind::prompt;
use mangabind::utils::HttpClient;

#[derive(Parser)]
#[command(name = "mangabind")]
#[command(about = "Download manga chapters and bind them into PDFs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, default_value = "mangabind.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a single chapter
    Download {
        /// Title key from the configuration (see `titles`)
        title: String,
        /// Chapter number
        chapter: u32,
    },
    /// Download every chapter in an inclusive range
    Range {
        /// Title key from the configuration
        title: String,
        /// First chapter
        start: u32,
        /// Last chapter
        end: u32,
    },
    /// List configured titles
    Titles,
    /// Write the default configuration file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    let (config, title_key, selection) = match cli.command {
        Some(Commands::Init) => {
            Config::default().save(&cli.config)?;
            info!("Wrote default configuration to {}", cli.config);
            return Ok(());
        }
        Some(Commands::Titles) => {
            show_titles(&Config::load_or_default(&cli.config)?);
            return Ok(());
        }
        Some(Commands::Download { title, chapter }) => (
            Config::load_or_default(&cli.config)?,
            title,
            ChapterSelection::single(chapter)?,
        ),
        Some(Commands::Range { title, start, end }) => (
            Config::load_or_default(&cli.config)?,
            title,
            ChapterSelection::range(start, end)?,
        ),
        None => {
            let config = Config::load_or_default(&cli.config)?;
            let selection = prompt::ask(&config)?;
            (config, selection.title_key, selection.chapters)
        }
    };

    let title = config.require_title(&title_key)?;
    let fetcher = Arc::new(HttpClient::new(&config.http)?);
    let pipeline = ChapterPipeline::new(&config, fetcher, Arc::new(TerminalProgress::new()))?;

    println!("[{}]", title.name);
    let report = pipeline.run_selection(title, selection).await?;
    summarize(&report);

    if let (ChapterSelection::Single(chapter), Some((_, e))) = (selection, report.failed.first()) {
        anyhow::bail!("chapter {} failed: {}", chapter, e);
    }

    Ok(())
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(format!("mangabind={}", level))
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .init();

    Ok(())
}

fn show_titles(config: &Config) {
    println!("{:<12} {:<20} {:<50}", "Key", "Title", "Chapter URL");
    println!("{}", "-".repeat(82));

    for title in &config.titles {
        println!(
            "{:<12} {:<20} {:<50}",
            title.key, title.name, title.chapter_url_template
        );
    }
}

fn summarize(report: &RangeReport) {
    for (chapter, e) in &report.failed {
        warn!("Chapter {} failed: {}", chapter, e);
    }
    info!(
        "{} of {} chapter(s) bound",
        report.completed.len(),
        report.attempted()
    );
}
