use crate::compositor;
use crate::config::{Config, ReadingDirection, TitleConfig};
use crate::error::{MangaBindError, Result};
use crate::extractor::extract_links;
use crate::models::{ChapterJob, ChapterOutcome, ChapterSelection, DownloadTask, RangeReport};
use crate::pool::FetchPool;
use crate::progress::{ProgressEvent, SharedReporter};
use crate::storage::StorageManager;
use crate::traits::Fetcher;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Turns one chapter page into one PDF: extract links, download every image,
/// bind them, then drop the image directory.
pub struct ChapterPipeline {
    fetcher: Arc<dyn Fetcher>,
    pool: FetchPool,
    storage: StorageManager,
    direction: ReadingDirection,
    reporter: SharedReporter,
}

impl ChapterPipeline {
    pub fn new(config: &Config, fetcher: Arc<dyn Fetcher>, reporter: SharedReporter) -> Result<Self> {
        let pool = FetchPool::new(fetcher.clone(), config.download.concurrency, reporter.clone())?;
        Ok(Self {
            fetcher,
            pool,
            storage: StorageManager::new(&config.storage),
            direction: config.layout.reading_direction,
            reporter,
        })
    }

    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    /// Download and bind a single chapter. Any failure is fatal for the
    /// chapter and no document is left behind.
    pub async fn run_chapter(&self, title: &TitleConfig, chapter: u32) -> Result<ChapterOutcome> {
        let started = Instant::now();
        let job = title.job(chapter)?;

        debug!("[{}] Chapter {}: {}", title.name, chapter, job.url());
        self.reporter.on_event(&ProgressEvent::ChapterStarted {
            chapter,
            url: job.url().to_string(),
        });

        match self.process(title, &job, started).await {
            Ok(outcome) => {
                self.reporter.on_event(&ProgressEvent::ChapterFinished {
                    chapter,
                    document: outcome.document.path.clone(),
                    pages: outcome.document.page_count(),
                    elapsed: outcome.elapsed,
                });
                Ok(outcome)
            }
            Err(e) => {
                self.reporter.on_event(&ProgressEvent::ChapterFailed {
                    chapter,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn process(
        &self,
        title: &TitleConfig,
        job: &ChapterJob,
        started: Instant,
    ) -> Result<ChapterOutcome> {
        let chapter = job.chapter();
        let page_url = Url::parse(job.url())?;
        let directory = self.storage.prepare_chapter(title, job).await?;

        debug!("[Get Image Links] {}", job.url());
        let html = self.fetcher.fetch_text(job.url()).await?;
        let links = extract_links(&html, Some(&page_url))?;
        if links.is_empty() {
            return Err(MangaBindError::EmptyChapter(chapter));
        }
        debug!("[Obtained Image Links] {} images", links.len());
        self.reporter.on_event(&ProgressEvent::LinksExtracted {
            chapter,
            count: links.len(),
        });

        let tasks: Vec<DownloadTask> = links
            .iter()
            .map(|link| DownloadTask::new(&directory, link))
            .collect();
        let report = self.pool.run(tasks).await?;
        if !report.is_complete() {
            return Err(MangaBindError::DownloadFailed {
                chapter,
                failed: report.total - report.completed,
                total: report.total,
            });
        }
        debug!("[Finished Downloading]");

        self.reporter.on_event(&ProgressEvent::Composing {
            chapter,
            images: links.len(),
        });
        let output = self.storage.document_path(title, job);
        let direction = self.direction;
        let count = links.len();
        let compose_dir = directory.clone();
        let document = tokio::task::spawn_blocking(move || {
            compositor::compose(&compose_dir, count, direction, &output)
        })
        .await
        .map_err(|e| MangaBindError::Worker(e.to_string()))??;
        debug!("[Finished Creating PDF] {:?}", document.path);

        self.storage.remove_chapter(title, job).await?;

        Ok(ChapterOutcome {
            chapter,
            document,
            elapsed: started.elapsed(),
        })
    }

    /// Run every chapter in `start..=end`. A failed chapter is recorded and
    /// the next one is attempted.
    pub async fn run_range(&self, title: &TitleConfig, start: u32, end: u32) -> Result<RangeReport> {
        let selection = ChapterSelection::range(start, end)?;
        Ok(self.run_chapters(title, selection, true).await)
    }

    pub async fn run_selection(
        &self,
        title: &TitleConfig,
        selection: ChapterSelection,
    ) -> Result<RangeReport> {
        match selection {
            ChapterSelection::Single(chapter) => {
                ChapterSelection::single(chapter)?;
                Ok(self.run_chapters(title, selection, false).await)
            }
            ChapterSelection::Range { start, end } => self.run_range(title, start, end).await,
        }
    }

    async fn run_chapters(
        &self,
        title: &TitleConfig,
        selection: ChapterSelection,
        show_counter: bool,
    ) -> RangeReport {
        let started = Instant::now();
        let chapters = selection.chapters();
        let total = chapters.clone().count();
        let mut report = RangeReport::default();

        for (done, chapter) in chapters.enumerate() {
            if show_counter {
                self.reporter
                    .on_event(&ProgressEvent::RangeAdvanced { done, total });
            }
            match self.run_chapter(title, chapter).await {
                Ok(outcome) => report.completed.push(outcome),
                Err(e) => {
                    warn!("Error completing chapter {}: {}", chapter, e);
                    report.failed.push((chapter, e));
                }
            }
        }

        report.elapsed = started.elapsed();
        info!(
            "Finished {} chapter(s): {} bound, {} failed in {:.2}s",
            total,
            report.completed.len(),
            report.failed.len(),
            report.elapsed.as_secs_f64()
        );
        self.reporter.on_event(&ProgressEvent::RunFinished {
            elapsed: report.elapsed,
        });
        report
    }
}
