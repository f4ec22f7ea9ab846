use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    ChapterStarted { chapter: u32, url: String },
    LinksExtracted { chapter: u32, count: usize },
    /// Emitted once per acknowledged successful task. May arrive from several
    /// workers concurrently; `completed` is monotonic.
    ImageFetched { completed: usize, total: usize },
    ImageFailed { index: usize, url: String, error: String },
    Composing { chapter: u32, images: usize },
    ChapterFinished { chapter: u32, document: PathBuf, pages: usize, elapsed: Duration },
    ChapterFailed { chapter: u32, error: String },
    RangeAdvanced { done: usize, total: usize },
    RunFinished { elapsed: Duration },
}

/// Receives pipeline events. Must be `Send + Sync`: fetch workers report
/// from their own tasks.
pub trait ProgressReporter: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

pub type SharedReporter = Arc<dyn ProgressReporter>;

pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn on_event(&self, _event: &ProgressEvent) {}
}

/// Renders events as indicatif bars and status lines.
#[derive(Default)]
pub struct TerminalProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn start_bar(&self, len: u64, message: &'static str) {
        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(message);
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(old) = slot.replace(pb) {
                old.finish_and_clear();
            }
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(slot) = self.bar.lock() {
            if let Some(pb) = slot.as_ref() {
                f(pb);
            }
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(pb) = slot.take() {
                pb.finish_and_clear();
            }
        }
    }

    fn line(&self, text: String) {
        let mut printed = false;
        self.with_bar(|pb| {
            pb.println(&text);
            printed = true;
        });
        if !printed {
            println!("{}", text);
        }
    }
}

impl ProgressReporter for TerminalProgress {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::ChapterStarted { chapter, url } => {
                self.line(format!("Chapter {} [{}]", chapter, url));
            }
            ProgressEvent::LinksExtracted { count, .. } => {
                self.start_bar(*count as u64, "Downloading");
            }
            ProgressEvent::ImageFetched { completed, .. } => {
                self.with_bar(|pb| pb.set_position(*completed as u64));
            }
            ProgressEvent::ImageFailed { index, error, .. } => {
                self.line(format!("  image {} failed: {}", index, error));
            }
            ProgressEvent::Composing { .. } => {
                self.with_bar(|pb| pb.set_message("Creating PDF"));
            }
            ProgressEvent::ChapterFinished {
                document,
                pages,
                elapsed,
                ..
            } => {
                self.finish_bar();
                println!(
                    "  -> {} ({} pages, {:.1}s)",
                    document.display(),
                    pages,
                    elapsed.as_secs_f64()
                );
            }
            ProgressEvent::ChapterFailed { chapter, error } => {
                self.finish_bar();
                println!("Error completing chapter {}", chapter);
                println!("  {}", error);
            }
            ProgressEvent::RangeAdvanced { done, total } => {
                println!("[{}/{}]", done, total);
            }
            ProgressEvent::RunFinished { elapsed } => {
                println!("[Total exec time: {:.2}s]", elapsed.as_secs_f64());
            }
        }
    }
}
