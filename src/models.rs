use crate::error::{MangaBindError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Identity of one chapter download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterJob {
    chapter: u32,
    url: String,
    dir_name: String,
}

impl ChapterJob {
    pub fn new(chapter: u32, url: impl Into<String>, dir_name: impl Into<String>) -> Result<Self> {
        if chapter == 0 {
            return Err(MangaBindError::invalid_input("chapter must be positive"));
        }
        let dir_name = dir_name.into();
        if dir_name.trim().is_empty() {
            return Err(MangaBindError::invalid_input(
                "chapter directory name is empty",
            ));
        }
        Ok(Self {
            chapter,
            url: url.into(),
            dir_name,
        })
    }

    pub fn chapter(&self) -> u32 {
        self.chapter
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn dir_name(&self) -> &str {
        &self.dir_name
    }
}

/// One image URL from a chapter page. `index` is 1-based reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLink {
    pub index: usize,
    pub url: String,
}

/// Fetch `url` and store it as `<directory>/<index>.jpg`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub directory: PathBuf,
    pub index: usize,
    pub url: String,
}

impl DownloadTask {
    pub fn new(directory: impl Into<PathBuf>, link: &ImageLink) -> Self {
        Self {
            directory: directory.into(),
            index: link.index,
            url: link.url.clone(),
        }
    }

    pub fn file_name(&self) -> String {
        image_file_name(self.index)
    }

    pub fn destination(&self) -> PathBuf {
        self.directory.join(self.file_name())
    }
}

pub fn image_file_name(index: usize) -> String {
    format!("{}.jpg", index)
}

pub fn image_path(directory: &Path, index: usize) -> PathBuf {
    directory.join(image_file_name(index))
}

/// A task that was acknowledged without producing its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub index: usize,
    pub url: String,
    pub error: String,
}

/// Outcome of a fetch pool run once every task has been acknowledged.
#[derive(Debug, Clone, Default)]
pub struct PoolReport {
    pub total: usize,
    pub completed: usize,
    pub failures: Vec<TaskFailure>,
}

impl PoolReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.completed == self.total
    }
}

/// One output page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositePage {
    /// A landscape image stretched over the whole page.
    Full { index: usize },
    /// Two half-page slots; `first` is the earlier image in reading order.
    Spread { first: usize, second: Option<usize> },
}

impl CompositePage {
    pub fn indices(&self) -> Vec<usize> {
        match *self {
            CompositePage::Full { index } => vec![index],
            CompositePage::Spread { first, second } => {
                std::iter::once(first).chain(second).collect()
            }
        }
    }
}

/// The pages written for one chapter, in output order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    pub pages: Vec<CompositePage>,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// What the user asked to download for a title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterSelection {
    Single(u32),
    Range { start: u32, end: u32 },
}

impl ChapterSelection {
    pub fn range(start: u32, end: u32) -> Result<Self> {
        if start == 0 || end == 0 {
            return Err(MangaBindError::invalid_input(
                "range bounds must be positive",
            ));
        }
        if end < start {
            return Err(MangaBindError::invalid_input(format!(
                "range end {} is before start {}",
                end, start
            )));
        }
        Ok(Self::Range { start, end })
    }

    pub fn single(chapter: u32) -> Result<Self> {
        if chapter == 0 {
            return Err(MangaBindError::invalid_input("chapter must be positive"));
        }
        Ok(Self::Single(chapter))
    }

    pub fn chapters(&self) -> std::ops::RangeInclusive<u32> {
        match *self {
            ChapterSelection::Single(n) => n..=n,
            ChapterSelection::Range { start, end } => start..=end,
        }
    }
}

/// A chapter that was bound into a document.
#[derive(Debug, Clone)]
pub struct ChapterOutcome {
    pub chapter: u32,
    pub document: Document,
    pub elapsed: Duration,
}

/// Per-chapter results of a range run.
#[derive(Debug, Default)]
pub struct RangeReport {
    pub completed: Vec<ChapterOutcome>,
    pub failed: Vec<(u32, MangaBindError)>,
    pub elapsed: Duration,
}

impl RangeReport {
    pub fn attempted(&self) -> usize {
        self.completed.len() + self.failed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_zero_is_invalid() {
        assert!(matches!(
            ChapterJob::new(0, "http://x/0", "ch-0"),
            Err(MangaBindError::InvalidInput(_))
        ));
    }

    #[test]
    fn range_end_before_start_is_invalid() {
        assert!(ChapterSelection::range(5, 4).is_err());
        assert!(ChapterSelection::range(0, 4).is_err());
        assert_eq!(
            ChapterSelection::range(4, 4).unwrap().chapters().collect::<Vec<_>>(),
            vec![4]
        );
    }

    #[test]
    fn task_destination_uses_index_file_name() {
        let link = ImageLink {
            index: 3,
            url: "http://img/3".to_string(),
        };
        let task = DownloadTask::new("/tmp/ch", &link);
        assert_eq!(task.destination(), PathBuf::from("/tmp/ch/3.jpg"));
    }

    #[test]
    fn spread_indices_skip_blank_half() {
        let page = CompositePage::Spread {
            first: 5,
            second: None,
        };
        assert_eq!(page.indices(), vec![5]);
    }
}
