use crate::config::{StorageConfig, TitleConfig};
use crate::error::Result;
use crate::models::ChapterJob;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Output file extension of a bound chapter.
pub const DOCUMENT_EXTENSION: &str = "pdf";

/// Resolves where a chapter's images and document live:
/// `<base>/<title dir>/<chapter dir>/` while downloading and
/// `<base>/<title dir>/<chapter dir>.pdf` once bound.
pub struct StorageManager {
    config: StorageConfig,
}

impl StorageManager {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn title_path(&self, title: &TitleConfig) -> PathBuf {
        Path::new(&self.config.base_path).join(sanitize_filename(&title.title_dir_name()))
    }

    pub fn chapter_path(&self, title: &TitleConfig, job: &ChapterJob) -> PathBuf {
        self.title_path(title).join(sanitize_filename(job.dir_name()))
    }

    pub fn document_path(&self, title: &TitleConfig, job: &ChapterJob) -> PathBuf {
        self.title_path(title).join(format!(
            "{}.{}",
            sanitize_filename(job.dir_name()),
            DOCUMENT_EXTENSION
        ))
    }

    /// Create the chapter work directory. Files left by an earlier run are kept.
    pub async fn prepare_chapter(&self, title: &TitleConfig, job: &ChapterJob) -> Result<PathBuf> {
        let path = self.chapter_path(title, job);
        tokio::fs::create_dir_all(&path).await?;
        Ok(path)
    }

    pub async fn remove_chapter(&self, title: &TitleConfig, job: &ChapterJob) -> Result<()> {
        let chapter_path = self.chapter_path(title, job);

        if chapter_path.exists() {
            tokio::fs::remove_dir_all(&chapter_path).await?;
            debug!("Removed chapter directory: {:?}", chapter_path);
        }

        Ok(())
    }
}

pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim_matches(|c: char| c == '.' || c == ' ')
        .to_string()
}
