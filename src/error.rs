use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MangaBindError {
    #[error("HTTP request error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing image {index} at {path:?}: {reason}")]
    MissingResource {
        index: usize,
        path: PathBuf,
        reason: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Chapter {0} has no images")]
    EmptyChapter(u32),

    #[error("Chapter {chapter}: {failed} of {total} images failed to download")]
    DownloadFailed {
        chapter: u32,
        failed: usize,
        total: usize,
    },

    #[error("Title not found: {0}")]
    TitleNotFound(String),

    #[error("Download worker crashed: {0}")]
    Worker(String),
}

impl MangaBindError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn title_not_found(key: impl Into<String>) -> Self {
        Self::TitleNotFound(key.into())
    }

    pub fn missing_resource(index: usize, path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::MissingResource {
            index,
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MangaBindError>;
