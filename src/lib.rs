pub mod compositor;
pub mod config;
pub mod error;
pub mod extractor;
pub mod models;
pub mod pipeline;
pub mod pool;
pub mod progress;
pub mod prompt;
pub mod storage;
pub mod traits;
pub mod utils;

pub use config::Config;
pub use error::{MangaBindError, Result};
pub use pipeline::ChapterPipeline;
pub use traits::Fetcher;
