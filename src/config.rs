use crate::error::{MangaBindError, Result};
use crate::models::ChapterJob;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// Placeholder substituted with the chapter number in title templates.
pub const CHAPTER_PLACEHOLDER: &str = "{chapter}";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub http: HttpConfig,
    pub download: DownloadConfig,
    pub layout: LayoutConfig,
    pub titles: Vec<TitleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub base_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: Option<String>,
    pub headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub reading_direction: ReadingDirection,
}

/// Which half of a spread receives the first image of a portrait pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadingDirection {
    #[default]
    LeftToRight,
    RightToLeft,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleConfig {
    pub key: String,
    pub name: String,
    pub chapter_url_template: String,
    pub directory_template: String,
}

impl TitleConfig {
    /// Directory holding every chapter of this title, e.g. `[One Punch Man]`.
    pub fn title_dir_name(&self) -> String {
        format!("[{}]", self.name)
    }

    pub fn chapter_url(&self, chapter: u32) -> String {
        expand_template(&self.chapter_url_template, chapter)
    }

    pub fn chapter_dir_name(&self, chapter: u32) -> String {
        expand_template(&self.directory_template, chapter)
    }

    /// Build the identity of one chapter download.
    pub fn job(&self, chapter: u32) -> Result<ChapterJob> {
        ChapterJob::new(
            chapter,
            self.chapter_url(chapter),
            self.chapter_dir_name(chapter),
        )
    }
}

fn expand_template(template: &str, chapter: u32) -> String {
    if template.contains(CHAPTER_PLACEHOLDER) {
        template.replace(CHAPTER_PLACEHOLDER, &chapter.to_string())
    } else {
        format!("{}{}", template, chapter)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| MangaBindError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to the built-in titles.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            tracing::info!(
                "Config file {:?} not found, using built-in defaults",
                path.as_ref()
            );
            Ok(Self::default())
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| MangaBindError::config(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.download.concurrency == 0 {
            return Err(MangaBindError::invalid_input(
                "download.concurrency must be at least 1",
            ));
        }
        if self.titles.is_empty() {
            return Err(MangaBindError::config("no titles configured"));
        }

        let mut seen = HashSet::new();
        for title in &self.titles {
            if !seen.insert(title.key.as_str()) {
                return Err(MangaBindError::config(format!(
                    "duplicate title key '{}'",
                    title.key
                )));
            }
            if title.chapter_url_template.trim().is_empty()
                || title.directory_template.trim().is_empty()
            {
                return Err(MangaBindError::config(format!(
                    "title '{}' has an empty template",
                    title.key
                )));
            }
        }
        Ok(())
    }

    pub fn get_title(&self, key: &str) -> Option<&TitleConfig> {
        self.titles.iter().find(|t| t.key == key)
    }

    pub fn require_title(&self, key: &str) -> Result<&TitleConfig> {
        self.get_title(key)
            .ok_or_else(|| MangaBindError::title_not_found(key))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage: StorageConfig {
                base_path: ".".to_string(),
            },
            http: HttpConfig {
                timeout_secs: 60,
                connect_timeout_secs: 10,
                user_agent: Some("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()),
                headers: None,
            },
            download: DownloadConfig { concurrency: 10 },
            layout: LayoutConfig {
                reading_direction: ReadingDirection::LeftToRight,
            },
            titles: vec![
                TitleConfig {
                    key: "onepunch".to_string(),
                    name: "One Punch Man".to_string(),
                    chapter_url_template:
                        "http://readonepunchman.net/manga/onepunch-man-chapter-{chapter}".to_string(),
                    directory_template: "onepunch-man-chapter-{chapter}".to_string(),
                },
                TitleConfig {
                    key: "hxh".to_string(),
                    name: "Hunter x Hunter".to_string(),
                    chapter_url_template:
                        "http://readhunterxhunter.net/manga/hunter-x-hunter-chapter-{chapter}".to_string(),
                    directory_template: "hunter-x-hunter-chapter-{chapter}".to_string(),
                },
            ],
        }
    }
}
