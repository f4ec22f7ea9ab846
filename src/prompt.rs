use crate::config::{Config, TitleConfig};
use crate::models::ChapterSelection;
use anyhow::{Context, Result};
use inquire::validator::Validation;
use inquire::{CustomType, Select};
use std::fmt;

/// What the user picked from the menu.
#[derive(Debug, Clone)]
pub struct Selection {
    pub title_key: String,
    pub chapters: ChapterSelection,
}

struct TitleChoice<'a>(&'a TitleConfig);

impl fmt::Display for TitleChoice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.name)
    }
}

const SINGLE: &str = "Single Chapter";
const RANGE: &str = "Range";

pub fn ask(config: &Config) -> Result<Selection> {
    let choices: Vec<TitleChoice> = config.titles.iter().map(TitleChoice).collect();
    let title = Select::new("Select Manga:", choices)
        .prompt()
        .context("Failed to select manga")?
        .0;

    let mode = Select::new("Download:", vec![SINGLE, RANGE])
        .prompt()
        .context("Failed to select download mode")?;

    let chapters = if mode == SINGLE {
        ChapterSelection::Single(ask_positive("Select Chapter:")?)
    } else {
        let start = ask_positive("Start Range:")?;
        let end = CustomType::<u32>::new("End Range:")
            .with_error_message("Please type a whole number")
            .with_validator(move |value: &u32| {
                if *value >= start {
                    Ok(Validation::Valid)
                } else {
                    Ok(Validation::Invalid(
                        format!("End Range must be at least {}", start).into(),
                    ))
                }
            })
            .prompt()
            .context("Failed to read end of range")?;
        ChapterSelection::Range { start, end }
    };

    Ok(Selection {
        title_key: title.key.clone(),
        chapters,
    })
}

fn ask_positive(message: &str) -> Result<u32> {
    CustomType::<u32>::new(message)
        .with_error_message("Please type a whole number")
        .with_validator(|value: &u32| {
            if *value > 0 {
                Ok(Validation::Valid)
            } else {
                Ok(Validation::Invalid("Chapter must be positive".into()))
            }
        })
        .prompt()
        .with_context(|| format!("Failed to read '{}'", message))
}
