//! CSV word lists.
//!
//! Rows are `learning,native[,sentence,translation]`. A leading header row
//! is skipped.

use std::path::Path;

use tracing::warn;

use super::Result;
use crate::models::Example;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvWord {
    pub learning_word: String,
    pub native_word: String,
    pub example: Option<Example>,
}

const HEADER_NAMES: [&str; 4] = ["learning", "word", "learning_word", "term"];

pub fn read_word_csv(path: &Path) -> Result<Vec<CsvWord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    parse_records(reader.records())
}

fn parse_records<I>(records: I) -> Result<Vec<CsvWord>>
where
    I: Iterator<Item = std::result::Result<csv::StringRecord, csv::Error>>,
{
    let mut words = Vec::new();

    for (i, record) in records.enumerate() {
        let record = record?;
        let field = |n: usize| record.get(n).unwrap_or("").to_string();

        if i == 0 && HEADER_NAMES.contains(&field(0).to_lowercase().as_str()) {
            continue;
        }

        let learning_word = field(0);
        let native_word = field(1);
        if learning_word.is_empty() || native_word.is_empty() {
            warn!(row = i + 1, "Skipping CSV row without a word and translation");
            continue;
        }

        let sentence = field(2);
        let example = (!sentence.is_empty()).then(|| Example {
            sentence,
            translation: field(3),
        });

        words.push(CsvWord {
            learning_word,
            native_word,
            example,
        });
    }

    Ok(words)
}

/// Convert a filename (snake_case or kebab-case) to Title Case.
pub fn filename_to_title_case(name: &str) -> String {
    name.split(|c| c == '_' || c == '-')
        .filter(|s| !s.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => {
                    first.to_uppercase().collect::<String>() + chars.as_str().to_lowercase().as_str()
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
