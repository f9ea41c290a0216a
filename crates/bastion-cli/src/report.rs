//! CSV summary of a batch results file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use bastion_core::models::ArticleRecord;

const EXCERPT_MAX_CHARS: usize = 500;

/// A results-file record, read leniently so hand-edited files still load.
#[derive(Debug, Deserialize)]
pub struct ResultRecord {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub attempts_made: Option<u32>,
    #[serde(default)]
    pub data: Option<ArticleRecord>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One CSV row.
#[derive(Debug, Serialize, PartialEq)]
pub struct ReportRow {
    pub id: String,
    pub url: String,
    pub success: bool,
    pub attempts: Option<u32>,
    pub title: String,
    pub author: String,
    pub date_published: String,
    pub word_count: Option<u64>,
    pub error: String,
    pub excerpt: String,
}

impl From<ResultRecord> for ReportRow {
    fn from(record: ResultRecord) -> Self {
        let data = record.data.unwrap_or_default();
        Self {
            id: id_text(record.id.as_ref()),
            url: record.url,
            success: record.success,
            attempts: record.attempts_made,
            title: data.title.unwrap_or_default(),
            author: data.author.unwrap_or_default(),
            date_published: data.date_published.unwrap_or_default(),
            word_count: data.word_count,
            error: record.error.unwrap_or_default(),
            excerpt: truncate_chars(&data.excerpt.unwrap_or_default(), EXCERPT_MAX_CHARS),
        }
    }
}

fn id_text(id: Option<&Value>) -> String {
    match id {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

/// Write one row per record to `output`. Returns the number of rows.
pub fn write_report(records: Vec<ResultRecord>, output: &Path) -> Result<usize> {
    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let mut rows = 0;
    for record in records {
        writer.serialize(ReportRow::from(record))?;
        rows += 1;
    }
    writer.flush()?;

    Ok(rows)
}
