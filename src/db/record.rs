//! Catalog row types and the tag list helpers.

use chrono::NaiveDateTime;
use thiserror::Error;

/// A row of the `photos` table.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRecord {
    pub id: i64,
    pub content_digest: String,
    pub file_path: String,
    pub folder_path: String,
    pub file_name: String,
    pub format_version: i64,
    pub last_updated: NaiveDateTime,
    pub reference_date: NaiveDateTime,
    pub operation_log: String,

    pub width: u32,
    pub height: u32,
    pub file_size: u64,
    pub file_date: NaiveDateTime,

    pub thumbnail_file_size: u64,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,

    pub capture_date: Option<NaiveDateTime>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub location_description: Option<String>,

    pub tags: Option<String>,
    pub description: Option<String>,
    pub people: Option<String>,
    pub similarity: Option<String>,
}

/// Everything the indexer knows about a file before it has an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub content_digest: String,
    pub file_path: String,
    pub folder_path: String,
    pub file_name: String,
    pub format_version: i64,
    pub last_updated: NaiveDateTime,
    pub reference_date: NaiveDateTime,
    pub operation_log: String,

    pub width: u32,
    pub height: u32,
    pub file_size: u64,
    pub file_date: NaiveDateTime,

    pub thumbnail_file_size: u64,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,

    pub capture_date: Option<NaiveDateTime>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub location_description: Option<String>,
}

impl NewRecord {
    /// Append one timestamped line to the operation log. Lines are joined
    /// with `\n` and the log has no leading newline, but logs written by other
    /// tools may start with one, so readers should split on lines and drop
    /// empty ones.
    pub fn log_operation(&mut self, at: NaiveDateTime, message: &str) {
        if !self.operation_log.is_empty() {
            self.operation_log.push('\n');
        }
        self.operation_log
            .push_str(&format!("{}: {}", at.format("%Y-%m-%dT%H:%M:%S"), message));
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagError {
    #[error("empty tags are not allowed")]
    Empty,
    #[error("tag {0:?} may not contain a comma")]
    ContainsComma(String),
}

fn normalize_tag(tag: &str) -> Result<&str, TagError> {
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(TagError::Empty);
    }
    if tag.contains(',') {
        return Err(TagError::ContainsComma(tag.to_string()));
    }
    Ok(tag)
}

/// Split a stored tag column into its entries.
pub fn parse_tags(stored: Option<&str>) -> Vec<String> {
    stored
        .unwrap_or_default()
        .split(',')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Inverse of [`parse_tags`]: every entry is followed by a comma.
pub fn format_tags<S: AsRef<str>>(tags: &[S]) -> String {
    tags.iter().map(|t| format!("{},", t.as_ref())).collect()
}

impl CatalogRecord {
    pub fn tag_list(&self) -> Vec<String> {
        parse_tags(self.tags.as_deref())
    }

    /// Add a tag. Adding a tag that is already present is a no-op.
    pub fn add_tag(&mut self, tag: &str) -> Result<(), TagError> {
        let tag = normalize_tag(tag)?;
        let mut tags = self.tag_list();
        if tags.iter().any(|t| t == tag) {
            return Ok(());
        }
        tags.push(tag.to_string());
        self.tags = Some(format_tags(&tags));
        Ok(())
    }

    /// Remove a tag. Removing a tag that is not present is a no-op.
    pub fn remove_tag(&mut self, tag: &str) -> Result<(), TagError> {
        let tag = normalize_tag(tag)?;
        let mut tags = self.tag_list();
        let before = tags.len();
        tags.retain(|t| t != tag);
        if tags.len() != before {
            self.tags = Some(format_tags(&tags));
        }
        Ok(())
    }
}
