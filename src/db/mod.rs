mod record;
mod schema;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use record::{format_tags, parse_tags, CatalogRecord, NewRecord, TagError};
pub use schema::{FORMAT_VERSION, SCHEMA};

/// How long a connection waits on a locked database before failing.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

const SELECT_COLUMNS: &str = r#"
    id, content_digest, file_path, folder_path, file_name,
    format_version, last_updated, reference_date, operation_log,
    width, height, file_size, file_date,
    thumbnail_file_size, thumbnail_width, thumbnail_height,
    capture_date, make, model, longitude, latitude, location_description,
    tags, description, people, similarity
"#;

/// Thumbnail location relative to the thumbnail root, derived from a digest:
/// `<first two chars, lowercased>/<digest>.jpg`.
pub fn thumbnail_relative_path(digest: &str) -> PathBuf {
    let shard: String = digest.chars().take(2).collect::<String>().to_lowercase();
    PathBuf::from(shard).join(format!("{}.jpg", digest))
}

/// A connection to the photo catalog.
///
/// The indexer opens one of these per file and drops it when the file is
/// done, so nothing is shared between files.
pub struct Catalog {
    conn: Connection,
}

impl Catalog {
    /// Open (creating if needed) the catalog at `path`. Safe to call
    /// repeatedly; the schema is only created when absent.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create database directory {:?}", parent))?;
            }
        }
        let conn = Connection::open(path).context("Failed to open database")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let catalog = Self { conn };
        catalog.initialize()?;
        Ok(catalog)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let catalog = Self {
            conn: Connection::open_in_memory()?,
        };
        catalog.initialize()?;
        Ok(catalog)
    }

    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA).context("Failed to create schema")?;
        Ok(())
    }

    pub fn exists_by_path(&self, file_path: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM photos WHERE file_path = ?", [file_path], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    pub fn find_by_path(&self, file_path: &str) -> Result<Option<CatalogRecord>> {
        let sql = format!("SELECT {} FROM photos WHERE file_path = ?", SELECT_COLUMNS);
        let record = self
            .conn
            .query_row(&sql, [file_path], row_to_record)
            .optional()?;
        Ok(record)
    }

    pub fn get(&self, id: i64) -> Result<Option<CatalogRecord>> {
        let sql = format!("SELECT {} FROM photos WHERE id = ?", SELECT_COLUMNS);
        let record = self.conn.query_row(&sql, [id], row_to_record).optional()?;
        Ok(record)
    }

    /// All records, oldest reference date first.
    pub fn all(&self) -> Result<Vec<CatalogRecord>> {
        let sql = format!(
            "SELECT {} FROM photos ORDER BY reference_date ASC, id ASC",
            SELECT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map([], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Insert a record in its own transaction and return the new id.
    /// Fails if a record with the same file path already exists.
    pub fn insert(&mut self, record: &NewRecord) -> Result<i64> {
        let tx = self.conn.transaction().context("begin transaction")?;
        tx.execute(
            r#"
            INSERT INTO photos (
                content_digest, file_path, folder_path, file_name,
                format_version, last_updated, reference_date, operation_log,
                width, height, file_size, file_date,
                thumbnail_file_size, thumbnail_width, thumbnail_height,
                capture_date, make, model, longitude, latitude, location_description
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            rusqlite::params![
                record.content_digest,
                record.file_path,
                record.folder_path,
                record.file_name,
                record.format_version,
                record.last_updated,
                record.reference_date,
                record.operation_log,
                record.width,
                record.height,
                record.file_size as i64,
                record.file_date,
                record.thumbnail_file_size as i64,
                record.thumbnail_width,
                record.thumbnail_height,
                record.capture_date,
                record.make,
                record.model,
                record.longitude,
                record.latitude,
                record.location_description,
            ],
        )
        .with_context(|| format!("Failed to insert record for {}", record.file_path))?;
        let id = tx.last_insert_rowid();
        tx.commit().context("commit transaction")?;
        Ok(id)
    }

    /// Replace the tag list of a record. Returns false if no record has `id`.
    pub fn set_tags<S: AsRef<str>>(&self, id: i64, tags: &[S]) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE photos SET tags = ? WHERE id = ?",
            rusqlite::params![format_tags(tags), id],
        )?;
        Ok(changed > 0)
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<CatalogRecord> {
    Ok(CatalogRecord {
        id: row.get(0)?,
        content_digest: row.get(1)?,
        file_path: row.get(2)?,
        folder_path: row.get(3)?,
        file_name: row.get(4)?,
        format_version: row.get(5)?,
        last_updated: row.get(6)?,
        reference_date: row.get(7)?,
        operation_log: row.get(8)?,
        width: row.get(9)?,
        height: row.get(10)?,
        file_size: row.get::<_, i64>(11)? as u64,
        file_date: row.get(12)?,
        thumbnail_file_size: row.get::<_, i64>(13)? as u64,
        thumbnail_width: row.get(14)?,
        thumbnail_height: row.get(15)?,
        capture_date: row.get(16)?,
        make: row.get(17)?,
        model: row.get(18)?,
        longitude: row.get(19)?,
        latitude: row.get(20)?,
        location_description: row.get(21)?,
        tags: row.get(22)?,
        description: row.get(23)?,
        people: row.get(24)?,
        similarity: row.get(25)?,
    })
}
