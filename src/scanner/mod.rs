pub mod discovery;
pub mod hashing;
pub mod metadata;
pub mod thumbnails;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::db::{Catalog, NewRecord, FORMAT_VERSION};

pub use discovery::{collect_folders, is_supported, list_files};
pub use hashing::content_digest;
pub use metadata::{extract_metadata, GeoLocation, ImageMetadata};
pub use thumbnails::{Rendition, ThumbnailStore};

/// Counters kept across scan cycles. Diagnostic only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub folders_processed: u64,
    pub files_analyzed: u64,
    pub files_supported_format: u64,
    pub files_ignored: u64,
}

impl ScanStats {
    pub fn merge(&mut self, other: &ScanStats) {
        self.folders_processed += other.folders_processed;
        self.files_analyzed += other.files_analyzed;
        self.files_supported_format += other.files_supported_format;
        self.files_ignored += other.files_ignored;
    }
}

impl fmt::Display for ScanStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "folders processed: {}, files analyzed: {}, supported format: {}, already cataloged: {}",
            self.folders_processed, self.files_analyzed, self.files_supported_format, self.files_ignored
        )
    }
}

/// What happened to a single eligible file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// A new record was written with this id.
    Indexed(i64),
    /// The path already has a record; nothing was touched.
    AlreadyCataloged,
}

/// Turns one image file into a thumbnail plus a catalog record.
pub struct Indexer {
    db_path: PathBuf,
    thumbnails: ThumbnailStore,
    thumbnail_size: u32,
    jpeg_quality: u8,
}

impl Indexer {
    pub fn new(config: &Config) -> Self {
        Self {
            db_path: config.db_path.clone(),
            thumbnails: ThumbnailStore::new(config.thumbnails_path.clone()),
            thumbnail_size: config.thumbnail_size,
            jpeg_quality: config.jpeg_quality,
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn thumbnails(&self) -> &ThumbnailStore {
        &self.thumbnails
    }

    /// Index `path` unless a record for it already exists.
    ///
    /// A path that is already cataloged is never looked at again, even if
    /// its content changed. On error no record is written, although a
    /// thumbnail may already be on disk.
    pub fn process_file(&self, path: &Path) -> Result<FileOutcome> {
        tracing::debug!("Start processing file: {}", path.display());

        let file_path = path.to_string_lossy().to_string();
        let mut db = Catalog::open(&self.db_path)?;

        if db.exists_by_path(&file_path)? {
            tracing::debug!("Skipping {} (already in catalog)", path.display());
            return Ok(FileOutcome::AlreadyCataloged);
        }

        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let file_date = modified_time(path)?;

        let metadata = extract_metadata(&bytes);
        let rendition = thumbnails::generate(
            &bytes,
            metadata.orientation,
            self.thumbnail_size,
            self.jpeg_quality,
        )?;
        let digest = content_digest(&bytes);

        self.thumbnails.write(&digest, &rendition.bytes)?;

        let record = build_record(path, file_path, digest, bytes.len() as u64, file_date, &rendition, metadata);
        let id = db.insert(&record)?;

        tracing::info!("Finished processing file: {}", path.display());
        Ok(FileOutcome::Indexed(id))
    }
}

fn modified_time(path: &Path) -> Result<NaiveDateTime> {
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("Failed to read modification time of {}", path.display()))?;
    Ok(DateTime::<Local>::from(modified).naive_local())
}

fn build_record(
    path: &Path,
    file_path: String,
    digest: String,
    file_size: u64,
    file_date: NaiveDateTime,
    rendition: &Rendition,
    metadata: ImageMetadata,
) -> NewRecord {
    let last_updated = Local::now().naive_local();
    let location_description = metadata.location.map(|l| l.description());

    let mut record = NewRecord {
        content_digest: digest,
        file_path,
        folder_path: path
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default(),
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        format_version: FORMAT_VERSION,
        last_updated,
        reference_date: metadata.capture_date.unwrap_or(file_date),
        operation_log: String::new(),
        width: rendition.source_width,
        height: rendition.source_height,
        file_size,
        file_date,
        thumbnail_file_size: rendition.bytes.len() as u64,
        thumbnail_width: rendition.width,
        thumbnail_height: rendition.height,
        capture_date: metadata.capture_date,
        make: metadata.camera_make,
        model: metadata.camera_model,
        longitude: metadata.location.map(|l| l.longitude),
        latitude: metadata.location.map(|l| l.latitude),
        location_description,
    };
    record.log_operation(last_updated, "Thumbnail created");
    record
}

#[cfg(test)]
mod tests {
    use super::metadata::tests::{ascii, dms, jpeg_with_exif};
    use super::*;
    use chrono::NaiveDate;
    use std::fs::{self, File};
    use std::time::{Duration, SystemTime};
    use tempfile::{tempdir, TempDir};

    fn setup() -> (TempDir, Config) {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("photos")).unwrap();
        let config = Config {
            db_path: dir.path().join("catalog.db"),
            thumbnails_path: dir.path().join("thumbs"),
            folders: vec![dir.path().join("photos")],
            thumbnail_size: 60,
            jpeg_quality: 80,
        };
        (dir, config)
    }

    fn catalog(config: &Config) -> Catalog {
        Catalog::open(&config.db_path).unwrap()
    }

    #[test]
    fn test_stats_merge() {
        let mut total = ScanStats::default();
        let cycle = ScanStats {
            folders_processed: 1,
            files_analyzed: 2,
            files_supported_format: 1,
            files_ignored: 0,
        };
        total.merge(&cycle);
        total.merge(&cycle);
        assert_eq!(total.files_analyzed, 4);
        assert_eq!(total.folders_processed, 2);
    }

    #[test]
    fn test_process_file_with_exif() {
        let (dir, config) = setup();
        let path = dir.path().join("photos/IMG_0001.JPG");
        let bytes = jpeg_with_exif(
            120,
            80,
            &[
                ascii(exif::Tag::Make, "NIKON"),
                ascii(exif::Tag::Model, "D750"),
                ascii(exif::Tag::DateTimeOriginal, "2023:05:01 10:00:00"),
                dms(exif::Tag::GPSLatitude, 52, 13, 480),
                ascii(exif::Tag::GPSLatitudeRef, "N"),
                dms(exif::Tag::GPSLongitude, 21, 0, 360),
                ascii(exif::Tag::GPSLongitudeRef, "E"),
            ],
        );
        fs::write(&path, &bytes).unwrap();

        let indexer = Indexer::new(&config);
        let FileOutcome::Indexed(id) = indexer.process_file(&path).unwrap() else {
            panic!("expected a new record");
        };

        let record = catalog(&config).get(id).unwrap().unwrap();
        let captured = NaiveDate::from_ymd_opt(2023, 5, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();

        assert_eq!(record.file_path, path.to_string_lossy());
        assert_eq!(record.folder_path, dir.path().join("photos").to_string_lossy());
        assert_eq!(record.file_name, "IMG_0001.JPG");
        assert_eq!(record.content_digest, content_digest(&bytes));
        assert_eq!(record.format_version, 1);
        assert_eq!(record.capture_date, Some(captured));
        assert_eq!(record.reference_date, captured);
        assert_eq!(record.make.as_deref(), Some("NIKON"));
        assert_eq!(record.model.as_deref(), Some("D750"));
        assert!(record.latitude.is_some() && record.longitude.is_some());
        assert!(record.location_description.is_some());
        assert_eq!((record.width, record.height), (120, 80));
        assert_eq!((record.thumbnail_width, record.thumbnail_height), (60, 40));
        assert_eq!(record.file_size, bytes.len() as u64);
        assert!(record.operation_log.ends_with(": Thumbnail created"));
        assert_eq!(record.operation_log.lines().count(), 1);

        let thumbnail = indexer.thumbnails().path_for(&record.content_digest);
        assert_eq!(fs::metadata(&thumbnail).unwrap().len(), record.thumbnail_file_size);
    }

    #[test]
    fn test_reference_date_falls_back_to_file_date() {
        let (dir, config) = setup();
        let path = dir.path().join("photos/plain.jpg");
        fs::write(&path, jpeg_with_exif(40, 90, &[])).unwrap();

        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();

        let indexer = Indexer::new(&config);
        indexer.process_file(&path).unwrap();

        let record = catalog(&config)
            .find_by_path(&path.to_string_lossy())
            .unwrap()
            .unwrap();
        let expected = DateTime::<Local>::from(mtime).naive_local();
        assert_eq!(record.capture_date, None);
        assert_eq!(record.file_date, expected);
        assert_eq!(record.reference_date, expected);
        assert_eq!(record.latitude, None);
        assert_eq!(record.longitude, None);
        assert_eq!(record.location_description, None);
        assert_eq!((record.thumbnail_width, record.thumbnail_height), (27, 60));
    }

    #[test]
    fn test_half_gps_sets_neither_coordinate() {
        let (dir, config) = setup();
        let path = dir.path().join("photos/half.jpg");
        fs::write(
            &path,
            jpeg_with_exif(
                16,
                16,
                &[
                    dms(exif::Tag::GPSLongitude, 21, 0, 360),
                    ascii(exif::Tag::GPSLongitudeRef, "E"),
                ],
            ),
        )
        .unwrap();

        Indexer::new(&config).process_file(&path).unwrap();
        let record = catalog(&config)
            .find_by_path(&path.to_string_lossy())
            .unwrap()
            .unwrap();
        assert_eq!(record.latitude, None);
        assert_eq!(record.longitude, None);
        assert_eq!(record.location_description, None);
    }

    #[test]
    fn test_cataloged_path_is_never_reprocessed() {
        let (dir, config) = setup();
        let path = dir.path().join("photos/a.jpg");
        fs::write(&path, jpeg_with_exif(30, 20, &[])).unwrap();

        let indexer = Indexer::new(&config);
        assert!(matches!(indexer.process_file(&path).unwrap(), FileOutcome::Indexed(_)));
        let before = catalog(&config).find_by_path(&path.to_string_lossy()).unwrap();

        // New content under the same path
        fs::write(&path, jpeg_with_exif(50, 20, &[])).unwrap();
        assert_eq!(indexer.process_file(&path).unwrap(), FileOutcome::AlreadyCataloged);

        let db = catalog(&config);
        assert_eq!(db.count().unwrap(), 1);
        assert_eq!(db.find_by_path(&path.to_string_lossy()).unwrap(), before);
    }

    #[test]
    fn test_identical_files_share_a_thumbnail() {
        let (dir, config) = setup();
        let bytes = jpeg_with_exif(30, 20, &[]);
        let first = dir.path().join("photos/a.jpg");
        let second = dir.path().join("photos/copy of a.jpg");
        fs::write(&first, &bytes).unwrap();
        fs::write(&second, &bytes).unwrap();

        let indexer = Indexer::new(&config);
        indexer.process_file(&first).unwrap();
        indexer.process_file(&second).unwrap();

        let records = catalog(&config).all().unwrap();
        assert_eq!(records.len(), 2);
        assert_ne!(records[0].id, records[1].id);
        assert_ne!(records[0].file_path, records[1].file_path);
        assert_eq!(records[0].content_digest, records[1].content_digest);

        let digest = &records[0].content_digest;
        let shard = config.thumbnails_path.join(&digest[..2]);
        assert_eq!(fs::read_dir(shard).unwrap().count(), 1);
    }

    #[test]
    fn test_undecodable_file_leaves_no_record() {
        let (dir, config) = setup();
        let path = dir.path().join("photos/broken.jpg");
        fs::write(&path, b"definitely not a jpeg").unwrap();

        let indexer = Indexer::new(&config);
        assert!(indexer.process_file(&path).is_err());
        assert_eq!(catalog(&config).count().unwrap(), 0);
        assert!(!config.thumbnails_path.exists());
    }
}
