/// Bumped when the `photos` row layout changes.
pub const FORMAT_VERSION: i64 = 1;

pub const SCHEMA: &str = r#"
-- One row per indexed image file
CREATE TABLE IF NOT EXISTS photos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content_digest TEXT NOT NULL,      -- SHA-1 of the original bytes; duplicates allowed
    file_path TEXT NOT NULL UNIQUE,
    folder_path TEXT NOT NULL,
    reference_date TEXT NOT NULL,      -- capture date, else file date
    file_name TEXT NOT NULL,

    format_version INTEGER NOT NULL,
    last_updated TEXT NOT NULL,
    operation_log TEXT NOT NULL DEFAULT '',

    width INTEGER NOT NULL,
    height INTEGER NOT NULL,
    file_size INTEGER NOT NULL,
    file_date TEXT NOT NULL,

    thumbnail_file_size INTEGER NOT NULL,
    thumbnail_width INTEGER NOT NULL,
    thumbnail_height INTEGER NOT NULL,

    -- EXIF data
    capture_date TEXT,
    make TEXT,
    model TEXT,
    longitude REAL,
    latitude REAL,
    location_description TEXT,

    -- Annotations, written by consumers of the catalog
    tags TEXT,                         -- comma-terminated list: "a,b,"
    description TEXT,
    people TEXT,
    similarity TEXT
);

CREATE INDEX IF NOT EXISTS idx_photos_digest ON photos(content_digest);
CREATE INDEX IF NOT EXISTS idx_photos_file_path ON photos(file_path);
CREATE INDEX IF NOT EXISTS idx_photos_folder_path ON photos(folder_path);
CREATE INDEX IF NOT EXISTS idx_photos_reference_date ON photos(reference_date);
"#;
