//! Background photo indexer.
//!
//! Repeatedly walks a set of folders, and for every JPEG not yet in the
//! catalog stores a thumbnail (addressed by the SHA-1 of the file) and one
//! SQLite row with its dimensions and EXIF capture data.

pub mod config;
pub mod db;
pub mod logging;
pub mod scanner;
pub mod service;

pub use config::Config;
pub use db::{Catalog, CatalogRecord};
pub use scanner::{FileOutcome, Indexer, ScanStats};
pub use service::{shutdown_channel, ScanLoop, Shutdown, ShutdownTrigger};
