//! The long-running scan loop.
//!
//! Each cycle rebuilds the folder list, walks every folder and file in order
//! and hands eligible files to the [`Indexer`]. Between cycles the loop idles
//! for [`RESCAN_INTERVAL`]. Shutdown is cooperative: it is checked before each
//! folder, before each file and during the idle wait, and a file that has
//! already started is always allowed to finish.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::scanner::{self, FileOutcome, Indexer, ScanStats};

/// Time between the end of one scan cycle and the start of the next.
pub const RESCAN_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Fires a [`Shutdown`].
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Cooperative cancellation observed by the scan loop.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is triggered. If the trigger is dropped without
    /// firing, this never resolves.
    pub async fn requested(&mut self) {
        if self.rx.wait_for(|requested| *requested).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

pub struct ScanLoop {
    indexer: Arc<Indexer>,
    roots: Arc<Vec<PathBuf>>,
    interval: Duration,
    totals: ScanStats,
}

impl ScanLoop {
    pub fn new(config: &Config) -> Self {
        let roots = config
            .folders
            .iter()
            .map(|root| std::path::absolute(root).unwrap_or_else(|_| root.clone()))
            .collect();

        Self {
            indexer: Arc::new(Indexer::new(config)),
            roots: Arc::new(roots),
            interval: RESCAN_INTERVAL,
            totals: ScanStats::default(),
        }
    }

    /// Statistics accumulated over every cycle run so far.
    pub fn totals(&self) -> ScanStats {
        self.totals
    }

    /// Scan, idle, repeat until `shutdown` fires. Returns the accumulated
    /// statistics. With no root folders configured this logs a warning and
    /// returns immediately.
    pub async fn run(&mut self, mut shutdown: Shutdown) -> Result<ScanStats> {
        if !self.check_roots() {
            return Ok(self.totals);
        }

        while !shutdown.is_requested() {
            self.cycle(&shutdown).await?;
            if shutdown.is_requested() {
                break;
            }

            info!(
                "All folders processed. Sleeping for {} minutes before checking again",
                self.interval.as_secs() / 60
            );
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.requested() => break,
            }
        }

        info!("Scan loop stopped ({})", self.totals);
        Ok(self.totals)
    }

    /// Run a single scan cycle without idling afterwards.
    pub async fn run_once(&mut self, shutdown: Shutdown) -> Result<ScanStats> {
        if self.check_roots() && !shutdown.is_requested() {
            self.cycle(&shutdown).await?;
        }
        Ok(self.totals)
    }

    fn check_roots(&self) -> bool {
        if self.roots.is_empty() {
            warn!("Configuration error: no folders to analyze");
            return false;
        }
        true
    }

    async fn cycle(&mut self, shutdown: &Shutdown) -> Result<ScanStats> {
        let indexer = Arc::clone(&self.indexer);
        let roots = Arc::clone(&self.roots);
        let shutdown = shutdown.clone();

        let stats = tokio::task::spawn_blocking(move || scan_cycle(&indexer, &roots, &shutdown))
            .await
            .context("Scan cycle aborted")?;

        self.totals.merge(&stats);
        info!("Cycle finished ({}); totals: {}", stats, self.totals);
        Ok(stats)
    }
}

/// One pass over every folder under `roots`. Blocking.
pub fn scan_cycle(indexer: &Indexer, roots: &[PathBuf], shutdown: &Shutdown) -> ScanStats {
    let folders = scanner::collect_folders(roots);
    let listing: Vec<String> = folders.iter().map(|f| f.display().to_string()).collect();
    info!("Starting processing folders:\n{}", listing.join("\n"));

    let mut stats = ScanStats::default();
    for folder in &folders {
        if shutdown.is_requested() {
            break;
        }
        scan_folder(folder, shutdown, &mut stats, |file| indexer.process_file(file));
        stats.folders_processed += 1;
        info!("Stats: {}", stats);
    }
    stats
}

/// Hand every eligible file in `folder` to `process`, one at a time.
fn scan_folder<F>(folder: &Path, shutdown: &Shutdown, stats: &mut ScanStats, mut process: F)
where
    F: FnMut(&Path) -> Result<FileOutcome>,
{
    // Empty when the folder vanished between the walk and the scan
    let files = scanner::list_files(folder);
    debug!("{} entries in {}", files.len(), folder.display());

    for file in files {
        if shutdown.is_requested() {
            break;
        }
        if scanner::is_supported(&file) {
            match process(&file) {
                Ok(FileOutcome::Indexed(_)) => {}
                Ok(FileOutcome::AlreadyCataloged) => stats.files_ignored += 1,
                Err(e) => error!("Exception when processing file {}: {:#}", file.display(), e),
            }
            stats.files_supported_format += 1;
        }
        stats.files_analyzed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Catalog;
    use crate::scanner::metadata::tests::jpeg_with_exif;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn setup() -> (TempDir, Config) {
        let dir = tempdir().unwrap();
        let photos = dir.path().join("photos");
        fs::create_dir(&photos).unwrap();
        let config = Config {
            db_path: dir.path().join("catalog.db"),
            thumbnails_path: dir.path().join("thumbs"),
            folders: vec![photos],
            thumbnail_size: 32,
            jpeg_quality: 75,
        };
        (dir, config)
    }

    fn record_count(config: &Config) -> i64 {
        Catalog::open(&config.db_path).unwrap().count().unwrap()
    }

    #[test]
    fn test_shutdown_flag() {
        let (trigger, shutdown) = shutdown_channel();
        let copy = shutdown.clone();
        assert!(!shutdown.is_requested());
        trigger.trigger();
        assert!(shutdown.is_requested());
        assert!(copy.is_requested());
    }

    #[tokio::test]
    async fn test_two_cycles_end_to_end() {
        let (dir, config) = setup();
        let photo = dir.path().join("photos/holiday.jpg");
        fs::write(&photo, jpeg_with_exif(64, 48, &[])).unwrap();
        fs::write(dir.path().join("photos/notes.txt"), "not an image").unwrap();

        let (_trigger, shutdown) = shutdown_channel();
        let mut scan_loop = ScanLoop::new(&config);

        let first = scan_loop.run_once(shutdown.clone()).await.unwrap();
        assert_eq!(record_count(&config), 1);
        assert_eq!(first.folders_processed, 1);
        assert_eq!(first.files_analyzed, 2);
        assert_eq!(first.files_supported_format, 1);
        assert_eq!(first.files_ignored, 0);

        let second = scan_loop.run_once(shutdown).await.unwrap();
        assert_eq!(record_count(&config), 1);
        assert_eq!(second.folders_processed, 2);
        assert_eq!(second.files_analyzed, 4);
        assert_eq!(second.files_supported_format, 2);
        assert_eq!(second.files_ignored, 1);
        assert_eq!(scan_loop.totals(), second);

        let record = Catalog::open(&config.db_path)
            .unwrap()
            .find_by_path(&photo.to_string_lossy())
            .unwrap();
        assert!(record.is_some());
    }

    #[tokio::test]
    async fn test_failed_file_does_not_stop_the_cycle() {
        let (dir, config) = setup();
        let sub = dir.path().join("photos/sub");
        fs::create_dir(&sub).unwrap();
        fs::write(dir.path().join("photos/broken.jpg"), b"garbage").unwrap();
        fs::write(sub.join("fine.jpeg"), jpeg_with_exif(10, 10, &[])).unwrap();

        let (_trigger, shutdown) = shutdown_channel();
        let stats = ScanLoop::new(&config).run_once(shutdown).await.unwrap();

        assert_eq!(stats.folders_processed, 2);
        assert_eq!(stats.files_supported_format, 2);
        assert_eq!(record_count(&config), 1);
    }

    #[tokio::test]
    async fn test_no_folders_configured() {
        let (_dir, mut config) = setup();
        config.folders.clear();

        let (_trigger, shutdown) = shutdown_channel();
        let stats = ScanLoop::new(&config).run(shutdown).await.unwrap();
        assert_eq!(stats, ScanStats::default());
        assert!(!config.db_path.exists());
    }

    #[tokio::test]
    async fn test_shutdown_before_start_does_no_work() {
        let (dir, config) = setup();
        fs::write(dir.path().join("photos/a.jpg"), jpeg_with_exif(10, 10, &[])).unwrap();

        let (trigger, shutdown) = shutdown_channel();
        trigger.trigger();
        let stats = ScanLoop::new(&config).run(shutdown).await.unwrap();

        assert_eq!(stats, ScanStats::default());
        assert!(!config.db_path.exists());
    }

    #[test]
    fn test_shutdown_stops_before_next_folder() {
        let (dir, config) = setup();
        fs::write(dir.path().join("photos/a.jpg"), jpeg_with_exif(10, 10, &[])).unwrap();

        let (trigger, shutdown) = shutdown_channel();
        trigger.trigger();
        let stats = scan_cycle(&Indexer::new(&config), &config.folders, &shutdown);
        assert_eq!(stats, ScanStats::default());
    }

    #[test]
    fn test_shutdown_stops_before_next_file() {
        let (dir, config) = setup();
        let folder = dir.path().join("photos");
        fs::write(folder.join("a.jpg"), jpeg_with_exif(10, 10, &[])).unwrap();
        fs::write(folder.join("b.jpg"), jpeg_with_exif(12, 10, &[])).unwrap();

        let indexer = Indexer::new(&config);
        let (trigger, shutdown) = shutdown_channel();
        let mut stats = ScanStats::default();
        let mut calls = 0;

        scan_folder(&folder, &shutdown, &mut stats, |file| {
            calls += 1;
            let outcome = indexer.process_file(file);
            // Arrives while the first file is in flight
            trigger.trigger();
            outcome
        });

        assert_eq!(calls, 1);
        assert_eq!(stats.files_analyzed, 1);
        assert_eq!(stats.files_supported_format, 1);
        assert_eq!(record_count(&config), 1);
    }

    #[tokio::test]
    async fn test_idle_wait_is_cancellable() {
        let (dir, config) = setup();
        fs::write(dir.path().join("photos/a.jpg"), jpeg_with_exif(10, 10, &[])).unwrap();

        let (trigger, shutdown) = shutdown_channel();
        let mut scan_loop = ScanLoop::new(&config);
        let handle = tokio::spawn(async move { scan_loop.run(shutdown).await });

        for _ in 0..500 {
            if config.db_path.exists() && record_count(&config) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(record_count(&config), 1);

        trigger.trigger();
        let totals = tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("scan loop did not stop")
            .unwrap()
            .unwrap();
        assert_eq!(totals.folders_processed, 1);
        assert_eq!(totals.files_supported_format, 1);
    }
}
