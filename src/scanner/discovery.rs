use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions handed to the indexing pipeline, compared case-insensitively.
pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["jpg", "jpeg"];

/// Flatten `roots` into every directory to visit, depth-first.
///
/// Each existing root comes first, followed by its subdirectories in the
/// order the directory listing returns them. Missing roots are skipped.
/// Symlinked folders are followed; a folder whose target was already
/// visited is skipped so link cycles terminate.
pub fn collect_folders(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut folders = Vec::new();
    let mut visited = HashSet::new();
    let mut stack: Vec<PathBuf> = roots.iter().rev().cloned().collect();

    while let Some(folder) = stack.pop() {
        if !folder.is_dir() {
            continue;
        }
        let canonical = std::fs::canonicalize(&folder).unwrap_or_else(|_| folder.clone());
        if !visited.insert(canonical) {
            tracing::debug!("Skipping already visited folder {}", folder.display());
            continue;
        }

        let subfolders = list_entries(&folder, Path::is_dir);
        folders.push(folder);

        // Reversed so the first listed subfolder is popped first.
        stack.extend(subfolders.into_iter().rev());
    }

    folders
}

/// Files directly inside `folder`, in directory listing order. Symlinks to
/// files are listed under the link path.
pub fn list_files(folder: &Path) -> Vec<PathBuf> {
    list_entries(folder, Path::is_file)
}

/// Direct children of `folder` matching `keep`, which follows symlinks.
/// Unreadable entries are skipped.
fn list_entries(folder: &Path, keep: fn(&Path) -> bool) -> Vec<PathBuf> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(folder).min_depth(1).max_depth(1).follow_links(false) {
        match entry {
            Ok(entry) if keep(entry.path()) => entries.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => tracing::debug!("Skipping unreadable entry in {}: {}", folder.display(), e),
        }
    }
    entries
}

/// Whether `path` has one of the [`SUPPORTED_EXTENSIONS`].
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| supported.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}
