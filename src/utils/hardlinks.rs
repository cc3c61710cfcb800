//! Hardlink inspection for completed downloads.

use dashmap::DashMap;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Counts hardlinks pointing at downloaded files from outside the seed directory.
///
/// When an ignored root directory is populated, links to the same inode that live
/// inside that directory (e.g. cross-seed copies) are not counted.
#[derive(Debug, Default)]
pub struct HardLinkInspector {
    /// (device, inode) -> number of paths inside the ignored root directories
    root_dir_links: DashMap<(u64, u64), u64>,
}

impl HardLinkInspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk `directory` and remember how many paths reference each inode
    pub fn populate_root_dir(&self, directory: &Path) {
        self.root_dir_links.clear();

        let mut files = 0u64;
        for entry in WalkDir::new(directory).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(directory = %directory.display(), error = %e, "Failed to read entry while scanning root dir");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            if let Some(key) = inode_key(entry.path()) {
                *self.root_dir_links.entry(key).or_insert(0) += 1;
                files += 1;
            }
        }

        debug!(
            directory = %directory.display(),
            files = files,
            inodes = self.root_dir_links.len(),
            "Scanned ignored root dir for hardlinks"
        );
    }

    /// Number of hardlinks to `path` besides the path itself.
    ///
    /// Returns `None` when the file is missing or link counts are unavailable.
    pub fn hardlink_count(&self, path: &Path, ignore_root_dir: bool) -> Option<u64> {
        let (key, nlink) = link_info(path)?;
        let others = nlink.saturating_sub(1);

        if !ignore_root_dir {
            return Some(others);
        }

        let inside_root = self
            .root_dir_links
            .get(&key)
            .map(|count| *count)
            .unwrap_or(0)
            .saturating_sub(1);

        Some(others.saturating_sub(inside_root))
    }
}

#[cfg(unix)]
fn link_info(path: &Path) -> Option<((u64, u64), u64)> {
    use std::os::unix::fs::MetadataExt;

    let metadata = std::fs::metadata(path).ok()?;
    if !metadata.is_file() {
        return None;
    }
    Some(((metadata.dev(), metadata.ino()), metadata.nlink()))
}

#[cfg(not(unix))]
fn link_info(_path: &Path) -> Option<((u64, u64), u64)> {
    None
}

fn inode_key(path: &Path) -> Option<(u64, u64)> {
    link_info(path).map(|(key, _)| key)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_single_file_has_no_hardlinks() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("movie.mkv");
        fs::write(&file, b"data").unwrap();

        let inspector = HardLinkInspector::new();
        assert_eq!(inspector.hardlink_count(&file, false), Some(0));
    }

    #[test]
    fn test_hardlinked_file_is_counted() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("movie.mkv");
        fs::write(&file, b"data").unwrap();
        fs::hard_link(&file, dir.path().join("library.mkv")).unwrap();

        let inspector = HardLinkInspector::new();
        assert_eq!(inspector.hardlink_count(&file, false), Some(1));
    }

    #[test]
    fn test_links_inside_root_dir_are_ignored() {
        let root = tempfile::tempdir().unwrap();
        let downloads = root.path().join("downloads");
        let cross_seed = root.path().join("cross-seed");
        fs::create_dir_all(&downloads).unwrap();
        fs::create_dir_all(&cross_seed).unwrap();

        let file = downloads.join("episode.mkv");
        fs::write(&file, b"data").unwrap();
        fs::hard_link(&file, cross_seed.join("episode.mkv")).unwrap();

        let inspector = HardLinkInspector::new();
        inspector.populate_root_dir(root.path());

        assert_eq!(inspector.hardlink_count(&file, false), Some(1));
        assert_eq!(inspector.hardlink_count(&file, true), Some(0));
    }

    #[test]
    fn test_missing_file_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let inspector = HardLinkInspector::new();
        assert_eq!(inspector.hardlink_count(&dir.path().join("missing"), false), None);
    }
}
