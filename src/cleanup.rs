use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::matcher::is_temp_file;

/// Delete every exiftool temporary file under `root`, including the backup
/// tree. Returns how many were removed.
pub fn remove_temp_files(root: &Path) -> usize {
    let mut removed = 0;

    for entry in WalkDir::new(root).into_iter().filter_map(|e| match e {
        Ok(e) => Some(e),
        Err(err) => {
            warn!("Walk error while cleaning up: {}", err);
            None
        }
    }) {
        if !entry.file_type().is_file() {
            continue;
        }
        let is_temp = entry.file_name().to_str().is_some_and(is_temp_file);
        if !is_temp {
            continue;
        }

        match fs::remove_file(entry.path()) {
            Ok(()) => {
                debug!("Removed temporary file {}", entry.path().display());
                removed += 1;
            }
            Err(e) => warn!("Failed to remove {}: {}", entry.path().display(), e),
        }
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_only_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("album")).unwrap();
        fs::write(root.join("a.jpg"), "").unwrap();
        fs::write(root.join("a.jpg_exiftool_tmp"), "").unwrap();
        fs::write(root.join("album/b_exiftool_tmp.mov"), "").unwrap();
        fs::write(root.join("album/b.mov"), "").unwrap();

        assert_eq!(remove_temp_files(root), 2);
        assert!(root.join("a.jpg").exists());
        assert!(root.join("album/b.mov").exists());
        assert!(!root.join("a.jpg_exiftool_tmp").exists());
        assert!(!root.join("album/b_exiftool_tmp.mov").exists());

        assert_eq!(remove_temp_files(root), 0);
    }
}
