use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::matcher::{is_media_candidate, is_sidecar_name};

/// A `.json` sidecar found during the scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sidecar {
    pub path: PathBuf,
    pub dir: PathBuf,
    /// File name, lossily decoded when it is not UTF-8
    pub name: String,
}

/// Sidecars of one directory, in name order
#[derive(Debug)]
pub struct DirectoryBatch {
    pub dir: PathBuf,
    pub sidecars: Vec<Sidecar>,
}

/// Recursively collect every sidecar under `root`, skipping the backup
/// directory. Entries that cannot be read are logged and skipped.
pub fn collect_sidecars(root: &Path, backup_root: &Path) -> Vec<Sidecar> {
    let mut sidecars = Vec::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.path() != backup_root);

    for entry_result in walker {
        let entry = match entry_result {
            Ok(e) => e,
            Err(err) => {
                if let Some(path) = err.path() {
                    warn!("Failed to access {}: {}", path.display(), err);
                } else {
                    warn!("Walk error: {}", err);
                }
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        // Undecodable bytes only matter for matching; the sidecar still
        // gets archived under its real name.
        let name = entry.file_name().to_string_lossy();
        if !is_sidecar_name(&name) {
            continue;
        }
        if entry.file_name().to_str().is_none() {
            debug!("Non UTF-8 sidecar name: {}", entry.path().display());
        }

        let path = entry.path().to_path_buf();
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
        sidecars.push(Sidecar {
            name: name.into_owned(),
            path,
            dir,
        });
    }

    debug!("Found {} sidecars under {}", sidecars.len(), root.display());
    sidecars
}

/// Group sidecars by directory. Directories come out in path order.
pub fn group_by_directory(sidecars: Vec<Sidecar>) -> Vec<DirectoryBatch> {
    let mut groups: BTreeMap<PathBuf, Vec<Sidecar>> = BTreeMap::new();
    for sidecar in sidecars {
        groups.entry(sidecar.dir.clone()).or_default().push(sidecar);
    }

    groups
        .into_iter()
        .map(|(dir, mut sidecars)| {
            sidecars.sort_by(|a, b| a.name.cmp(&b.name));
            DirectoryBatch { dir, sidecars }
        })
        .collect()
}

/// Names of the files in `dir` that could be media files, sorted
pub fn list_candidates(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if is_media_candidate(name) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
