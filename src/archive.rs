use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::ArchiveError;

/// Highest `-N` tried before giving up on a crowded backup directory
const MAX_COLLISION_SUFFIX: u32 = 10000;

/// Moves sidecars into `<root>/<backup>/<relative dir>/`, never overwriting
/// anything already there.
#[derive(Debug)]
pub struct Archiver {
    root: PathBuf,
    backup_root: PathBuf,
    prepared: bool,
}

impl Archiver {
    pub fn new(root: &Path, backup_name: &str) -> Self {
        Archiver {
            root: root.to_path_buf(),
            backup_root: root.join(backup_name),
            prepared: false,
        }
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Create the backup root if needed and hide it. Safe to call repeatedly,
    /// and across runs over the same root.
    pub fn ensure_backup_root(&mut self) -> Result<(), ArchiveError> {
        if self.prepared {
            return Ok(());
        }

        fs::create_dir_all(&self.backup_root).map_err(|source| ArchiveError::CreateDir {
            path: self.backup_root.clone(),
            source,
        })?;
        mark_hidden(&self.backup_root);

        self.prepared = true;
        Ok(())
    }

    /// Backup directory mirroring `dir`, which must sit under the root
    pub fn destination_dir(&self, dir: &Path) -> Result<PathBuf, ArchiveError> {
        let relative = dir
            .strip_prefix(&self.root)
            .map_err(|_| ArchiveError::OutsideRoot(dir.to_path_buf()))?;
        Ok(self.backup_root.join(relative))
    }

    /// Move a sidecar into the backup tree, returning where it ended up
    pub fn archive(&mut self, sidecar: &Path) -> Result<PathBuf, ArchiveError> {
        let dir = sidecar.parent().unwrap_or(&self.root);
        let dest_dir = self.destination_dir(dir)?;

        self.ensure_backup_root()?;
        fs::create_dir_all(&dest_dir).map_err(|source| ArchiveError::CreateDir {
            path: dest_dir.clone(),
            source,
        })?;

        let name = sidecar
            .file_name()
            .ok_or_else(|| ArchiveError::OutsideRoot(sidecar.to_path_buf()))?;
        let target = find_available_name(&dest_dir, name)?;

        move_file(sidecar, &target).map_err(|source| ArchiveError::Move {
            from: sidecar.to_path_buf(),
            to: target.clone(),
            source,
        })?;

        debug!("Archived {} -> {}", sidecar.display(), target.display());
        Ok(target)
    }
}

/// Backups are append-only: an earlier run's copy of the same sidecar is
/// kept and the newcomer becomes `name-1.json`, `name-2.json` and so on.
/// Names are handled as raw OS strings so undecodable names survive.
fn find_available_name(dir: &Path, name: &OsStr) -> Result<PathBuf, ArchiveError> {
    let wanted = dir.join(name);
    if !wanted.exists() {
        return Ok(wanted);
    }

    let name_path = Path::new(name);
    let stem = name_path.file_stem().unwrap_or(name);
    let ext = name_path.extension();

    (1..=MAX_COLLISION_SUFFIX)
        .map(|n| dir.join(numbered(stem, ext, n)))
        .find(|candidate| !candidate.exists())
        .ok_or(ArchiveError::NoFreeName(wanted))
}

fn numbered(stem: &OsStr, ext: Option<&OsStr>, n: u32) -> OsString {
    let mut name = stem.to_os_string();
    name.push(format!("-{}", n));
    if let Some(ext) = ext {
        name.push(".");
        name.push(ext);
    }
    name
}

/// Rename, falling back to copy and delete when the rename is refused
/// (for instance across mount points)
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            debug!("Rename of {} failed ({}), copying instead", from.display(), rename_err);
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

#[cfg(target_os = "macos")]
fn mark_hidden(path: &Path) {
    use std::process::Command;

    match Command::new("chflags").arg("hidden").arg(path).status() {
        Ok(status) if status.success() => {}
        Ok(status) => warn!("chflags hidden {} exited with {}", path.display(), status),
        Err(e) => warn!("Could not run chflags on {}: {}", path.display(), e),
    }
}

/// The leading dot of the backup name already hides it here
#[cfg(not(target_os = "macos"))]
fn mark_hidden(path: &Path) {
    if !path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
    {
        warn!("Backup directory {} will not be hidden", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_top_level() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let sidecar = root.join("lonely.json");
        fs::write(&sidecar, "{}").unwrap();

        let mut archiver = Archiver::new(root, ".json_backup");
        let target = archiver.archive(&sidecar).unwrap();

        assert_eq!(target, root.join(".json_backup/lonely.json"));
        assert!(target.exists());
        assert!(!sidecar.exists());
    }

    #[test]
    fn test_archive_mirrors_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("2020/trip")).unwrap();
        let sidecar = root.join("2020/trip/IMG_1.JPG.json");
        fs::write(&sidecar, "{}").unwrap();

        let mut archiver = Archiver::new(root, ".json_backup");
        let target = archiver.archive(&sidecar).unwrap();

        assert_eq!(target, root.join(".json_backup/2020/trip/IMG_1.JPG.json"));
        assert_eq!(fs::read_to_string(target).unwrap(), "{}");
    }

    #[test]
    fn test_collision_gets_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let backup = root.join(".json_backup");
        fs::create_dir_all(&backup).unwrap();
        fs::write(backup.join("lonely.json"), "old").unwrap();
        fs::write(backup.join("lonely-1.json"), "older").unwrap();

        let sidecar = root.join("lonely.json");
        fs::write(&sidecar, "new").unwrap();

        let mut archiver = Archiver::new(root, ".json_backup");
        let target = archiver.archive(&sidecar).unwrap();

        assert_eq!(target, backup.join("lonely-2.json"));
        assert_eq!(fs::read_to_string(backup.join("lonely.json")).unwrap(), "old");
        assert_eq!(fs::read_to_string(backup.join("lonely-1.json")).unwrap(), "older");
        assert_eq!(fs::read_to_string(target).unwrap(), "new");
    }

    #[test]
    fn test_numbered_names() {
        let stem = OsStr::new("IMG_1.JPG");
        assert_eq!(numbered(stem, Some(OsStr::new("json")), 3), "IMG_1.JPG-3.json");
        assert_eq!(numbered(OsStr::new("notes"), None, 1), "notes-1");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_name_keeps_its_bytes() {
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let name = OsStr::from_bytes(b"caf\xe9.jpg.json");
        let sidecar = root.join(name);
        if fs::write(&sidecar, "{}").is_err() {
            // filesystem insists on UTF-8 names
            return;
        }
        let backup = root.join(".json_backup");
        fs::create_dir_all(&backup).unwrap();
        fs::write(backup.join(name), "old").unwrap();

        let mut archiver = Archiver::new(root, ".json_backup");
        let target = archiver.archive(&sidecar).unwrap();

        assert_eq!(target, backup.join(OsStr::from_bytes(b"caf\xe9.jpg-1.json")));
        assert_eq!(fs::read_to_string(backup.join(name)).unwrap(), "old");
        assert!(!sidecar.exists());
    }

    #[test]
    fn test_ensure_backup_root_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        let mut first = Archiver::new(root, ".json_backup");
        first.ensure_backup_root().unwrap();
        first.ensure_backup_root().unwrap();

        let mut second = Archiver::new(root, ".json_backup");
        second.ensure_backup_root().unwrap();
        assert!(root.join(".json_backup").is_dir());
    }

    #[test]
    fn test_outside_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let sidecar = other.path().join("x.json");
        fs::write(&sidecar, "{}").unwrap();

        let mut archiver = Archiver::new(dir.path(), ".json_backup");
        assert!(matches!(
            archiver.archive(&sidecar),
            Err(ArchiveError::OutsideRoot(_))
        ));
        assert!(sidecar.exists());
    }

    #[test]
    fn test_missing_sidecar_is_a_move_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut archiver = Archiver::new(dir.path(), ".json_backup");
        assert!(matches!(
            archiver.archive(&dir.path().join("gone.json")),
            Err(ArchiveError::Move { .. })
        ));
    }
}
