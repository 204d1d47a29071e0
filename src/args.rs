use anyhow::{bail, Result};
use clap::Parser;
use std::path::{Component, Path, PathBuf};

pub const DEFAULT_BACKUP_DIR: &str = ".json_backup";

/// Merge photo-export JSON sidecars into their media files with exiftool,
/// then move the sidecars into a hidden backup folder.
#[derive(Parser, Debug)]
#[command(name = "takeout_sidecars", version, about, long_about = None)]
pub struct Args {
    /// Root directory of the exported library (scanned recursively)
    pub root: PathBuf,

    /// Name of the backup directory created under the root
    #[arg(long = "backup-dir", default_value = DEFAULT_BACKUP_DIR)]
    pub backup_dir: String,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Validate parsed arguments. Fails before any file is touched.
    pub fn validate(&self) -> Result<()> {
        validate_root(&self.root)?;
        validate_backup_name(&self.backup_dir)?;
        Ok(())
    }
}

pub fn validate_root(root: &Path) -> Result<()> {
    if !root.exists() {
        bail!("Root directory does not exist: {}", root.display());
    }
    if !root.is_dir() {
        bail!("Root path is not a directory: {}", root.display());
    }
    Ok(())
}

/// The backup name must be a single plain path component
pub fn validate_backup_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => bail!("Backup directory must be a plain directory name, got {:?}", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["takeout_sidecars", "/photos"]).unwrap();
        assert_eq!(args.root, PathBuf::from("/photos"));
        assert_eq!(args.backup_dir, ".json_backup");
        assert!(!args.no_progress);
        assert!(!args.verbose);
    }

    #[test]
    fn test_root_is_required() {
        assert!(Args::try_parse_from(["takeout_sidecars"]).is_err());
    }

    #[test]
    fn test_flags() {
        let args = Args::try_parse_from([
            "takeout_sidecars",
            "/photos",
            "--backup-dir",
            ".sidecars",
            "--no-progress",
            "-v",
        ])
        .unwrap();
        assert_eq!(args.backup_dir, ".sidecars");
        assert!(args.no_progress);
        assert!(args.verbose);
    }

    #[test]
    fn test_backup_name_validation() {
        assert!(validate_backup_name(".json_backup").is_ok());
        assert!(validate_backup_name("backup").is_ok());
        assert!(validate_backup_name("").is_err());
        assert!(validate_backup_name("a/b").is_err());
        assert!(validate_backup_name("..").is_err());
        assert!(validate_backup_name("/abs").is_err());
    }

    #[test]
    fn test_missing_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = validate_root(&missing).unwrap_err();
        assert!(err.to_string().contains("does not exist"));

        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(validate_root(&file).is_err());
        assert!(validate_root(dir.path()).is_ok());
    }
}
