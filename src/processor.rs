use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::archive::Archiver;
use crate::args::validate_root;
use crate::cleanup::remove_temp_files;
use crate::matcher::{plan_directory, MediaMatch};
use crate::report::{FileReport, Outcome, Progress, RunStats};
use crate::scan::{collect_sidecars, group_by_directory, list_candidates, DirectoryBatch, Sidecar};
use crate::sidecar::{read_sidecar, ExtractedFields};
use crate::writer::MetadataWriter;

/// Drives one run: every sidecar under the root is matched, applied and
/// archived, one at a time.
pub struct Processor<W: MetadataWriter> {
    root: PathBuf,
    archiver: Archiver,
    writer: W,
    progress: Box<dyn Progress>,
}

impl<W: MetadataWriter> Processor<W> {
    pub fn new(root: &Path, backup_name: &str, writer: W, progress: Box<dyn Progress>) -> Result<Self> {
        validate_root(root)?;
        let root = fs::canonicalize(root)
            .with_context(|| format!("Failed to resolve root directory: {}", root.display()))?;

        Ok(Processor {
            archiver: Archiver::new(&root, backup_name),
            root,
            writer,
            progress,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn backup_root(&self) -> &Path {
        self.archiver.backup_root()
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn run(&mut self) -> Result<RunStats> {
        let mut stats = RunStats::default();

        // Leftovers from an interrupted earlier run
        stats.temp_files_removed += remove_temp_files(&self.root);

        let sidecars = collect_sidecars(&self.root, self.archiver.backup_root());
        info!("Processing {} sidecars under {}", sidecars.len(), self.root.display());

        self.progress.start(sidecars.len());
        for batch in group_by_directory(sidecars) {
            let reports = self.process_directory(&batch);
            stats.extend(&reports);
        }
        self.progress.finish();

        stats.temp_files_removed += remove_temp_files(&self.root);

        Ok(stats)
    }

    fn process_directory(&mut self, batch: &DirectoryBatch) -> Vec<FileReport> {
        let candidates = match list_candidates(&batch.dir) {
            Ok(c) => c,
            Err(e) => {
                self.progress
                    .warn(&format!("Failed to list {}: {}", batch.dir.display(), e));
                Vec::new()
            }
        };

        let names: Vec<String> = batch.sidecars.iter().map(|s| s.name.clone()).collect();
        let plan = plan_directory(&names, &candidates);

        batch
            .sidecars
            .iter()
            .zip(plan)
            .map(|(sidecar, media)| {
                let report = self.process_sidecar(sidecar, media.as_ref());
                self.progress.advance(&sidecar.name);
                report
            })
            .collect()
    }

    fn process_sidecar(&mut self, sidecar: &Sidecar, media: Option<&MediaMatch>) -> FileReport {
        let outcome = match media {
            Some(m) => {
                let media_path = sidecar.dir.join(&m.name);
                debug!("{} -> {} ({:?})", sidecar.name, m.name, m.rank);
                self.apply_sidecar(&sidecar.path, &media_path)
            }
            None => {
                debug!("{} has no media file", sidecar.path.display());
                Outcome::Orphaned
            }
        };

        // Archived whatever the outcome
        let archived = match self.archiver.archive(&sidecar.path) {
            Ok(_) => true,
            Err(e) => {
                self.progress.warn(&format!("Could not archive: {}", e));
                false
            }
        };

        FileReport { outcome, archived }
    }

    fn apply_sidecar(&mut self, sidecar: &Path, media: &Path) -> Outcome {
        let fields = match read_sidecar(sidecar) {
            Ok(f) => f,
            Err(e) => {
                self.progress.warn(&e.to_string());
                ExtractedFields::default()
            }
        };

        if fields.is_empty() {
            debug!("{} has nothing to write", sidecar.display());
            return Outcome::NoFields;
        }

        match self.writer.apply(media, &fields) {
            Ok(()) => Outcome::Updated,
            Err(e) => {
                self.progress.warn(&e.to_string());
                Outcome::WriteFailed
            }
        }
    }
}
