use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Write as _;
use std::path::Path;
use tracing::warn;

const BAR_TEMPLATE: &str = "[{bar:40}] {percent:>3}% {msg}";
const NAME_WIDTH: usize = 50;

/// What happened to one sidecar before it was archived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Fields written to the matched media file
    Updated,
    /// exiftool refused or failed
    WriteFailed,
    /// Matched, but the sidecar yielded nothing to write
    NoFields,
    /// No media file for this sidecar
    Orphaned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileReport {
    pub outcome: Outcome,
    pub archived: bool,
}

/// Counters for a whole run, folded from per-file reports
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub total: usize,
    pub updated: usize,
    pub orphaned: usize,
    pub failed: usize,
    pub archive_failures: usize,
    pub temp_files_removed: usize,
}

impl RunStats {
    pub fn record(&mut self, report: &FileReport) {
        self.total += 1;
        match report.outcome {
            Outcome::Updated => self.updated += 1,
            Outcome::Orphaned => self.orphaned += 1,
            Outcome::WriteFailed | Outcome::NoFields => self.failed += 1,
        }
        if !report.archived {
            self.archive_failures += 1;
        }
    }

    pub fn orphaned_or_failed(&self) -> usize {
        self.orphaned + self.failed
    }

    pub fn summary(&self, backup_root: &Path) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Summary ===");
        let _ = writeln!(out, "Updated files: {}", self.updated);
        let _ = writeln!(out, "Orphan or failed JSONs: {}", self.orphaned_or_failed());
        let _ = writeln!(out, "JSONs moved to: {}", backup_root.display());
        if self.archive_failures > 0 {
            let _ = writeln!(out, "JSONs that could not be moved: {}", self.archive_failures);
        }
        if self.temp_files_removed > 0 {
            let _ = writeln!(out, "Temporary exiftool files removed: {}", self.temp_files_removed);
        }
        out
    }

    pub fn print_summary(&self, backup_root: &Path) {
        println!();
        print!("{}", self.summary(backup_root));
    }
}

impl<'a> Extend<&'a FileReport> for RunStats {
    fn extend<I: IntoIterator<Item = &'a FileReport>>(&mut self, iter: I) {
        for report in iter {
            self.record(report);
        }
    }
}

/// Observer told about each sidecar as it is handled. Purely cosmetic.
pub trait Progress {
    fn start(&mut self, total: usize);
    fn advance(&mut self, name: &str);
    fn finish(&mut self);

    /// Report a per-file problem without tearing the display
    fn warn(&self, message: &str) {
        warn!("{}", message);
    }
}

/// No output at all, for tests and `--no-progress`
pub struct NoProgress;

impl Progress for NoProgress {
    fn start(&mut self, _total: usize) {}
    fn advance(&mut self, _name: &str) {}
    fn finish(&mut self) {}
}

/// Single-line bar redrawn in place
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#-");
        bar.set_style(style);
        BarProgress { bar }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress for BarProgress {
    fn start(&mut self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
    }

    fn advance(&mut self, name: &str) {
        self.bar.set_message(truncate_name(name));
        self.bar.inc(1);
    }

    fn finish(&mut self) {
        self.bar.finish_with_message("Completed");
    }

    fn warn(&self, message: &str) {
        self.bar.suspend(|| warn!("{}", message));
    }
}

fn truncate_name(name: &str) -> String {
    name.chars().take(NAME_WIDTH).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcome: Outcome, archived: bool) -> FileReport {
        FileReport { outcome, archived }
    }

    #[test]
    fn test_fold_counts_every_file_once() {
        let reports = vec![
            report(Outcome::Updated, true),
            report(Outcome::Updated, true),
            report(Outcome::Orphaned, true),
            report(Outcome::WriteFailed, false),
            report(Outcome::NoFields, true),
        ];

        let mut stats = RunStats::default();
        stats.extend(&reports);

        assert_eq!(stats.total, 5);
        assert_eq!(stats.updated, 2);
        assert_eq!(stats.orphaned, 1);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.archive_failures, 1);
        assert_eq!(stats.updated + stats.orphaned_or_failed(), stats.total);
    }

    #[test]
    fn test_summary_lines() {
        let stats = RunStats {
            total: 3,
            updated: 2,
            orphaned: 1,
            ..Default::default()
        };
        let summary = stats.summary(Path::new("/photos/.json_backup"));
        assert_eq!(
            summary,
            "=== Summary ===\n\
             Updated files: 2\n\
             Orphan or failed JSONs: 1\n\
             JSONs moved to: /photos/.json_backup\n"
        );
    }

    #[test]
    fn test_summary_mentions_problems() {
        let stats = RunStats {
            archive_failures: 1,
            temp_files_removed: 4,
            ..Default::default()
        };
        let summary = stats.summary(Path::new("b"));
        assert!(summary.contains("could not be moved: 1"));
        assert!(summary.contains("files removed: 4"));
    }

    #[test]
    fn test_truncate_name() {
        let long = "x".repeat(80);
        assert_eq!(truncate_name(&long).len(), 50);
        assert_eq!(truncate_name("short.json"), "short.json");
    }

    #[test]
    fn test_hidden_bar_runs_headless() {
        let mut progress = BarProgress {
            bar: ProgressBar::hidden(),
        };
        progress.start(2);
        progress.advance("a.json");
        progress.advance("b.json");
        assert_eq!(progress.bar.position(), 2);
        progress.finish();
    }
}
