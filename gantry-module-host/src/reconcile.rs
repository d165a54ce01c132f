//! On-disk state reconciliation
//!
//! Decides whether the bundled archive must be (re-)extracted by inspecting
//! the install layout, and performs the extraction. Emptiness, not mere
//! existence, is the trigger: an extraction that completed but produced zero
//! files is indistinguishable from one that never ran and must be retried.

use crate::layout::InstallLayout;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during reconciliation
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Extraction is required but the source archive is absent
    #[error("Archive not found: {0}")]
    ArchiveMissing(PathBuf),

    #[error("Reconcile I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// An archive entry path escapes the library root
    #[error("Unsafe archive entry path: {0}")]
    UnsafeEntry(String),

    /// The archive yields no files at all
    #[error("Archive contains no module files")]
    EmptyArchive,
}

/// Whether the payload on disk satisfies the installation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionNeed {
    /// Payload directory exists and is non-empty
    Satisfied,

    /// Library root or payload is absent, or the payload is empty
    MustExtract,
}

/// Outcome of a successful reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Extraction was already satisfied; nothing was touched
    AlreadyInstalled,

    /// The archive was extracted, with the number of files written
    Extracted(usize),
}

/// Inspects the install layout and repairs it from the bundled archive
pub struct StateReconciler {
    layout: InstallLayout,
}

impl StateReconciler {
    pub fn new(layout: InstallLayout) -> Self {
        Self { layout }
    }

    /// Remove an empty payload husk, then decide whether extraction must run
    ///
    /// An interrupted deletion can remove the payload files but leave the
    /// directory skeleton behind; a bare existence check would then falsely
    /// report the installation as present, so an empty payload directory
    /// causes the whole library root to be removed before re-evaluating.
    pub fn assess(&self) -> Result<ExtractionNeed, ReconcileError> {
        let library_root = self.layout.library_root();
        let runtime_dir = self.layout.runtime_dir();

        if runtime_dir.is_dir() && dir_is_empty(&runtime_dir)? {
            tracing::warn!(path = %library_root.display(), "Empty payload husk, removing library root");
            fs::remove_dir_all(&library_root)?;
        }

        // root presence is checked before payload emptiness so the empty
        // check never runs against a path whose parents are gone
        if !library_root.is_dir() || !runtime_dir.is_dir() || dir_is_empty(&runtime_dir)? {
            return Ok(ExtractionNeed::MustExtract);
        }
        Ok(ExtractionNeed::Satisfied)
    }

    /// Ensure the payload is present, extracting the bundled archive if needed
    pub fn reconcile(&self) -> Result<ReconcileOutcome, ReconcileError> {
        if self.assess()? == ExtractionNeed::Satisfied {
            return Ok(ReconcileOutcome::AlreadyInstalled);
        }

        let archive = self.layout.archive_path();
        if !archive.is_file() {
            return Err(ReconcileError::ArchiveMissing(archive));
        }

        tracing::info!(
            archive = %archive.display(),
            "Payload missing or empty, extracting bundled archive"
        );
        let files = self.extract(&archive)?;
        Ok(ReconcileOutcome::Extracted(files))
    }

    /// Extract the archive into the library root, overwriting partial contents
    fn extract(&self, archive_path: &Path) -> Result<usize, ReconcileError> {
        let library_root = self.layout.library_root();
        let file = File::open(archive_path)?;
        let mut archive = zip::ZipArchive::new(file)?;

        fs::create_dir_all(&library_root)?;
        let mut extracted = 0usize;

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            let Some(relative) = entry.enclosed_name() else {
                return Err(ReconcileError::UnsafeEntry(entry.name().to_string()));
            };
            let dest = library_root.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&dest)?;
                continue;
            }
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&dest)?;
            io::copy(&mut entry, &mut out)?;
            extracted += 1;
        }

        if extracted == 0 {
            return Err(ReconcileError::EmptyArchive);
        }
        Ok(extracted)
    }
}

fn dir_is_empty(dir: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(dir)?.next().is_none())
}
