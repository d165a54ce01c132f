//! Module discovery and directory scanning
//!
//! Loads every novel module file from a directory, skipping candidates whose
//! identity is already present in the registry.

use crate::identity::ModuleIdentity;
use crate::loader::{LoaderError, ModuleLoader};
use crate::registry::ModuleRegistry;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extension of loadable module files
const MODULE_EXTENSION: &str = "wasm";

/// Errors that can occur during module discovery
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to read directory: {0}")]
    ReadDirectory(#[source] std::io::Error),

    #[error("Failed to read module file {path}: {source}")]
    ReadModule {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load module {path}: {source}")]
    LoadModule {
        path: PathBuf,
        #[source]
        source: LoaderError,
    },
}

/// Result of one loading pass over a directory
pub struct LoadReport {
    /// Identities newly loaded by this pass
    pub loaded: Vec<ModuleIdentity>,

    /// Files skipped because their identity was already loaded
    pub skipped: Vec<PathBuf>,

    /// Candidates that failed to probe or load (with errors)
    pub failures: Vec<(PathBuf, DiscoveryError)>,
}

impl LoadReport {
    /// True if every candidate either loaded or deduplicated cleanly
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Total number of module files found
    pub fn total_found(&self) -> usize {
        self.loaded.len() + self.skipped.len() + self.failures.len()
    }
}

/// Directory scanner that feeds novel modules into a registry
pub struct ModuleScanner {
    loader: ModuleLoader,
}

impl ModuleScanner {
    /// Create a scanner around an existing loader
    pub fn new(loader: ModuleLoader) -> Self {
        Self { loader }
    }

    /// Load every module in `dir` whose identity is not yet in `registry`
    ///
    /// A missing directory is fatal to the whole call. Everything else is a
    /// per-candidate outcome: duplicates are skipped silently, probe and
    /// load failures are collected in the report and never abort the batch.
    /// Directory order only decides which file wins an identity tie.
    pub fn load_unique(
        &self,
        dir: impl AsRef<Path>,
        registry: &mut ModuleRegistry,
    ) -> Result<LoadReport, DiscoveryError> {
        let dir = dir.as_ref();

        if !dir.is_dir() {
            return Err(DiscoveryError::DirectoryNotFound(dir.to_path_buf()));
        }

        let entries = std::fs::read_dir(dir).map_err(DiscoveryError::ReadDirectory)?;

        let mut report = LoadReport {
            loaded: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
        };

        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    report
                        .failures
                        .push((dir.to_path_buf(), DiscoveryError::ReadDirectory(e)));
                    continue;
                }
            };

            let path = entry.path();

            // non-recursive; only module files are candidates
            if !path
                .extension()
                .map(|e| e == MODULE_EXTENSION)
                .unwrap_or(false)
            {
                continue;
            }

            match self.load_candidate(&path, registry) {
                Ok(Some(identity)) => report.loaded.push(identity),
                Ok(None) => {
                    tracing::debug!(path = %path.display(), "Duplicate module identity, skipping");
                    report.skipped.push(path);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Module candidate failed to load");
                    report.failures.push((path, e));
                }
            }
        }

        tracing::info!(
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            "Module scan complete"
        );

        Ok(report)
    }

    /// Probe one candidate and load it if its identity is novel
    fn load_candidate(
        &self,
        path: &Path,
        registry: &mut ModuleRegistry,
    ) -> Result<Option<ModuleIdentity>, DiscoveryError> {
        let bytes = std::fs::read(path).map_err(|e| DiscoveryError::ReadModule {
            path: path.to_path_buf(),
            source: e,
        })?;

        let probed = self
            .loader
            .probe(&bytes)
            .map_err(|e| DiscoveryError::LoadModule {
                path: path.to_path_buf(),
                source: e,
            })?;

        if registry.contains(&probed.identity) {
            return Ok(None);
        }

        let loaded = self
            .loader
            .load(probed)
            .map_err(|e| DiscoveryError::LoadModule {
                path: path.to_path_buf(),
                source: e,
            })?;

        let identity = loaded.identity.clone();
        registry.register(loaded);
        Ok(Some(identity))
    }
}
