//! Startup sequencing and rollback
//!
//! Runs the reconcile, load and invoke stages in order and funnels every
//! unrecoverable failure into one shared rollback routine. Stage errors are
//! plain values matched here; nothing unwinds across the stages.

use crate::discovery::ModuleScanner;
use crate::invoke::{invoke, EntryPoint};
use crate::layout::InstallLayout;
use crate::loader::{LoaderConfig, LoaderError, ModuleLoader};
use crate::reconcile::{ReconcileError, ReconcileOutcome, StateReconciler};
use crate::registry::ModuleRegistry;
use crate::shell::HostShell;
use gantry_module_api::CallResult;
use std::fs;
use std::io::ErrorKind;

/// Message shown on the prompted rollback path
pub const FAILURE_NOTICE: &str = "Something went wrong while starting the bundled modules. \
Please restart the application and run the update again.";

/// Whether rollback asks the user before purging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackMode {
    /// Purge and terminate immediately
    Forced,

    /// Present the failure dialog once, then purge and terminate
    Prompted,
}

/// Delete the installed library state plus the archive, then terminate
///
/// Both the loading and the invocation failure paths end here; the mode is
/// the only difference between them. Deletion is best-effort so a partially
/// removable tree cannot block termination.
pub fn rollback(layout: &InstallLayout, shell: &mut dyn HostShell, mode: RollbackMode) {
    if mode == RollbackMode::Prompted {
        shell.notify_failure(FAILURE_NOTICE);
    }
    shell.release_modules();

    let library_root = layout.library_root();
    if let Err(e) = fs::remove_dir_all(&library_root) {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!(path = %library_root.display(), error = %e, "Failed to remove library root");
        }
    }

    let archive = layout.archive_path();
    if let Err(e) = fs::remove_file(&archive) {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!(path = %archive.display(), error = %e, "Failed to remove archive");
        }
    }

    shell.terminate();
}

/// Startup sequence owning the registry and the host-facing hooks
pub struct Bootstrap<S: HostShell> {
    layout: InstallLayout,
    entry: EntryPoint,
    shell: S,
    scanner: ModuleScanner,
    registry: ModuleRegistry,
    modules_ready: bool,
}

impl<S: HostShell> Bootstrap<S> {
    /// Build the sequence with the default loader configuration
    pub fn new(layout: InstallLayout, entry: EntryPoint, shell: S) -> Result<Self, LoaderError> {
        Self::with_config(layout, entry, shell, LoaderConfig::default())
    }

    pub fn with_config(
        layout: InstallLayout,
        entry: EntryPoint,
        shell: S,
        config: LoaderConfig,
    ) -> Result<Self, LoaderError> {
        let loader = ModuleLoader::new(config)?;
        Ok(Self {
            layout,
            entry,
            shell,
            scanner: ModuleScanner::new(loader),
            registry: ModuleRegistry::new(),
            modules_ready: false,
        })
    }

    /// True once `early_load` has produced a usable module set
    pub fn modules_ready(&self) -> bool {
        self.modules_ready
    }

    /// Loaded-module set built by `early_load`
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Early-initialization hook: reconcile the payload and load modules
    ///
    /// Must run before any other host hook. A missing or unusable archive
    /// halts startup without touching the disk; a failure of the loading
    /// pass as a whole purges the installation and terminates.
    pub fn early_load(&mut self) {
        let reconciler = StateReconciler::new(self.layout.clone());
        match reconciler.reconcile() {
            Ok(ReconcileOutcome::AlreadyInstalled) => {
                tracing::debug!("Payload already present");
            }
            Ok(ReconcileOutcome::Extracted(files)) => {
                tracing::info!(files, "Bundled archive extracted");
            }
            Err(ReconcileError::ArchiveMissing(path)) => {
                tracing::error!(path = %path.display(), "Bundled archive not found, cannot install modules");
                return;
            }
            Err(e) => {
                // leave the partial tree for the next startup to reconcile
                tracing::error!(error = %e, "Reconciliation failed");
                return;
            }
        }

        match self
            .scanner
            .load_unique(self.layout.runtime_dir(), &mut self.registry)
        {
            Ok(_) => {
                // per-candidate failures were already logged by the scanner
                self.modules_ready = true;
            }
            Err(e) => {
                tracing::error!(error = %e, "Module loading pass failed, purging installation");
                rollback(&self.layout, &mut self.shell, RollbackMode::Forced);
            }
        }
    }

    /// Main-load hook: hand control to the entry point
    ///
    /// A no-op unless `early_load` reported success. Resolution or call
    /// failures, and a fault reported by the module itself, offer the user
    /// one dialog, then purge and terminate.
    pub fn main_load(&mut self) -> Option<CallResult> {
        if !self.modules_ready {
            return None;
        }

        match invoke(&mut self.registry, &self.entry) {
            Ok(CallResult::Fault(fault)) => {
                tracing::error!(
                    code = fault.code,
                    message = %fault.message,
                    "Entry point reported a fault, purging installation"
                );
                rollback(&self.layout, &mut self.shell, RollbackMode::Prompted);
                None
            }
            Ok(result) => {
                tracing::info!(module = %self.entry.module, "Entry point invoked");
                Some(result)
            }
            Err(e) => {
                tracing::error!(error = %e, "Entry point invocation failed, purging installation");
                rollback(&self.layout, &mut self.shell, RollbackMode::Prompted);
                None
            }
        }
    }
}
