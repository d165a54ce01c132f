//! On-disk install layout
//!
//! Every path the bootstrap touches is derived from one mod-specific root
//! directory.

use std::path::{Path, PathBuf};

/// Directory under the root that owns all extracted module state
pub const LIBRARY_DIR: &str = "Libraries";

/// Subdirectory of the library root holding the loadable module files
pub const RUNTIME_DIR: &str = "Runtime";

/// Bundled archive the library root is populated from
pub const ARCHIVE_FILE: &str = "RequiredLibs.zip";

/// Paths of one module installation
#[derive(Debug, Clone)]
pub struct InstallLayout {
    root: PathBuf,
}

impl InstallLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The mod-specific root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/Libraries`: created by extraction, removed wholesale on rollback
    pub fn library_root(&self) -> PathBuf {
        self.root.join(LIBRARY_DIR)
    }

    /// `<root>/Libraries/Runtime`: the module files to load
    pub fn runtime_dir(&self) -> PathBuf {
        self.library_root().join(RUNTIME_DIR)
    }

    /// `<root>/RequiredLibs.zip`: source of truth for the library root
    pub fn archive_path(&self) -> PathBuf {
        self.root.join(ARCHIVE_FILE)
    }
}
