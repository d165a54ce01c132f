//! gantry-module-host: Bootstrap loader and wasm module host for gantry
//!
//! Ensures the bundled module payload is present on disk, loads each module
//! into the process exactly once by identity, and hands control to a
//! designated entry point, rolling the installation back wholesale when
//! any stage leaves it unusable.

pub mod bootstrap;
pub mod discovery;
pub mod identity;
pub mod invoke;
pub mod layout;
pub mod loader;
pub mod reconcile;
pub mod registry;
pub mod shell;

pub use bootstrap::{rollback, Bootstrap, RollbackMode, FAILURE_NOTICE};
pub use discovery::{DiscoveryError, LoadReport, ModuleScanner};
pub use identity::ModuleIdentity;
pub use invoke::{invoke, EntryPoint, InvokeError};
pub use layout::InstallLayout;
pub use loader::{LoadedModule, LoaderConfig, LoaderError, ModuleLoader, ProbedModule};
pub use reconcile::{ExtractionNeed, ReconcileError, ReconcileOutcome, StateReconciler};
pub use registry::ModuleRegistry;
pub use shell::{HostShell, ProcessShell};

pub use gantry_module_api::{
    CallFault, CallResult, MethodKind, MethodSpec, ModuleDescriptor, ModuleManifest, ServiceSpec,
};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize a tracing subscriber with `RUST_LOG` filtering
///
/// Defaults to "info" when `RUST_LOG` is not set. Intended for hosts that
/// have no subscriber of their own; call it once, before `early_load`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
