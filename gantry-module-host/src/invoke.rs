//! Entry-point resolution and invocation
//!
//! Resolves one loaded module by name, a service inside it, and a method on
//! that service, then performs the single hand-off call into the module.
//! Every resolution step fails with its own error kind; no retries happen
//! at this layer.

use crate::loader::LoaderError;
use crate::registry::ModuleRegistry;
use gantry_module_api::{constructor_export_name, method_export_name, CallResult, MethodKind};
use thiserror::Error;

/// Errors that can occur while resolving or calling an entry point
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("Module '{0}' not found in the loaded set")]
    ModuleNotFound(String),

    #[error("Service '{service}' not found in module '{module}'")]
    ServiceNotFound { module: String, service: String },

    #[error("Method '{method}' not found on service '{service}'")]
    MethodNotFound { service: String, method: String },

    #[error("Failed to construct an instance of '{service}': {source}")]
    InstantiationFailed {
        service: String,
        #[source]
        source: LoaderError,
    },

    #[error("Invocation of '{export}' failed: {source}")]
    Call {
        export: String,
        #[source]
        source: LoaderError,
    },
}

/// The (module, service, method) triple control is handed to
#[derive(Debug, Clone)]
pub struct EntryPoint {
    /// Simple module name, matched case-insensitively
    pub module: String,

    /// Fully qualified service name, matched exactly
    pub service: String,

    /// Method name, matched exactly
    pub method: String,

    /// Expected parameter-type signature (empty supported)
    pub params: Vec<String>,

    /// Expected dispatch kind
    pub kind: MethodKind,

    /// Arguments passed at invocation
    pub args: Vec<String>,
}

impl EntryPoint {
    /// The common contract: a static method with no parameters
    pub fn static_niladic(
        module: impl Into<String>,
        service: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            service: service.into(),
            method: method.into(),
            params: Vec::new(),
            kind: MethodKind::Static,
            args: Vec::new(),
        }
    }
}

/// Resolve the entry point against the loaded set and invoke it
///
/// Resolution order: module by simple name, service by exact fully-qualified
/// name in the module's manifest, method by exact name plus dispatch kind
/// plus parameter signature. Instance dispatch constructs a default instance
/// first. A `Void` result is a valid, non-error outcome.
pub fn invoke(registry: &mut ModuleRegistry, entry: &EntryPoint) -> Result<CallResult, InvokeError> {
    let module = registry
        .find_by_name_mut(&entry.module)
        .ok_or_else(|| InvokeError::ModuleNotFound(entry.module.clone()))?;

    let service = module
        .manifest
        .find_service(&entry.service)
        .ok_or_else(|| InvokeError::ServiceNotFound {
            module: entry.module.clone(),
            service: entry.service.clone(),
        })?;

    let method = service
        .methods
        .iter()
        .find(|m| m.name == entry.method && m.kind == entry.kind && m.params == entry.params)
        .ok_or_else(|| InvokeError::MethodNotFound {
            service: entry.service.clone(),
            method: entry.method.clone(),
        })?;

    let export = method_export_name(&entry.service, &method.name);
    let kind = method.kind;
    let session = module.session_mut();

    tracing::debug!(export = %export, "Invoking entry point");

    let result = match kind {
        MethodKind::Static => session
            .call_static(&export, &entry.args)
            .map_err(|e| lift_call_error(entry, &export, e))?,
        MethodKind::Instance => {
            let constructor = constructor_export_name(&entry.service);
            let handle = session.call_constructor(&constructor).map_err(|e| {
                InvokeError::InstantiationFailed {
                    service: entry.service.clone(),
                    source: e,
                }
            })?;
            session
                .call_instance(&export, handle, &entry.args)
                .map_err(|e| lift_call_error(entry, &export, e))?
        }
    };

    Ok(result)
}

/// A declared method whose export is absent is still a missing method;
/// everything else is a call failure.
fn lift_call_error(entry: &EntryPoint, export: &str, source: LoaderError) -> InvokeError {
    match source {
        LoaderError::ExportNotFound(_) => InvokeError::MethodNotFound {
            service: entry.service.clone(),
            method: entry.method.clone(),
        },
        source => InvokeError::Call {
            export: export.to_string(),
            source,
        },
    }
}
