//! Module loader using wasmtime
//!
//! Compiles candidate module files, probes their declared identity without
//! registering them, and produces loaded modules ready for invocation.

use crate::identity::ModuleIdentity;
use gantry_module_api::{
    CallResult, ModuleManifest, ABI_VERSION, ALLOC_EXPORT, DEALLOC_EXPORT, MANIFEST_EXPORT,
    MEMORY_EXPORT,
};
use thiserror::Error;
use wasmtime::*;

/// Errors that can occur while probing or loading a module
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Engine creation failed: {0}")]
    EngineCreation(#[source] anyhow::Error),

    #[error("Module compilation failed: {0}")]
    Compilation(#[source] anyhow::Error),

    #[error("Instantiation failed: {0}")]
    Instantiation(#[source] anyhow::Error),

    #[error("Store configuration failed: {0}")]
    StoreConfig(String),

    #[error("Export not found: {0}")]
    ExportNotFound(String),

    #[error("Export call failed: {export} - {source}")]
    ExportCall {
        export: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("ABI version mismatch: expected {expected}, got {actual}")]
    AbiVersionMismatch { expected: u32, actual: u32 },

    #[error("Manifest rejected: {0}")]
    InvalidManifest(String),

    #[error("Deserialization failed: {0}")]
    Deserialization(#[source] rmp_serde::decode::Error),

    #[error("Memory access error: {0}")]
    MemoryAccess(String),

    #[error("Fuel exhausted (CPU limit exceeded)")]
    FuelExhausted,
}

/// Loader configuration
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Fuel budget per guest call (CPU limit)
    pub fuel_limit: u64,

    /// Maximum wasm stack size in bytes
    pub max_stack_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            fuel_limit: 10_000_000,
            max_stack_size: 1024 * 1024, // 1MB
        }
    }
}

/// Module loader with wasmtime engine
pub struct ModuleLoader {
    engine: Engine,
    config: LoaderConfig,
}

/// A candidate whose manifest has been read but which is not yet loaded
///
/// Probing compiles the module and reads its declared manifest through a
/// scratch instantiation; nothing is retained in the host process if the
/// probe result is discarded.
pub struct ProbedModule {
    /// Declared manifest
    pub manifest: ModuleManifest,

    /// Identity derived from the manifest
    pub identity: ModuleIdentity,

    module: Module,
}

/// A module loaded into the host process, ready for invocation
pub struct LoadedModule {
    /// Declared manifest
    pub manifest: ModuleManifest,

    /// Identity the module is registered under
    pub identity: ModuleIdentity,

    session: ModuleSession,
}

impl LoadedModule {
    pub(crate) fn session_mut(&mut self) -> &mut ModuleSession {
        &mut self.session
    }
}

/// Live wasm instance with its store and the guest-memory plumbing
pub(crate) struct ModuleSession {
    store: Store<()>,
    instance: Instance,
    memory: Memory,
    alloc_fn: TypedFunc<i32, i32>,
    dealloc_fn: TypedFunc<(i32, i32), ()>,
    fuel_limit: u64,
}

/// Unpack ptr and len from a packed i64
#[inline]
fn unpack_ptr_len(packed: i64) -> (i32, i32) {
    let ptr = (packed >> 32) as i32;
    let len = (packed & 0xFFFFFFFF) as i32;
    (ptr, len)
}

impl ModuleLoader {
    /// Create a new module loader
    pub fn new(config: LoaderConfig) -> Result<Self, LoaderError> {
        let mut engine_config = Config::new();
        engine_config.consume_fuel(true);
        engine_config.max_wasm_stack(config.max_stack_size);
        engine_config.wasm_memory64(false);

        let engine = Engine::new(&engine_config).map_err(LoaderError::EngineCreation)?;

        Ok(Self { engine, config })
    }

    /// Read a candidate's declared identity without loading it
    ///
    /// Compiles the module and calls its manifest export in a throwaway
    /// store. The probe fails on non-module bytes, a missing or misbehaving
    /// manifest export, and ABI or manifest validation errors.
    pub fn probe(&self, wasm_bytes: &[u8]) -> Result<ProbedModule, LoaderError> {
        let module = Module::new(&self.engine, wasm_bytes).map_err(LoaderError::Compilation)?;

        let mut scratch = self.instantiate(&module)?;
        let manifest = scratch.read_manifest()?;

        if manifest.abi_version != ABI_VERSION {
            return Err(LoaderError::AbiVersionMismatch {
                expected: ABI_VERSION,
                actual: manifest.abi_version,
            });
        }
        if manifest.module.name.is_empty() {
            return Err(LoaderError::InvalidManifest("module name is empty".into()));
        }
        if manifest.module.version.is_empty() {
            return Err(LoaderError::InvalidManifest(
                "module version is empty".into(),
            ));
        }

        let identity = ModuleIdentity::from_descriptor(&manifest.module);

        Ok(ProbedModule {
            manifest,
            identity,
            module,
        })
    }

    /// Fully load a probed candidate
    ///
    /// Builds the instance the module lives in for the rest of the process
    /// lifetime. The scratch instantiation used by the probe is discarded.
    pub fn load(&self, probed: ProbedModule) -> Result<LoadedModule, LoaderError> {
        let session = self.instantiate(&probed.module)?;

        Ok(LoadedModule {
            manifest: probed.manifest,
            identity: probed.identity,
            session,
        })
    }

    fn instantiate(&self, module: &Module) -> Result<ModuleSession, LoaderError> {
        let mut store = Store::new(&self.engine, ());
        store
            .set_fuel(self.config.fuel_limit)
            .map_err(|e| LoaderError::StoreConfig(format!("Failed to set fuel: {}", e)))?;

        let linker = Linker::new(&self.engine);
        let instance = linker
            .instantiate(&mut store, module)
            .map_err(LoaderError::Instantiation)?;

        let memory = instance
            .get_memory(&mut store, MEMORY_EXPORT)
            .ok_or_else(|| LoaderError::ExportNotFound(MEMORY_EXPORT.to_string()))?;

        let alloc_fn = instance
            .get_typed_func::<i32, i32>(&mut store, ALLOC_EXPORT)
            .map_err(|_| LoaderError::ExportNotFound(ALLOC_EXPORT.to_string()))?;

        let dealloc_fn = instance
            .get_typed_func::<(i32, i32), ()>(&mut store, DEALLOC_EXPORT)
            .map_err(|_| LoaderError::ExportNotFound(DEALLOC_EXPORT.to_string()))?;

        Ok(ModuleSession {
            store,
            instance,
            memory,
            alloc_fn,
            dealloc_fn,
            fuel_limit: self.config.fuel_limit,
        })
    }
}

impl ModuleSession {
    pub(crate) fn read_manifest(&mut self) -> Result<ModuleManifest, LoaderError> {
        let manifest_fn = self
            .instance
            .get_typed_func::<(), i64>(&mut self.store, MANIFEST_EXPORT)
            .map_err(|_| LoaderError::ExportNotFound(MANIFEST_EXPORT.to_string()))?;

        let packed = manifest_fn
            .call(&mut self.store, ())
            .map_err(|e| call_error(MANIFEST_EXPORT, e))?;

        let bytes = self.take_buffer(packed)?;
        rmp_serde::from_slice(&bytes).map_err(LoaderError::Deserialization)
    }

    /// Call a static-dispatch method export
    pub(crate) fn call_static(
        &mut self,
        export: &str,
        args: &[String],
    ) -> Result<CallResult, LoaderError> {
        let func = self
            .instance
            .get_typed_func::<(i32, i32), i64>(&mut self.store, export)
            .map_err(|_| LoaderError::ExportNotFound(export.to_string()))?;

        let (args_ptr, args_len) = self.write_args(args)?;
        self.refuel()?;

        let packed = func
            .call(&mut self.store, (args_ptr, args_len))
            .map_err(|e| call_error(export, e))?;

        self.dealloc_fn
            .call(&mut self.store, (args_ptr, args_len))
            .ok();
        self.decode_result(packed)
    }

    /// Call an instance-dispatch method export (leading instance handle)
    pub(crate) fn call_instance(
        &mut self,
        export: &str,
        handle: i32,
        args: &[String],
    ) -> Result<CallResult, LoaderError> {
        let func = self
            .instance
            .get_typed_func::<(i32, i32, i32), i64>(&mut self.store, export)
            .map_err(|_| LoaderError::ExportNotFound(export.to_string()))?;

        let (args_ptr, args_len) = self.write_args(args)?;
        self.refuel()?;

        let packed = func
            .call(&mut self.store, (handle, args_ptr, args_len))
            .map_err(|e| call_error(export, e))?;

        self.dealloc_fn
            .call(&mut self.store, (args_ptr, args_len))
            .ok();
        self.decode_result(packed)
    }

    /// Call a service constructor export, returning the instance handle
    pub(crate) fn call_constructor(&mut self, export: &str) -> Result<i32, LoaderError> {
        let ctor = self
            .instance
            .get_typed_func::<(), i32>(&mut self.store, export)
            .map_err(|_| LoaderError::ExportNotFound(export.to_string()))?;

        self.refuel()?;
        ctor.call(&mut self.store, ())
            .map_err(|e| call_error(export, e))
    }

    fn refuel(&mut self) -> Result<(), LoaderError> {
        self.store
            .set_fuel(self.fuel_limit)
            .map_err(|e| LoaderError::StoreConfig(format!("Failed to set fuel: {}", e)))
    }

    fn write_args(&mut self, args: &[String]) -> Result<(i32, i32), LoaderError> {
        let bytes = rmp_serde::to_vec(args)
            .map_err(|e| LoaderError::MemoryAccess(format!("Failed to serialize args: {}", e)))?;

        let len: i32 = bytes.len().try_into().map_err(|_| {
            LoaderError::MemoryAccess(format!(
                "Arguments too large: {} bytes exceeds i32::MAX",
                bytes.len()
            ))
        })?;

        self.refuel()?;
        let ptr = self
            .alloc_fn
            .call(&mut self.store, len)
            .map_err(|e| call_error(ALLOC_EXPORT, e))?;

        self.memory
            .write(&mut self.store, ptr as usize, &bytes)
            .map_err(|e| LoaderError::MemoryAccess(format!("Failed to write args: {}", e)))?;

        Ok((ptr, len))
    }

    fn decode_result(&mut self, packed: i64) -> Result<CallResult, LoaderError> {
        let bytes = self.take_buffer(packed)?;
        rmp_serde::from_slice(&bytes).map_err(LoaderError::Deserialization)
    }

    /// Validate a packed ptr/len, copy the buffer out and release it
    fn take_buffer(&mut self, packed: i64) -> Result<Vec<u8>, LoaderError> {
        let (ptr, len) = unpack_ptr_len(packed);
        if ptr < 0 || len < 0 {
            return Err(LoaderError::MemoryAccess(format!(
                "Invalid buffer pointer/length: ptr={}, len={}",
                ptr, len
            )));
        }

        let bytes = self.read_memory(ptr as usize, len as usize)?;

        if let Err(e) = self.dealloc_fn.call(&mut self.store, (ptr, len)) {
            tracing::warn!(error = %e, "Failed to release guest buffer");
        }
        Ok(bytes)
    }

    fn read_memory(&self, ptr: usize, len: usize) -> Result<Vec<u8>, LoaderError> {
        let data = self.memory.data(&self.store);
        let end = ptr.checked_add(len).ok_or_else(|| {
            LoaderError::MemoryAccess(format!("Integer overflow: ptr={}, len={}", ptr, len))
        })?;
        if end > data.len() {
            return Err(LoaderError::MemoryAccess(format!(
                "Out of bounds: ptr={}, len={}, memory_size={}",
                ptr,
                len,
                data.len()
            )));
        }
        Ok(data[ptr..end].to_vec())
    }
}

fn call_error(export: &str, e: anyhow::Error) -> LoaderError {
    if e.downcast_ref::<Trap>()
        .is_some_and(|t| *t == Trap::OutOfFuel)
    {
        LoaderError::FuelExhausted
    } else {
        LoaderError::ExportCall {
            export: export.to_string(),
            source: e,
        }
    }
}
