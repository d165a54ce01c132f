//! gantry-module-sdk: SDK for authoring gantry guest modules
//!
//! Provides the memory plumbing and export boilerplate a bundled module
//! needs to speak the host ABI.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gantry_module_sdk::prelude::*;
//!
//! struct Inspector;
//!
//! impl BundledModule for Inspector {
//!     fn manifest() -> ModuleManifest {
//!         ModuleManifest::new(ModuleDescriptor::new("inspector", "1.0.0")).service(
//!             ServiceSpec::new("demo.inspector.Overlay")
//!                 .method(MethodSpec::static_method("create_instance")),
//!         )
//!     }
//! }
//!
//! // Generates module_manifest / module_alloc / module_dealloc
//! export_module!(Inspector);
//!
//! // Method exports carry the "<service>#<method>" names the host resolves
//! #[export_name = "demo.inspector.Overlay#create_instance"]
//! pub extern "C" fn create_instance(args_ptr: i32, args_len: i32) -> i64 {
//!     let _args: Vec<String> =
//!         unsafe { memory::deserialize_from_ptr(args_ptr, args_len).unwrap_or_default() };
//!     memory::serialize_and_return(&CallResult::value("attached"))
//! }
//! ```

use std::alloc::{alloc, dealloc, Layout};

// Re-export everything from gantry-module-api
pub use gantry_module_api::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{export_module, memory, BundledModule};
    pub use gantry_module_api::{
        CallFault, CallResult, MethodKind, MethodSpec, ModuleDescriptor, ModuleManifest,
        ServiceSpec, ABI_VERSION,
    };
}

/// Trait that bundled modules implement
pub trait BundledModule {
    /// Returns the manifest declaring the module's identity and services
    fn manifest() -> ModuleManifest;
}

/// Memory utilities for wasm guest development
pub mod memory {
    use super::*;

    /// Allocate memory in the wasm linear memory
    ///
    /// # Safety
    /// This function is safe to call from the host.
    #[inline]
    pub fn module_alloc(size: i32) -> i32 {
        if size <= 0 {
            return 0;
        }
        let layout = Layout::from_size_align(size as usize, 1).unwrap();
        unsafe { alloc(layout) as i32 }
    }

    /// Deallocate memory in the wasm linear memory
    ///
    /// # Safety
    /// The ptr must have been allocated by `module_alloc` with the same size.
    #[inline]
    pub fn module_dealloc(ptr: i32, size: i32) {
        if ptr == 0 || size <= 0 {
            return;
        }
        let layout = Layout::from_size_align(size as usize, 1).unwrap();
        unsafe { dealloc(ptr as *mut u8, layout) }
    }

    /// Pack a pointer and length into a single i64 value
    ///
    /// This is the standard way to return two values from a wasm function
    /// since wasm32-unknown-unknown doesn't support multi-value returns.
    #[inline]
    pub fn pack_ptr_len(ptr: i32, len: i32) -> i64 {
        ((ptr as i64) << 32) | (len as i64 & 0xFFFFFFFF)
    }

    /// Serialize data and return it as an allocated buffer
    ///
    /// Returns a packed i64 containing the pointer and length.
    pub fn serialize_and_return<T: serde::Serialize>(data: &T) -> i64 {
        let bytes = rmp_serde::to_vec(data).unwrap_or_default();
        let len = bytes.len() as i32;
        let ptr = module_alloc(len);

        if ptr != 0 && len > 0 {
            unsafe {
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr as *mut u8, len as usize);
            }
        }

        pack_ptr_len(ptr, len)
    }

    /// Deserialize data from a raw pointer and length
    ///
    /// # Safety
    /// The pointer must be valid and point to `len` bytes of valid
    /// MessagePack data.
    pub unsafe fn deserialize_from_ptr<T: serde::de::DeserializeOwned>(
        ptr: i32,
        len: i32,
    ) -> Option<T> {
        if ptr == 0 || len <= 0 {
            return None;
        }
        let slice = std::slice::from_raw_parts(ptr as *const u8, len as usize);
        rmp_serde::from_slice(slice).ok()
    }
}

/// Macro to export the ambient module functions
///
/// Generates the `module_manifest`, `module_alloc` and `module_dealloc`
/// exports required by the host. Method and constructor exports are written
/// by hand with `#[export_name = "<service>#<method>"]`.
#[macro_export]
macro_rules! export_module {
    ($module:ty) => {
        #[no_mangle]
        pub extern "C" fn module_manifest() -> i64 {
            let manifest = <$module as $crate::BundledModule>::manifest();
            $crate::memory::serialize_and_return(&manifest)
        }

        #[no_mangle]
        pub extern "C" fn module_alloc(size: i32) -> i32 {
            $crate::memory::module_alloc(size)
        }

        #[no_mangle]
        pub extern "C" fn module_dealloc(ptr: i32, size: i32) {
            $crate::memory::module_dealloc(ptr, size)
        }
    };
}
