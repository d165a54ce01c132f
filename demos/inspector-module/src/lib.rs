//! Inspector module - a minimal gantry guest
//!
//! Demonstrates the bundled-module contract the bootstrap invokes:
//! a static, parameterless entry method on a declared service.

use gantry_module_sdk::prelude::*;

const SERVICE: &str = "demo.inspector.Overlay";

struct InspectorModule;

impl BundledModule for InspectorModule {
    fn manifest() -> ModuleManifest {
        ModuleManifest::new(
            ModuleDescriptor::new("inspector", "1.0.0")
                .description("Runtime inspection overlay"),
        )
        .service(ServiceSpec::new(SERVICE).method(MethodSpec::static_method("create_instance")))
    }
}

export_module!(InspectorModule);

/// Entry point invoked by the host bootstrap
#[export_name = "demo.inspector.Overlay#create_instance"]
pub extern "C" fn create_instance(args_ptr: i32, args_len: i32) -> i64 {
    let _args: Vec<String> =
        unsafe { memory::deserialize_from_ptr(args_ptr, args_len).unwrap_or_default() };

    memory::serialize_and_return(&CallResult::value("inspector overlay attached"))
}
