//! gantry-module-api: Shared types for the gantry module system
//!
//! This crate defines the protocol between the host and a bundled guest
//! module (wasm). Communication uses MessagePack serialization.

use serde::{Deserialize, Serialize};

/// ABI version for compatibility checking
pub const ABI_VERSION: u32 = 1;

/// Name of the linear memory export every module must provide
pub const MEMORY_EXPORT: &str = "memory";

/// Export returning the packed ptr/len of the MessagePack-encoded manifest
pub const MANIFEST_EXPORT: &str = "module_manifest";

/// Export the host calls to allocate a guest buffer
pub const ALLOC_EXPORT: &str = "module_alloc";

/// Export the host calls to release a guest buffer
pub const DEALLOC_EXPORT: &str = "module_dealloc";

/// Export name of a service method, e.g. `"demo.inspector.Overlay#create_instance"`
pub fn method_export_name(service: &str, method: &str) -> String {
    format!("{}#{}", service, method)
}

/// Export name of a service constructor
pub fn constructor_export_name(service: &str) -> String {
    format!("{}#construct", service)
}

/// Identity and provenance of a bundled module
///
/// The (name, version, signing key) triple is the module's identity as far
/// as the host is concerned; two modules with an equal triple are the same
/// unit of code regardless of where their files live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Simple module name (matched case-insensitively by the host)
    pub name: String,

    /// Exact version string
    pub version: String,

    /// Publisher signing key bytes, if the module is signed
    #[serde(default)]
    pub signing_key: Option<Vec<u8>>,

    /// Module author
    #[serde(default)]
    pub author: Option<String>,

    /// Short description for log output
    #[serde(default)]
    pub description: Option<String>,
}

/// A named unit inside a module on which methods are resolved
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Fully qualified service name (e.g. "demo.inspector.Overlay")
    pub name: String,

    /// Methods this service exposes
    #[serde(default)]
    pub methods: Vec<MethodSpec>,
}

/// A callable method declared by a service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodSpec {
    /// Method name (also the suffix of the wasm export)
    pub name: String,

    /// Declared parameter type names, in order
    #[serde(default)]
    pub params: Vec<String>,

    /// Whether the method is called on the service itself or on an instance
    pub kind: MethodKind,
}

/// Dispatch kind of a method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    /// Called on the service itself; export shape `(i32, i32) -> i64`
    Static,

    /// Called on a constructed instance; export shape `(i32, i32, i32) -> i64`
    Instance,
}

/// Module manifest with ABI version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// ABI version for compatibility
    pub abi_version: u32,

    /// Module identity and provenance
    pub module: ModuleDescriptor,

    /// Services declared by this module
    #[serde(default)]
    pub services: Vec<ServiceSpec>,
}

/// Result of invoking a method inside a module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CallResult {
    /// Invocation produced a value
    Value(String),

    /// Invocation completed without producing a value
    Void,

    /// The module reported a fault
    Fault(CallFault),
}

/// Fault details reported by a module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallFault {
    /// Module-defined fault code
    pub code: u8,

    /// Human-readable fault message
    pub message: String,
}

impl ModuleDescriptor {
    /// Create a descriptor with the mandatory identity fields
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            signing_key: None,
            author: None,
            description: None,
        }
    }

    /// Attach the publisher signing key
    pub fn signed(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.signing_key = Some(key.into());
        self
    }

    /// Set the author
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Hex fingerprint of the signing key, for log output
    pub fn key_fingerprint(&self) -> Option<String> {
        self.signing_key
            .as_ref()
            .map(|key| blake3::hash(key).to_hex().to_string())
    }
}

impl ServiceSpec {
    /// Create a service spec with no methods
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// Add a method
    pub fn method(mut self, method: MethodSpec) -> Self {
        self.methods.push(method);
        self
    }
}

impl MethodSpec {
    /// Create a static method with an empty parameter signature
    pub fn static_method(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            kind: MethodKind::Static,
        }
    }

    /// Create an instance method with an empty parameter signature
    pub fn instance_method(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            kind: MethodKind::Instance,
        }
    }

    /// Append a parameter type name
    pub fn param(mut self, param: impl Into<String>) -> Self {
        self.params.push(param.into());
        self
    }
}

impl ModuleManifest {
    /// Create a manifest for the current ABI version
    pub fn new(module: ModuleDescriptor) -> Self {
        Self {
            abi_version: ABI_VERSION,
            module,
            services: Vec::new(),
        }
    }

    /// Declare a service
    pub fn service(mut self, service: ServiceSpec) -> Self {
        self.services.push(service);
        self
    }

    /// Look up a declared service by exact fully-qualified name
    pub fn find_service(&self, name: &str) -> Option<&ServiceSpec> {
        self.services.iter().find(|s| s.name == name)
    }
}

impl CallResult {
    /// Create a value result
    pub fn value(output: impl Into<String>) -> Self {
        Self::Value(output.into())
    }

    /// Create a fault result
    pub fn fault(code: u8, message: impl Into<String>) -> Self {
        Self::Fault(CallFault {
            code,
            message: message.into(),
        })
    }

    /// True unless the module reported a fault
    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Fault(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_serialization() {
        let manifest = ModuleManifest::new(
            ModuleDescriptor::new("inspector", "1.2.0").author("gantry"),
        )
        .service(
            ServiceSpec::new("demo.inspector.Overlay")
                .method(MethodSpec::static_method("create_instance"))
                .method(MethodSpec::instance_method("refresh").param("string")),
        );

        let bytes = rmp_serde::to_vec(&manifest).unwrap();
        let decoded: ModuleManifest = rmp_serde::from_slice(&bytes).unwrap();

        assert_eq!(decoded.abi_version, ABI_VERSION);
        assert_eq!(decoded.module.name, "inspector");
        assert_eq!(decoded.services.len(), 1);
        assert_eq!(decoded.services[0].methods.len(), 2);
        assert_eq!(decoded.services[0].methods[1].params, vec!["string"]);
        assert_eq!(decoded.services[0].methods[1].kind, MethodKind::Instance);
    }

    #[test]
    fn test_call_result_serialization() {
        let result = CallResult::value("attached");
        let bytes = rmp_serde::to_vec(&result).unwrap();
        let decoded: CallResult = rmp_serde::from_slice(&bytes).unwrap();

        match decoded {
            CallResult::Value(s) => assert_eq!(s, "attached"),
            _ => panic!("Expected value"),
        }

        let void = rmp_serde::to_vec(&CallResult::Void).unwrap();
        let decoded: CallResult = rmp_serde::from_slice(&void).unwrap();
        assert!(decoded.is_ok());
        assert!(matches!(decoded, CallResult::Void));
    }

    #[test]
    fn test_export_names() {
        assert_eq!(
            method_export_name("demo.inspector.Overlay", "create_instance"),
            "demo.inspector.Overlay#create_instance"
        );
        assert_eq!(
            constructor_export_name("demo.inspector.Overlay"),
            "demo.inspector.Overlay#construct"
        );
    }

    #[test]
    fn test_key_fingerprint() {
        let unsigned = ModuleDescriptor::new("a", "1.0");
        assert!(unsigned.key_fingerprint().is_none());

        let signed = ModuleDescriptor::new("a", "1.0").signed([0xAB; 8]);
        let fp = signed.key_fingerprint().unwrap();
        assert_eq!(fp.len(), 64);
    }

    #[test]
    fn test_find_service_is_exact() {
        let manifest = ModuleManifest::new(ModuleDescriptor::new("a", "1.0"))
            .service(ServiceSpec::new("demo.Overlay"));

        assert!(manifest.find_service("demo.Overlay").is_some());
        assert!(manifest.find_service("demo.overlay").is_none());
        assert!(manifest.find_service("Overlay").is_none());
    }
}
