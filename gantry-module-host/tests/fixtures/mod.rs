//! Wasm fixture assembly for host tests
//!
//! Builds tiny guest modules in WAT, each with a real MessagePack manifest
//! and canned call results baked into data segments, so the tests exercise
//! the full probe/load/invoke path without a wasm toolchain.

#![allow(dead_code)]

use gantry_module_api::{
    constructor_export_name, method_export_name, CallResult, MethodKind, ModuleDescriptor,
    ModuleManifest, ServiceSpec,
};
use gantry_module_host::{LoaderConfig, ModuleLoader, ModuleRegistry};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub struct ModuleFixture {
    pub manifest: ModuleManifest,
    results: Vec<(String, String, CallResult)>,
    trapping_constructors: Vec<String>,
}

impl ModuleFixture {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            manifest: ModuleManifest::new(ModuleDescriptor::new(name, version)),
            results: Vec::new(),
            trapping_constructors: Vec::new(),
        }
    }

    pub fn signed(mut self, key: &[u8]) -> Self {
        self.manifest.module.signing_key = Some(key.to_vec());
        self
    }

    pub fn abi_version(mut self, version: u32) -> Self {
        self.manifest.abi_version = version;
        self
    }

    pub fn service(mut self, service: ServiceSpec) -> Self {
        self.manifest.services.push(service);
        self
    }

    /// Emit an export for (service, method) returning this canned result
    pub fn result(mut self, service: &str, method: &str, result: CallResult) -> Self {
        self.results
            .push((service.to_string(), method.to_string(), result));
        self
    }

    /// Emit a constructor for `service` that traps instead of returning
    pub fn trapping_constructor(mut self, service: &str) -> Self {
        self.trapping_constructors.push(service.to_string());
        self
    }

    pub fn wasm(&self) -> Vec<u8> {
        wat::parse_str(self.wat()).expect("valid fixture wat")
    }

    pub fn write_to(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        std::fs::write(&path, self.wasm()).expect("write fixture module");
        path
    }

    fn wat(&self) -> String {
        let mut out = String::new();
        out.push_str("(module\n");
        out.push_str("  (memory (export \"memory\") 2)\n");
        out.push_str("  (global $next (mut i32) (i32.const 65536))\n");
        out.push_str(concat!(
            "  (func (export \"module_alloc\") (param $size i32) (result i32)\n",
            "    (local $ptr i32)\n",
            "    global.get $next\n",
            "    local.set $ptr\n",
            "    global.get $next\n",
            "    local.get $size\n",
            "    i32.add\n",
            "    global.set $next\n",
            "    local.get $ptr)\n",
        ));
        out.push_str("  (func (export \"module_dealloc\") (param i32 i32))\n");

        let manifest_bytes = rmp_serde::to_vec(&self.manifest).expect("serialize manifest");
        let mut offset: i64 = 8;

        writeln!(
            out,
            "  (data (i32.const {}) \"{}\")",
            offset,
            data_string(&manifest_bytes)
        )
        .unwrap();
        writeln!(
            out,
            "  (func (export \"module_manifest\") (result i64) i64.const {})",
            pack(offset, manifest_bytes.len())
        )
        .unwrap();
        offset += manifest_bytes.len() as i64;

        for (service, method, result) in &self.results {
            let bytes = rmp_serde::to_vec(result).expect("serialize result");
            writeln!(
                out,
                "  (data (i32.const {}) \"{}\")",
                offset,
                data_string(&bytes)
            )
            .unwrap();

            let params = match self.kind_of(service, method) {
                MethodKind::Instance => "(param i32 i32 i32)",
                MethodKind::Static => "(param i32 i32)",
            };
            writeln!(
                out,
                "  (func (export \"{}\") {} (result i64) i64.const {})",
                method_export_name(service, method),
                params,
                pack(offset, bytes.len())
            )
            .unwrap();
            offset += bytes.len() as i64;
        }

        for service in self.constructor_services() {
            let export = constructor_export_name(&service);
            if self.trapping_constructors.contains(&service) {
                writeln!(out, "  (func (export \"{}\") (result i32) unreachable)", export)
                    .unwrap();
            } else {
                writeln!(out, "  (func (export \"{}\") (result i32) i32.const 1)", export)
                    .unwrap();
            }
        }

        out.push_str(")\n");
        out
    }

    fn kind_of(&self, service: &str, method: &str) -> MethodKind {
        self.manifest
            .services
            .iter()
            .find(|s| s.name == service)
            .and_then(|s| s.methods.iter().find(|m| m.name == method))
            .map(|m| m.kind)
            .unwrap_or(MethodKind::Static)
    }

    /// Services needing a constructor export: any with instance methods,
    /// plus those explicitly marked as trapping
    fn constructor_services(&self) -> Vec<String> {
        let mut services: Vec<String> = self
            .manifest
            .services
            .iter()
            .filter(|s| s.methods.iter().any(|m| m.kind == MethodKind::Instance))
            .map(|s| s.name.clone())
            .collect();
        for service in &self.trapping_constructors {
            if !services.contains(service) {
                services.push(service.clone());
            }
        }
        services
    }
}

/// Escape bytes for a WAT data-segment string
fn data_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("\\{:02x}", b)).collect()
}

fn pack(ptr: i64, len: usize) -> i64 {
    (ptr << 32) | (len as i64 & 0xFFFF_FFFF)
}

pub fn loader() -> ModuleLoader {
    ModuleLoader::new(LoaderConfig::default()).expect("create loader")
}

/// Probe, load and register a fixture directly, bypassing the scanner
pub fn load_fixture(loader: &ModuleLoader, registry: &mut ModuleRegistry, fixture: &ModuleFixture) {
    let probed = loader.probe(&fixture.wasm()).expect("probe fixture");
    let loaded = loader.load(probed).expect("load fixture");
    registry.register(loaded);
}
