//! Integration tests for deduplicated directory loading

mod fixtures;

use fixtures::{loader, ModuleFixture};
use gantry_module_host::{ModuleIdentity, ModuleRegistry, ModuleScanner};
use tempfile::TempDir;

fn scanner() -> ModuleScanner {
    ModuleScanner::new(loader())
}

#[test]
fn test_duplicate_files_load_once_per_identity() {
    let temp = TempDir::new().unwrap();
    ModuleFixture::new("alpha", "1.0").write_to(temp.path(), "alpha_v1.wasm");
    ModuleFixture::new("alpha", "1.0").write_to(temp.path(), "alpha_v1_copy.wasm");
    ModuleFixture::new("alpha", "2.0").write_to(temp.path(), "alpha_v2.wasm");

    let mut registry = ModuleRegistry::new();
    let report = scanner().load_unique(temp.path(), &mut registry).unwrap();

    assert_eq!(report.loaded.len(), 2);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.failures.is_empty());
    assert_eq!(registry.len(), 2);
    assert!(registry.contains(&ModuleIdentity::new("alpha", "1.0", Vec::new())));
    assert!(registry.contains(&ModuleIdentity::new("alpha", "2.0", Vec::new())));
}

#[test]
fn test_already_loaded_identities_are_skipped() {
    let temp_a = TempDir::new().unwrap();
    ModuleFixture::new("alpha", "1.0").write_to(temp_a.path(), "alpha.wasm");

    let temp_b = TempDir::new().unwrap();
    ModuleFixture::new("alpha", "1.0").write_to(temp_b.path(), "alpha.wasm");
    ModuleFixture::new("beta", "1.0").write_to(temp_b.path(), "beta.wasm");

    let scanner = scanner();
    let mut registry = ModuleRegistry::new();
    scanner.load_unique(temp_a.path(), &mut registry).unwrap();

    let report = scanner.load_unique(temp_b.path(), &mut registry).unwrap();

    assert_eq!(report.loaded.len(), 1);
    assert!(report.loaded[0].matches_name("beta"));
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_load_unique_is_idempotent() {
    let temp = TempDir::new().unwrap();
    ModuleFixture::new("alpha", "1.0").write_to(temp.path(), "alpha.wasm");
    ModuleFixture::new("beta", "1.0").write_to(temp.path(), "beta.wasm");

    let scanner = scanner();
    let mut registry = ModuleRegistry::new();

    let first = scanner.load_unique(temp.path(), &mut registry).unwrap();
    assert_eq!(first.loaded.len(), 2);

    let second = scanner.load_unique(temp.path(), &mut registry).unwrap();
    assert!(second.loaded.is_empty());
    assert_eq!(second.skipped.len(), 2);
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_name_dedup_ignores_case() {
    let temp = TempDir::new().unwrap();
    ModuleFixture::new("Inspector", "1.0").write_to(temp.path(), "a.wasm");
    ModuleFixture::new("inspector", "1.0").write_to(temp.path(), "b.wasm");

    let mut registry = ModuleRegistry::new();
    let report = scanner().load_unique(temp.path(), &mut registry).unwrap();

    assert_eq!(report.loaded.len(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_signing_key_distinguishes_identities() {
    let temp = TempDir::new().unwrap();
    ModuleFixture::new("alpha", "1.0").write_to(temp.path(), "unsigned.wasm");
    ModuleFixture::new("alpha", "1.0")
        .signed(&[0xCA, 0xFE])
        .write_to(temp.path(), "signed.wasm");

    let mut registry = ModuleRegistry::new();
    let report = scanner().load_unique(temp.path(), &mut registry).unwrap();

    assert_eq!(report.loaded.len(), 2);
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_absent_key_matches_empty_key() {
    let temp = TempDir::new().unwrap();
    ModuleFixture::new("alpha", "1.0").write_to(temp.path(), "absent_key.wasm");
    ModuleFixture::new("alpha", "1.0")
        .signed(&[])
        .write_to(temp.path(), "empty_key.wasm");

    let mut registry = ModuleRegistry::new();
    let report = scanner().load_unique(temp.path(), &mut registry).unwrap();

    assert_eq!(report.loaded.len(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_bad_file_does_not_prevent_other_loads() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("broken.wasm"), b"not a module").unwrap();
    ModuleFixture::new("alpha", "1.0").write_to(temp.path(), "alpha.wasm");
    ModuleFixture::new("beta", "1.0").write_to(temp.path(), "beta.wasm");

    let mut registry = ModuleRegistry::new();
    let report = scanner().load_unique(temp.path(), &mut registry).unwrap();

    assert_eq!(report.loaded.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert!(!report.is_success());
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_wrong_abi_version_is_a_candidate_failure() {
    let temp = TempDir::new().unwrap();
    ModuleFixture::new("alpha", "1.0")
        .abi_version(99)
        .write_to(temp.path(), "future.wasm");
    ModuleFixture::new("beta", "1.0").write_to(temp.path(), "beta.wasm");

    let mut registry = ModuleRegistry::new();
    let report = scanner().load_unique(temp.path(), &mut registry).unwrap();

    assert_eq!(report.loaded.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(registry.len(), 1);
    assert!(registry.contains(&ModuleIdentity::new("beta", "1.0", Vec::new())));
}
