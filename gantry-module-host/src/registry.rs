//! Loaded-module registry
//!
//! An explicit, append-only set of loaded modules keyed by identity. The
//! registry is owned by the startup sequence and threaded through it by
//! reference; it is never global state.

use crate::identity::ModuleIdentity;
use crate::loader::LoadedModule;
use std::collections::HashMap;

/// The set of modules loaded into the host process
#[derive(Default)]
pub struct ModuleRegistry {
    modules: HashMap<ModuleIdentity, LoadedModule>,
}

impl ModuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
        }
    }

    /// True if a module with this identity is already loaded
    pub fn contains(&self, identity: &ModuleIdentity) -> bool {
        self.modules.contains_key(identity)
    }

    /// Register a newly loaded module
    ///
    /// The registry is append-only: on an identity tie the existing entry
    /// wins and the new module is dropped. Returns whether the module was
    /// registered.
    pub fn register(&mut self, module: LoadedModule) -> bool {
        if self.modules.contains_key(&module.identity) {
            return false;
        }
        tracing::info!(module = %module.identity, "Module loaded");
        self.modules.insert(module.identity.clone(), module);
        true
    }

    /// First module whose simple name matches, ignoring ASCII case
    pub fn find_by_name(&self, name: &str) -> Option<&LoadedModule> {
        self.modules.values().find(|m| m.identity.matches_name(name))
    }

    /// Mutable access to a module by simple name, ignoring ASCII case
    pub fn find_by_name_mut(&mut self, name: &str) -> Option<&mut LoadedModule> {
        self.modules
            .values_mut()
            .find(|m| m.identity.matches_name(name))
    }

    /// Identities of every loaded module
    pub fn identities(&self) -> impl Iterator<Item = &ModuleIdentity> {
        self.modules.keys()
    }

    /// Number of loaded modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// True if nothing has been loaded
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_registry() {
        let registry = ModuleRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.find_by_name("inspector").is_none());
        assert!(!registry.contains(&ModuleIdentity::new("inspector", "1.0", Vec::new())));
    }
}
