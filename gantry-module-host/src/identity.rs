//! Module identity
//!
//! The deduplication key the loader uses to decide whether a candidate file
//! is the same unit of code as a module already in the process.

use gantry_module_api::ModuleDescriptor;
use std::fmt;
use std::hash::{Hash, Hasher};

/// The (name, version, signing key) tuple a module is deduplicated on
///
/// Equality is ASCII-case-insensitive on the name and exact on the version
/// and key bytes. An absent signing key is normalized to an empty key, so
/// two unsigned modules with equal name and version compare equal.
#[derive(Debug, Clone)]
pub struct ModuleIdentity {
    name: String,
    version: String,
    signing_key: Vec<u8>,
}

impl ModuleIdentity {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        signing_key: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            signing_key: signing_key.into(),
        }
    }

    /// Identity declared by a module descriptor
    pub fn from_descriptor(descriptor: &ModuleDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            signing_key: descriptor.signing_key.clone().unwrap_or_default(),
        }
    }

    /// Simple module name, in its declared casing
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Exact version string
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Signing key bytes; empty when the module is unsigned
    pub fn signing_key(&self) -> &[u8] {
        &self.signing_key
    }

    /// True if `name` is this identity's simple name, ignoring ASCII case
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl PartialEq for ModuleIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
            && self.version == other.version
            && self.signing_key == other.signing_key
    }
}

impl Eq for ModuleIdentity {}

impl Hash for ModuleIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // must agree with the case-insensitive PartialEq
        self.name.to_ascii_lowercase().hash(state);
        self.version.hash(state);
        self.signing_key.hash(state);
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.name, self.version)?;
        if !self.signing_key.is_empty() {
            write!(f, " (signed)")?;
        }
        Ok(())
    }
}
