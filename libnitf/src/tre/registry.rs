use std::collections::HashMap;

use tracing::{debug, warn};

use super::TreDescriptor;
use crate::error::Result;

const BUILTIN_DESCRIPTORS: &str = include_str!("builtin.tre");

/// Tag name to layout lookup used while decoding TRE runs
///
/// Registering a layout for a tag that is already known replaces it.
#[derive(Debug, Clone)]
pub struct TreRegistry {
    descriptors: HashMap<String, TreDescriptor>,
}

impl Default for TreRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl TreRegistry {
    /// A registry that decodes nothing; every TRE stays opaque
    #[must_use]
    pub fn empty() -> Self {
        Self {
            descriptors: HashMap::new(),
        }
    }

    /// A registry holding the layouts that ship with this crate
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        if let Err(e) = registry.register_source(BUILTIN_DESCRIPTORS) {
            warn!("built-in TRE descriptors not registered: {e}");
        }
        registry
    }

    /// Adds one layout
    pub fn register(&mut self, descriptor: TreDescriptor) {
        debug!("registering TRE descriptor {}", descriptor.name());
        self.descriptors
            .insert(descriptor.name().to_owned(), descriptor);
    }

    /// Parses descriptor source text and registers every layout in it
    ///
    /// Returns the number of layouts registered.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Descriptor`] if the text is not valid descriptor source; nothing
    /// is registered in that case
    pub fn register_source(&mut self, source: &str) -> Result<usize> {
        let descriptors = TreDescriptor::parse_all(source)?;
        let count = descriptors.len();
        for descriptor in descriptors {
            self.register(descriptor);
        }
        Ok(count)
    }

    /// Looks up the layout for a tag
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TreDescriptor> {
        self.descriptors.get(name)
    }

    /// Whether a layout is registered for the tag
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    /// Registered tags, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.descriptors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::{TreDescriptor, TreRegistry, BUILTIN_DESCRIPTORS};

    #[test]
    fn builtin_source_parses() {
        let descriptors = TreDescriptor::parse_all(BUILTIN_DESCRIPTORS).unwrap();
        assert_eq!(descriptors.len(), 4);
        assert_eq!(
            TreRegistry::with_builtins().names(),
            vec!["BLOCKA", "ENGRDA", "STDIDC", "USE00A"]
        );
    }

    #[test]
    #[traced_test]
    fn builtins_register_cleanly() {
        assert!(TreRegistry::with_builtins().contains("ENGRDA"));
        assert!(logs_contain("registering TRE descriptor ENGRDA"));
        assert!(!logs_contain("not registered"));
    }

    #[test]
    fn user_source_extends_registry() {
        let mut registry = TreRegistry::empty();
        assert!(!registry.contains("MYTREA"));
        assert_eq!(
            registry
                .register_source("tre MYTREA 3 field A 3 string end")
                .unwrap(),
            1
        );
        assert_eq!(registry.get("MYTREA").unwrap().length(), Some(3));
        assert!(registry.register_source("tre BROKEN").is_err());
    }
}
