//! Explicit backend registry.
//!
//! Backends are chosen by a configuration key resolved at stack startup
//! through this registry. There is no runtime class loading: every
//! available backend registers a plain constructor function.

use crate::adapter::SipEntityCache;
use crate::error::{CacheError, CacheResult};
use crate::memory::InMemoryCache;
use std::collections::HashMap;
use std::sync::Arc;

/// A constructor for a cache backend.
pub type CacheFactory = Box<dyn Fn() -> Arc<dyn SipEntityCache> + Send + Sync>;

/// Maps configuration keys to backend constructors.
pub struct CacheRegistry {
    factories: HashMap<String, CacheFactory>,
}

impl CacheRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Creates a registry with the built-in backends registered.
    ///
    /// Currently that is only `"memory"`; distributed backends live in
    /// their own crates and register themselves at startup.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("memory", || Arc::new(InMemoryCache::new()));
        registry
    }

    /// Registers a backend constructor under a key.
    ///
    /// Re-registering a key replaces the previous constructor.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn SipEntityCache> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Constructs the backend registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::UnknownBackend`] if no constructor is
    /// registered for the key.
    pub fn create(&self, name: &str) -> CacheResult<Arc<dyn SipEntityCache>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| CacheError::UnknownBackend {
                name: name.to_owned(),
            })
    }

    /// Returns the registered backend names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
