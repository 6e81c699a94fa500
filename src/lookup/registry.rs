//! Registry of the lookup backends available to a run.

use std::collections::HashMap;
use std::sync::Arc;

use super::{CrossRefLookup, Lookup, LookupError, SemanticScholarLookup};
use crate::config::LookupSettings;

/// Registry for all available lookup backends
#[derive(Debug, Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn Lookup>>,
}

impl BackendRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every built-in backend configured from settings
    ///
    /// `base_url` only applies to the selected backend.
    pub fn from_settings(settings: &LookupSettings) -> Result<Self, LookupError> {
        let mut registry = Self::new();
        let timeout = settings.timeout();
        let base_url_for = |id: &str| {
            settings
                .base_url
                .clone()
                .filter(|_| settings.backend == id)
        };

        let mut semantic =
            SemanticScholarLookup::new(settings.semantic_scholar_api_key.clone(), timeout)?;
        if let Some(url) = base_url_for("semantic") {
            semantic = semantic.with_base_url(url);
        }
        registry.register(Arc::new(semantic));

        let mut crossref = CrossRefLookup::new(settings.crossref_mailto.clone(), timeout)?;
        if let Some(url) = base_url_for("crossref") {
            crossref = crossref.with_base_url(url);
        }
        registry.register(Arc::new(crossref));

        Ok(registry)
    }

    /// Register a new backend
    pub fn register(&mut self, backend: Arc<dyn Lookup>) {
        self.backends.insert(backend.id().to_string(), backend);
    }

    /// Get a backend by ID
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Lookup>> {
        self.backends.get(id)
    }

    /// Get a backend by ID, returning an error if not found
    pub fn get_required(&self, id: &str) -> Result<&Arc<dyn Lookup>, LookupError> {
        self.get(id).ok_or_else(|| {
            let mut known: Vec<&str> = self.ids().collect();
            known.sort_unstable();
            LookupError::InvalidRequest(format!(
                "Unknown lookup backend '{}' (available: {})",
                id,
                known.join(", ")
            ))
        })
    }

    /// Get all backend IDs
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
