//! Cache configuration.

use std::num::NonZeroUsize;

use serde::Deserialize;

// Default values for cache configuration
const DEFAULT_DOCUMENT_LIMIT: usize = 1000;
const DEFAULT_LIST_LIMIT: usize = 100;

/// Limits for the keyed cache.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the local cache. When disabled, optimistic mutation and
    /// propagation become no-ops and every read goes to the remote store.
    pub enable_cache: bool,
    /// Maximum single-document entries.
    pub document_limit: usize,
    /// Maximum cached list entries.
    pub list_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enable_cache: true,
            document_limit: DEFAULT_DOCUMENT_LIMIT,
            list_limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl CacheConfig {
    pub fn is_enabled(&self) -> bool {
        self.enable_cache
    }

    /// Returns the document limit as NonZeroUsize, clamping to 1 if zero.
    pub fn document_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.document_limit).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the list limit as NonZeroUsize, clamping to 1 if zero.
    pub fn list_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.list_limit).unwrap_or(NonZeroUsize::MIN)
    }
}
