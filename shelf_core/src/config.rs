//! Engine configuration.

/// Default number of entries shown per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Default cap on vertices visited by a single traversal.
pub const DEFAULT_TRAVERSAL_LIMIT: usize = 100_000;

/// Tunables for a [`Library`](crate::Library).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Entries per listing page (at least 1).
    pub page_size: usize,
    /// Vertex visits allowed per traversal before it aborts with
    /// `TraversalLimit`.
    pub traversal_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            traversal_limit: DEFAULT_TRAVERSAL_LIMIT,
        }
    }
}

impl EngineConfig {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_traversal_limit(mut self, limit: usize) -> Self {
        self.traversal_limit = limit;
        self
    }
}
