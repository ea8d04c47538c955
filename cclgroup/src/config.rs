//! Runtime toggles for the adapter.
//!
//! Both default to off. Override via environment variables (prefixed
//! `CCL_GROUP_`) or by constructing a custom `CclConfig`.

/// Adapter configuration shared by every call issued through one gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CclConfig {
    /// Pass a stable per-shape identifier with every engine call so the
    /// engine may reuse internal resources across repeated calls.
    pub cache_collectives: bool,

    /// Hand allgather's per-rank output buffers straight to the engine
    /// instead of staging through one flat receive buffer.
    pub vector_allgatherv: bool,
}

impl CclConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `CCL_GROUP_CACHE`
    /// - `CCL_GROUP_VECTOR_ALLGATHERV`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("CCL_GROUP_CACHE") {
            cfg.cache_collectives = parse_toggle(&v);
        }
        if let Ok(v) = std::env::var("CCL_GROUP_VECTOR_ALLGATHERV") {
            cfg.vector_allgatherv = parse_toggle(&v);
        }

        cfg
    }

    pub fn with_cache(mut self, on: bool) -> Self {
        self.cache_collectives = on;
        self
    }

    pub fn with_vector_allgatherv(mut self, on: bool) -> Self {
        self.vector_allgatherv = on;
        self
    }
}

fn parse_toggle(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}
