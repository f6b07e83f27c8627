//! Extension configuration.

/// Worker-level configuration for the telemetry extension.
#[derive(Debug, Clone, Default)]
pub struct ExtensionConfig {
    /// Maximum number of peer identity records cached per worker.
    ///
    /// `0` selects the built-in default
    /// ([`crate::identity_cache::DEFAULT_MAX_CACHE_SIZE`]); a negative
    /// value disables caching entirely, so every lookup re-fetches and
    /// re-parses peer metadata — more work, always-fresh data.
    pub max_peer_cache_size: i32,
}
