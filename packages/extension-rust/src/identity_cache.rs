//! Per-worker cache of workload identities.

use std::cell::RefCell;
use std::sync::Arc;

use indexmap::IndexMap;
use meshlens_core::{Error, IdentityRecord, Result};
use tracing::{debug, info, warn};

use crate::config::ExtensionConfig;
use crate::direction::TrafficDirection;
use crate::host::{metadata_exchange, paths, Host};

/// Maximum peer entries held when the configured size is zero.
pub const DEFAULT_MAX_CACHE_SIZE: usize = 500;

/// Resolves local and peer workload identity with at most one metadata
/// parse per unique peer, under bounded memory.
///
/// One instance per worker; requests on a worker run sequentially, so the
/// interior `RefCell` is never contended and no locking is needed. Records
/// hand out as `Arc<IdentityRecord>`, keeping them alive for readers even
/// after eviction.
pub struct IdentityCache {
    local: Arc<IdentityRecord>,
    peers: RefCell<IndexMap<String, Arc<IdentityRecord>>>,
    /// `None` disables caching entirely.
    capacity: Option<usize>,
    empty: Arc<IdentityRecord>,
}

impl IdentityCache {
    /// Creates the cache and resolves the local identity once.
    ///
    /// Missing local metadata degrades to the empty record with a warning;
    /// it never blocks request processing.
    #[must_use]
    pub fn new<H: Host + ?Sized>(host: &H, config: &ExtensionConfig) -> Self {
        let local = match extract_local_identity(host) {
            Ok(record) => Arc::new(record),
            Err(err) => {
                warn!(%err, "cannot extract local identity, falling back to empty record");
                Arc::new(IdentityRecord::default())
            }
        };
        let capacity = match config.max_peer_cache_size {
            size if size < 0 => None,
            0 => Some(DEFAULT_MAX_CACHE_SIZE),
            size => usize::try_from(size).ok(),
        };
        Self {
            local,
            peers: RefCell::new(IndexMap::new()),
            capacity,
            empty: Arc::new(IdentityRecord::default()),
        }
    }

    /// The process-local identity resolved at worker start-up.
    #[must_use]
    pub fn local(&self) -> Arc<IdentityRecord> {
        Arc::clone(&self.local)
    }

    /// Resolves the identity of the peer on the active connection.
    ///
    /// An absent peer id or metadata blob yields the empty record — the
    /// peer is not yet known, which is a soft miss, not an error. With
    /// caching disabled the metadata is re-fetched and re-parsed on every
    /// call.
    #[must_use]
    pub fn peer<H: Host + ?Sized>(&self, host: &H, direction: TrafficDirection) -> Arc<IdentityRecord> {
        let (id_key, metadata_key) = peer_keys(direction);

        let Some(capacity) = self.capacity else {
            return fetch_peer_identity(host, metadata_key)
                .map_or_else(|| self.empty(), Arc::new);
        };

        let Some(peer_id) = host
            .scalar(&[paths::FILTER_STATE, id_key])
            .and_then(|value| value.as_str().map(str::to_string))
        else {
            debug!(key = id_key, "peer id not present in filter state");
            return self.empty();
        };

        if let Some(record) = self.peers.borrow().get(&peer_id) {
            return Arc::clone(record);
        }

        let Some(record) = fetch_peer_identity(host, metadata_key) else {
            return self.empty();
        };
        let record = Arc::new(record);
        let mut peers = self.peers.borrow_mut();
        peers.insert(peer_id, Arc::clone(&record));
        if peers.len() > capacity {
            // Batch-evict the oldest quarter by insertion order instead of
            // tracking per-entry recency.
            let target = (3 * capacity).div_ceil(4);
            let evicted = peers.len() - target;
            peers.drain(..evicted);
            info!(evicted, len = peers.len(), "trimmed peer identity cache");
        }
        record
    }

    /// Number of peer entries currently cached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.borrow().len()
    }

    /// True when no peer entry is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.borrow().is_empty()
    }

    fn empty(&self) -> Arc<IdentityRecord> {
        Arc::clone(&self.empty)
    }
}

fn peer_keys(direction: TrafficDirection) -> (&'static str, &'static str) {
    match direction {
        TrafficDirection::Outbound => {
            (metadata_exchange::UPSTREAM_ID, metadata_exchange::UPSTREAM)
        }
        _ => (metadata_exchange::DOWNSTREAM_ID, metadata_exchange::DOWNSTREAM),
    }
}

fn extract_local_identity<H: Host + ?Sized>(host: &H) -> Result<IdentityRecord> {
    let metadata = host
        .structured(paths::NODE_METADATA)
        .ok_or_else(|| Error::NotFound("node metadata".to_string()))?;
    Ok(IdentityRecord::from_metadata(&metadata))
}

fn fetch_peer_identity<H: Host + ?Sized>(host: &H, metadata_key: &str) -> Option<IdentityRecord> {
    let Some(metadata) = host.structured(&[paths::FILTER_STATE, metadata_key]) else {
        debug!(key = metadata_key, "peer metadata not present in filter state");
        return None;
    };
    Some(IdentityRecord::from_metadata(&metadata))
}

#[cfg(test)]
mod tests {
    use meshlens_core::Value;

    use super::*;
    use crate::testutil::{metadata_tree, FakeHost};

    fn config(max_peer_cache_size: i32) -> ExtensionConfig {
        ExtensionConfig { max_peer_cache_size }
    }

    fn set_downstream_peer(host: &FakeHost, peer_id: &str, workload: &str) {
        host.set_scalar(
            &[paths::FILTER_STATE, metadata_exchange::DOWNSTREAM_ID],
            Value::from(peer_id),
        );
        host.set_structured(
            &[paths::FILTER_STATE, metadata_exchange::DOWNSTREAM],
            metadata_tree(workload, "default"),
        );
    }

    // ---- Local identity ----

    #[test]
    fn local_identity_is_resolved_once_at_construction() {
        let host = FakeHost::new();
        host.set_structured(paths::NODE_METADATA, metadata_tree("local-wl", "prod"));
        let cache = IdentityCache::new(&host, &config(0));
        assert_eq!(cache.local().name, "local-wl");
        assert_eq!(cache.local().namespace, "prod");

        // Mutating host state afterwards does not change the local record.
        host.set_structured(paths::NODE_METADATA, metadata_tree("other", "other"));
        assert_eq!(cache.local().name, "local-wl");
    }

    #[test]
    fn missing_local_metadata_degrades_to_empty_record() {
        let host = FakeHost::new();
        let cache = IdentityCache::new(&host, &config(0));
        assert_eq!(*cache.local(), IdentityRecord::default());
    }

    // ---- Peer resolution ----

    #[test]
    fn repeated_peer_lookup_fetches_metadata_once() {
        let host = FakeHost::new();
        set_downstream_peer(&host, "sidecar~10.0.0.1~reviews", "reviews-v1");
        let cache = IdentityCache::new(&host, &config(0));

        let first = cache.peer(&host, TrafficDirection::Inbound);
        let fetches_after_first = host.structured_calls.get();
        let second = cache.peer(&host, TrafficDirection::Inbound);

        assert_eq!(host.structured_calls.get(), fetches_after_first);
        assert_eq!(first, second);
        assert_eq!(first.name, "reviews-v1");
    }

    #[test]
    fn missing_peer_id_yields_empty_record_without_fetch() {
        let host = FakeHost::new();
        host.set_structured(
            &[paths::FILTER_STATE, metadata_exchange::DOWNSTREAM],
            metadata_tree("reviews-v1", "default"),
        );
        let cache = IdentityCache::new(&host, &config(0));
        let before = host.structured_calls.get();

        let record = cache.peer(&host, TrafficDirection::Inbound);
        assert_eq!(*record, IdentityRecord::default());
        assert_eq!(host.structured_calls.get(), before);
        assert!(cache.is_empty());
    }

    #[test]
    fn missing_peer_metadata_is_not_cached() {
        let host = FakeHost::new();
        host.set_scalar(
            &[paths::FILTER_STATE, metadata_exchange::DOWNSTREAM_ID],
            Value::from("peer-a"),
        );
        let cache = IdentityCache::new(&host, &config(0));
        assert_eq!(*cache.peer(&host, TrafficDirection::Inbound), IdentityRecord::default());
        assert!(cache.is_empty());

        // Once the blob shows up the peer resolves and is cached.
        host.set_structured(
            &[paths::FILTER_STATE, metadata_exchange::DOWNSTREAM],
            metadata_tree("late-arrival", "default"),
        );
        assert_eq!(cache.peer(&host, TrafficDirection::Inbound).name, "late-arrival");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn outbound_direction_reads_upstream_keys() {
        let host = FakeHost::new();
        host.set_scalar(
            &[paths::FILTER_STATE, metadata_exchange::UPSTREAM_ID],
            Value::from("peer-up"),
        );
        host.set_structured(
            &[paths::FILTER_STATE, metadata_exchange::UPSTREAM],
            metadata_tree("details-v1", "default"),
        );
        let cache = IdentityCache::new(&host, &config(0));
        assert_eq!(cache.peer(&host, TrafficDirection::Outbound).name, "details-v1");
        // Downstream keys were never populated.
        assert_eq!(
            *cache.peer(&host, TrafficDirection::Inbound),
            IdentityRecord::default()
        );
    }

    // ---- Disabled cache ----

    #[test]
    fn disabled_cache_fetches_every_call() {
        let host = FakeHost::new();
        set_downstream_peer(&host, "peer-a", "reviews-v1");
        let cache = IdentityCache::new(&host, &config(-1));

        let before = host.structured_calls.get();
        assert_eq!(cache.peer(&host, TrafficDirection::Inbound).name, "reviews-v1");
        assert_eq!(host.structured_calls.get(), before + 1);

        // Fresh data is observed immediately.
        set_downstream_peer(&host, "peer-a", "reviews-v2");
        assert_eq!(cache.peer(&host, TrafficDirection::Inbound).name, "reviews-v2");
        assert_eq!(host.structured_calls.get(), before + 2);
        assert!(cache.is_empty());
    }

    // ---- Eviction ----

    #[test]
    fn overflow_evicts_oldest_quarter_in_one_batch() {
        let host = FakeHost::new();
        let cache = IdentityCache::new(&host, &config(4));

        for i in 1..=5 {
            set_downstream_peer(&host, &format!("peer-{i}"), &format!("wl-{i}"));
            cache.peer(&host, TrafficDirection::Inbound);
        }
        // ceil(3*4/4) = 3 entries remain after the overflowing insert.
        assert_eq!(cache.len(), 3);

        // peer-1 and peer-2 were the earliest inserted: refetched on next
        // lookup, observing new metadata.
        set_downstream_peer(&host, "peer-1", "wl-1-reloaded");
        assert_eq!(cache.peer(&host, TrafficDirection::Inbound).name, "wl-1-reloaded");

        // peer-5 survived: served from cache, blind to host mutation.
        set_downstream_peer(&host, "peer-5", "wl-5-reloaded");
        let before = host.structured_calls.get();
        assert_eq!(cache.peer(&host, TrafficDirection::Inbound).name, "wl-5");
        assert_eq!(host.structured_calls.get(), before);
    }

    #[test]
    fn eviction_keeps_three_quarters_for_larger_caches() {
        let host = FakeHost::new();
        let cache = IdentityCache::new(&host, &config(8));
        for i in 1..=9 {
            set_downstream_peer(&host, &format!("peer-{i}"), &format!("wl-{i}"));
            cache.peer(&host, TrafficDirection::Inbound);
        }
        assert_eq!(cache.len(), 6);
    }

    #[test]
    fn evicted_records_stay_alive_for_existing_readers() {
        let host = FakeHost::new();
        let cache = IdentityCache::new(&host, &config(4));
        set_downstream_peer(&host, "peer-1", "wl-1");
        let held = cache.peer(&host, TrafficDirection::Inbound);

        for i in 2..=5 {
            set_downstream_peer(&host, &format!("peer-{i}"), &format!("wl-{i}"));
            cache.peer(&host, TrafficDirection::Inbound);
        }
        assert_eq!(held.name, "wl-1");
    }
}
