//! Layered, deduplicating resource resolver
//!
//! Lookup order for a [`ResourceKey`]:
//! 1. in-memory cache (moka)
//! 2. manifests embedded in the current document
//! 3. each configured [`DataSource`] in order (local cache, then remote)
//!
//! Concurrent lookups of the same key share one load. Failures are never
//! cached, so a later pass retries them.

use crate::dataset::Dataset;
use crate::source::{DataSource, Provenance, Resource, ResourceKey};
use dashmap::DashMap;
use futures::future::join_all;
use moka::future::Cache;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Resource plus where it came from
#[derive(Debug, Clone)]
pub struct ResolvedResource {
    pub resource: Resource,
    pub provenance: Provenance,
}

/// Why a reference could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnresolvedReason {
    /// No layer knows the reference
    #[error("not found in any layer")]
    NotFound,

    /// A layer failed; carries the last failure
    #[error("{0}")]
    Failed(String),
}

/// Outcome of resolving one reference
#[derive(Debug, Clone)]
pub enum Resolution {
    Resolved(ResolvedResource),
    Unresolved(UnresolvedReason),
}

impl Resolution {
    #[must_use]
    pub fn resource(&self) -> Option<&Resource> {
        match self {
            Self::Resolved(resolved) => Some(&resolved.resource),
            Self::Unresolved(_) => None,
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// Builder for [`ResourceResolver`]
#[derive(Default)]
pub struct ResolverBuilder {
    capacity: Option<u64>,
    layers: Vec<Arc<dyn DataSource>>,
}

impl ResolverBuilder {
    /// Bound the memory cache; unbounded when unset
    #[must_use]
    pub fn capacity(mut self, capacity: u64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Append a lookup layer after the ones already added
    #[must_use]
    pub fn layer(mut self, source: Arc<dyn DataSource>) -> Self {
        self.layers.push(source);
        self
    }

    #[must_use]
    pub fn build(self) -> ResourceResolver {
        let builder = Cache::builder();
        let memory = match self.capacity {
            Some(capacity) => builder.max_capacity(capacity).build(),
            None => builder.build(),
        };
        ResourceResolver {
            memory,
            embedded: Arc::new(DashMap::new()),
            layers: Arc::new(self.layers),
        }
    }
}

/// Shared resolver; clones share the same cache
#[derive(Clone)]
pub struct ResourceResolver {
    memory: Cache<ResourceKey, ResolvedResource>,
    embedded: Arc<DashMap<ResourceKey, Value>>,
    layers: Arc<Vec<Arc<dyn DataSource>>>,
}

impl std::fmt::Debug for ResourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceResolver")
            .field("cached", &self.memory.entry_count())
            .field("embedded", &self.embedded.len())
            .field("layers", &self.layers.len())
            .finish()
    }
}

impl Default for ResourceResolver {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ResourceResolver {
    #[must_use]
    pub fn builder() -> ResolverBuilder {
        ResolverBuilder::default()
    }

    /// Make a manifest available as the embedded layer
    ///
    /// Does not replace an entry already in the memory cache.
    pub fn register_embedded(&self, key: ResourceKey, manifest: Value) {
        self.embedded.insert(key, manifest);
    }

    /// Resolve one reference
    pub async fn resolve(&self, key: &ResourceKey) -> Resolution {
        match self.memory.try_get_with(key.clone(), self.load(key)).await {
            Ok(resolved) => Resolution::Resolved(resolved),
            Err(reason) => {
                tracing::warn!("Unresolved reference {}: {}", key, reason);
                Resolution::Unresolved((*reason).clone())
            }
        }
    }

    /// Resolve a batch concurrently, one load per distinct key
    ///
    /// Returns once every key is resolved or definitively unresolved.
    pub async fn resolve_batch<I>(&self, keys: I) -> BTreeMap<ResourceKey, Resolution>
    where
        I: IntoIterator<Item = ResourceKey>,
    {
        let distinct: BTreeSet<ResourceKey> = keys.into_iter().collect();
        let outcomes = join_all(distinct.iter().map(|key| self.resolve(key))).await;
        distinct.into_iter().zip(outcomes).collect()
    }

    async fn load(&self, key: &ResourceKey) -> Result<ResolvedResource, UnresolvedReason> {
        let mut reason = UnresolvedReason::NotFound;

        let embedded = self.embedded.get(key).map(|entry| entry.value().clone());
        if let Some(manifest) = embedded {
            match Resource::from_manifest(key, &manifest) {
                Ok(resource) => {
                    tracing::debug!("Resolved {} from embedded document data", key);
                    return Ok(ResolvedResource {
                        resource,
                        provenance: Provenance::Embedded,
                    });
                }
                Err(e) => {
                    tracing::warn!("Embedded manifest for {} is invalid: {}", key, e);
                    reason = UnresolvedReason::Failed(e.to_string());
                }
            }
        }

        for layer in self.layers.iter() {
            match layer.fetch(key).await {
                Ok(Some(resource)) => {
                    tracing::debug!("Resolved {} ({:?})", key, layer.provenance());
                    return Ok(ResolvedResource {
                        resource,
                        provenance: layer.provenance(),
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("{:?} layer failed for {}: {}", layer.provenance(), key, e);
                    reason = UnresolvedReason::Failed(e.to_string());
                }
            }
        }

        Err(reason)
    }

    /// Cached resource without triggering a load
    pub async fn cached(&self, key: &ResourceKey) -> Option<ResolvedResource> {
        self.memory.get(key).await
    }

    /// All datasets currently in the memory cache
    #[must_use]
    pub fn datasets(&self) -> Vec<Arc<Dataset>> {
        self.memory
            .iter()
            .filter_map(|(_, resolved)| resolved.resource.as_dataset().cloned())
            .collect()
    }

    /// Approximate number of cached resources
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.memory.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{FetchError, ResourceKind};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct SlowSource {
        calls: AtomicUsize,
        provenance: Provenance,
        fail: bool,
    }

    impl SlowSource {
        fn new(provenance: Provenance) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                provenance,
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                provenance: Provenance::Remote,
                fail: true,
            })
        }
    }

    #[async_trait::async_trait]
    impl DataSource for SlowSource {
        async fn fetch(&self, key: &ResourceKey) -> Result<Option<Resource>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                return Err(FetchError::decode(key, "boom"));
            }
            if key.kind == ResourceKind::Dataset && key.reference == "ds1" {
                let manifest = json!({ "keyData": { "mesh1": { "topology": "Triangles" } } });
                return Resource::from_manifest(key, &manifest)
                    .map(Some)
                    .map_err(|e| FetchError::decode(key, e.to_string()));
            }
            Ok(None)
        }

        fn provenance(&self) -> Provenance {
            self.provenance
        }
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_fetch() {
        let source = SlowSource::new(Provenance::Cached);
        let resolver = ResourceResolver::builder().layer(source.clone()).build();
        let key = ResourceKey::dataset("ds1");

        let (a, b, c) = tokio::join!(
            resolver.resolve(&key),
            resolver.resolve(&key),
            resolver.resolve(&key)
        );
        assert!(a.is_resolved() && b.is_resolved() && c.is_resolved());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        // Later lookups hit memory
        assert!(resolver.resolve(&key).await.is_resolved());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn batch_dedups_keys() {
        let source = SlowSource::new(Provenance::Cached);
        let resolver = ResourceResolver::builder().layer(source.clone()).build();

        let outcomes = resolver
            .resolve_batch(vec![
                ResourceKey::dataset("ds1"),
                ResourceKey::dataset("ds1"),
                ResourceKey::dataset("missing"),
            ])
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[&ResourceKey::dataset("ds1")].is_resolved());
        assert!(matches!(
            outcomes[&ResourceKey::dataset("missing")],
            Resolution::Unresolved(UnresolvedReason::NotFound)
        ));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn misses_are_not_cached() {
        let source = SlowSource::new(Provenance::Cached);
        let resolver = ResourceResolver::builder().layer(source.clone()).build();
        let key = ResourceKey::dataset("missing");

        assert!(!resolver.resolve(&key).await.is_resolved());
        assert!(!resolver.resolve(&key).await.is_resolved());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failing_layer_falls_through() {
        let broken = SlowSource::failing();
        let local = SlowSource::new(Provenance::Cached);
        let resolver = ResourceResolver::builder()
            .layer(broken.clone())
            .layer(local.clone())
            .build();

        let outcome = resolver.resolve(&ResourceKey::dataset("ds1")).await;
        match outcome {
            Resolution::Resolved(resolved) => assert_eq!(resolved.provenance, Provenance::Cached),
            Resolution::Unresolved(reason) => panic!("unexpected: {reason}"),
        }

        let outcome = resolver.resolve(&ResourceKey::dataset("other")).await;
        assert!(matches!(
            outcome,
            Resolution::Unresolved(UnresolvedReason::Failed(_))
        ));
    }

    #[tokio::test]
    async fn embedded_layer_wins_over_sources() {
        let source = SlowSource::new(Provenance::Remote);
        let resolver = ResourceResolver::builder().layer(source.clone()).build();
        let key = ResourceKey::vis_asset("abc");
        resolver.register_embedded(key.clone(), json!({ "artifactType": "glyph" }));

        match resolver.resolve(&key).await {
            Resolution::Resolved(resolved) => {
                assert_eq!(resolved.provenance, Provenance::Embedded);
                assert!(resolved.resource.as_vis_asset().is_some());
            }
            Resolution::Unresolved(reason) => panic!("unexpected: {reason}"),
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn datasets_lists_cached_entries() {
        let source = SlowSource::new(Provenance::Cached);
        let resolver = ResourceResolver::builder().layer(source).build();
        resolver.resolve(&ResourceKey::dataset("ds1")).await;
        resolver.memory.run_pending_tasks().await;

        let datasets = resolver.datasets();
        assert_eq!(datasets.len(), 1);
        assert_eq!(datasets[0].path(), "ds1");
        assert!(resolver.cached(&ResourceKey::dataset("ds1")).await.is_some());
    }
}
