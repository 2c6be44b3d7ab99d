//! Cluster Directory Lookup
//!
//! Enumerates the clusters visible under a subscription through a [`ManagementDirectory`]
//! and keeps the listing in a [`ResolutionCache`] keyed by (subscription, tenant).
//!
//! Cluster names are matched case-insensitively. Records without a name are kept in the
//! snapshot but never listed or matched.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::cache::{cache_key, ResolutionCache, CLUSTERS_NAMESPACE, DEFAULT_TTL};
use crate::engine::{ClusterRecord, ManagementDirectory, RetryPolicy};
use crate::error::{QuarryError, Result};

/// One enumeration of a subscription's clusters
#[derive(Debug, Clone)]
pub struct DirectorySnapshot {
    records: Arc<Vec<ClusterRecord>>,
    expires_at: Instant,
}

impl DirectorySnapshot {
    /// All records, in enumeration order
    #[must_use]
    pub fn records(&self) -> &[ClusterRecord] {
        &self.records
    }

    /// Names of all named clusters, in enumeration order
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.records.iter().filter_map(ClusterRecord::name).map(str::to_string).collect()
    }

    /// Record whose name matches `name`, ignoring case
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&ClusterRecord> {
        self.records
            .iter()
            .find(|record| record.name().is_some_and(|n| n.eq_ignore_ascii_case(name)))
    }

    /// When this listing stops being authoritative
    #[must_use]
    pub const fn expires_at(&self) -> Instant {
        self.expires_at
    }
}

/// Cached cluster directory over a management-plane backend
#[derive(Debug)]
pub struct ClusterDirectory<D> {
    backend: D,
    cache: ResolutionCache<DirectorySnapshot>,
}

impl<D: ManagementDirectory> ClusterDirectory<D> {
    pub fn new(backend: D) -> Self {
        Self::with_ttl(backend, DEFAULT_TTL)
    }

    pub fn with_ttl(backend: D, ttl: Duration) -> Self {
        Self { backend, cache: ResolutionCache::new(ttl) }
    }

    pub const fn backend(&self) -> &D {
        &self.backend
    }

    /// Current listing for the subscription, enumerating only on a cache miss
    pub async fn snapshot(
        &self,
        subscription: &str,
        tenant: Option<&str>,
        retry_policy: Option<&RetryPolicy>,
    ) -> Result<DirectorySnapshot> {
        let subscription = require_non_empty(subscription, "subscription")?;
        let key = cache_key(CLUSTERS_NAMESPACE, subscription, tenant);
        let ttl = self.cache.ttl();

        self.cache
            .get_or_fetch(&key, || async move {
                let records = self
                    .backend
                    .enumerate_clusters(subscription, tenant, retry_policy)
                    .await
                    .map_err(|e| {
                        tracing::warn!(subscription, error = %e, "cluster enumeration failed");
                        QuarryError::upstream_from(
                            format!("Error retrieving clusters for subscription '{subscription}'"),
                            e,
                        )
                    })?;

                tracing::debug!(subscription, clusters = records.len(), "enumerated clusters");
                Ok(DirectorySnapshot { records: Arc::new(records), expires_at: Instant::now() + ttl })
            })
            .await
    }

    /// Names of all clusters visible under the subscription
    pub async fn list_clusters(
        &self,
        subscription: &str,
        tenant: Option<&str>,
        retry_policy: Option<&RetryPolicy>,
    ) -> Result<Vec<String>> {
        Ok(self.snapshot(subscription, tenant, retry_policy).await?.names())
    }

    /// Record of the named cluster, along with the snapshot it came from
    pub async fn find_cluster(
        &self,
        subscription: &str,
        name: &str,
        tenant: Option<&str>,
        retry_policy: Option<&RetryPolicy>,
    ) -> Result<(ClusterRecord, DirectorySnapshot)> {
        let name = require_non_empty(name, "cluster-name")?;
        let snapshot = self.snapshot(subscription, tenant, retry_policy).await?;

        let record = snapshot.find(name).cloned().ok_or_else(|| {
            QuarryError::resource_not_found(format!(
                "Cluster '{name}' not found in subscription '{}'.",
                subscription.trim()
            ))
        })?;

        Ok((record, snapshot))
    }

    /// Record of the named cluster
    pub async fn get_cluster(
        &self,
        subscription: &str,
        name: &str,
        tenant: Option<&str>,
        retry_policy: Option<&RetryPolicy>,
    ) -> Result<ClusterRecord> {
        Ok(self.find_cluster(subscription, name, tenant, retry_policy).await?.0)
    }
}

fn require_non_empty<'a>(value: &'a str, name: &str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(QuarryError::missing_required_argument(format!(
            "Missing required option --{name}"
        )));
    }
    Ok(value)
}
