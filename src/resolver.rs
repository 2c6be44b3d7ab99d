//! Endpoint Resolution
//!
//! Turns a [`ClusterTarget`] into a canonical [`ClusterEndpoint`].
//!
//! Endpoints given directly are returned unchanged. Coordinates are resolved through the
//! [`ClusterDirectory`] and memoized per (subscription, tenant, cluster); a memoized endpoint
//! never outlives the directory listing it was read from. Resolution failures are not retried.

use serde::{Serialize, Serializer};
use std::time::Duration;
use url::Url;

use crate::addressing::ClusterTarget;
use crate::cache::{cache_key, key_part, ResolutionCache, DEFAULT_TTL, ENDPOINTS_NAMESPACE};
use crate::directory::ClusterDirectory;
use crate::engine::{ManagementDirectory, RetryPolicy};
use crate::error::{QuarryError, Result};

/// Validated cluster endpoint
///
/// Always a well-formed URI with a non-empty host. The caller's (trimmed) text is kept
/// as-is and doubles as a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClusterEndpoint {
    raw: String,
    host: String,
}

impl ClusterEndpoint {
    /// Parse and validate an endpoint
    pub fn parse(value: &str) -> Result<Self> {
        let raw = value.trim();
        if raw.is_empty() {
            return Err(QuarryError::invalid_endpoint("Cluster endpoint cannot be empty"));
        }

        let url = Url::parse(raw)
            .map_err(|e| QuarryError::invalid_endpoint(format!("'{raw}' is not a valid URI: {e}")))?;

        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| QuarryError::invalid_endpoint(format!("'{raw}' has no host")))?;

        if host.starts_with('.') {
            return Err(QuarryError::invalid_endpoint(format!(
                "'{raw}' has an empty leading host label"
            )));
        }

        Ok(Self { raw: raw.to_string(), host: host.to_string() })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Leftmost DNS label of the host, used where control commands want the cluster name
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.host.split('.').next().unwrap_or(&self.host)
    }
}

impl std::fmt::Display for ClusterEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for ClusterEndpoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

/// Cluster short name of an endpoint string
pub fn short_name(endpoint: &str) -> Result<String> {
    Ok(ClusterEndpoint::parse(endpoint)?.short_name().to_string())
}

/// Resolves cluster targets to endpoints
#[derive(Debug)]
pub struct EndpointResolver<D> {
    directory: ClusterDirectory<D>,
    endpoints: ResolutionCache<ClusterEndpoint>,
}

impl<D: ManagementDirectory> EndpointResolver<D> {
    pub fn new(backend: D) -> Self {
        Self::with_ttl(backend, DEFAULT_TTL)
    }

    pub fn with_ttl(backend: D, ttl: Duration) -> Self {
        Self {
            directory: ClusterDirectory::with_ttl(backend, ttl),
            endpoints: ResolutionCache::new(ttl),
        }
    }

    pub const fn directory(&self) -> &ClusterDirectory<D> {
        &self.directory
    }

    /// Canonical endpoint for `target`
    pub async fn resolve(
        &self,
        target: &ClusterTarget,
        tenant: Option<&str>,
        retry_policy: Option<&RetryPolicy>,
    ) -> Result<ClusterEndpoint> {
        match target {
            ClusterTarget::ByEndpoint(endpoint) => Ok(endpoint.clone()),
            ClusterTarget::ByCoordinates { subscription, cluster } => {
                self.resolve_by_name(subscription, cluster, tenant, retry_policy).await
            }
        }
    }

    async fn resolve_by_name(
        &self,
        subscription: &str,
        cluster: &str,
        tenant: Option<&str>,
        retry_policy: Option<&RetryPolicy>,
    ) -> Result<ClusterEndpoint> {
        let key = format!(
            "{}/{}",
            cache_key(ENDPOINTS_NAMESPACE, subscription, tenant),
            key_part(&cluster.to_ascii_lowercase())
        );
        if let Some(endpoint) = self.endpoints.get(&key) {
            tracing::debug!(subscription, cluster, "endpoint cache hit");
            return Ok(endpoint);
        }

        let (record, snapshot) =
            self.directory.find_cluster(subscription, cluster, tenant, retry_policy).await?;

        let uri = record
            .cluster_uri
            .as_deref()
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
            .ok_or_else(|| {
                QuarryError::resolution_failed(format!(
                    "Could not retrieve URI for cluster '{cluster}'"
                ))
            })?;
        let endpoint = ClusterEndpoint::parse(uri)?;

        tracing::info!(subscription, cluster, endpoint = %endpoint, "resolved cluster endpoint");
        self.endpoints.set_until(key, endpoint.clone(), snapshot.expires_at());
        Ok(endpoint)
    }
}
