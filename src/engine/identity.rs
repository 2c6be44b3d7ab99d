//! Environment Identity Provider
//!
//! Reads a pre-issued access token from the environment. A tenant-scoped variable
//! (`QUARRY_ACCESS_TOKEN_<TENANT>`) takes precedence over the unscoped one.

use crate::engine::{Credential, IdentityProvider};
use crate::error::{QuarryError, Result};

/// Default variable holding the access token
pub const TOKEN_ENV: &str = "QUARRY_ACCESS_TOKEN";

/// [`IdentityProvider`] backed by environment variables
#[derive(Debug, Clone)]
pub struct EnvironmentIdentity {
    variable: String,
}

impl EnvironmentIdentity {
    pub fn new(variable: impl Into<String>) -> Self {
        Self { variable: variable.into() }
    }

    #[must_use]
    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Variable consulted first for `tenant`
    #[must_use]
    pub fn tenant_variable(&self, tenant: &str) -> String {
        let suffix: String = tenant
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("{}_{suffix}", self.variable)
    }

    fn lookup(name: &str) -> Option<String> {
        std::env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }
}

impl Default for EnvironmentIdentity {
    fn default() -> Self {
        Self::new(TOKEN_ENV)
    }
}

impl IdentityProvider for EnvironmentIdentity {
    async fn get_credential(&self, tenant: Option<&str>) -> Result<Credential> {
        let scoped = tenant.and_then(|t| Self::lookup(&self.tenant_variable(t)));
        let token = scoped.or_else(|| Self::lookup(&self.variable)).ok_or_else(|| {
            QuarryError::upstream(
                "identity provider",
                format!("No access token found; set {}", self.variable),
            )
        })?;

        tracing::debug!(tenant = tenant.unwrap_or("<default>"), "resolved credential");
        Ok(Credential::new(token, tenant.map(str::to_string)))
    }
}
