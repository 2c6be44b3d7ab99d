//! Configuration Management
//!
//! This module loads and saves Quarry settings and named cluster profiles.
//!
//! # Configuration Locations
//! - Local: `.quarry/config.json` (team-shareable, per-project)
//! - Global: `~/.config/quarry/config.json` (per-user)
//!
//! # Resolution Precedence
//! 1. Explicit command-line arguments (highest priority)
//! 2. Local config file (`.quarry/config.json`)
//! 3. Global config file (`~/.config/quarry/config.json`)
//!
//! # Named Profiles
//! A profile pins a cluster (by endpoint or by subscription + cluster name) and optionally a
//! tenant and database, so agents can refer to a cluster by a short name.
//!
//! Secrets are never stored directly: the connection string is read from the environment
//! variable named by `connection_string_env`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::addressing::OperationArgs;
use crate::engine::{AuthMethod, RetryPolicy};
use crate::error::{QuarryError, Result};

/// Named cluster profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,

    /// Database used when the command does not name one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

impl ClusterProfile {
    /// Profile addressing a cluster by endpoint
    pub fn by_endpoint(cluster_uri: impl Into<String>) -> Self {
        Self { cluster_uri: Some(cluster_uri.into()), ..Default::default() }
    }

    /// Profile addressing a cluster by subscription and name
    pub fn by_coordinates(subscription: impl Into<String>, cluster_name: impl Into<String>) -> Self {
        Self {
            subscription: Some(subscription.into()),
            cluster_name: Some(cluster_name.into()),
            ..Default::default()
        }
    }

    /// A profile must address its cluster one way or the other
    pub fn validate(&self, name: &str) -> Result<()> {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        if set(&self.cluster_uri) || (set(&self.subscription) && set(&self.cluster_name)) {
            return Ok(());
        }
        Err(QuarryError::config_error(format!(
            "Profile '{name}' needs either cluster_uri or both subscription and cluster_name"
        )))
    }

    /// Fill arguments the caller left unset
    ///
    /// The profile describes one cluster. If the caller named any cluster argument the whole
    /// profile is ignored, so its database and tenant never follow a request to another cluster.
    pub fn apply(&self, args: &mut OperationArgs) {
        let addressed =
            args.cluster_uri.is_some() || args.subscription.is_some() || args.cluster_name.is_some();
        if addressed {
            return;
        }

        args.cluster_uri.clone_from(&self.cluster_uri);
        args.subscription.clone_from(&self.subscription);
        args.cluster_name.clone_from(&self.cluster_name);
        if args.database.is_none() {
            args.database.clone_from(&self.database);
        }
        if args.options.tenant.is_none() {
            args.options.tenant.clone_from(&self.tenant);
        }
    }
}

/// Settings file contents (same shape for local and global files)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Default tenant for identity resolution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<AuthMethod>,

    /// Name of the environment variable holding the connection string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string_env: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,

    /// Path to the offline catalog file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,

    /// Named cluster profiles
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub clusters: BTreeMap<String, ClusterProfile>,

    /// Name of the default profile (must exist in `clusters`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl Settings {
    /// Overlay `local` on top of `self`, key by key
    #[must_use]
    pub fn merge(mut self, local: Self) -> Self {
        if local.tenant.is_some() {
            self.tenant = local.tenant;
        }
        if local.auth_method.is_some() {
            self.auth_method = local.auth_method;
        }
        if local.connection_string_env.is_some() {
            self.connection_string_env = local.connection_string_env;
        }
        if local.retry_policy.is_some() {
            self.retry_policy = local.retry_policy;
        }
        if local.catalog.is_some() {
            self.catalog = local.catalog;
        }
        if local.default.is_some() {
            self.default = local.default;
        }
        self.clusters.extend(local.clusters);
        self
    }

    /// Look up a profile by name, falling back to the default profile
    ///
    /// Returns `None` when no name is given and no default is configured.
    pub fn profile(&self, name: Option<&str>) -> Result<Option<(&str, &ClusterProfile)>> {
        let Some(name) = name.or(self.default.as_deref()) else {
            return Ok(None);
        };

        let (name, profile) = self.clusters.get_key_value(name).ok_or_else(|| {
            let available: Vec<_> = self.clusters.keys().collect();
            QuarryError::config_error(format!(
                "Profile '{name}' not found. Available profiles: {available:?}"
            ))
        })?;
        profile.validate(name)?;
        Ok(Some((name.as_str(), profile)))
    }

    /// Auth method, letting an explicit choice win over the configured one
    #[must_use]
    pub fn auth_method(&self, explicit: Option<AuthMethod>) -> AuthMethod {
        explicit.or(self.auth_method).unwrap_or_default()
    }

    /// Connection string from the configured environment variable, if any
    pub fn connection_string(&self) -> Result<Option<String>> {
        let Some(var) = self.connection_string_env.as_deref() else {
            return Ok(None);
        };
        std::env::var(var).map(Some).map_err(|_| {
            QuarryError::config_error(format!(
                "Environment variable {var} not found for connection string"
            ))
        })
    }

    /// Fill unset arguments from the selected profile and from these settings
    pub fn apply(&self, args: &mut OperationArgs, profile: Option<&str>) -> Result<()> {
        if let Some((name, profile)) = self.profile(profile)? {
            tracing::debug!(profile = name, "applying cluster profile");
            profile.apply(args);
        }

        if args.options.tenant.is_none() {
            args.options.tenant.clone_from(&self.tenant);
        }
        if args.options.retry_policy.is_none() {
            args.options.retry_policy.clone_from(&self.retry_policy);
        }
        if args.options.auth_method == AuthMethod::ConnectionString
            && args.options.connection_string.is_none()
        {
            args.options.connection_string = self.connection_string()?;
        }
        Ok(())
    }
}

/// Configuration file location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLocation {
    /// Local config: `.quarry/config.json` (team-shareable)
    Local,
    /// Global config: `~/.config/quarry/config.json` (per-user)
    Global,
}

impl ConfigLocation {
    pub fn path(self) -> Result<PathBuf> {
        match self {
            Self::Local => local_config_path(),
            Self::Global => global_config_path(),
        }
    }
}

/// Get path to local config file (`.quarry/config.json`)
pub fn local_config_path() -> Result<PathBuf> {
    let current_dir = std::env::current_dir().map_err(|e| {
        QuarryError::config_error(format!("Could not determine current directory: {e}"))
    })?;

    Ok(current_dir.join(".quarry").join("config.json"))
}

/// Get path to global config file (`~/.config/quarry/config.json`)
pub fn global_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| QuarryError::config_error("Could not determine user config directory"))?;

    Ok(config_dir.join("quarry").join("config.json"))
}

/// Load settings from a config file; a missing file yields empty settings
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| QuarryError::config_error(format!("Could not read config file: {e}")))?;

    serde_json::from_str(&contents).map_err(|e| {
        QuarryError::config_error(format!(
            "Invalid config file format in '{}': {e}",
            path.display()
        ))
    })
}

/// Save settings to a config file, creating parent directories as needed
pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            QuarryError::config_error(format!("Could not create config directory: {e}"))
        })?;
    }

    let contents = serde_json::to_string_pretty(settings)
        .map_err(|e| QuarryError::config_error(format!("Could not serialize config: {e}")))?;

    fs::write(path, contents)
        .map_err(|e| QuarryError::config_error(format!("Could not write config file: {e}")))
}

/// Load and merge two settings files, `local` winning key by key
pub fn load_from(local: &Path, global: &Path) -> Result<Settings> {
    Ok(load_settings(global)?.merge(load_settings(local)?))
}

/// Load settings with precedence (local over global)
pub fn load_with_precedence() -> Result<Settings> {
    load_from(&local_config_path()?, &global_config_path()?)
}

/// Save a profile into the settings file at `path`
///
/// The first profile saved to a file becomes its default, as does any profile saved with
/// `make_default`.
pub fn save_profile_to(
    path: &Path,
    name: &str,
    profile: ClusterProfile,
    make_default: bool,
) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(QuarryError::config_error("Profile name cannot be empty"));
    }
    profile.validate(name)?;

    let mut settings = load_settings(path)?;
    let first = settings.clusters.is_empty();
    settings.clusters.insert(name.to_string(), profile);
    if first || make_default {
        settings.default = Some(name.to_string());
    }

    save_settings(path, &settings)?;
    tracing::info!(profile = name, path = %path.display(), "saved cluster profile");
    Ok(())
}

/// Save a profile to the local or global config file
pub fn save_profile(
    name: &str,
    profile: ClusterProfile,
    location: ConfigLocation,
    make_default: bool,
) -> Result<()> {
    save_profile_to(&location.path()?, name, profile, make_default)
}
