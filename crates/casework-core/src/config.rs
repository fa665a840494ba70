//! Configuration for the workflow core
//!
//! Layering follows the usual order: compiled defaults, then an optional TOML
//! file, then `CASEWORK_*` environment variables, then validation.
//!
//! ```toml
//! [api]
//! base_path = "/api/v1"
//! scopes_path = "/auth/scopes"
//!
//! [authorization]
//! external_authority = true
//! empty_scopes_use_roles = false
//!
//! [collections]
//! page_size = 25
//! placeholder_prefix = "temp-"
//!
//! [logging]
//! filter = "casework=debug"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{CaseworkError, Result};

const ENV_PREFIX: &str = "CASEWORK_";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseworkConfig {
    /// Resource paths
    pub api: ApiConfig,
    /// Capability resolution policy
    pub authorization: AuthorizationConfig,
    /// List synchronizer settings
    pub collections: CollectionConfig,
    /// Tracing subscriber settings
    pub logging: LoggingConfig,
}

/// Remote API layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Prefix prepended to every resource path
    pub base_path: String,
    /// Path of the external scope endpoint, relative to `base_path`
    pub scopes_path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_path: "/api/v1".to_string(),
            scopes_path: "/auth/scopes".to_string(),
        }
    }
}

/// Capability resolution policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    /// Capabilities come from an external token authority's scopes
    pub external_authority: bool,
    /// With an external authority, an empty scope list falls back to roles
    /// instead of failing closed
    pub empty_scopes_use_roles: bool,
}

/// List synchronizer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Items requested per list page
    pub page_size: u32,
    /// Prefix of client-fabricated placeholder ids
    pub placeholder_prefix: String,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            page_size: 25,
            placeholder_prefix: "temp-".to_string(),
        }
    }
}

/// Tracing subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive string; `RUST_LOG` wins when set
    pub filter: String,
    /// Colored output
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            ansi: true,
        }
    }
}

impl CaseworkConfig {
    /// Compiled defaults.
    pub fn defaults() -> Self {
        Self::default()
    }

    /// Parse a TOML document. Missing sections and keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CaseworkError::config(format!("Invalid TOML: {e}")))
    }

    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CaseworkError::config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Defaults, then `path` if given, then the process environment, then
    /// validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::defaults(),
        };
        config.merge_with_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Merge `CASEWORK_<SECTION>_<KEY>` variables from the process environment.
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Merge `CASEWORK_<SECTION>_<KEY>` pairs from an arbitrary source.
    ///
    /// Unprefixed variables are ignored; prefixed ones that name no known key
    /// are errors so typos do not pass silently.
    pub fn merge_with_vars<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(rest) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let rest = rest.to_ascii_lowercase();
            let Some((section, field)) = rest.split_once('_') else {
                return Err(CaseworkError::config(format!(
                    "Unrecognised environment key {}",
                    key.as_ref()
                )));
            };
            self.set_from_string(&format!("{section}.{field}"), value.as_ref())?;
        }
        Ok(())
    }

    /// Set a single value by dotted key, e.g. `collections.page_size`.
    pub fn set_from_string(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "api.base_path" => self.api.base_path = value.to_string(),
            "api.scopes_path" => self.api.scopes_path = value.to_string(),
            "authorization.external_authority" => {
                self.authorization.external_authority = parse_bool(key, value)?;
            }
            "authorization.empty_scopes_use_roles" => {
                self.authorization.empty_scopes_use_roles = parse_bool(key, value)?;
            }
            "collections.page_size" => {
                self.collections.page_size = value.trim().parse().map_err(|_| {
                    CaseworkError::config(format!("{key} must be a positive integer"))
                })?;
            }
            "collections.placeholder_prefix" => {
                self.collections.placeholder_prefix = value.to_string();
            }
            "logging.filter" => self.logging.filter = value.to_string(),
            "logging.ansi" => self.logging.ansi = parse_bool(key, value)?,
            _ => {
                return Err(CaseworkError::config(format!(
                    "Unknown configuration key {key}"
                )))
            }
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.api.base_path.is_empty() && !self.api.base_path.starts_with('/') {
            return Err(CaseworkError::config(
                "api.base_path must be empty or start with '/'",
            ));
        }
        if !self.api.scopes_path.starts_with('/') {
            return Err(CaseworkError::config("api.scopes_path must start with '/'"));
        }
        if self.collections.page_size == 0 || self.collections.page_size > 500 {
            return Err(CaseworkError::config(
                "collections.page_size must be between 1 and 500",
            ));
        }
        if self.collections.placeholder_prefix.trim().is_empty() {
            return Err(CaseworkError::config(
                "collections.placeholder_prefix must not be empty",
            ));
        }
        if self.authorization.empty_scopes_use_roles && !self.authorization.external_authority {
            tracing::warn!(
                "authorization.empty_scopes_use_roles has no effect without external_authority"
            );
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CaseworkError::config(format!(
            "{key} must be a boolean, got '{value}'"
        ))),
    }
}
