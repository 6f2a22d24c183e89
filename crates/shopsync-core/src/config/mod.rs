//! Engine configuration.
//!
//! Config values come from the environment (the CLI loads a `.env` file
//! first); everything is normalized and validated before the engine sees it.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::normalize_text_option;

const DEFAULT_API_VERSION: &str = "2024-01";

/// Remote storefront connection settings.
///
/// The access token is a secret; `Debug` redacts it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Store domain (e.g., mystore.myshopify.com)
    pub store_domain: String,
    /// Admin API access token
    pub access_token: String,
    /// API version (default: 2024-01)
    pub api_version: String,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("store_domain", &self.store_domain)
            .field("access_token", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl RemoteConfig {
    /// Build and validate remote settings.
    pub fn new(
        store_domain: impl Into<String>,
        access_token: impl Into<String>,
        api_version: Option<String>,
    ) -> Result<Self> {
        let store_domain = normalize_text_option(Some(store_domain.into())).ok_or_else(|| {
            Error::InvalidInput("store domain must not be empty".to_string())
        })?;
        if store_domain.contains("://") {
            return Err(Error::InvalidInput(
                "store domain must be a bare hostname, not a URL".to_string(),
            ));
        }

        let access_token = normalize_text_option(Some(access_token.into())).ok_or_else(|| {
            Error::InvalidInput("access token must not be empty".to_string())
        })?;

        let api_version =
            normalize_text_option(api_version).unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

        Ok(Self {
            store_domain,
            access_token,
            api_version,
        })
    }

    /// Read remote settings from `SHOPSYNC_STORE_DOMAIN`,
    /// `SHOPSYNC_ACCESS_TOKEN`, and `SHOPSYNC_API_VERSION`.
    pub fn from_env() -> Result<Self> {
        let store_domain = std::env::var("SHOPSYNC_STORE_DOMAIN").map_err(|_| {
            Error::InvalidInput("SHOPSYNC_STORE_DOMAIN is not set".to_string())
        })?;
        let access_token = std::env::var("SHOPSYNC_ACCESS_TOKEN").map_err(|_| {
            Error::InvalidInput("SHOPSYNC_ACCESS_TOKEN is not set".to_string())
        })?;
        let api_version = std::env::var("SHOPSYNC_API_VERSION").ok();

        Self::new(store_domain, access_token, api_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_empty_values() {
        assert!(RemoteConfig::new("  ", "token", None).is_err());
        assert!(RemoteConfig::new("shop.example.com", "", None).is_err());
    }

    #[test]
    fn new_rejects_url_domains() {
        assert!(RemoteConfig::new("https://shop.example.com", "token", None).is_err());
    }

    #[test]
    fn new_defaults_api_version() {
        let config = RemoteConfig::new("shop.example.com", "token", None).unwrap();
        assert_eq!(config.api_version, DEFAULT_API_VERSION);

        let pinned =
            RemoteConfig::new("shop.example.com", "token", Some("2025-07".to_string())).unwrap();
        assert_eq!(pinned.api_version, "2025-07");
    }

    #[test]
    fn debug_redacts_token() {
        let config = RemoteConfig::new("shop.example.com", "secret-token", None).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }
}
