//! Configuration management for the reconciliation report.
//!
//! Configuration is layered: a TOML secrets store is consulted first and the
//! process environment (with `.env` loaded through `dotenvy`) is the fallback.
//! Everything is resolved once into a [`Config`] that is passed by reference
//! to the explorer client, so the fetch pipeline never reads ambient state.
//!
//! ## Keys
//!
//! Required:
//! - `ETHERSCAN_API_KEY_Reconciliation`: explorer API key
//!
//! Optional (with defaults):
//! - `ETHERSCAN_CHAIN_ID`: numeric chain id (default: 1, Ethereum mainnet)
//! - `ETHERSCAN_BASE_URL`: explorer endpoint (default: Etherscan v2 API)
//! - `RECON_SECRETS_FILE`: secrets store path (default: `./secrets.toml`)
//!
//! ## Example
//!
//! ```no_run
//! use usdt_reconciliation::config::Config;
//! use usdt_reconciliation::error::ReconResult;
//!
//! # fn main() -> ReconResult<()> {
//! let config = Config::load()?;
//! println!("Chain id: {}", config.chain_id());
//! # Ok(())
//! # }
//! ```

use crate::error::{ReconError, ReconResult};
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Secrets/environment key holding the explorer API key.
pub const API_KEY_VAR: &str = "ETHERSCAN_API_KEY_Reconciliation";

/// Secrets/environment key holding the chain id.
pub const CHAIN_ID_VAR: &str = "ETHERSCAN_CHAIN_ID";

/// Environment key overriding the explorer endpoint.
pub const BASE_URL_VAR: &str = "ETHERSCAN_BASE_URL";

/// Environment key pointing at the secrets store.
pub const SECRETS_FILE_VAR: &str = "RECON_SECRETS_FILE";

/// Secrets store location used when `RECON_SECRETS_FILE` is unset.
pub const DEFAULT_SECRETS_FILE: &str = "./secrets.toml";

/// Ethereum mainnet.
pub const DEFAULT_CHAIN_ID: u64 = 1;

/// Etherscan multichain (v2) endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.etherscan.io/v2/api";

/// Which configuration layer supplied a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// The TOML secrets store
    Secrets,
    /// Process environment (including `.env`)
    Environment,
    /// Built-in default
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Secrets => write!(f, "secrets store"),
            Self::Environment => write!(f, "environment"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Flat key/value secrets store backed by a TOML document.
#[derive(Debug, Clone, Default)]
pub struct SecretsStore {
    table: toml::Table,
}

impl SecretsStore {
    /// Create an empty store.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the store from a TOML file.
    ///
    /// A missing file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file exists but cannot be read
    /// or is not valid TOML.
    pub fn load<P: AsRef<Path>>(path: P) -> ReconResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No secrets file at {}, using environment only", path.display());
            return Ok(Self::empty());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            ReconError::config(
                format!("Failed to read secrets file {}", path.display()),
                Some(Box::new(e)),
            )
        })?;

        let store = Self::from_toml_str(&contents)?;
        info!("Secrets store loaded from {}", path.display());
        Ok(store)
    }

    /// Parse the store from TOML text.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the text is not valid TOML.
    pub fn from_toml_str(contents: &str) -> ReconResult<Self> {
        let table = contents.parse::<toml::Table>().map_err(|e| {
            ReconError::config("Secrets file is not valid TOML", Some(Box::new(e)))
        })?;
        Ok(Self { table })
    }

    fn get(&self, key: &str) -> Option<&toml::Value> {
        self.table.get(key)
    }
}

/// Resolve the API key and report which layer supplied it.
///
/// Empty values are treated as unset in both layers.
///
/// # Errors
///
/// Returns a configuration error if neither layer has a non-empty key.
pub fn resolve_api_key<F>(
    secrets: &SecretsStore,
    env_lookup: F,
) -> ReconResult<(String, ConfigSource)>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(toml::Value::String(key)) = secrets.get(API_KEY_VAR) {
        if !key.is_empty() {
            return Ok((key.clone(), ConfigSource::Secrets));
        }
    }

    match env_lookup(API_KEY_VAR) {
        Some(key) if !key.is_empty() => Ok((key, ConfigSource::Environment)),
        _ => Err(ReconError::config(
            format!("{API_KEY_VAR} not set in secrets or environment"),
            None,
        )),
    }
}

/// Resolve the API key.
///
/// # Errors
///
/// Returns a configuration error if no key is found in either layer.
pub fn get_api_key<F>(secrets: &SecretsStore, env_lookup: F) -> ReconResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    resolve_api_key(secrets, env_lookup).map(|(key, _)| key)
}

/// Resolve the chain id, defaulting to mainnet when unset.
///
/// # Errors
///
/// Returns a configuration error if a layer holds a value that is not a
/// non-negative integer.
pub fn get_chain_id<F>(secrets: &SecretsStore, env_lookup: F) -> ReconResult<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match secrets.get(CHAIN_ID_VAR) {
        Some(toml::Value::Integer(id)) => {
            return u64::try_from(*id).map_err(|e| {
                ReconError::config(
                    format!("{CHAIN_ID_VAR} must be a non-negative integer, got {id}"),
                    Some(Box::new(e)),
                )
            });
        }
        Some(toml::Value::String(raw)) if !raw.trim().is_empty() => {
            return parse_chain_id(raw);
        }
        Some(toml::Value::String(_)) | None => {}
        Some(other) => {
            return Err(ReconError::config(
                format!("{CHAIN_ID_VAR} must be an integer, got {}", other.type_str()),
                None,
            ));
        }
    }

    match env_lookup(CHAIN_ID_VAR) {
        Some(raw) if !raw.trim().is_empty() => parse_chain_id(&raw),
        _ => Ok(DEFAULT_CHAIN_ID),
    }
}

fn parse_chain_id(raw: &str) -> ReconResult<u64> {
    raw.trim().parse::<u64>().map_err(|e| {
        ReconError::config(
            format!("{CHAIN_ID_VAR} must be an integer, got '{raw}'"),
            Some(Box::new(e)),
        )
    })
}

/// Resolved runtime configuration.
#[derive(Clone)]
pub struct Config {
    /// Explorer API key
    api_key: String,

    /// Layer the key came from
    key_source: ConfigSource,

    /// Numeric chain id sent with every request
    chain_id: u64,

    /// Explorer endpoint
    base_url: String,
}

impl Config {
    /// Load configuration from the secrets store and the environment.
    ///
    /// This function:
    /// 1. Loads `.env` file using `dotenvy` (if present)
    /// 2. Loads the TOML secrets store (`RECON_SECRETS_FILE` or `./secrets.toml`)
    /// 3. Resolves the API key, chain id and endpoint
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the API key is missing, the chain id
    /// is invalid, or the secrets file cannot be parsed.
    pub fn load() -> ReconResult<Self> {
        // Load .env file if present (ignore error if file doesn't exist)
        dotenvy::dotenv().ok();

        let secrets_path =
            env::var(SECRETS_FILE_VAR).unwrap_or_else(|_| DEFAULT_SECRETS_FILE.to_string());
        let secrets = SecretsStore::load(&secrets_path)?;

        Self::from_sources(&secrets, |key| env::var(key).ok())
    }

    /// Build configuration from an explicit secrets store and environment lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`], minus file access.
    pub fn from_sources<F>(secrets: &SecretsStore, env_lookup: F) -> ReconResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (api_key, key_source) = resolve_api_key(secrets, &env_lookup)?;
        let chain_id = get_chain_id(secrets, &env_lookup)?;

        let base_url = env_lookup(BASE_URL_VAR)
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ReconError::config(
                format!("{BASE_URL_VAR} must be an http(s) URL, got: {base_url}"),
                None,
            ));
        }

        debug!(chain_id, key_source = %key_source, "Configuration resolved");

        Ok(Self {
            api_key,
            key_source,
            chain_id,
            base_url,
        })
    }

    /// Create a configuration directly (useful for tests and embedding).
    #[must_use]
    pub fn new(api_key: impl Into<String>, chain_id: u64, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            key_source: ConfigSource::Default,
            chain_id,
            base_url: base_url.into(),
        }
    }

    /// Get the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// API key with all but the last four characters hidden.
    #[must_use]
    pub fn masked_api_key(&self) -> String {
        let visible: String = self
            .api_key
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("****{visible}")
    }

    /// Get the layer that supplied the API key.
    #[must_use]
    pub const fn key_source(&self) -> ConfigSource {
        self.key_source
    }

    /// Get the chain id.
    #[must_use]
    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Get the explorer endpoint.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.masked_api_key())
            .field("key_source", &self.key_source)
            .field("chain_id", &self.chain_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}
