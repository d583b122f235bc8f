//! Configuration for the cache decorator

use crate::cache::ttl::TtlConfig;
use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "fetch";

/// How the store and upstream are consulted for a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Store first, upstream on miss, then populate in the background
    #[default]
    Readthrough,

    /// Store and upstream concurrently, first usable answer wins
    Race,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Readthrough => write!(f, "readthrough"),
            Strategy::Race => write!(f, "race"),
        }
    }
}

impl FromStr for Strategy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "readthrough" => Ok(Strategy::Readthrough),
            "race" => Ok(Strategy::Race),
            other => Err(CacheError::InvalidConfig(format!(
                "unknown strategy '{}' (expected readthrough or race)",
                other
            ))),
        }
    }
}

/// What a race does when the store already holds upstream's exact encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Leave the entry alone; its expiry is not extended
    #[default]
    SkipIdentical,

    /// Rewrite it anyway so the expiry restarts
    Always,
}

impl FromStr for RefreshPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip_identical" => Ok(RefreshPolicy::SkipIdentical),
            "always" => Ok(RefreshPolicy::Always),
            other => Err(CacheError::InvalidConfig(format!(
                "unknown refresh policy '{}' (expected skip_identical or always)",
                other
            ))),
        }
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// Immutable decorator configuration, validated once at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Expiry for stored entries
    pub ttl: TtlConfig,

    /// Consistency strategy
    #[serde(default)]
    pub strategy: Strategy,

    /// Prefix separating this decorator's keys from others on the same store
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Race behaviour when store and upstream agree
    #[serde(default)]
    pub refresh_policy: RefreshPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: TtlConfig::default(),
            strategy: Strategy::default(),
            namespace: default_namespace(),
            refresh_policy: RefreshPolicy::default(),
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.ttl.validate()?;

        if self.namespace.is_empty() {
            return Err(CacheError::InvalidConfig(
                "namespace must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Parse and validate a JSON configuration such as
    /// `{"ttl": {"a.com": 60, "default": 300}, "strategy": "race", "namespace": "tiles"}`
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let config: CacheConfig = serde_json::from_value(value)
            .map_err(|e| CacheError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the environment, reading `.env` if present
    ///
    /// - `FETCH_CACHE_TTL` (required): `120` or `a.com=60,default=300`
    /// - `FETCH_CACHE_STRATEGY`: `readthrough` (default) or `race`
    /// - `FETCH_CACHE_NAMESPACE`: key prefix, default `fetch`
    /// - `FETCH_CACHE_REFRESH_POLICY`: `skip_identical` (default) or `always`
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source
    pub fn from_lookup<L>(lookup: L) -> Result<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let ttl = lookup("FETCH_CACHE_TTL").ok_or_else(|| {
            CacheError::InvalidConfig("FETCH_CACHE_TTL is not set".to_string())
        })?;

        let mut builder = CacheConfig::builder().ttl(ttl.parse::<TtlConfig>()?);

        if let Some(strategy) = lookup("FETCH_CACHE_STRATEGY") {
            builder = builder.strategy(strategy.parse()?);
        }
        if let Some(namespace) = lookup("FETCH_CACHE_NAMESPACE") {
            builder = builder.namespace(namespace);
        }
        if let Some(policy) = lookup("FETCH_CACHE_REFRESH_POLICY") {
            builder = builder.refresh_policy(policy.parse()?);
        }

        builder.build()
    }
}

/// Builder for cache configuration with validation
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    ttl: Option<TtlConfig>,
    strategy: Option<Strategy>,
    namespace: Option<String>,
    refresh_policy: Option<RefreshPolicy>,
}

impl CacheConfigBuilder {
    /// Set the expiry configuration (required)
    pub fn ttl(mut self, ttl: TtlConfig) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Use one expiry for every host
    pub fn ttl_secs(self, secs: u64) -> Self {
        self.ttl(TtlConfig::Flat(secs))
    }

    /// Set the consistency strategy
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Set the key namespace
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the race refresh policy
    pub fn refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = Some(policy);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<CacheConfig> {
        let ttl = self
            .ttl
            .ok_or_else(|| CacheError::InvalidConfig("ttl is required".to_string()))?;

        let config = CacheConfig {
            ttl,
            strategy: self.strategy.unwrap_or_default(),
            namespace: self.namespace.unwrap_or_else(default_namespace),
            refresh_policy: self.refresh_policy.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }
}
