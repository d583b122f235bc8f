//! Expiry resolution per URL

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use url::Url;

/// Expiry used when a per-host map has neither a match nor a `default`
pub const FALLBACK_TTL_SECS: u64 = 300;

/// How long stored entries live, in seconds
///
/// Deserializes from either a bare number or a map of hostnames with an
/// optional `default` entry:
///
/// ```
/// use fetch_cache::cache::TtlConfig;
///
/// let flat: TtlConfig = serde_json::from_str("120").unwrap();
/// let hosts: TtlConfig = serde_json::from_str(r#"{"a.com": 60, "default": 300}"#).unwrap();
///
/// assert_eq!(flat.resolve("https://b.com/x").unwrap(), 120);
/// assert_eq!(hosts.resolve("https://a.com/x").unwrap(), 60);
/// assert_eq!(hosts.resolve("https://b.com/x").unwrap(), 300);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TtlConfig {
    /// Same expiry for every key
    Flat(u64),

    /// Expiry by exact hostname, then `default`, then [`FALLBACK_TTL_SECS`]
    PerHost {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<u64>,
        #[serde(flatten)]
        hosts: HashMap<String, u64>,
    },
}

impl Default for TtlConfig {
    fn default() -> Self {
        TtlConfig::Flat(FALLBACK_TTL_SECS)
    }
}

impl TtlConfig {
    /// Create a per-host configuration with an optional default
    pub fn per_host(default: Option<u64>) -> Self {
        TtlConfig::PerHost {
            default,
            hosts: HashMap::new(),
        }
    }

    /// Add or replace one hostname entry
    ///
    /// A flat configuration becomes per-host with the flat value as default.
    pub fn with_host(self, host: impl Into<String>, secs: u64) -> Self {
        let (default, mut hosts) = match self {
            TtlConfig::Flat(secs) => (Some(secs), HashMap::new()),
            TtlConfig::PerHost { default, hosts } => (default, hosts),
        };
        hosts.insert(host.into(), secs);
        TtlConfig::PerHost { default, hosts }
    }

    /// Reject zero expiries, which the store would treat as "no entry"
    pub fn validate(&self) -> Result<()> {
        match self {
            TtlConfig::Flat(0) => Err(CacheError::InvalidConfig(
                "ttl must be greater than 0".to_string(),
            )),
            TtlConfig::Flat(_) => Ok(()),
            TtlConfig::PerHost { default, hosts } => {
                if *default == Some(0) {
                    return Err(CacheError::InvalidConfig(
                        "default ttl must be greater than 0".to_string(),
                    ));
                }
                if let Some((host, _)) = hosts.iter().find(|(_, secs)| **secs == 0) {
                    return Err(CacheError::InvalidConfig(format!(
                        "ttl for host '{}' must be greater than 0",
                        host
                    )));
                }
                Ok(())
            }
        }
    }

    /// Resolve the expiry in seconds for a URL
    ///
    /// The URL is parsed even for flat configurations so that malformed
    /// input is rejected before the store is touched.
    pub fn resolve(&self, url: &str) -> Result<u64> {
        let host = hostname(url)?;

        Ok(match self {
            TtlConfig::Flat(secs) => *secs,
            TtlConfig::PerHost { default, hosts } => hosts
                .get(&host)
                .copied()
                .or(*default)
                .unwrap_or(FALLBACK_TTL_SECS),
        })
    }
}

fn hostname(url: &str) -> Result<String> {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        // Path-only keys such as `/x` have no host
        Err(url::ParseError::RelativeUrlWithoutBase) => return Ok(String::new()),
        Err(e) => {
            return Err(CacheError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            })
        }
    };

    // Opaque URLs such as `data:` carry no host; they resolve through the default
    Ok(parsed.host_str().unwrap_or_default().to_string())
}

/// Parses `120` or `a.com=60,b.com=90,default=300`
impl FromStr for TtlConfig {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(secs) = s.parse::<u64>() {
            return Ok(TtlConfig::Flat(secs));
        }

        let mut config = TtlConfig::per_host(None);
        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (host, secs) = pair.split_once('=').ok_or_else(|| {
                CacheError::InvalidConfig(format!("expected host=seconds, got '{}'", pair))
            })?;
            let secs: u64 = secs.trim().parse().map_err(|_| {
                CacheError::InvalidConfig(format!("invalid ttl seconds in '{}'", pair))
            })?;

            config = match (host.trim(), config) {
                ("default", TtlConfig::PerHost { hosts, .. }) => TtlConfig::PerHost {
                    default: Some(secs),
                    hosts,
                },
                (host, config) => config.with_host(host, secs),
            };
        }

        if config == TtlConfig::per_host(None) {
            return Err(CacheError::InvalidConfig(format!("empty ttl '{}'", s)));
        }
        Ok(config)
    }
}
