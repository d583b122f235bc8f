//! Stored entry with expiry metadata

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A value held by [`MemoryStore`](super::MemoryStore)
#[derive(Debug, Clone)]
pub struct StoredEntry {
    /// Encoded outcome as written by the cache
    pub value: Bytes,

    /// Entry metadata
    pub metadata: EntryMetadata,
}

impl StoredEntry {
    /// Create an entry that expires after `ttl`
    pub fn new(value: Bytes, ttl: Duration) -> Self {
        let now = Utc::now();
        let expires_at =
            now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(300));

        Self {
            value,
            metadata: EntryMetadata {
                created_at: now,
                expires_at,
                version: 1,
            },
        }
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.metadata.expires_at
    }

    /// Get time until expiration
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let now = Utc::now();
        if now >= self.metadata.expires_at {
            None
        } else {
            (self.metadata.expires_at - now).to_std().ok()
        }
    }

    /// Overwrite the value and restart the expiry clock
    pub fn overwrite(&mut self, value: Bytes, ttl: Duration) {
        self.value = value;
        self.metadata.expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(300));
        self.metadata.version += 1;
    }
}

/// Metadata associated with a stored entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// When the key was first written
    pub created_at: DateTime<Utc>,

    /// When the entry expires
    pub expires_at: DateTime<Utc>,

    /// Number of writes to this key, starting at 1
    pub version: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_entry_creation() {
        let entry = StoredEntry::new(Bytes::from_static(b"Shello"), Duration::from_secs(60));

        assert_eq!(entry.value, Bytes::from_static(b"Shello"));
        assert!(!entry.is_expired());
        assert_eq!(entry.metadata.version, 1);
    }

    #[test]
    fn test_entry_expiration() {
        let entry = StoredEntry::new(Bytes::from_static(b"B"), Duration::from_millis(50));

        assert!(!entry.is_expired());
        sleep(Duration::from_millis(80));
        assert!(entry.is_expired());
        assert!(entry.time_until_expiration().is_none());
    }

    #[test]
    fn test_overwrite_bumps_version_and_expiry() {
        let mut entry = StoredEntry::new(Bytes::from_static(b"Sold"), Duration::from_secs(10));
        let original_expiry = entry.metadata.expires_at;

        entry.overwrite(Bytes::from_static(b"Snew"), Duration::from_secs(3600));

        assert_eq!(entry.value, Bytes::from_static(b"Snew"));
        assert_eq!(entry.metadata.version, 2);
        assert!(entry.metadata.expires_at > original_expiry);
    }

    #[test]
    fn test_time_until_expiration() {
        let entry = StoredEntry::new(Bytes::new(), Duration::from_secs(3600));

        let time_left = entry.time_until_expiration().unwrap();
        assert!(time_left <= Duration::from_secs(3600));
        assert!(time_left > Duration::from_secs(3500));
    }
}
