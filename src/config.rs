//! Configuration for the settings synchronizer.
//!
//! # Example
//!
//! ```
//! use settings_sync::SyncConfig;
//!
//! // Minimal config (uses defaults)
//! let config = SyncConfig::default();
//! assert_eq!(config.key_prefix, "pref:");
//! assert_eq!(config.pending_log_key, "sync:pending");
//!
//! // From JSON, overriding a few fields
//! let config: SyncConfig = serde_json::from_str(
//!     r#"{ "pending_max_entries": 64, "start_forced_offline": true }"#
//! ).unwrap();
//! assert_eq!(config.pending_max_entries, 64);
//! assert!(config.start_forced_offline);
//! assert_eq!(config.health_failure_threshold, 3);
//! ```

use serde::Deserialize;

/// Configuration for the settings synchronizer.
///
/// All fields have defaults; an empty document is a valid config.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Prefix applied to preference keys in the local store
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Local store key holding the persisted pending log
    #[serde(default = "default_pending_log_key")]
    pub pending_log_key: String,

    /// Pending log size before it is compacted to one entry per key
    #[serde(default = "default_pending_max_entries")]
    pub pending_max_entries: usize,

    /// Consecutive remote failures before the remote is reported degraded
    #[serde(default = "default_health_failure_threshold")]
    pub health_failure_threshold: u64,

    /// Capacity of the preference change broadcast channel
    #[serde(default = "default_change_channel_capacity")]
    pub change_channel_capacity: usize,

    /// Initial value of the user "offline mode" switch
    #[serde(default)]
    pub start_forced_offline: bool,

    /// SQLite file for the durable local store (None = caller supplies a store)
    #[serde(default)]
    pub local_store_path: Option<String>,
}

fn default_key_prefix() -> String { "pref:".to_string() }
fn default_pending_log_key() -> String { "sync:pending".to_string() }
fn default_pending_max_entries() -> usize { 256 }
fn default_health_failure_threshold() -> u64 { 3 }
fn default_change_channel_capacity() -> usize { 64 }

impl SyncConfig {
    /// Local store key for a preference.
    #[must_use]
    pub fn local_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    /// Whether `key` would land on the pending log's own local store key.
    #[must_use]
    pub fn collides_with_pending_log(&self, key: &str) -> bool {
        self.local_key(key) == self.pending_log_key
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            pending_log_key: default_pending_log_key(),
            pending_max_entries: default_pending_max_entries(),
            health_failure_threshold: default_health_failure_threshold(),
            change_channel_capacity: default_change_channel_capacity(),
            start_forced_offline: false,
            local_store_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_matches_default() {
        let parsed: SyncConfig = serde_json::from_str("{}").unwrap();
        let default = SyncConfig::default();
        assert_eq!(parsed.key_prefix, default.key_prefix);
        assert_eq!(parsed.pending_log_key, default.pending_log_key);
        assert_eq!(parsed.pending_max_entries, default.pending_max_entries);
        assert_eq!(parsed.change_channel_capacity, default.change_channel_capacity);
        assert!(parsed.local_store_path.is_none());
    }

    #[test]
    fn test_local_key() {
        let config = SyncConfig {
            key_prefix: "acct1/".into(),
            ..Default::default()
        };
        assert_eq!(config.local_key("font_size"), "acct1/font_size");
    }

    #[test]
    fn test_pending_log_collision() {
        assert!(!SyncConfig::default().collides_with_pending_log("pending"));

        let config = SyncConfig {
            key_prefix: String::new(),
            pending_log_key: "pending".into(),
            ..Default::default()
        };
        assert!(config.collides_with_pending_log("pending"));
        assert!(!config.collides_with_pending_log("theme"));
    }
}
