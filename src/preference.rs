// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Preference values.
//!
//! A [`PreferenceEntry`] is the unit that flows through the synchronizer: a
//! named JSON value plus the time it was last written on this device. Typed
//! preferences implement [`Preference`] to get a stable key and a serde
//! round trip.
//!
//! # Example
//!
//! ```
//! use settings_sync::preference::{FontSize, Preference, PreferenceEntry};
//!
//! let entry = PreferenceEntry::from_typed(&FontSize::Large).unwrap();
//! assert_eq!(entry.key, FontSize::KEY);
//! assert_eq!(entry.value, serde_json::json!("large"));
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::synchronizer::SyncError;

/// Prefix reserved for the synchronizer's own bookkeeping keys.
pub const RESERVED_PREFIX: &str = "sync:";

/// Current wall clock as epoch millis.
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// A typed, named piece of user configuration.
pub trait Preference: Serialize + DeserializeOwned + Send + Sync {
    /// Field name in both the local cache and the remote profile document.
    const KEY: &'static str;
}

/// Check that a key can be stored and synced.
pub fn validate_key(key: &str) -> Result<(), SyncError> {
    if key.is_empty() {
        return Err(SyncError::InvalidKey {
            key: key.to_string(),
            reason: "empty",
        });
    }
    if key.starts_with(RESERVED_PREFIX) {
        return Err(SyncError::InvalidKey {
            key: key.to_string(),
            reason: "uses the reserved sync: prefix",
        });
    }
    if key.chars().any(char::is_whitespace) {
        return Err(SyncError::InvalidKey {
            key: key.to_string(),
            reason: "contains whitespace",
        });
    }
    Ok(())
}

/// A preference value as written on this device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceEntry {
    pub key: String,
    pub value: Value,
    /// Last local write (epoch millis)
    pub updated_at: i64,
}

impl PreferenceEntry {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
            updated_at: now_millis(),
        }
    }

    /// Build an entry from a typed preference.
    pub fn from_typed<P: Preference>(pref: &P) -> Result<Self, SyncError> {
        Ok(Self::new(P::KEY, serde_json::to_value(pref)?))
    }

    /// Decode the value as a typed preference.
    pub fn to_typed<P: Preference>(&self) -> Result<P, SyncError> {
        Ok(serde_json::from_value(self.value.clone())?)
    }
}

/// Accessibility font size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
    ExtraLarge,
}

impl FontSize {
    /// Scale factor applied to the base text size.
    #[must_use]
    pub fn scale(self) -> f32 {
        match self {
            Self::Small => 0.875,
            Self::Medium => 1.0,
            Self::Large => 1.25,
            Self::ExtraLarge => 1.5,
        }
    }
}

impl Preference for FontSize {
    const KEY: &'static str = "font_size";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_entry_is_stamped() {
        let entry = PreferenceEntry::new("theme", json!("dark"));
        assert_eq!(entry.key, "theme");
        assert!(entry.updated_at > 0);
    }

    #[test]
    fn test_typed_round_trip() {
        let entry = PreferenceEntry::from_typed(&FontSize::ExtraLarge).unwrap();
        assert_eq!(entry.value, json!("extra_large"));
        assert_eq!(entry.to_typed::<FontSize>().unwrap(), FontSize::ExtraLarge);
    }

    #[test]
    fn test_to_typed_rejects_wrong_shape() {
        let entry = PreferenceEntry::new(FontSize::KEY, json!(42));
        assert!(matches!(entry.to_typed::<FontSize>(), Err(SyncError::Serialization(_))));
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("font_size").is_ok());
        assert!(validate_key("notifications.frequency").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("sync:pending").is_err());
        assert!(validate_key("font size").is_err());
    }

    #[test]
    fn test_font_size_scale_is_monotonic() {
        assert!(FontSize::Small.scale() < FontSize::Medium.scale());
        assert!(FontSize::Large.scale() < FontSize::ExtraLarge.scale());
        assert_eq!(FontSize::default(), FontSize::Medium);
    }
}
