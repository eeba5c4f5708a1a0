// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! Configuration for background synchronization. Intended to be serialized
//! alongside the application's other preferences.

use crate::traits::HasSettings;
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Contains persistent resource-sync settings.
#[derive(Clone, Debug, Derivative, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(rename_all = "kebab-case")]
pub struct ResourceSyncSettings {
    /// How long after startup to ask the server what's new.
    #[derivative(Default(value = "10_000"))]
    #[serde(default = "ResourceSyncSettings::default_update_check_delay_ms")]
    update_check_delay_ms: u64,

    /// Outdated resources are requested after a random whole number of
    /// seconds in `0..=max_resource_request_delay_secs`, so that they don't
    /// all hit the server at once.
    #[derivative(Default(value = "4"))]
    #[serde(default = "ResourceSyncSettings::default_max_resource_request_delay_secs")]
    max_resource_request_delay_secs: u64,

    /// Overrides the platform tag that's matched against advertised versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    platform: Option<String>,

    #[serde(skip)]
    has_been_saved: bool,
}
impl HasSettings for ResourceSyncSettings {
    fn has_been_saved(&self) -> bool {
        self.has_been_saved
    }

    fn needs_save(&mut self) {
        self.has_been_saved = false;
    }

    fn mark_clean(&mut self) {
        self.has_been_saved = true;
    }
}
impl ResourceSyncSettings {
    fn default_update_check_delay_ms() -> u64 {
        10_000
    }

    fn default_max_resource_request_delay_secs() -> u64 {
        4
    }

    /// Settings with no startup delay and no request staggering, for tests
    /// and command-line use.
    pub fn immediate() -> Self {
        Self {
            update_check_delay_ms: 0,
            max_resource_request_delay_secs: 0,
            ..Default::default()
        }
    }

    /// The delay before the first updates check.
    pub fn update_check_delay(&self) -> Duration {
        Duration::from_millis(self.update_check_delay_ms)
    }

    /// Updates the field and marks the struct eligible to save.
    pub fn set_update_check_delay(&mut self, delay: Duration) {
        let ms = delay.as_millis() as u64;
        if ms != self.update_check_delay_ms {
            self.update_check_delay_ms = ms;
            self.needs_save();
        }
    }

    /// The largest stagger, in seconds, applied to a resource request.
    pub fn max_resource_request_delay_secs(&self) -> u64 {
        self.max_resource_request_delay_secs
    }

    /// Updates the field and marks the struct eligible to save.
    pub fn set_max_resource_request_delay_secs(&mut self, secs: u64) {
        if secs != self.max_resource_request_delay_secs {
            self.max_resource_request_delay_secs = secs;
            self.needs_save();
        }
    }

    /// The platform tag to match against advertised versions.
    pub fn platform(&self) -> String {
        self.platform
            .clone()
            .unwrap_or_else(|| crate::sync::platform_type().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = ResourceSyncSettings::default();
        assert_eq!(s.update_check_delay(), Duration::from_secs(10));
        assert_eq!(s.max_resource_request_delay_secs(), 4);
        assert!(!s.platform().is_empty());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let s: ResourceSyncSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(s.update_check_delay(), Duration::from_secs(10));
        assert_eq!(s.max_resource_request_delay_secs(), 4);

        let s: ResourceSyncSettings =
            serde_json::from_str(r#"{"update-check-delay-ms": 500, "platform": "linux64"}"#)
                .unwrap();
        assert_eq!(s.update_check_delay(), Duration::from_millis(500));
        assert_eq!(s.platform(), "linux64");
    }

    #[test]
    fn setters_mark_dirty() {
        let mut s = ResourceSyncSettings::default();
        s.mark_clean();
        s.set_max_resource_request_delay_secs(4);
        assert!(s.has_been_saved(), "unchanged value shouldn't dirty settings");
        s.set_max_resource_request_delay_secs(2);
        assert!(!s.has_been_saved());
    }
}
