//! Immutable snapshot of the store's flat configuration.

use std::collections::BTreeMap;

use logstore_core::{AppError, AppResult};

use crate::{PayloadFormat, RetentionPolicy};

/// Schema version marker written by installers.
pub const SETTING_VERSION: &str = "version";
/// Whether guest and not-logged-in activity is logged.
pub const SETTING_LOG_GUESTS: &str = "logguests";
/// Whether payloads are stored as JSON instead of the native format.
pub const SETTING_JSON_FORMAT: &str = "jsonformat";
/// Number of events buffered before a batch insert.
pub const SETTING_BUFFER_SIZE: &str = "buffersize";

/// Settings that never name a policy key.
pub const GLOBAL_SETTINGS: [&str; 4] = [
    SETTING_VERSION,
    SETTING_LOG_GUESTS,
    SETTING_JSON_FORMAT,
    SETTING_BUFFER_SIZE,
];

/// Suffix of the per-key enabled flag.
pub const ENABLED_SUFFIX: &str = "_enabled";

/// Write buffer size used when none is configured.
pub const DEFAULT_BUFFER_SIZE: usize = 50;

/// Flat `name -> value` configuration read once per operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsSnapshot {
    values: BTreeMap<String, String>,
}

impl SettingsSnapshot {
    /// Creates a snapshot from raw name/value pairs.
    #[must_use]
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    /// Builder-style setter, mainly for composing snapshots in tests and tools.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Enables a policy key with a retention window in days.
    #[must_use]
    pub fn with_policy(self, policy_key: &str, retention_days: u32) -> Self {
        self.with(policy_key, retention_days.to_string())
            .with(format!("{policy_key}{ENABLED_SUFFIX}"), "1")
    }

    /// Returns the raw value for a setting.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Returns whether payloads are written and read as JSON.
    #[must_use]
    pub fn json_format(&self) -> bool {
        self.get(SETTING_JSON_FORMAT).is_none_or(is_truthy)
    }

    /// Returns the configured payload format.
    #[must_use]
    pub fn payload_format(&self) -> PayloadFormat {
        PayloadFormat::from_json_flag(self.json_format())
    }

    /// Returns whether guest activity is logged.
    #[must_use]
    pub fn log_guests(&self) -> bool {
        self.get(SETTING_LOG_GUESTS).is_none_or(is_truthy)
    }

    /// Returns the write buffer size, never less than one.
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.get(SETTING_BUFFER_SIZE)
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_BUFFER_SIZE)
            .max(1)
    }

    /// Resolves the policy for a key.
    ///
    /// Returns `None` when the key has no value at all. A present value with
    /// a missing or falsy enabled flag resolves as disabled.
    #[must_use]
    pub fn resolve(&self, policy_key: &str) -> Option<RetentionPolicy> {
        let value = self.get(policy_key)?;
        let enabled = self
            .get(&format!("{policy_key}{ENABLED_SUFFIX}"))
            .is_some_and(is_truthy);

        Some(RetentionPolicy {
            enabled,
            retention_days: parse_retention_days(value).unwrap_or(0),
        })
    }

    /// Returns every setting name that may be a policy key, in name order.
    pub fn policy_keys(&self) -> impl Iterator<Item = &str> {
        self.values
            .keys()
            .map(String::as_str)
            .filter(|name| !GLOBAL_SETTINGS.contains(name))
    }
}

/// Parses a stored retention value in days. Empty text means zero.
pub fn parse_retention_days(value: &str) -> AppResult<u32> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }

    trimmed.parse::<u32>().map_err(|error| {
        AppError::Validation(format!("invalid retention value '{value}': {error}"))
    })
}

fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    !(value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false"))
}
