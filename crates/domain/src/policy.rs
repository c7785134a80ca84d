//! Per-event-type write and retention policy.

/// Namespace separator used in fully-qualified event type names.
pub const EVENT_NAME_SEPARATOR: char = '\\';

/// Seconds in one retention day.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Derives the policy key used to index configuration and tag stored rows.
///
/// `\core\event\user_loggedin` becomes `core_event_user_loggedin`.
#[must_use]
pub fn derive_policy_key(event_name: &str) -> String {
    event_name
        .strip_prefix(EVENT_NAME_SEPARATOR)
        .unwrap_or(event_name)
        .replace(EVENT_NAME_SEPARATOR, "_")
}

/// Resolved configuration for one policy key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Whether events of this type are logged and swept.
    pub enabled: bool,
    /// Days a row is kept. Zero keeps rows forever.
    pub retention_days: u32,
}

impl RetentionPolicy {
    /// Returns true when events of this type should be persisted.
    #[must_use]
    pub fn accepts_writes(&self) -> bool {
        self.enabled
    }
}

/// Why the cleanup sweep leaves a policy key alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No configuration exists for the key.
    Unconfigured,
    /// Configuration exists but the enabled flag is off.
    Disabled,
    /// Enabled with a retention of zero days.
    NeverDelete,
}

/// What one sweep invocation does for one policy key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupPlan {
    /// Leave every row of the key in place.
    Skip(SkipReason),
    /// Delete rows created strictly before `cutoff` (unix seconds).
    Purge {
        /// Exclusive upper bound on `timecreated` of deleted rows.
        cutoff: i64,
    },
}

impl CleanupPlan {
    /// Plans cleanup for a resolved policy at time `now` (unix seconds).
    ///
    /// A zero retention is checked before the enabled flag, so a disabled key
    /// with retention zero reports [`SkipReason::NeverDelete`].
    #[must_use]
    pub fn for_policy(policy: Option<RetentionPolicy>, now: i64) -> Self {
        let Some(policy) = policy else {
            return Self::Skip(SkipReason::Unconfigured);
        };
        if policy.retention_days == 0 {
            return Self::Skip(SkipReason::NeverDelete);
        }
        if !policy.enabled {
            return Self::Skip(SkipReason::Disabled);
        }

        Self::Purge {
            cutoff: now.saturating_sub(i64::from(policy.retention_days) * SECONDS_PER_DAY),
        }
    }
}
