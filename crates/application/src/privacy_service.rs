use std::sync::Arc;

use logstore_core::AppResult;

use crate::LogStoreRepository;

/// Describes the collection of stored events as a whole.
pub const PRIVACY_SUMMARY: &str = "A collection of past events";

/// A stored column holding personal data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrivacyField {
    /// Column name.
    pub column: &'static str,
    /// Human-readable description.
    pub description: &'static str,
}

const PRIVACY_FIELDS: [PrivacyField; 9] = [
    PrivacyField {
        column: "eventname",
        description: "The event name",
    },
    PrivacyField {
        column: "userid",
        description: "The ID of the user who triggered this event",
    },
    PrivacyField {
        column: "relateduserid",
        description: "The ID of a user related to this event",
    },
    PrivacyField {
        column: "anonymous",
        description: "Whether the event was flagged as anonymous",
    },
    PrivacyField {
        column: "other",
        description: "Additional information about the event",
    },
    PrivacyField {
        column: "timecreated",
        description: "The time when the event occurred",
    },
    PrivacyField {
        column: "origin",
        description: "The origin of the event",
    },
    PrivacyField {
        column: "ip",
        description: "The IP address used at the time of the event",
    },
    PrivacyField {
        column: "realuserid",
        description: "The ID of the real user behind the event, when masquerading a user.",
    },
];

/// Personal-data discovery over the log store.
#[derive(Clone)]
pub struct PrivacyService {
    repository: Arc<dyn LogStoreRepository>,
}

impl PrivacyService {
    /// Creates a privacy service over a log store.
    #[must_use]
    pub fn new(repository: Arc<dyn LogStoreRepository>) -> Self {
        Self { repository }
    }

    /// Lists the columns that hold personal data.
    #[must_use]
    pub fn metadata(&self) -> &'static [PrivacyField] {
        &PRIVACY_FIELDS
    }

    /// Describes what the stored rows represent.
    #[must_use]
    pub fn summary(&self) -> &'static str {
        PRIVACY_SUMMARY
    }

    /// Contexts in which the user acted, was affected, or was impersonated.
    pub async fn context_ids_for_user(&self, user_id: i64) -> AppResult<Vec<i64>> {
        self.repository.context_ids_for_user(user_id).await
    }

    /// Users appearing in any user column of a context.
    pub async fn user_ids_for_context(&self, context_id: i64) -> AppResult<Vec<i64>> {
        self.repository.user_ids_for_context(context_id).await
    }

    /// Path under which exported log data is filed.
    #[must_use]
    pub fn export_subcontext(&self) -> [&'static str; 2] {
        ["Logs", "Selective log"]
    }
}
