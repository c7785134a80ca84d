//! Domain types and rules of the selective log store.

#![forbid(unsafe_code)]

pub mod codec;
mod event;
mod payload;
mod policy;
mod query;
mod settings;

pub use codec::{CodecError, PayloadFormat};
pub use event::{Crud, EducationLevel, EventData, EventExtra, LogEntry, LogEvent, LogRecord};
pub use payload::{EventPayload, PayloadValue};
pub use policy::{
    CleanupPlan, EVENT_NAME_SEPARATOR, RetentionPolicy, SECONDS_PER_DAY, SkipReason,
    derive_policy_key,
};
pub use query::{LogColumn, LogFilter, LogQuery, LogSort, SortDirection};
pub use settings::{
    DEFAULT_BUFFER_SIZE, ENABLED_SUFFIX, GLOBAL_SETTINGS, SETTING_BUFFER_SIZE,
    SETTING_JSON_FORMAT, SETTING_LOG_GUESTS, SETTING_VERSION, SettingsSnapshot,
    parse_retention_days,
};
