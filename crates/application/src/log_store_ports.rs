use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use logstore_core::AppResult;
use logstore_domain::{LogEntry, LogEvent, LogFilter, LogQuery, LogRecord, SettingsSnapshot};

/// Lazily produced log rows. Dropping the stream releases the underlying
/// cursor and connection.
pub type LogRecordStream<'a> = BoxStream<'a, AppResult<LogRecord>>;

/// Storage port for the log table.
#[async_trait]
pub trait LogStoreRepository: Send + Sync {
    /// Inserts all entries with one multi-row statement. Either every row is
    /// stored or the call fails.
    async fn insert_entries(&self, entries: Vec<LogEntry>) -> AppResult<()>;

    /// Returns matching rows in the query's order and page.
    async fn select_records(&self, query: LogQuery) -> AppResult<Vec<LogRecord>>;

    /// Streams matching rows in the query's order and page.
    fn stream_records(&self, query: LogQuery) -> LogRecordStream<'_>;

    /// Counts matching rows.
    async fn count_records(&self, filter: LogFilter) -> AppResult<u64>;

    /// Returns whether any row matches.
    async fn records_exist(&self, filter: LogFilter) -> AppResult<bool>;

    /// Returns the oldest creation time among rows of `config_name` created
    /// before `before`.
    async fn min_time_created(&self, config_name: &str, before: i64) -> AppResult<Option<i64>>;

    /// Deletes rows of `config_name` created before `before` and returns the
    /// number removed.
    async fn delete_created_before(&self, config_name: &str, before: i64) -> AppResult<u64>;

    /// Lists contexts where the user appears as actor, related user or real
    /// user, ascending and without duplicates.
    async fn context_ids_for_user(&self, user_id: i64) -> AppResult<Vec<i64>>;

    /// Lists users appearing in a context in any user column, ascending and
    /// without duplicates.
    async fn user_ids_for_context(&self, context_id: i64) -> AppResult<Vec<i64>>;
}

/// Port for the store's flat configuration.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Reads every setting into an immutable snapshot.
    async fn load_snapshot(&self) -> AppResult<SettingsSnapshot>;

    /// Creates or replaces one setting.
    async fn save_setting(&self, name: &str, value: &str) -> AppResult<()>;
}

/// Rehydrates typed events from stored rows.
pub trait EventFactory: Send + Sync {
    /// Event type produced by the factory.
    type Event: Send;

    /// Builds an event, or returns `None` when the data is not acceptable,
    /// for example because the event type is no longer registered.
    fn restore(&self, event: LogEvent) -> Option<Self::Event>;
}

/// Wall clock used for cutoffs and time budgets.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
