use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use futures::StreamExt;

use logstore_core::{AppError, AppResult, NonEmptyString};
use logstore_domain::{
    Crud, EducationLevel, EventData, EventExtra, EventPayload, LogEntry, LogEvent, LogFilter,
    LogQuery, LogRecord, SettingsSnapshot,
};

use crate::{Clock, LogRecordStream, LogStoreRepository, SettingsRepository};

/// Vec-backed log table with failure switches and call counters.
#[derive(Default)]
pub(crate) struct FakeLogStore {
    pub(crate) records: Mutex<Vec<LogRecord>>,
    next_id: AtomicI64,
    pub(crate) insert_calls: AtomicUsize,
    pub(crate) delete_calls: AtomicUsize,
    pub(crate) fail_inserts: AtomicBool,
    /// One-based delete call from which deletes fail.
    pub(crate) fail_deletes_from: Mutex<Option<usize>>,
}

impl FakeLogStore {
    pub(crate) fn snapshot(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub(crate) fn seed(&self, entries: Vec<LogEntry>) {
        if let Ok(mut records) = self.records.lock() {
            for entry in entries {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                records.push(LogRecord { id, entry });
            }
        }
    }

    fn matching(&self, query: &LogQuery) -> Vec<LogRecord> {
        let mut matching: Vec<LogRecord> = self
            .snapshot()
            .into_iter()
            .filter(|record| query.filter.matches(&record.entry))
            .collect();
        matching.sort_by(|left, right| query.sort.compare(left, right));
        matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

#[async_trait]
impl LogStoreRepository for FakeLogStore {
    async fn insert_entries(&self, entries: Vec<LogEntry>) -> AppResult<()> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(AppError::Storage("insert rejected".to_owned()));
        }
        self.seed(entries);
        Ok(())
    }

    async fn select_records(&self, query: LogQuery) -> AppResult<Vec<LogRecord>> {
        Ok(self.matching(&query))
    }

    fn stream_records(&self, query: LogQuery) -> LogRecordStream<'_> {
        futures::stream::iter(self.matching(&query).into_iter().map(Ok)).boxed()
    }

    async fn count_records(&self, filter: LogFilter) -> AppResult<u64> {
        Ok(self
            .snapshot()
            .iter()
            .filter(|record| filter.matches(&record.entry))
            .count() as u64)
    }

    async fn records_exist(&self, filter: LogFilter) -> AppResult<bool> {
        Ok(self.count_records(filter).await? > 0)
    }

    async fn min_time_created(&self, config_name: &str, before: i64) -> AppResult<Option<i64>> {
        Ok(self
            .snapshot()
            .iter()
            .filter(|record| {
                record.entry.config_name == config_name && record.entry.time_created < before
            })
            .map(|record| record.entry.time_created)
            .min())
    }

    async fn delete_created_before(&self, config_name: &str, before: i64) -> AppResult<u64> {
        let call = self.delete_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let fail_from = self.fail_deletes_from.lock().ok().and_then(|value| *value);
        if fail_from.is_some_and(|from| call >= from) {
            return Err(AppError::Storage("delete failed".to_owned()));
        }
        let Ok(mut records) = self.records.lock() else {
            return Err(AppError::Internal("fake store poisoned".to_owned()));
        };
        let before_len = records.len();
        records.retain(|record| {
            !(record.entry.config_name == config_name && record.entry.time_created < before)
        });
        Ok((before_len - records.len()) as u64)
    }

    async fn context_ids_for_user(&self, user_id: i64) -> AppResult<Vec<i64>> {
        Ok(self
            .snapshot()
            .iter()
            .filter(|record| {
                record.entry.user_id == user_id
                    || record.entry.related_user_id == Some(user_id)
                    || record.entry.real_user_id == Some(user_id)
            })
            .map(|record| record.entry.context_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect())
    }

    async fn user_ids_for_context(&self, context_id: i64) -> AppResult<Vec<i64>> {
        Ok(self
            .snapshot()
            .iter()
            .filter(|record| record.entry.context_id == context_id)
            .flat_map(|record| {
                [
                    Some(record.entry.user_id),
                    record.entry.related_user_id,
                    record.entry.real_user_id,
                ]
            })
            .flatten()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect())
    }
}

/// Settings repository serving a fixed snapshot.
pub(crate) struct FakeSettings(pub(crate) Mutex<SettingsSnapshot>);

impl FakeSettings {
    pub(crate) fn new(snapshot: SettingsSnapshot) -> Self {
        Self(Mutex::new(snapshot))
    }
}

#[async_trait]
impl SettingsRepository for FakeSettings {
    async fn load_snapshot(&self) -> AppResult<SettingsSnapshot> {
        self.0
            .lock()
            .map(|snapshot| snapshot.clone())
            .map_err(|_| AppError::Internal("fake settings poisoned".to_owned()))
    }

    async fn save_setting(&self, name: &str, value: &str) -> AppResult<()> {
        let mut snapshot = self
            .0
            .lock()
            .map_err(|_| AppError::Internal("fake settings poisoned".to_owned()))?;
        *snapshot = snapshot.clone().with(name, value);
        Ok(())
    }
}

/// Clock that starts at a fixed instant and advances by `step_seconds` on
/// every read.
pub(crate) struct SteppingClock {
    current: Mutex<DateTime<Utc>>,
    step_seconds: i64,
}

impl SteppingClock {
    pub(crate) fn new(start_unix: i64, step_seconds: i64) -> Self {
        Self {
            current: Mutex::new(DateTime::from_timestamp(start_unix, 0).unwrap_or_default()),
            step_seconds,
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let Ok(mut current) = self.current.lock() else {
            return DateTime::default();
        };
        let now = *current;
        *current = now + TimeDelta::seconds(self.step_seconds);
        now
    }
}

/// Builds a dispatched event of the given type created at `time_created`.
pub(crate) fn log_event(event_name: &str, time_created: i64) -> LogEvent {
    LogEvent {
        data: EventData {
            event_name: NonEmptyString::new(event_name)
                .unwrap_or_else(|_| panic!("fixture event name must not be empty")),
            component: "core".to_owned(),
            action: "viewed".to_owned(),
            target: "course".to_owned(),
            object_table: Some("course".to_owned()),
            object_id: Some(2),
            crud: Crud::Read,
            edu_level: EducationLevel::Participating,
            context_id: 20,
            user_id: 5,
            related_user_id: None,
            anonymous: false,
            other: EventPayload::new(),
            time_created,
        },
        extra: EventExtra {
            origin: Some("web".to_owned()),
            ip: Some("192.0.2.10".to_owned()),
            real_user_id: None,
        },
    }
}

/// Builds a stored row for `config_name` created at `time_created`.
pub(crate) fn log_entry(config_name: &str, time_created: i64) -> LogEntry {
    LogEntry {
        event_name: format!("\\{}", config_name.replacen('_', "\\", 2)),
        component: "core".to_owned(),
        action: "viewed".to_owned(),
        target: "course".to_owned(),
        object_table: None,
        object_id: None,
        crud: Crud::Read,
        edu_level: EducationLevel::Participating,
        context_id: 20,
        user_id: 5,
        related_user_id: None,
        anonymous: false,
        other: "{}".to_owned(),
        time_created,
        origin: Some("web".to_owned()),
        ip: None,
        real_user_id: None,
        config_name: config_name.to_owned(),
    }
}
