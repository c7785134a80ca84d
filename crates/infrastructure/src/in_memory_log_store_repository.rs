use std::collections::BTreeSet;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use tokio::sync::RwLock;

use logstore_application::{LogRecordStream, LogStoreRepository};
use logstore_core::AppResult;
use logstore_domain::{LogEntry, LogFilter, LogQuery, LogRecord};

/// In-memory log store, ordered by insertion.
#[derive(Debug, Default)]
pub struct InMemoryLogStoreRepository {
    state: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    records: Vec<LogRecord>,
    last_id: i64,
}

impl InMemoryLogStoreRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn collect_distinct<F, I>(&self, project: F) -> Vec<i64>
    where
        F: Fn(&LogRecord) -> I,
        I: IntoIterator<Item = i64>,
    {
        let state = self.state.read().await;
        state
            .records
            .iter()
            .flat_map(project)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[async_trait]
impl LogStoreRepository for InMemoryLogStoreRepository {
    async fn insert_entries(&self, entries: Vec<LogEntry>) -> AppResult<()> {
        let mut state = self.state.write().await;
        for entry in entries {
            state.last_id += 1;
            let id = state.last_id;
            state.records.push(LogRecord { id, entry });
        }

        Ok(())
    }

    async fn select_records(&self, query: LogQuery) -> AppResult<Vec<LogRecord>> {
        let state = self.state.read().await;
        let sort = query.sort.normalized();

        let mut matching: Vec<LogRecord> = state
            .records
            .iter()
            .filter(|record| query.filter.matches(&record.entry))
            .cloned()
            .collect();
        matching.sort_by(|left, right| sort.compare(left, right));

        Ok(matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect())
    }

    fn stream_records(&self, query: LogQuery) -> LogRecordStream<'_> {
        stream::once(self.select_records(query))
            .map_ok(|records| stream::iter(records.into_iter().map(Ok)))
            .try_flatten()
            .boxed()
    }

    async fn count_records(&self, filter: LogFilter) -> AppResult<u64> {
        let state = self.state.read().await;
        Ok(state
            .records
            .iter()
            .filter(|record| filter.matches(&record.entry))
            .count() as u64)
    }

    async fn records_exist(&self, filter: LogFilter) -> AppResult<bool> {
        let state = self.state.read().await;
        Ok(state
            .records
            .iter()
            .any(|record| filter.matches(&record.entry)))
    }

    async fn min_time_created(&self, config_name: &str, before: i64) -> AppResult<Option<i64>> {
        let state = self.state.read().await;
        Ok(state
            .records
            .iter()
            .filter(|record| {
                record.entry.config_name == config_name && record.entry.time_created < before
            })
            .map(|record| record.entry.time_created)
            .min())
    }

    async fn delete_created_before(&self, config_name: &str, before: i64) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let previous_len = state.records.len();
        state.records.retain(|record| {
            record.entry.config_name != config_name || record.entry.time_created >= before
        });

        Ok((previous_len - state.records.len()) as u64)
    }

    async fn context_ids_for_user(&self, user_id: i64) -> AppResult<Vec<i64>> {
        Ok(self
            .collect_distinct(|record| {
                let entry = &record.entry;
                (entry.user_id == user_id
                    || entry.related_user_id == Some(user_id)
                    || entry.real_user_id == Some(user_id))
                .then_some(entry.context_id)
            })
            .await)
    }

    async fn user_ids_for_context(&self, context_id: i64) -> AppResult<Vec<i64>> {
        Ok(self
            .collect_distinct(|record| {
                let entry = &record.entry;
                (entry.context_id == context_id)
                    .then(|| [Some(entry.user_id), entry.related_user_id, entry.real_user_id])
                    .into_iter()
                    .flatten()
                    .flatten()
            })
            .await)
    }
}
