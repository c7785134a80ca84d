use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt, future};
use tracing::debug;

use logstore_core::AppResult;
use logstore_domain::{
    EventPayload, LogEvent, LogFilter, LogQuery, LogRecord, PayloadFormat, codec,
};

use crate::{EventFactory, LogStoreRepository};

/// A rehydrated event together with the id of the row it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadEvent<E> {
    /// Storage id of the source row.
    pub id: i64,
    /// Rehydrated event.
    pub event: E,
}

/// Lazily rehydrated events. The underlying cursor is released when the
/// stream is dropped, whether or not it was read to the end.
pub type EventStream<'a, E> = BoxStream<'a, AppResult<ReadEvent<E>>>;

/// Query side of the log store.
pub struct LogReader<F: EventFactory> {
    repository: Arc<dyn LogStoreRepository>,
    factory: Arc<F>,
    format: PayloadFormat,
}

impl<F: EventFactory> LogReader<F> {
    /// Creates a reader decoding payloads with `format`.
    #[must_use]
    pub fn new(
        repository: Arc<dyn LogStoreRepository>,
        factory: Arc<F>,
        format: PayloadFormat,
    ) -> Self {
        Self {
            repository,
            factory,
            format,
        }
    }

    /// New events keep arriving in this store.
    #[must_use]
    pub fn is_logging(&self) -> bool {
        true
    }

    /// Returns the events for a query, fully materialized. Rows the factory
    /// rejects are skipped.
    pub async fn select(&self, query: LogQuery) -> AppResult<Vec<ReadEvent<F::Event>>> {
        let records = self.repository.select_records(normalize(query)).await?;
        Ok(records
            .into_iter()
            .filter_map(|record| self.reconstruct(record))
            .collect())
    }

    /// Returns the events for a query as a lazy stream over an open cursor.
    pub fn select_stream(&self, query: LogQuery) -> EventStream<'_, F::Event> {
        self.repository
            .stream_records(normalize(query))
            .try_filter_map(move |record| future::ready(Ok(self.reconstruct(record))))
            .boxed()
    }

    /// Counts rows matching a filter.
    pub async fn select_count(&self, filter: LogFilter) -> AppResult<u64> {
        self.repository.count_records(filter).await
    }

    /// Returns whether any row matches a filter.
    pub async fn select_exists(&self, filter: LogFilter) -> AppResult<bool> {
        self.repository.records_exist(filter).await
    }

    /// Rehydrates one row. Returns `None` when the factory rejects it.
    pub fn reconstruct(&self, record: LogRecord) -> Option<ReadEvent<F::Event>> {
        let LogRecord { id, entry } = record;
        let other = match codec::try_decode(&entry.other, self.format) {
            Ok(payload) => payload,
            Err(error) => {
                debug!(record_id = id, error = %error, "substituting empty payload");
                EventPayload::new()
            }
        };

        let event = match entry.into_event(other) {
            Ok(event) => event,
            Err(error) => {
                debug!(record_id = id, error = %error, "stored row is not an event");
                return None;
            }
        };

        match self.factory.restore(event) {
            Some(event) => Some(ReadEvent { id, event }),
            None => {
                debug!(record_id = id, "event factory rejected stored row");
                None
            }
        }
    }
}

fn normalize(mut query: LogQuery) -> LogQuery {
    query.sort = query.sort.normalized();
    query
}

/// Factory accepting only event types registered with it.
#[derive(Debug, Clone, Default)]
pub struct RegisteredEventFactory {
    event_names: HashSet<String>,
}

impl RegisteredEventFactory {
    /// Creates a factory for the given event type names.
    #[must_use]
    pub fn new<I, S>(event_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            event_names: event_names.into_iter().map(Into::into).collect(),
        }
    }
}

impl EventFactory for RegisteredEventFactory {
    type Event = LogEvent;

    fn restore(&self, event: LogEvent) -> Option<Self::Event> {
        self.event_names
            .contains(event.data.event_name.as_str())
            .then_some(event)
    }
}

#[cfg(test)]
mod tests;
