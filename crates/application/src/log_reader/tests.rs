use std::sync::Arc;

use futures::StreamExt;

use logstore_domain::{
    EventPayload, LogColumn, LogFilter, LogQuery, LogSort, PayloadFormat, PayloadValue,
    SortDirection, codec,
};

use crate::test_support::{FakeLogStore, log_entry};

use super::{LogReader, RegisteredEventFactory};

const VIEWED: &str = "\\core\\event\\course_viewed";
const VIEWED_KEY: &str = "core_event_course_viewed";

fn reader(store: &Arc<FakeLogStore>, format: PayloadFormat) -> LogReader<RegisteredEventFactory> {
    LogReader::new(
        store.clone(),
        Arc::new(RegisteredEventFactory::new([VIEWED])),
        format,
    )
}

#[tokio::test]
async fn pagination_orders_same_timestamp_rows_by_ascending_id() {
    let store = Arc::new(FakeLogStore::default());
    store.seed((0..6).map(|_| log_entry(VIEWED_KEY, 500)).collect());
    let reader = reader(&store, PayloadFormat::Json);

    let page = |offset| LogQuery {
        sort: LogSort::by(LogColumn::TimeCreated, SortDirection::Desc),
        offset,
        limit: Some(3),
        ..LogQuery::default()
    };

    let first = reader.select(page(0)).await.unwrap_or_default();
    let second = reader.select(page(3)).await.unwrap_or_default();
    let first_ids: Vec<i64> = first.iter().map(|event| event.id).collect();
    let second_ids: Vec<i64> = second.iter().map(|event| event.id).collect();
    assert_eq!(first_ids, vec![1, 2, 3]);
    assert_eq!(second_ids, vec![4, 5, 6]);
}

#[tokio::test]
async fn rejected_rows_are_skipped_not_fatal() {
    let store = Arc::new(FakeLogStore::default());
    store.seed(vec![
        log_entry(VIEWED_KEY, 10),
        log_entry("mod_forum_post_created", 11),
        log_entry(VIEWED_KEY, 12),
    ]);
    let reader = reader(&store, PayloadFormat::Json);

    let events = reader.select(LogQuery::default()).await;
    assert!(events.is_ok());
    let ids: Vec<i64> = events
        .unwrap_or_default()
        .iter()
        .map(|event| event.id)
        .collect();
    assert_eq!(ids, vec![1, 3]);
}

#[tokio::test]
async fn reconstruct_moves_storage_fields_into_extra_bundle() {
    let store = Arc::new(FakeLogStore::default());
    let payload = EventPayload::new().with("forumid", PayloadValue::Integer(8));
    let mut entry = log_entry(VIEWED_KEY, 10);
    entry.other = codec::encode(&payload, PayloadFormat::Native).unwrap_or_default();
    entry.ip = Some("198.51.100.7".to_owned());
    entry.real_user_id = Some(2);
    store.seed(vec![entry]);
    let reader = reader(&store, PayloadFormat::Native);

    let events = reader.select(LogQuery::default()).await.unwrap_or_default();
    assert_eq!(events.len(), 1);
    let event = &events[0].event;
    assert_eq!(event.data.other, payload);
    assert_eq!(event.extra.ip.as_deref(), Some("198.51.100.7"));
    assert_eq!(event.extra.real_user_id, Some(2));
    assert_eq!(event.extra.origin.as_deref(), Some("web"));
}

#[tokio::test]
async fn payload_in_another_format_decodes_empty() {
    let store = Arc::new(FakeLogStore::default());
    let mut entry = log_entry(VIEWED_KEY, 10);
    entry.other = r#"{"forumid":8}"#.to_owned();
    store.seed(vec![entry]);
    let reader = reader(&store, PayloadFormat::Native);

    let events = reader.select(LogQuery::default()).await.unwrap_or_default();
    assert_eq!(events.len(), 1);
    assert!(events[0].event.data.other.is_empty());
}

#[tokio::test]
async fn stream_yields_the_same_events_lazily() {
    let store = Arc::new(FakeLogStore::default());
    store.seed(vec![
        log_entry(VIEWED_KEY, 30),
        log_entry("mod_forum_post_created", 20),
        log_entry(VIEWED_KEY, 10),
    ]);
    let reader = reader(&store, PayloadFormat::Json);
    let query = LogQuery {
        sort: LogSort::by(LogColumn::TimeCreated, SortDirection::Asc),
        ..LogQuery::default()
    };

    let mut stream = reader.select_stream(query);
    let mut ids = Vec::new();
    while let Some(next) = stream.next().await {
        assert!(next.is_ok());
        if let Ok(event) = next {
            ids.push(event.id);
        }
    }
    drop(stream);
    assert_eq!(ids, vec![3, 1]);
}

#[tokio::test]
async fn stream_can_be_abandoned_early() {
    let store = Arc::new(FakeLogStore::default());
    store.seed((0..4).map(|offset| log_entry(VIEWED_KEY, offset)).collect());
    let reader = reader(&store, PayloadFormat::Json);

    let first = reader
        .select_stream(LogQuery::default())
        .take(1)
        .collect::<Vec<_>>()
        .await;
    assert_eq!(first.len(), 1);
    assert_eq!(reader.select_count(LogFilter::default()).await.unwrap_or(0), 4);
}

#[tokio::test]
async fn count_and_exists_share_filter_semantics() {
    let store = Arc::new(FakeLogStore::default());
    store.seed(vec![log_entry(VIEWED_KEY, 10), log_entry(VIEWED_KEY, 20)]);
    let reader = reader(&store, PayloadFormat::Json);

    let recent = LogFilter {
        created_from: Some(15),
        ..LogFilter::for_config_name(VIEWED_KEY)
    };
    assert_eq!(reader.select_count(recent.clone()).await.unwrap_or(0), 1);
    assert!(reader.select_exists(recent).await.unwrap_or(false));
    assert!(
        !reader
            .select_exists(LogFilter::for_context(999))
            .await
            .unwrap_or(true)
    );
    assert!(reader.is_logging());
}
