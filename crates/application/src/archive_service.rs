use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use logstore_core::{AppError, AppResult};
use logstore_domain::{
    Crud, EducationLevel, EventPayload, LogEntry, LogEvent, LogFilter, LogQuery, LogRecord,
    PayloadFormat, SettingsSnapshot, codec,
};

use crate::{LogStoreRepository, RawLogWriter};

/// One log row in the portable course-archive format.
///
/// Field names and order follow the stored columns. `other` carries the
/// stored payload text base64-encoded so the archive stays markup safe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedLogRecord {
    /// Source row id.
    pub id: i64,
    /// Fully-qualified event type name.
    #[serde(rename = "eventname")]
    pub event_name: String,
    /// Emitting component.
    pub component: String,
    /// Verb.
    pub action: String,
    /// Object kind.
    pub target: String,
    /// Affected object table.
    #[serde(rename = "objecttable")]
    pub object_table: Option<String>,
    /// Affected object id.
    #[serde(rename = "objectid")]
    pub object_id: Option<i64>,
    /// One-letter crud value.
    pub crud: String,
    /// Numeric education level.
    #[serde(rename = "edulevel")]
    pub edu_level: i16,
    /// Source context.
    #[serde(rename = "contextid")]
    pub context_id: i64,
    /// Acting user.
    #[serde(rename = "userid")]
    pub user_id: i64,
    /// Affected user.
    #[serde(rename = "relateduserid")]
    pub related_user_id: Option<i64>,
    /// Anonymity flag.
    pub anonymous: bool,
    /// Base64 of the stored payload text.
    pub other: String,
    /// Creation time in unix seconds.
    #[serde(rename = "timecreated")]
    pub time_created: i64,
    /// Client IP address.
    pub ip: Option<String>,
    /// Actual actor under impersonation.
    #[serde(rename = "realuserid")]
    pub real_user_id: Option<i64>,
}

impl From<LogRecord> for ArchivedLogRecord {
    fn from(record: LogRecord) -> Self {
        let LogRecord { id, entry } = record;
        Self {
            id,
            event_name: entry.event_name,
            component: entry.component,
            action: entry.action,
            target: entry.target,
            object_table: entry.object_table,
            object_id: entry.object_id,
            crud: entry.crud.as_str().to_owned(),
            edu_level: entry.edu_level.as_i16(),
            context_id: entry.context_id,
            user_id: entry.user_id,
            related_user_id: entry.related_user_id,
            anonymous: entry.anonymous,
            other: STANDARD.encode(entry.other),
            time_created: entry.time_created,
            ip: entry.ip,
            real_user_id: entry.real_user_id,
        }
    }
}

/// Translates identifiers of an archived site into the restoring site.
pub trait RestoreIdMapper: Send + Sync {
    /// Maps a source context id. `None` drops the record.
    fn map_context(&self, context_id: i64) -> Option<i64>;

    /// Maps a source user id. `None` drops the record.
    fn map_user(&self, user_id: i64) -> Option<i64>;

    /// Seconds added to every creation time.
    fn date_offset(&self) -> i64 {
        0
    }
}

/// Outcome of restoring an archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Records written.
    pub restored: usize,
    /// Records dropped as unmappable or malformed.
    pub skipped: usize,
}

/// Exports and restores the rows of one context.
#[derive(Clone)]
pub struct ArchiveService {
    repository: Arc<dyn LogStoreRepository>,
    writer: RawLogWriter,
}

impl ArchiveService {
    /// Creates an archive service over a log store.
    #[must_use]
    pub fn new(repository: Arc<dyn LogStoreRepository>) -> Self {
        Self {
            writer: RawLogWriter::new(repository.clone()),
            repository,
        }
    }

    /// Returns every row of a context in ascending id order.
    pub async fn export_context(&self, context_id: i64) -> AppResult<Vec<ArchivedLogRecord>> {
        let query = LogQuery {
            filter: LogFilter::for_context(context_id),
            ..LogQuery::default()
        };
        let records = self.repository.select_records(query).await?;
        debug!(context_id, count = records.len(), "exported context logs");

        Ok(records.into_iter().map(ArchivedLogRecord::from).collect())
    }

    /// Remaps archived rows into this site and inserts them as one batch.
    ///
    /// Payloads are re-encoded in the format `settings` selects. Rows whose
    /// context or users cannot be mapped are skipped.
    pub async fn restore(
        &self,
        records: Vec<ArchivedLogRecord>,
        mapper: &dyn RestoreIdMapper,
        settings: &SettingsSnapshot,
    ) -> AppResult<RestoreReport> {
        let mut report = RestoreReport::default();
        let mut events = Vec::with_capacity(records.len());

        for record in records {
            let source_id = record.id;
            match remap(record, mapper) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {
                    debug!(source_id, "skipping unmappable archived record");
                    report.skipped += 1;
                }
                Err(error) => {
                    debug!(source_id, error = %error, "skipping malformed archived record");
                    report.skipped += 1;
                }
            }
        }

        report.restored = self
            .writer
            .insert_batch(events, settings.payload_format())
            .await?;
        info!(
            restored = report.restored,
            skipped = report.skipped,
            "restored archived log records"
        );

        Ok(report)
    }
}

fn remap(record: ArchivedLogRecord, mapper: &dyn RestoreIdMapper) -> AppResult<Option<LogEvent>> {
    let Some(context_id) = mapper.map_context(record.context_id) else {
        return Ok(None);
    };
    let Some(user_id) = mapper.map_user(record.user_id) else {
        return Ok(None);
    };
    let Some(related_user_id) = map_optional_user(record.related_user_id, mapper) else {
        return Ok(None);
    };
    let Some(real_user_id) = map_optional_user(record.real_user_id, mapper) else {
        return Ok(None);
    };

    let stored = STANDARD
        .decode(&record.other)
        .map_err(|error| AppError::Validation(format!("invalid archived payload: {error}")))?;
    let other = decode_archived_payload(&String::from_utf8_lossy(&stored));

    let entry = LogEntry {
        event_name: record.event_name,
        component: record.component,
        action: record.action,
        target: record.target,
        object_table: record.object_table,
        object_id: record.object_id,
        crud: record.crud.parse::<Crud>()?,
        edu_level: EducationLevel::try_from(record.edu_level)?,
        context_id,
        user_id,
        related_user_id,
        anonymous: record.anonymous,
        other: String::new(),
        time_created: record.time_created.saturating_add(mapper.date_offset()),
        origin: None,
        ip: record.ip,
        real_user_id,
        config_name: String::new(),
    };

    entry.into_event(other).map(Some)
}

/// `Some(None)` keeps an absent id absent; `None` means unmappable.
fn map_optional_user(user_id: Option<i64>, mapper: &dyn RestoreIdMapper) -> Option<Option<i64>> {
    match user_id {
        Some(user_id) => mapper.map_user(user_id).map(Some),
        None => Some(None),
    }
}

/// The archiving site may have used either payload format.
fn decode_archived_payload(stored: &str) -> EventPayload {
    codec::try_decode(stored, PayloadFormat::Json)
        .or_else(|_| codec::try_decode(stored, PayloadFormat::Native))
        .unwrap_or_default()
}
