use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt, TryStreamExt};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::debug;

use logstore_application::{LogRecordStream, LogStoreRepository};
use logstore_core::{AppError, AppResult};
use logstore_domain::{Crud, EducationLevel, LogEntry, LogFilter, LogQuery, LogRecord};

mod query;

use query::{push_filter, push_page, push_sort};

/// Table holding the selective log rows.
pub const LOG_TABLE: &str = "logstore_selective_log";

/// Rows per multi-row insert statement, well below the bind parameter limit.
const INSERT_CHUNK_ROWS: usize = 1_000;

const SELECT_COLUMNS: &str = "SELECT id, eventname, component, action, target, objecttable, \
     objectid, crud, edulevel, contextid, userid, relateduserid, anonymous, other, \
     timecreated, origin, ip, realuserid, configname FROM logstore_selective_log";

/// PostgreSQL-backed log store.
#[derive(Clone)]
pub struct PostgresLogStoreRepository {
    pool: PgPool,
}

impl PostgresLogStoreRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn record_stream(
        &self,
        query: LogQuery,
    ) -> impl Stream<Item = AppResult<LogRecord>> + Send + '_ {
        try_stream! {
            let mut builder = select_builder(&query)?;
            let mut rows = builder.build_query_as::<LogRow>().fetch(&self.pool);
            while let Some(row) = rows.try_next().await.map_err(|error| {
                AppError::Storage(format!("failed to stream log records: {error}"))
            })? {
                yield log_record_from_row(row)?;
            }
        }
    }
}

#[derive(Debug, FromRow)]
struct LogRow {
    id: i64,
    eventname: String,
    component: String,
    action: String,
    target: String,
    objecttable: Option<String>,
    objectid: Option<i64>,
    crud: String,
    edulevel: i16,
    contextid: i64,
    userid: i64,
    relateduserid: Option<i64>,
    anonymous: bool,
    other: String,
    timecreated: i64,
    origin: Option<String>,
    ip: Option<String>,
    realuserid: Option<i64>,
    configname: String,
}

#[async_trait]
impl LogStoreRepository for PostgresLogStoreRepository {
    async fn insert_entries(&self, entries: Vec<LogEntry>) -> AppResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Storage(format!("failed to start log insert transaction: {error}"))
        })?;

        for chunk in entries.chunks(INSERT_CHUNK_ROWS) {
            let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
                "INSERT INTO logstore_selective_log (eventname, component, action, target, \
                 objecttable, objectid, crud, edulevel, contextid, userid, relateduserid, \
                 anonymous, other, timecreated, origin, ip, realuserid, configname) ",
            );
            builder.push_values(chunk, |mut row, entry| {
                row.push_bind(entry.event_name.as_str())
                    .push_bind(entry.component.as_str())
                    .push_bind(entry.action.as_str())
                    .push_bind(entry.target.as_str())
                    .push_bind(entry.object_table.as_deref())
                    .push_bind(entry.object_id)
                    .push_bind(entry.crud.as_str())
                    .push_bind(entry.edu_level.as_i16())
                    .push_bind(entry.context_id)
                    .push_bind(entry.user_id)
                    .push_bind(entry.related_user_id)
                    .push_bind(entry.anonymous)
                    .push_bind(entry.other.as_str())
                    .push_bind(entry.time_created)
                    .push_bind(entry.origin.as_deref())
                    .push_bind(entry.ip.as_deref())
                    .push_bind(entry.real_user_id)
                    .push_bind(entry.config_name.as_str());
            });

            builder
                .build()
                .execute(&mut *transaction)
                .await
                .map_err(|error| {
                    AppError::Storage(format!("failed to insert log records: {error}"))
                })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Storage(format!("failed to commit log insert transaction: {error}"))
        })?;
        debug!(count = entries.len(), "stored log records");

        Ok(())
    }

    async fn select_records(&self, query: LogQuery) -> AppResult<Vec<LogRecord>> {
        let mut builder = select_builder(&query)?;
        let rows = builder
            .build_query_as::<LogRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::Storage(format!("failed to select log records: {error}")))?;

        rows.into_iter().map(log_record_from_row).collect()
    }

    fn stream_records(&self, query: LogQuery) -> LogRecordStream<'_> {
        self.record_stream(query).boxed()
    }

    async fn count_records(&self, filter: LogFilter) -> AppResult<u64> {
        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM logstore_selective_log");
        push_filter(&mut builder, &filter);

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|error| AppError::Storage(format!("failed to count log records: {error}")))?;

        u64::try_from(count)
            .map_err(|error| AppError::Internal(format!("negative log record count: {error}")))
    }

    async fn records_exist(&self, filter: LogFilter) -> AppResult<bool> {
        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT EXISTS (SELECT 1 FROM logstore_selective_log");
        push_filter(&mut builder, &filter);
        builder.push(')');

        builder
            .build_query_scalar::<bool>()
            .fetch_one(&self.pool)
            .await
            .map_err(|error| {
                AppError::Storage(format!("failed to check for log records: {error}"))
            })
    }

    async fn min_time_created(&self, config_name: &str, before: i64) -> AppResult<Option<i64>> {
        sqlx::query_scalar::<_, Option<i64>>(
            r#"
            SELECT MIN(timecreated)
            FROM logstore_selective_log
            WHERE configname = $1
                AND timecreated < $2
            "#,
        )
        .bind(config_name)
        .bind(before)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Storage(format!(
                "failed to find oldest log record for '{config_name}': {error}"
            ))
        })
    }

    async fn delete_created_before(&self, config_name: &str, before: i64) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM logstore_selective_log
            WHERE configname = $1
                AND timecreated < $2
            "#,
        )
        .bind(config_name)
        .bind(before)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Storage(format!(
                "failed to delete log records for '{config_name}': {error}"
            ))
        })?;

        Ok(result.rows_affected())
    }

    async fn context_ids_for_user(&self, user_id: i64) -> AppResult<Vec<i64>> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT DISTINCT contextid
            FROM logstore_selective_log
            WHERE userid = $1
                OR relateduserid = $1
                OR realuserid = $1
            ORDER BY contextid
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Storage(format!(
                "failed to list log contexts for user '{user_id}': {error}"
            ))
        })
    }

    async fn user_ids_for_context(&self, context_id: i64) -> AppResult<Vec<i64>> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT userid FROM logstore_selective_log WHERE contextid = $1
            UNION
            SELECT relateduserid FROM logstore_selective_log
            WHERE contextid = $1 AND relateduserid IS NOT NULL
            UNION
            SELECT realuserid FROM logstore_selective_log
            WHERE contextid = $1 AND realuserid IS NOT NULL
            ORDER BY 1
            "#,
        )
        .bind(context_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Storage(format!(
                "failed to list log users for context '{context_id}': {error}"
            ))
        })
    }
}

fn select_builder(query: &LogQuery) -> AppResult<QueryBuilder<'static, Postgres>> {
    let mut builder = QueryBuilder::new(SELECT_COLUMNS);
    push_filter(&mut builder, &query.filter);
    push_sort(&mut builder, &query.sort.normalized());
    push_page(&mut builder, query.offset, query.limit)?;
    Ok(builder)
}

fn log_record_from_row(row: LogRow) -> AppResult<LogRecord> {
    Ok(LogRecord {
        id: row.id,
        entry: LogEntry {
            event_name: row.eventname,
            component: row.component,
            action: row.action,
            target: row.target,
            object_table: row.objecttable,
            object_id: row.objectid,
            crud: row.crud.parse::<Crud>()?,
            edu_level: EducationLevel::try_from(row.edulevel)?,
            context_id: row.contextid,
            user_id: row.userid,
            related_user_id: row.relateduserid,
            anonymous: row.anonymous,
            other: row.other,
            time_created: row.timecreated,
            origin: row.origin,
            ip: row.ip,
            real_user_id: row.realuserid,
            config_name: row.configname,
        },
    })
}
