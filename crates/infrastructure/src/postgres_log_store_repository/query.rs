use sqlx::{Postgres, QueryBuilder};

use logstore_core::{AppError, AppResult};
use logstore_domain::{LogFilter, LogSort};

pub(super) fn push_filter(builder: &mut QueryBuilder<'static, Postgres>, filter: &LogFilter) {
    builder.push(" WHERE TRUE");

    if let Some(event_name) = &filter.event_name {
        builder.push(" AND eventname = ");
        builder.push_bind(event_name.clone());
    }
    if let Some(config_name) = &filter.config_name {
        builder.push(" AND configname = ");
        builder.push_bind(config_name.clone());
    }
    if let Some(component) = &filter.component {
        builder.push(" AND component = ");
        builder.push_bind(component.clone());
    }
    if let Some(crud) = filter.crud {
        builder.push(" AND crud = ");
        builder.push_bind(crud.as_str());
    }
    if let Some(edu_level) = filter.edu_level {
        builder.push(" AND edulevel = ");
        builder.push_bind(edu_level.as_i16());
    }
    if let Some(context_id) = filter.context_id {
        builder.push(" AND contextid = ");
        builder.push_bind(context_id);
    }
    if let Some(user_id) = filter.user_id {
        builder.push(" AND userid = ");
        builder.push_bind(user_id);
    }
    if let Some(related_user_id) = filter.related_user_id {
        builder.push(" AND relateduserid = ");
        builder.push_bind(related_user_id);
    }
    if let Some(real_user_id) = filter.real_user_id {
        builder.push(" AND realuserid = ");
        builder.push_bind(real_user_id);
    }
    if let Some(anonymous) = filter.anonymous {
        builder.push(" AND anonymous = ");
        builder.push_bind(anonymous);
    }
    if let Some(created_from) = filter.created_from {
        builder.push(" AND timecreated >= ");
        builder.push_bind(created_from);
    }
    if let Some(created_before) = filter.created_before {
        builder.push(" AND timecreated < ");
        builder.push_bind(created_before);
    }
}

pub(super) fn push_sort(builder: &mut QueryBuilder<'static, Postgres>, sort: &LogSort) {
    for (index, (column, direction)) in sort.keys().iter().enumerate() {
        builder.push(if index == 0 { " ORDER BY " } else { ", " });
        builder.push(column.as_str());
        builder.push(' ');
        builder.push(direction.as_sql());
    }
}

pub(super) fn push_page(
    builder: &mut QueryBuilder<'static, Postgres>,
    offset: usize,
    limit: Option<usize>,
) -> AppResult<()> {
    if let Some(limit) = limit {
        let limit = i64::try_from(limit).map_err(|error| {
            AppError::Validation(format!("invalid log query limit: {error}"))
        })?;
        builder.push(" LIMIT ");
        builder.push_bind(limit);
    }

    if offset > 0 {
        let offset = i64::try_from(offset).map_err(|error| {
            AppError::Validation(format!("invalid log query offset: {error}"))
        })?;
        builder.push(" OFFSET ");
        builder.push_bind(offset);
    }

    Ok(())
}
