//! Filters, sorting and pagination for log retrieval.

use std::cmp::Ordering;

use crate::{Crud, EducationLevel, LogEntry, LogRecord};

/// Equality and range conditions over log rows. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    /// Exact event type name.
    pub event_name: Option<String>,
    /// Exact policy key.
    pub config_name: Option<String>,
    /// Exact component.
    pub component: Option<String>,
    /// Data operation kind.
    pub crud: Option<Crud>,
    /// Educational significance.
    pub edu_level: Option<EducationLevel>,
    /// Context identifier.
    pub context_id: Option<i64>,
    /// Acting user.
    pub user_id: Option<i64>,
    /// Affected user.
    pub related_user_id: Option<i64>,
    /// Actual actor under impersonation.
    pub real_user_id: Option<i64>,
    /// Anonymous flag.
    pub anonymous: Option<bool>,
    /// Inclusive lower bound on creation time.
    pub created_from: Option<i64>,
    /// Exclusive upper bound on creation time.
    pub created_before: Option<i64>,
}

impl LogFilter {
    /// Filter matching every row of one context.
    #[must_use]
    pub fn for_context(context_id: i64) -> Self {
        Self {
            context_id: Some(context_id),
            ..Self::default()
        }
    }

    /// Filter matching every row of one policy key.
    #[must_use]
    pub fn for_config_name(config_name: impl Into<String>) -> Self {
        Self {
            config_name: Some(config_name.into()),
            ..Self::default()
        }
    }

    /// Returns whether the row satisfies every set condition.
    #[must_use]
    pub fn matches(&self, entry: &LogEntry) -> bool {
        fn eq<T: PartialEq>(wanted: &Option<T>, actual: &T) -> bool {
            wanted.as_ref().is_none_or(|wanted| wanted == actual)
        }

        eq(&self.event_name, &entry.event_name)
            && eq(&self.config_name, &entry.config_name)
            && eq(&self.component, &entry.component)
            && eq(&self.crud, &entry.crud)
            && eq(&self.edu_level, &entry.edu_level)
            && eq(&self.context_id, &entry.context_id)
            && eq(&self.user_id, &entry.user_id)
            && eq(&self.anonymous, &entry.anonymous)
            && self
                .related_user_id
                .is_none_or(|wanted| entry.related_user_id == Some(wanted))
            && self
                .real_user_id
                .is_none_or(|wanted| entry.real_user_id == Some(wanted))
            && self
                .created_from
                .is_none_or(|from| entry.time_created >= from)
            && self
                .created_before
                .is_none_or(|before| entry.time_created < before)
    }
}

/// Sortable log columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogColumn {
    /// Storage id.
    Id,
    /// Creation time.
    TimeCreated,
    /// Context identifier.
    ContextId,
    /// Acting user.
    UserId,
    /// Event type name.
    EventName,
}

impl LogColumn {
    /// Returns the storage column name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::TimeCreated => "timecreated",
            Self::ContextId => "contextid",
            Self::UserId => "userid",
            Self::EventName => "eventname",
        }
    }

    fn compare(&self, left: &LogRecord, right: &LogRecord) -> Ordering {
        match self {
            Self::Id => left.id.cmp(&right.id),
            Self::TimeCreated => left.entry.time_created.cmp(&right.entry.time_created),
            Self::ContextId => left.entry.context_id.cmp(&right.entry.context_id),
            Self::UserId => left.entry.user_id.cmp(&right.entry.user_id),
            Self::EventName => left.entry.event_name.cmp(&right.entry.event_name),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

impl SortDirection {
    /// Returns the SQL keyword.
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Ordered list of sort keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSort {
    keys: Vec<(LogColumn, SortDirection)>,
}

impl LogSort {
    /// Sort by one column.
    #[must_use]
    pub fn by(column: LogColumn, direction: SortDirection) -> Self {
        Self {
            keys: vec![(column, direction)],
        }
    }

    /// Appends a secondary key.
    #[must_use]
    pub fn then(mut self, column: LogColumn, direction: SortDirection) -> Self {
        self.keys.push((column, direction));
        self
    }

    /// Returns the sort with ties broken by ascending id, unless the caller
    /// already sorts by id.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut keys = self.keys.clone();
        if !keys.iter().any(|(column, _)| *column == LogColumn::Id) {
            keys.push((LogColumn::Id, SortDirection::Asc));
        }
        Self { keys }
    }

    /// Returns the sort keys in priority order.
    #[must_use]
    pub fn keys(&self) -> &[(LogColumn, SortDirection)] {
        &self.keys
    }

    /// Compares two rows under this sort.
    #[must_use]
    pub fn compare(&self, left: &LogRecord, right: &LogRecord) -> Ordering {
        self.keys
            .iter()
            .map(|(column, direction)| {
                let ordering = column.compare(left, right);
                match direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            })
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

/// Filtered, sorted and paginated retrieval request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogQuery {
    /// Row conditions.
    pub filter: LogFilter,
    /// Requested order; normalized before execution.
    pub sort: LogSort,
    /// Rows skipped before the first returned row.
    pub offset: usize,
    /// Maximum rows returned; `None` returns all.
    pub limit: Option<usize>,
}
