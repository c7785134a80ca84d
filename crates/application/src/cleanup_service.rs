use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use logstore_core::AppResult;
use logstore_domain::{CleanupPlan, SECONDS_PER_DAY, parse_retention_days};

use crate::{Clock, LogStoreRepository, SettingsRepository};

/// Display name of the scheduled cleanup job.
pub const CLEANUP_TASK_NAME: &str = "Log table cleanup";

/// Wall-clock budget of one sweep invocation.
pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(600);

/// Tuning for the cleanup sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupOptions {
    /// Budget across all policy keys; checked after each slice.
    pub time_budget: Duration,
    /// Width of one delete slice in seconds; values below one are raised to one.
    pub slice_seconds: i64,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            time_budget: DEFAULT_TIME_BUDGET,
            slice_seconds: SECONDS_PER_DAY,
        }
    }
}

/// Outcome of one sweep invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Policy keys with an enabled, non-zero retention.
    pub policies_swept: usize,
    /// Delete statements issued.
    pub slices: usize,
    /// Rows removed.
    pub deleted_rows: u64,
    /// Whether the sweep stopped early on its time budget.
    pub budget_exhausted: bool,
}

impl Display for SweepReport {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "Deleted {} old log records from selective store in {} slices across {} event types",
            self.deleted_rows, self.slices, self.policies_swept
        )?;
        if self.budget_exhausted {
            write!(formatter, " (time budget exhausted, resuming next run)")?;
        }
        Ok(())
    }
}

/// Time-boxed, incremental purge of rows past their retention window.
#[derive(Clone)]
pub struct CleanupSweeper {
    repository: Arc<dyn LogStoreRepository>,
    settings: Arc<dyn SettingsRepository>,
    clock: Arc<dyn Clock>,
    options: CleanupOptions,
}

impl CleanupSweeper {
    /// Creates a sweeper.
    #[must_use]
    pub fn new(
        repository: Arc<dyn LogStoreRepository>,
        settings: Arc<dyn SettingsRepository>,
        clock: Arc<dyn Clock>,
        options: CleanupOptions,
    ) -> Self {
        Self {
            repository,
            settings,
            clock,
            options: CleanupOptions {
                slice_seconds: options.slice_seconds.max(1),
                ..options
            },
        }
    }

    /// Runs one sweep invocation.
    ///
    /// For every enabled key with a non-zero retention, deletes from the
    /// oldest row toward the cutoff in slices of at most one day. Stops after
    /// the slice that exceeds the time budget. A storage error aborts the
    /// invocation; slices already deleted stay deleted.
    pub async fn execute(&self) -> AppResult<SweepReport> {
        let settings = self.settings.load_snapshot().await?;
        let started = self.clock.now();
        let mut report = SweepReport::default();

        for policy_key in settings.policy_keys() {
            let policy = settings.resolve(policy_key);
            let cutoff = match CleanupPlan::for_policy(policy, self.clock.now().timestamp()) {
                CleanupPlan::Purge { cutoff } => cutoff,
                CleanupPlan::Skip(reason) => {
                    if policy.is_some_and(|policy| policy.enabled)
                        && let Some(Err(error)) = settings.get(policy_key).map(parse_retention_days)
                    {
                        warn!(policy_key, error = %error, "keeping rows of misconfigured policy");
                    }
                    debug!(policy_key, reason = ?reason, "skipping policy");
                    continue;
                }
            };

            report.policies_swept += 1;
            let deleted_before = report.deleted_rows;

            while let Some(oldest) = self
                .repository
                .min_time_created(policy_key, cutoff)
                .await?
            {
                let slice_end = oldest.saturating_add(self.options.slice_seconds).min(cutoff);
                let deleted = self
                    .repository
                    .delete_created_before(policy_key, slice_end)
                    .await?;
                report.slices += 1;
                report.deleted_rows += deleted;
                debug!(policy_key, slice_end, deleted, "deleted log slice");

                if self.budget_exhausted(started) {
                    report.budget_exhausted = true;
                    warn!(
                        policy_key,
                        deleted_rows = report.deleted_rows,
                        budget_seconds = self.options.time_budget.as_secs(),
                        "cleanup time budget exhausted"
                    );
                    return Ok(report);
                }
            }

            info!(
                policy_key,
                cutoff,
                deleted = report.deleted_rows - deleted_before,
                "purged expired log records"
            );
        }

        Ok(report)
    }

    fn budget_exhausted(&self, started: DateTime<Utc>) -> bool {
        (self.clock.now() - started)
            .to_std()
            .is_ok_and(|elapsed| elapsed > self.options.time_budget)
    }
}
