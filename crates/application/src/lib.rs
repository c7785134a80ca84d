//! Application services and ports.

#![forbid(unsafe_code)]

mod archive_service;
mod cleanup_service;
mod log_reader;
mod log_store_ports;
mod log_writer;
mod privacy_service;

#[cfg(test)]
mod test_support;

pub use archive_service::{ArchiveService, ArchivedLogRecord, RestoreIdMapper, RestoreReport};
pub use cleanup_service::{
    CLEANUP_TASK_NAME, CleanupOptions, CleanupSweeper, DEFAULT_TIME_BUDGET, SweepReport,
};
pub use log_reader::{EventStream, LogReader, ReadEvent, RegisteredEventFactory};
pub use log_store_ports::{
    Clock, EventFactory, LogRecordStream, LogStoreRepository, SettingsRepository, SystemClock,
};
pub use log_writer::{
    ActorStatus, BufferedLogWriter, ExecutionMode, RawLogWriter, WriteContext, WriteOutcome,
    should_ignore,
};
pub use privacy_service::{PRIVACY_SUMMARY, PrivacyField, PrivacyService};
