use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use logstore_core::{AppError, AppResult};
use logstore_domain::{LogEntry, LogEvent, PayloadFormat, SettingsSnapshot};

use crate::LogStoreRepository;

/// How the current process was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Serving user requests.
    Interactive,
    /// Command-line or batch execution without a user session.
    CommandLine,
    /// Automated test run. Not exempt from guest suppression.
    Test,
}

/// Session state of the actor that triggered an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorStatus {
    /// A real logged-in user.
    Authenticated,
    /// The guest account.
    Guest,
    /// Nobody is logged in.
    NotLoggedIn,
}

/// Per-write information about where an event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteContext {
    /// Process execution mode.
    pub execution: ExecutionMode,
    /// Actor session state.
    pub actor: ActorStatus,
}

impl WriteContext {
    /// Context for an authenticated interactive request.
    #[must_use]
    pub fn interactive(actor: ActorStatus) -> Self {
        Self {
            execution: ExecutionMode::Interactive,
            actor,
        }
    }

    fn is_trusted_non_interactive(&self) -> bool {
        self.execution == ExecutionMode::CommandLine
    }
}

/// Returns whether an event must not be persisted.
///
/// The policy check runs first; guest suppression applies only when guest
/// logging is off and the process is not a command-line run.
#[must_use]
pub fn should_ignore(
    settings: &SettingsSnapshot,
    event: &LogEvent,
    context: &WriteContext,
) -> bool {
    let accepted = settings
        .resolve(&event.policy_key())
        .is_some_and(|policy| policy.accepts_writes());
    if !accepted {
        return true;
    }

    !context.is_trusted_non_interactive()
        && !settings.log_guests()
        && context.actor != ActorStatus::Authenticated
}

/// Encodes events and inserts them as one batch.
#[derive(Clone)]
pub struct RawLogWriter {
    repository: Arc<dyn LogStoreRepository>,
}

impl RawLogWriter {
    /// Creates a writer over a log store.
    #[must_use]
    pub fn new(repository: Arc<dyn LogStoreRepository>) -> Self {
        Self { repository }
    }

    /// Stamps each event with its policy key, encodes its payload and inserts
    /// the whole batch with one statement. Returns the number of rows written.
    pub async fn insert_batch(
        &self,
        events: Vec<LogEvent>,
        format: PayloadFormat,
    ) -> AppResult<usize> {
        if events.is_empty() {
            return Ok(0);
        }

        let entries = events
            .into_iter()
            .map(|event| {
                let event_name = event.data.event_name.as_str().to_owned();
                LogEntry::from_event(event, format).map_err(|error| {
                    AppError::Validation(format!(
                        "failed to encode payload for event '{event_name}': {error}"
                    ))
                })
            })
            .collect::<AppResult<Vec<_>>>()?;
        let count = entries.len();

        self.repository.insert_entries(entries).await?;
        debug!(count, "inserted log batch");

        Ok(count)
    }
}

/// Result of handing one event to the buffered writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The event was dropped by policy or guest rules.
    Ignored,
    /// The event waits in the buffer.
    Buffered {
        /// Events now pending.
        pending: usize,
    },
    /// The buffer filled up and was written.
    Flushed {
        /// Rows written by the flush.
        written: usize,
    },
}

/// Gatekeeper and buffer in front of a [`RawLogWriter`].
pub struct BufferedLogWriter {
    writer: RawLogWriter,
    settings: RwLock<Arc<SettingsSnapshot>>,
    buffer: Mutex<Vec<LogEvent>>,
}

impl BufferedLogWriter {
    /// Creates a buffered writer using a configuration snapshot.
    #[must_use]
    pub fn new(writer: RawLogWriter, settings: SettingsSnapshot) -> Self {
        Self {
            writer,
            settings: RwLock::new(Arc::new(settings)),
            buffer: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the configuration used by subsequent writes.
    pub async fn replace_settings(&self, settings: SettingsSnapshot) {
        *self.settings.write().await = Arc::new(settings);
    }

    /// Number of buffered events not yet written.
    pub async fn pending(&self) -> usize {
        self.buffer.lock().await.len()
    }

    /// Accepts one event, flushing when the buffer reaches the configured size.
    ///
    /// A failed flush loses the drained batch; resubmission is up to the caller.
    pub async fn write(&self, event: LogEvent, context: WriteContext) -> AppResult<WriteOutcome> {
        let settings = self.settings.read().await.clone();
        if should_ignore(&settings, &event, &context) {
            debug!(
                event_name = %event.data.event_name.as_str(),
                "ignoring event"
            );
            return Ok(WriteOutcome::Ignored);
        }

        let batch = {
            let mut buffer = self.buffer.lock().await;
            buffer.push(event);
            if buffer.len() < settings.buffer_size() {
                return Ok(WriteOutcome::Buffered {
                    pending: buffer.len(),
                });
            }
            std::mem::take(&mut *buffer)
        };

        let written = self
            .writer
            .insert_batch(batch, settings.payload_format())
            .await?;
        Ok(WriteOutcome::Flushed { written })
    }

    /// Writes every buffered event now.
    pub async fn flush(&self) -> AppResult<usize> {
        let batch = std::mem::take(&mut *self.buffer.lock().await);
        let format = self.settings.read().await.payload_format();
        self.writer.insert_batch(batch, format).await
    }

    /// Flushes and releases the writer.
    pub async fn dispose(self) -> AppResult<usize> {
        self.flush().await
    }
}
