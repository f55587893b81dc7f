//! Task executor: claim, then `setup -> run_process -> teardown`, then record
//! the outcome.
//!
//! Every exit path converges on one terminal state and exactly one final
//! persist. Panics inside process factories and hooks are caught and treated
//! as unexpected faults, so a misbehaving process can never leave its record
//! `Running`.

use std::any::Any;
use std::backtrace::Backtrace;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::completion::{CompletionEvent, CompletionNotifier, Outcome};
use super::error::{SchedulerError, TaskError};
use super::process::ProcessRegistry;
use super::record::{TaskRecord, TaskStatus};
use super::store::{ClaimOutcome, TaskStore};

/// `error_message` recorded for faults that are not a [`TaskError`].
pub const UNEXPECTED_ERROR_MESSAGE: &str = "unexpected error";

/// Why a hook did not return `Ok`.
enum Fault {
    Error(anyhow::Error),
    Panic(String),
}

/// Failure text destined for the record.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FailureText {
    message: String,
    debug: String,
}

impl Fault {
    fn classify(&self) -> FailureText {
        match self {
            Self::Error(err) => err.downcast_ref::<TaskError>().map_or_else(
                || FailureText {
                    message: UNEXPECTED_ERROR_MESSAGE.to_string(),
                    debug: format!("{err:?}\n\nstack backtrace:\n{}", Backtrace::force_capture()),
                },
                |task_err| FailureText {
                    message: task_err.message().to_string(),
                    debug: task_err.debug_detail(),
                },
            ),
            Self::Panic(msg) => FailureText {
                message: UNEXPECTED_ERROR_MESSAGE.to_string(),
                debug: format!("panicked: {msg}\n\nstack backtrace:\n{}", Backtrace::force_capture()),
            },
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Error(err) => format!("{err:#}"),
            Self::Panic(msg) => format!("panic: {msg}"),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

/// Await a hook, turning both errors and panics into a [`Fault`].
async fn guarded<F>(fut: F) -> Result<(), Fault>
where
    F: Future<Output = anyhow::Result<()>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(Fault::Error(err)),
        Err(payload) => Err(Fault::Panic(panic_message(payload.as_ref()))),
    }
}

/// Stateless lifecycle runner shared by every dispatched task.
#[derive(Clone)]
pub struct TaskRunner {
    store: Arc<dyn TaskStore>,
    registry: Arc<ProcessRegistry>,
    notifier: CompletionNotifier,
}

impl TaskRunner {
    /// Runner over `store` resolving kinds through `registry`.
    #[must_use]
    pub fn new(store: Arc<dyn TaskStore>, registry: Arc<ProcessRegistry>) -> Self {
        Self {
            store,
            registry,
            notifier: CompletionNotifier::new(),
        }
    }

    /// Replace the completion listeners.
    #[must_use]
    pub fn with_notifier(mut self, notifier: CompletionNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Store this runner writes to.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// Registry this runner resolves kinds with.
    #[must_use]
    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    /// Try to admit `record`.
    ///
    /// Returns the `Running` record on success, `None` if the record is not
    /// `Pending` or another claimant won. Losing is not an error and has no
    /// side effects.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn try_claim(&self, record: &TaskRecord) -> Result<Option<TaskRecord>, SchedulerError> {
        if record.status != TaskStatus::Pending {
            debug!(task_id = record.id, status = %record.status, "skipping non-pending record");
            return Ok(None);
        }
        match self.store.claim(record.id).await? {
            ClaimOutcome::Claimed(claimed) => Ok(Some(claimed)),
            ClaimOutcome::Lost { observed } => {
                debug!(task_id = record.id, ?observed, "claim lost");
                Ok(None)
            }
        }
    }

    /// Claim `record` and, if admitted, execute it to completion.
    ///
    /// # Errors
    ///
    /// Propagates store failures from the claim or the final persist.
    pub async fn run(&self, record: TaskRecord) -> Result<Option<CompletionEvent>, SchedulerError> {
        match self.try_claim(&record).await? {
            Some(claimed) => self.execute(claimed).await.map(Some),
            None => Ok(None),
        }
    }

    /// Execute an already claimed (`Running`) record.
    ///
    /// The completion event is published even when the final persist fails.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidTransition`] if `claimed` is not `Running`;
    /// otherwise any failure of the final persist.
    pub async fn execute(&self, claimed: TaskRecord) -> Result<CompletionEvent, SchedulerError> {
        if claimed.status != TaskStatus::Running {
            return Err(SchedulerError::InvalidTransition {
                id: claimed.id,
                from: claimed.status,
                to: TaskStatus::Running,
            });
        }
        let span = info_span!("task", task_id = claimed.id, kind = %claimed.kind);
        self.execute_inner(claimed).instrument(span).await
    }

    async fn execute_inner(&self, mut record: TaskRecord) -> Result<CompletionEvent, SchedulerError> {
        info!("task started");
        let failure = self.run_hooks(&record).await;

        match &failure {
            None => record.complete()?,
            Some(text) => record.fail(text.message.clone(), Some(text.debug.clone()))?,
        }

        let persisted = self.store.persist(&record).await;
        let outcome = if failure.is_some() {
            Outcome::Failed
        } else {
            Outcome::Completed
        };
        let event = CompletionEvent::new(
            record.id,
            record.kind.clone(),
            outcome,
            record.error_message.clone(),
        );
        self.notifier.notify(&event);

        match persisted {
            Ok(_) => {
                info!(outcome = ?outcome, "task finished");
                Ok(event)
            }
            Err(err) => {
                error!(error = %err, outcome = ?outcome, "failed to persist task outcome");
                Err(err)
            }
        }
    }

    /// Run the hooks and return the failure to record, if any.
    async fn run_hooks(&self, record: &TaskRecord) -> Option<FailureText> {
        let instance =
            std::panic::catch_unwind(AssertUnwindSafe(|| self.registry.instantiate(record)));
        let mut process = match instance {
            Ok(Some(process)) => process,
            Ok(None) => {
                let message = format!("no process registered for kind '{}'", record.kind);
                warn!("{message}");
                return Some(FailureText {
                    debug: format!("registered kinds: {:?}", self.registry.kinds()),
                    message,
                });
            }
            Err(payload) => {
                // No instance exists, so there is nothing to tear down.
                let fault = Fault::Panic(panic_message(payload.as_ref()));
                error!(error = %fault.describe(), "process factory panicked");
                return Some(fault.classify());
            }
        };

        let work = guarded(async {
            process.setup(record).await?;
            process.run_process(record).await
        })
        .await;

        if let Err(fault) = guarded(process.teardown(record)).await {
            error!(error = %fault.describe(), "teardown failed; outcome unchanged");
        }

        match work {
            Ok(()) => None,
            Err(fault) => {
                let text = fault.classify();
                if text.message == UNEXPECTED_ERROR_MESSAGE {
                    error!(error = %fault.describe(), "task raised an unexpected fault");
                } else {
                    error!("{}", text.message);
                }
                Some(text)
            }
        }
    }
}
