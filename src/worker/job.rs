//! Single-job completion primitive.
//!
//! A [`JobHandle`] owns one [`Action`] and runs it on a dedicated OS thread.
//! Any number of threads may block in [`JobHandle::wait`]; all of them are
//! released when the action returns, and all of them see its failure.
//!
//! Lifecycle: `idle → running → completed`. A handle is single-use.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::error::{ActionError, ActionPanicked, JobError, SharedActionError};

/// A unit of work run by a job.
pub trait Action: Send + 'static {
    fn execute(&mut self) -> Result<(), ActionError>;
}

impl<F> Action for F
where
    F: FnMut() -> Result<(), ActionError> + Send + 'static,
{
    fn execute(&mut self) -> Result<(), ActionError> {
        self()
    }
}

#[derive(Debug, Default)]
struct CompletionState {
    completed: bool,
    failure: Option<SharedActionError>,
}

/// Completion flag and captured failure, guarded by one mutex and signalled
/// through one condition variable.
#[derive(Debug, Default)]
pub struct Completion {
    state: Mutex<CompletionState>,
    done: Condvar,
}

impl Completion {
    fn lock(&self) -> MutexGuard<'_, CompletionState> {
        // Critical sections only assign plain fields, so a poisoned lock
        // still holds consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the outcome and wake every waiter. Only the first call counts.
    pub fn complete(&self, failure: Option<SharedActionError>) {
        let mut state = self.lock();
        if state.completed {
            return;
        }
        state.failure = failure;
        state.completed = true;
        self.done.notify_all();
    }

    /// Block until completed; returns the captured failure, if any.
    pub fn wait(&self) -> Option<SharedActionError> {
        let state = self
            .done
            .wait_while(self.lock(), |state| !state.completed)
            .unwrap_or_else(PoisonError::into_inner);
        state.failure.clone()
    }

    pub fn is_completed(&self) -> bool {
        self.lock().completed
    }
}

/// Start a thread running `action` and reporting into `completion`.
pub fn spawn_job(
    name: &str,
    action: Box<dyn Action>,
    completion: Arc<Completion>,
) -> std::io::Result<JoinHandle<()>> {
    let job_name = name.to_string();
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || run_job(&job_name, action, &completion))
}

fn run_job(name: &str, mut action: Box<dyn Action>, completion: &Completion) {
    debug!(job = %name, "Job started");
    let failure: Option<SharedActionError> =
        match panic::catch_unwind(AssertUnwindSafe(|| action.execute())) {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(Arc::from(e)),
            Err(payload) => Some(
                Arc::new(ActionPanicked(panic_message(payload.as_ref()))) as SharedActionError,
            ),
        };
    match &failure {
        None => debug!(job = %name, "Job completed"),
        Some(e) => warn!(job = %name, error = %e, "Job failed"),
    }
    completion.complete(failure);
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Handle to one asynchronously executed action.
pub struct JobHandle {
    name: String,
    action: Mutex<Option<Box<dyn Action>>>,
    completion: Arc<Completion>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl JobHandle {
    /// Wrap `action`. Nothing runs until [`JobHandle::start`].
    pub fn new(name: impl Into<String>, action: impl Action) -> Self {
        Self {
            name: name.into(),
            action: Mutex::new(Some(Box::new(action))),
            completion: Arc::new(Completion::default()),
            thread: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the action on a new thread. Does not block.
    pub fn start(&self) -> Result<(), JobError> {
        let action = self
            .action
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| JobError::AlreadyStarted {
                name: self.name.clone(),
            })?;

        match spawn_job(&self.name, action, Arc::clone(&self.completion)) {
            Ok(handle) => {
                *self.thread.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
                Ok(())
            }
            Err(e) => {
                // The handle can never run now; finish it so waiters are released.
                let source: SharedActionError = Arc::new(e);
                self.completion.complete(Some(Arc::clone(&source)));
                Err(JobError::Failed {
                    name: self.name.clone(),
                    source,
                })
            }
        }
    }

    /// True until the action has finished. A handle that was never started
    /// counts as alive.
    pub fn is_alive(&self) -> bool {
        !self.completion.is_completed()
    }

    pub fn is_completed(&self) -> bool {
        self.completion.is_completed()
    }

    /// Block until the action finishes, then return its failure, if any.
    ///
    /// Returns immediately when the job has already completed. Waiting on a
    /// handle that is never started blocks forever.
    pub fn wait(&self) -> Result<(), JobError> {
        match self.completion.wait() {
            None => Ok(()),
            Some(source) => Err(JobError::Failed {
                name: self.name.clone(),
                source,
            }),
        }
    }

    /// Like [`JobHandle::wait`], and also reap the execution thread.
    pub fn join(&self) -> Result<(), JobError> {
        let result = self.wait();
        let handle = self.thread.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            // Panics are caught inside the thread, so join cannot carry one.
            let _ = handle.join();
        }
        result
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("name", &self.name)
            .field("completed", &self.is_completed())
            .finish()
    }
}
