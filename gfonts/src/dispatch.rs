//! Background execution of pipeline operations
//!
//! Every dispatched unit reports exactly one [`TaskEvent::Value`] or
//! [`TaskEvent::Error`], followed by exactly one [`TaskEvent::Done`].

use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::Instrument;

use crate::Error;

/// Identifies the user selection a unit of work belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Hands out increasing [`Generation`]s; only the newest one is current.
#[derive(Debug, Clone, Default)]
pub struct GenerationCounter {
    latest: Arc<AtomicU64>,
}

impl GenerationCounter {
    pub fn current(&self) -> Generation {
        Generation(self.latest.load(Ordering::Acquire))
    }

    /// Supersede every generation handed out so far.
    pub fn advance(&self) -> Generation {
        Generation(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.current() == generation
    }
}

/// A failed unit of work, with enough context to report it
#[derive(Debug, thiserror::Error)]
#[error("{operation} failed: {error}")]
pub struct TaskError {
    pub operation: String,
    #[source]
    pub error: Error,
    /// The error followed by its source chain, one cause per line
    pub trace: String,
}

impl TaskError {
    pub fn new(operation: impl Into<String>, error: Error) -> Self {
        let trace = render_trace(&error);
        Self {
            operation: operation.into(),
            error,
            trace,
        }
    }
}

fn render_trace(error: &Error) -> String {
    let mut trace = format!("Error: {error}");
    let mut source = std::error::Error::source(error);
    let mut depth = 0;
    while let Some(cause) = source {
        let _ = write!(trace, "\n  {depth}: {cause}");
        source = std::error::Error::source(cause);
        depth += 1;
    }
    trace
}

#[derive(Debug)]
pub enum TaskEvent<T> {
    Value(T),
    Error(TaskError),
    Done,
}

/// Receives the events of one unit of work, in order.
pub trait TaskListener<T> {
    fn on_result(&mut self, value: T);
    fn on_error(&mut self, error: TaskError);
    fn on_finished(&mut self);
}

/// The caller's side of a dispatched unit
#[derive(Debug)]
pub struct TaskHandle<T> {
    operation: &'static str,
    generation: Option<Generation>,
    generations: GenerationCounter,
    events: mpsc::UnboundedReceiver<TaskEvent<T>>,
}

impl<T> TaskHandle<T> {
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn generation(&self) -> Option<Generation> {
        self.generation
    }

    /// False once a newer selection has been dispatched. Units dispatched
    /// outside of a selection are always current.
    pub fn is_current(&self) -> bool {
        self.generation
            .is_none_or(|generation| self.generations.is_current(generation))
    }

    /// The next event, or `None` after [`TaskEvent::Done`].
    pub async fn next_event(&mut self) -> Option<TaskEvent<T>> {
        self.events.recv().await
    }

    /// Wait for completion and collapse the events into a result.
    pub async fn outcome(mut self) -> Result<T, TaskError> {
        let mut outcome = None;
        while let Some(event) = self.next_event().await {
            match event {
                TaskEvent::Value(value) => outcome = Some(Ok(value)),
                TaskEvent::Error(error) => outcome = Some(Err(error)),
                TaskEvent::Done => break,
            }
        }
        outcome.unwrap_or_else(|| {
            Err(TaskError::new(
                self.operation,
                Error::Aborted("the runtime shut down before the task reported".to_string()),
            ))
        })
    }

    /// Forward every event to `listener`.
    pub async fn deliver<L: TaskListener<T>>(mut self, listener: &mut L) {
        while let Some(event) = self.next_event().await {
            match event {
                TaskEvent::Value(value) => listener.on_result(value),
                TaskEvent::Error(error) => listener.on_error(error),
                TaskEvent::Done => listener.on_finished(),
            }
        }
    }
}

/// Runs pipeline operations on a tokio runtime
#[derive(Debug, Clone)]
pub struct Dispatcher {
    runtime: Handle,
    generations: GenerationCounter,
}

impl Dispatcher {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            generations: GenerationCounter::default(),
        }
    }

    /// Use the runtime the caller is running on.
    ///
    /// Panics outside of a tokio runtime, like [`Handle::current`].
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    pub fn generations(&self) -> &GenerationCounter {
        &self.generations
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.generations.is_current(generation)
    }

    /// Run `work` in the background.
    pub fn dispatch<T, F>(&self, operation: &'static str, work: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: Future<Output = crate::Result<T>> + Send + 'static,
    {
        self.spawn(operation, None, work)
    }

    /// Run `work` as a new user selection, superseding every earlier one.
    pub fn dispatch_selection<T, F>(&self, operation: &'static str, work: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: Future<Output = crate::Result<T>> + Send + 'static,
    {
        let generation = self.generations.advance();
        self.spawn(operation, Some(generation), work)
    }

    fn spawn<T, F>(
        &self,
        operation: &'static str,
        generation: Option<Generation>,
        work: F,
    ) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: Future<Output = crate::Result<T>> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let span = tracing::info_span!(
            "task",
            operation,
            generation = generation.map(|g| g.value())
        );

        let task = self.runtime.spawn(work.instrument(span.clone()));
        self.runtime.spawn(
            async move {
                let event = match task.await {
                    Ok(Ok(value)) => TaskEvent::Value(value),
                    Ok(Err(error)) => TaskEvent::Error(TaskError::new(operation, error)),
                    Err(join_error) => {
                        TaskEvent::Error(TaskError::new(operation, aborted(join_error)))
                    }
                };
                if let TaskEvent::Error(error) = &event {
                    tracing::debug!("{}", error.trace);
                }
                // the receiver may be gone; nobody is left to tell
                let _ = tx.send(event);
                let _ = tx.send(TaskEvent::Done);
            }
            .instrument(span),
        );

        TaskHandle {
            operation,
            generation,
            generations: self.generations.clone(),
            events: rx,
        }
    }
}

fn aborted(join_error: JoinError) -> Error {
    if !join_error.is_panic() {
        return Error::Aborted("task was cancelled".to_string());
    }
    let payload = join_error.into_panic();
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    };
    Error::Aborted(format!("task panicked: {message}"))
}
