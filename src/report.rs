//! Progress and outcome reporting.
//!
//! All human readable output of a run goes through one [`Diagnostics`]
//! sink. Workers write to it concurrently, so every line is written under a
//! lock together with the deferred error flag.

use std::fmt;
use std::io::Write;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Message the client prints when it exits non-zero because of earlier errors.
pub const EXIT_ERROR: &str = "tarsnap: Error exit delayed from previous errors.";

/// A line of diagnostic output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The listing has been read and the client has exited
    ScanComplete { entries: usize },
    /// The listing client exited unsuccessfully
    ListingFailed { reason: String },
    WorkersCreated { workers: usize },
    WorkerStarted { worker: usize, files: usize },
    WorkerFinished {
        worker: usize,
        files: usize,
        elapsed: Duration,
    },
    /// The extraction client could not be started for a worker
    WorkerFailed { worker: usize, reason: String },
    /// A line the client printed that is worth passing on
    ClientOutput(String),
    /// At least one worker saw [`EXIT_ERROR`]
    DeferredError,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScanComplete { entries } => {
                write!(f, "File scanning complete: {entries} files found in archive")
            }
            Self::ListingFailed { reason } => write!(f, "Error waiting for tarsnap: {reason}"),
            Self::WorkersCreated { workers } => {
                write!(f, "Creating {workers} worker threads for file extraction")
            }
            Self::WorkerStarted { worker, files } => {
                write!(f, "Worker {worker} started with {files} files to process")
            }
            Self::WorkerFinished {
                worker,
                files,
                elapsed,
            } => write!(
                f,
                "Worker {worker} completed in {elapsed:.2?} with {files} files processed"
            ),
            Self::WorkerFailed { worker, reason } => {
                write!(f, "Error starting tarsnap for worker {worker}: {reason}")
            }
            Self::ClientOutput(line) => f.write_str(line),
            Self::DeferredError => f.write_str(EXIT_ERROR),
        }
    }
}

struct State {
    sink: Box<dyn Write + Send>,
    deferred_error: bool,
}

/// Serialized diagnostic output plus the run's deferred error flag.
pub struct Diagnostics {
    state: Mutex<State>,
}

impl Diagnostics {
    pub fn new<W: Write + Send + 'static>(sink: W) -> Self {
        Self {
            state: Mutex::new(State {
                sink: Box::new(sink),
                deferred_error: false,
            }),
        }
    }

    /// Diagnostics written to the process's standard error.
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }

    /// Write one event as a full line.
    pub fn emit(&self, event: Event) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(state.sink, "{event}").and_then(|()| state.sink.flush()) {
            tracing::warn!(error = %e, "Failed to write diagnostic output");
        }
    }

    /// Remember that a worker saw the client's deferred error message.
    pub fn record_deferred_error(&self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .deferred_error = true;
    }

    pub fn deferred_error(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .deferred_error
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::stderr()
    }
}

/// Result of a complete run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Number of non-empty groups that were extracted
    pub group_count: usize,
    /// Whether any worker saw the client's deferred error message
    pub any_error_occurred: bool,
}

impl RunOutcome {
    /// Re-emit the deferred error once if any worker reported it.
    pub fn report(&self, diagnostics: &Diagnostics) {
        if self.any_error_occurred {
            diagnostics.emit(Event::DeferredError);
        }
    }
}
