//! Concurrent extraction of partitioned groups.
//!
//! Every group gets its own task running one extraction client. Tasks only
//! share the [`RunContext`]: the client, the invocation settings and the
//! [`Diagnostics`] sink with its deferred error flag. A worker that cannot
//! start its client reports it and stops; siblings carry on regardless.

mod filter;

pub use filter::{ALREADY_EXISTS, GLOB_CHARS, LineKind, NOT_OLDER, escape_globs};

use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

use crate::client::{ArchiveClient, ClientProcess, Invocation};
use crate::partition::Group;
use crate::report::{Diagnostics, Event, RunOutcome};

/// State shared by all workers of a run.
pub struct RunContext<C: ArchiveClient> {
    client: Arc<C>,
    archive: String,
    options: Vec<String>,
    diagnostics: Arc<Diagnostics>,
}

impl<C: ArchiveClient> RunContext<C> {
    pub fn new(
        client: Arc<C>,
        archive: String,
        options: Vec<String>,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        Self {
            client,
            archive,
            options,
            diagnostics,
        }
    }

    fn invocation(&self, group: &Group) -> Invocation {
        Invocation::Extract {
            archive: self.archive.clone(),
            options: self.options.clone(),
            files: group.files.iter().map(|f| escape_globs(f)).collect(),
        }
    }
}

/// Extract every group concurrently and wait for all of them.
///
/// The deferred error message is re-emitted once at the end if any worker
/// saw it.
pub async fn extract_groups<C: ArchiveClient>(
    ctx: Arc<RunContext<C>>,
    groups: Vec<Group>,
) -> RunOutcome {
    let group_count = groups.len();
    ctx.diagnostics.emit(Event::WorkersCreated {
        workers: group_count,
    });

    let mut workers = JoinSet::new();
    for (worker, group) in groups.into_iter().enumerate() {
        let ctx = Arc::clone(&ctx);
        workers.spawn(async move { run_worker(&ctx, worker, group).await });
    }

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "Extraction worker task failed");
        }
    }

    let outcome = RunOutcome {
        group_count,
        any_error_occurred: ctx.diagnostics.deferred_error(),
    };
    outcome.report(&ctx.diagnostics);
    outcome
}

async fn run_worker<C: ArchiveClient>(ctx: &RunContext<C>, worker: usize, group: Group) {
    let started = Instant::now();
    let files = group.len();
    ctx.diagnostics.emit(Event::WorkerStarted { worker, files });
    tracing::debug!(worker, files, weight = group.weight, "Starting extraction worker");

    let mut process = match ctx.client.spawn(&ctx.invocation(&group)).await {
        Ok(process) => process,
        Err(e) => {
            ctx.diagnostics.emit(Event::WorkerFailed {
                worker,
                reason: format!("{e:#}"),
            });
            return;
        }
    };

    if let Err(e) = forward_client_output(&ctx.diagnostics, &mut process).await {
        tracing::warn!(worker, error = %e, "Stopped reading extraction output");
    }

    // Failures are reported by the client on stderr, not through the exit code.
    match process.wait().await {
        Ok(Some(status)) if !status.success() => {
            tracing::debug!(worker, %status, "Extraction client exited unsuccessfully");
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(worker, error = %e, "Failed to wait for extraction client"),
    }

    ctx.diagnostics.emit(Event::WorkerFinished {
        worker,
        files,
        elapsed: started.elapsed(),
    });
}

/// Filter the client's diagnostic lines into `diagnostics`.
async fn forward_client_output(
    diagnostics: &Diagnostics,
    process: &mut ClientProcess,
) -> Result<()> {
    while let Some(line) = process.next_line().await? {
        match LineKind::classify(&line) {
            LineKind::NotOlder | LineKind::AlreadyExists => {}
            LineKind::DeferredError => diagnostics.record_deferred_error(),
            LineKind::Other => diagnostics.emit(Event::ClientOutput(line)),
        }
    }
    Ok(())
}
