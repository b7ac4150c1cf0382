//! # tarsnapper
//!
//! Parallel extraction of tarsnap archives.
//!
//! The tarsnap client extracts an archive one file at a time. This library
//! lists the archive once, splits its members into groups of roughly equal
//! total size and runs one extraction client per group concurrently.
//!
//! ## Features
//!
//! - Listing parsed into an inventory of names, sizes and timestamps
//! - Empty directories requested explicitly so they are recreated
//! - Largest-first load balancing across a configurable number of workers
//! - Files unchanged since a previous inventory weigh nothing when balancing
//! - Benign client messages filtered; deferred errors reported once
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tarsnapper::{Options, Snapper, TarsnapClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let options = Options {
//!         workers: 8,
//!         ..Options::default()
//!     };
//!     let client = Arc::new(TarsnapClient::default());
//!     let snapper = Snapper::new("nightly-2024-05-01", options, client);
//!
//!     let outcome = snapper.run().await?;
//!     if outcome.any_error_occurred {
//!         std::process::exit(1);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod client;
pub mod extract;
pub mod inventory;
pub mod partition;
pub mod report;

pub use cli::Cli;
pub use client::{ArchiveClient, ClientProcess, Invocation, TarsnapClient};
pub use inventory::{Entry, Inventory};
pub use partition::{DEFAULT_WORKERS, Group, Target};
pub use report::{Diagnostics, Event, RunOutcome};

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::OnceCell;

use extract::RunContext;

/// Settings for one run.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Only list and extract this directory of the archive
    pub directory: Option<String>,
    /// Number of concurrent extraction workers; zero means [`DEFAULT_WORKERS`]
    pub workers: usize,
    /// Extra arguments passed to every client invocation
    pub tarsnap_options: Vec<String>,
    /// Inventory of an earlier run, used to discount unchanged files
    pub previous: Option<Inventory>,
}

impl Options {
    /// Effective worker count.
    pub fn workers(&self) -> usize {
        if self.workers == 0 {
            DEFAULT_WORKERS
        } else {
            self.workers
        }
    }
}

/// Parallel extractor for one archive.
///
/// The archive listing is fetched on first use and cached, so inspecting
/// [`inventory`](Self::inventory) or [`file_groups`](Self::file_groups)
/// before [`run`](Self::run) does not list the archive twice.
pub struct Snapper<C: ArchiveClient> {
    archive: String,
    options: Options,
    client: Arc<C>,
    diagnostics: Arc<Diagnostics>,
    inventory: OnceCell<Arc<Inventory>>,
}

impl<C: ArchiveClient> Snapper<C> {
    pub fn new(archive: impl Into<String>, options: Options, client: Arc<C>) -> Self {
        Self {
            archive: archive.into(),
            options,
            client,
            diagnostics: Arc::new(Diagnostics::stderr()),
            inventory: OnceCell::new(),
        }
    }

    /// Send diagnostic output somewhere other than standard error.
    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = Arc::new(diagnostics);
        self
    }

    /// The archive's members, listed by the client on first call.
    pub async fn inventory(&self) -> Result<Arc<Inventory>> {
        let inventory = self
            .inventory
            .get_or_try_init(|| async {
                let invocation = Invocation::List {
                    archive: self.archive.clone(),
                    directory: self.options.directory.clone(),
                    options: self.options.tarsnap_options.clone(),
                };
                let inventory = inventory::parser::scan_archive(
                    self.client.as_ref(),
                    &invocation,
                    &self.diagnostics,
                )
                .await
                .with_context(|| format!("Failed to list archive {}", self.archive))?;
                Ok::<_, anyhow::Error>(Arc::new(inventory))
            })
            .await?;
        Ok(Arc::clone(inventory))
    }

    /// Files plus empty directories to request from the client.
    pub async fn extraction_targets(&self) -> Result<Vec<Target>> {
        let inventory = self.inventory().await?;
        Ok(partition::extraction_targets(&inventory))
    }

    /// Extraction targets split into balanced groups, one per worker.
    pub async fn file_groups(&self) -> Result<Vec<Group>> {
        let targets = self.extraction_targets().await?;
        Ok(partition::partition(
            targets,
            self.options.workers(),
            self.options.previous.as_ref(),
        ))
    }

    /// List, partition and extract the archive.
    ///
    /// Only a failure to list the archive is returned as an error. Problems
    /// in individual workers are written to the diagnostics, and a deferred
    /// client error is reflected in [`RunOutcome::any_error_occurred`].
    pub async fn run(&self) -> Result<RunOutcome> {
        let groups = self.file_groups().await?;
        tracing::debug!(
            archive = %self.archive,
            groups = groups.len(),
            workers = self.options.workers(),
            "Partitioned archive"
        );

        let ctx = Arc::new(RunContext::new(
            Arc::clone(&self.client),
            self.archive.clone(),
            self.options.tarsnap_options.clone(),
            Arc::clone(&self.diagnostics),
        ));
        Ok(extract::extract_groups(ctx, groups).await)
    }
}
