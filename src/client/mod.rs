mod process;
mod tarsnap;

pub use process::ClientProcess;
pub use tarsnap::{TARSNAP, TarsnapClient};

use anyhow::Result;
use async_trait::async_trait;

/// A single invocation of the archive client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Verbose table of contents, optionally scoped to a directory of the archive.
    List {
        archive: String,
        directory: Option<String>,
        options: Vec<String>,
    },
    /// Verbose extraction restricted to the given (already escaped) paths.
    Extract {
        archive: String,
        options: Vec<String>,
        files: Vec<String>,
    },
}

impl Invocation {
    /// Command line arguments passed to the client binary.
    pub fn args(&self) -> Vec<String> {
        match self {
            Self::List {
                archive,
                directory,
                options,
            } => {
                let mut args = vec!["-tvf".to_string(), archive.clone()];
                args.extend(options.iter().cloned());
                args.extend(directory.iter().cloned());
                args
            }
            Self::Extract {
                archive,
                options,
                files,
            } => {
                let mut args = vec!["-xvf".to_string(), archive.clone()];
                args.extend(options.iter().cloned());
                args.extend(files.iter().cloned());
                args
            }
        }
    }
}

/// Trait for launching the external archive client.
///
/// Listing invocations expose the client's standard output; extraction
/// invocations expose its standard error, which is where the client reports
/// per-file diagnostics.
#[async_trait]
pub trait ArchiveClient: Send + Sync + 'static {
    /// Start the client and return a handle to its captured output.
    async fn spawn(&self, invocation: &Invocation) -> Result<ClientProcess>;
}
