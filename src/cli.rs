use clap::Parser;
use std::path::PathBuf;

use crate::Options;
use crate::client::TARSNAP;

#[derive(Parser, Debug)]
#[command(name = "tarsnapper")]
#[command(version)]
#[command(about = "Extract a tarsnap archive with several tarsnap processes", long_about = None)]
#[command(after_help = "Examples:\n  \
  tarsnapper nightly                      restore archive 'nightly' with 10 workers\n  \
  tarsnapper nightly -d home/alice -j 4   restore one directory with 4 workers\n  \
  tarsnapper nightly -- --keyfile k.key   pass extra options to every tarsnap call")]
pub struct Cli {
    /// Archive name
    #[arg(value_name = "ARCHIVE")]
    pub archive: String,

    /// Extract files from this directory of the archive
    #[arg(short = 'd', long, value_name = "DIR")]
    pub directory: Option<String>,

    /// Number of workers to use (default: 10)
    #[arg(short = 'j', long, value_name = "N", default_value_t = 0)]
    pub jobs: usize,

    /// Path to the tarsnap executable
    #[arg(long, value_name = "PATH", default_value = TARSNAP)]
    pub tarsnap: PathBuf,

    /// Print debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Options passed to every tarsnap invocation
    #[arg(last = true, value_name = "TARSNAP OPTIONS")]
    pub tarsnap_options: Vec<String>,
}

impl Cli {
    pub fn options(&self) -> Options {
        Options {
            directory: self.directory.clone(),
            workers: self.jobs,
            tarsnap_options: self.tarsnap_options.clone(),
            previous: None,
        }
    }
}
