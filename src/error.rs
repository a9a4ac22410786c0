//! Error types for fake-tb
//!
//! The context API itself never returns errors: outcomes travel through the
//! failed/skipped/panicked flags and log entries. These variants cover the
//! surrounding plumbing (configuration, filesystem side effects) and the one
//! invariant violation the engine refuses to absorb.

use std::io;
use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A state-mutating operation was invoked on a run that already signaled completion.
    #[error("{op} called after test {name:?} has completed")]
    CompletedRun { op: &'static str, name: String },

    #[error("failed to load run configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("failed to create temp dir: {0}")]
    TempDir(#[source] io::Error),

    #[error("failed to change working directory to {path:?}: {source}")]
    Chdir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
