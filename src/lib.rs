//! Run functions that take a test context against a fake one, then inspect
//! whether they passed, failed, skipped or panicked, and what they logged.

pub mod callers;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod context;
mod env;
pub mod error;
pub mod result;
pub mod retry;
pub mod runner;
pub mod stack;
pub mod tb;
pub mod want;

#[cfg(test)]
mod tests;

// Re-export main types
pub use config::RunOptions;
pub use error::{Error, Result};
pub use result::{LogLine, Logs, Outcome, Report, TestResult};
pub use runner::{run_test, RunBuilder};
pub use tb::{CleanupFn, Tb};
