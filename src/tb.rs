//! The capability set handed to a function under test.
//!
//! Helpers written against [`Tb`] can be exercised with
//! [`run_test`](crate::run_test) and their outcome inspected afterwards.
//!
//! ```rust
//! use fake_tb::{run_test, Tb};
//!
//! fn contains_in_order(t: &dyn Tb, s: &str, parts: &[&str]) {
//!     t.helper();
//!     let mut rest = s;
//!     for part in parts {
//!         match rest.find(part) {
//!             Some(i) => rest = &rest[i + part.len()..],
//!             None => {
//!                 t.errorf(format_args!("failed to find {part:?} in remaining string {rest:?}"));
//!                 return;
//!             }
//!         }
//!     }
//! }
//!
//! let res = run_test(|t| contains_in_order(t, "help test foo", &["test", "helper"]));
//! assert!(res.failed());
//! assert_eq!(
//!     res.logs().messages(),
//!     vec![r#"failed to find "helper" in remaining string " foo""#],
//! );
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

/// Action registered with [`Tb::cleanup`].
pub type CleanupFn = Box<dyn FnOnce(&dyn Tb) + Send + 'static>;

/// Test context capabilities.
///
/// Operations returning `!` perform an abrupt exit: the remaining statements
/// of the current run (or of the cleanup being executed) are skipped, and
/// `Drop` impls of the unwound frames still run.
pub trait Tb: Send + Sync {
    /// Record a log line.
    fn log(&self, msg: &str);

    /// Record a formatted log line.
    fn logf(&self, args: fmt::Arguments<'_>);

    /// `log` followed by `fail`.
    fn error(&self, msg: &str);

    /// `logf` followed by `fail`.
    fn errorf(&self, args: fmt::Arguments<'_>);

    /// Mark the run as failed and keep going.
    fn fail(&self);

    /// Mark the run as failed and exit abruptly.
    fn fail_now(&self) -> !;

    fn failed(&self) -> bool;

    /// `log` followed by `fail_now`.
    fn fatal(&self, msg: &str) -> !;

    /// `logf` followed by `fail_now`.
    fn fatalf(&self, args: fmt::Arguments<'_>) -> !;

    /// `log` followed by `skip_now`.
    fn skip(&self, msg: &str) -> !;

    /// `logf` followed by `skip_now`.
    fn skipf(&self, args: fmt::Arguments<'_>) -> !;

    /// Mark the run as skipped and exit abruptly.
    ///
    /// A run that failed before being skipped still counts as failed.
    fn skip_now(&self) -> !;

    fn skipped(&self) -> bool;

    /// Mark the calling function as a helper.
    ///
    /// Log lines are attributed to the first caller that is not a helper.
    fn helper(&self);

    /// Register an action to run after the test body, last registered first.
    fn cleanup(&self, f: CleanupFn);

    fn name(&self) -> String;

    /// Create a fresh directory that is removed when the run's cleanups execute.
    fn temp_dir(&self) -> PathBuf;

    /// Set an environment variable, restoring the previous value on cleanup.
    fn setenv(&self, key: &str, value: &str);

    /// Change the working directory, restoring it on cleanup.
    fn chdir(&self, dir: &Path);

    /// Token cancelled just before the run's cleanups execute.
    fn context(&self) -> CancellationToken;
}
