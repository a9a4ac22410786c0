//! Test runner
//!
//! Runs a function against a fresh [`Context`] on a dedicated thread and
//! waits for the completion signal. The function under test may exit
//! abruptly at any point; that only ends its own execution unit, never the
//! caller's.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::thread;

use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::config::RunOptions;
use crate::context::Context;
use crate::error::Result;
use crate::result::TestResult;
use crate::tb::Tb;

/// Run `body` against a fresh context with default options.
pub fn run_test<F>(body: F) -> TestResult
where
    F: FnOnce(&dyn Tb) + Send,
{
    RunBuilder::new().run(body)
}

/* ===================== Builder ===================== */

/// Configures and starts a run.
///
/// ```rust
/// use fake_tb::RunBuilder;
///
/// let res = RunBuilder::new()
///     .name("TestSum")
///     .run(|t| {
///         assert_eq!(t.name(), "TestSum");
///         t.skip("not today");
///     });
/// assert!(res.skipped());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RunBuilder {
    options: RunOptions,
}

impl RunBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from options found in `FAKE_TB_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            options: RunOptions::from_env()?,
        })
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.options.name = name.into();
        self
    }

    pub fn stack_depth(mut self, depth: usize) -> Self {
        self.options.stack_depth = depth;
        self
    }

    pub fn temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.options.temp_root = Some(root.into());
        self
    }

    pub fn options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Run `body` and block until it and all its cleanups have finished.
    pub fn run<F>(self, body: F) -> TestResult
    where
        F: FnOnce(&dyn Tb) + Send,
    {
        let run_id = Uuid::new_v4();
        let span = tracing::debug_span!("run", %run_id, name = %self.options.name);
        let thread_name = format!("fake-tb:{}", self.options.name.replace('\0', ""));

        let started_at = Utc::now();
        let ctx = Context::new(self.options);
        // Left in place if the thread cannot be spawned.
        let slot = Mutex::new(Some(body));

        thread::scope(|scope| {
            let spawned = thread::Builder::new()
                .name(thread_name)
                .spawn_scoped(scope, || {
                    let body = slot.lock().take();
                    if let Some(body) = body {
                        span.in_scope(|| execute(&ctx, body));
                    }
                });

            match spawned {
                Ok(handle) => {
                    ctx.wait();
                    if handle.join().is_err() {
                        tracing::error!(%run_id, "execution thread terminated abnormally");
                    }
                }
                Err(err) => {
                    tracing::warn!(%run_id, error = %err, "failed to spawn execution thread, running inline");
                    let body = slot.lock().take();
                    if let Some(body) = body {
                        span.in_scope(|| execute(&ctx, body));
                    }
                }
            }
        });

        let finished_at = Utc::now();
        let result = TestResult::new(ctx.into_record(), run_id, started_at, finished_at);
        tracing::debug!(%run_id, outcome = %result.outcome(), "run finished");
        result
    }
}

/* ===================== Execution Unit ===================== */

/// Signals completion however the execution unit ends.
struct CompleteOnDrop<'a>(&'a Context);

impl Drop for CompleteOnDrop<'_> {
    fn drop(&mut self) {
        self.0.complete();
    }
}

/// Body, then cancellation, then cleanups, then the completion signal.
fn execute<F>(ctx: &Context, body: F)
where
    F: FnOnce(&dyn Tb),
{
    let _complete = CompleteOnDrop(ctx);

    tracing::trace!("body started");
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| body(ctx as &dyn Tb))) {
        ctx.recover(payload);
    }

    ctx.cancel();
    ctx.run_cleanups();
}
