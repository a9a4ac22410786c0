//! Retrying flaky assertions
//!
//! Useful for tests that wait on background work. The function is tried
//! against throwaway contexts until one run passes (a skip counts as a pass)
//! or the attempts run out. A last attempt always runs against the caller's
//! `Tb`, so its logs and failures are the ones reported.

use std::time::Duration;

use crate::result::TestResult;
use crate::runner::RunBuilder;
use crate::tb::Tb;

pub const DEFAULT_ATTEMPTS: usize = 10;

/// Hook called after an attempt, with the 1-based attempt number.
pub type AttemptHook = Box<dyn Fn(&dyn Tb, usize, &TestResult) + Send + Sync>;

pub struct RetryOptions {
    /// Maximum number of runs, including the last one against the caller.
    /// Zero means [`DEFAULT_ATTEMPTS`].
    pub attempts: usize,

    /// Called after a failed attempt that will be retried.
    pub on_retry: Option<AttemptHook>,

    /// Called after the attempt that passed.
    pub on_pass: Option<AttemptHook>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            on_retry: None,
            on_pass: None,
        }
    }
}

impl std::fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryOptions")
            .field("attempts", &self.attempts)
            .field("on_retry", &self.on_retry.is_some())
            .field("on_pass", &self.on_pass.is_some())
            .finish()
    }
}

impl RetryOptions {
    pub fn run<F>(self, t: &dyn Tb, test_fn: F)
    where
        F: Fn(&dyn Tb) + Sync,
    {
        t.helper();
        run(t, self, test_fn);
    }
}

/// Try `test_fn` up to `n` times, logging and backing off between attempts.
pub fn n<F>(t: &dyn Tb, n: usize, test_fn: F)
where
    F: Fn(&dyn Tb) + Sync,
{
    t.helper();

    let opts = RetryOptions {
        attempts: n,
        on_retry: Some(Box::new(retry_backoff)),
        on_pass: None,
    };
    run(t, opts, test_fn);
}

/// Try `test_fn` until it passes or `opts.attempts` is reached.
pub fn run<F>(t: &dyn Tb, opts: RetryOptions, test_fn: F)
where
    F: Fn(&dyn Tb) + Sync,
{
    t.helper();

    let attempts = if opts.attempts == 0 {
        DEFAULT_ATTEMPTS
    } else {
        opts.attempts
    };

    for attempt in 1..attempts {
        let tr = RunBuilder::new().name(t.name()).run(|t| test_fn(t));

        if !tr.failed() {
            tracing::debug!(attempt, "retry attempt passed");
            if let Some(on_pass) = &opts.on_pass {
                on_pass(t, attempt, &tr);
            }
            break;
        }

        tracing::debug!(attempt, "retry attempt failed");
        if let Some(on_retry) = &opts.on_retry {
            on_retry(t, attempt, &tr);
        }
    }

    test_fn(t);
}

/// Log the failed attempt and sleep for `attempt` milliseconds.
pub fn retry_backoff(t: &dyn Tb, attempt: usize, _tr: &TestResult) {
    t.helper();

    let sleep_for = Duration::from_millis(attempt as u64);
    t.logf(format_args!(
        "retry attempt {attempt} failed, retrying in {sleep_for:?}"
    ));
    std::thread::sleep(sleep_for);
}
