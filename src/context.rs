//! Execution context
//!
//! The object handed to the function under test. It owns the outcome flags,
//! the recorded log entries, the helper set and the cleanup stack of one run.
//!
//! ## State machine
//!
//! `Running -> {Passed, Failed, Skipped, Panicked} -> Completed`
//!
//! Flags only ever go from unset to set. `skipped` may be set after `failed`
//! without revoking it. Once the completion signal fires the context is
//! read-only; any later mutation is an invariant violation and panics in the
//! calling thread.
//!
//! ## Abrupt exits
//!
//! `fail_now`, `fatal*`, `skip*` unwind with a private payload that only the
//! runner's recovery boundaries understand. The state lock is always released
//! before unwinding starts.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::cleanup::CleanupStack;
use crate::config::RunOptions;
use crate::env;
use crate::error::Error;
use crate::stack::{self, Frames};
use crate::tb::{CleanupFn, Tb};

/// Unwind payload used for abrupt exits.
pub(crate) struct AbruptExit;

fn abrupt_exit() -> ! {
    tracing::trace!("abrupt exit");
    panic::resume_unwind(Box::new(AbruptExit))
}

/* ===================== Recorded State ===================== */

/// Raw outcome flags. `Failed`, `Skipped` and friends are derived from these.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeFlags {
    pub failed: bool,
    pub skipped: bool,
    pub panicked: bool,
}

/// One recorded log line, unresolved.
#[derive(Debug, Clone)]
pub(crate) struct LogEntry {
    pub message: String,
    /// First frame is the context operation that recorded the entry.
    pub frames: Frames,
    /// Registration stack of the cleanup that was running, if any.
    pub cleanup_frames: Option<Arc<Frames>>,
}

#[derive(Debug, Default)]
struct State {
    flags: OutcomeFlags,
    logs: Vec<LogEntry>,
    /// Helper call sites keyed by instruction pointer.
    helpers: BTreeMap<usize, String>,
    cleanups: CleanupStack,
    current_cleanup: Option<Arc<Frames>>,
    cleanup_root: Option<Frames>,
    recovered: Option<String>,
}

impl State {
    fn push_log(&mut self, message: String, frames: Frames) {
        let cleanup_frames = self.current_cleanup.clone();
        self.logs.push(LogEntry {
            message,
            frames,
            cleanup_frames,
        });
    }
}

/// Everything the result view needs once the run is over.
#[derive(Debug)]
pub(crate) struct RunRecord {
    pub name: String,
    pub flags: OutcomeFlags,
    pub recovered: Option<String>,
    pub logs: Vec<LogEntry>,
    pub helpers: BTreeMap<usize, String>,
    pub cleanup_root: Option<Frames>,
}

/* ===================== Completion Signal ===================== */

/// One-shot completion signal.
#[derive(Debug, Default)]
struct Completion {
    done: Mutex<bool>,
    cond: Condvar,
}

impl Completion {
    fn signal(&self) {
        let mut done = self.done.lock();
        *done = true;
        self.cond.notify_all();
    }

    fn is_done(&self) -> bool {
        *self.done.lock()
    }

    fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.cond.wait(&mut done);
        }
    }
}

/* ===================== Context ===================== */

pub struct Context {
    options: RunOptions,
    state: Mutex<State>,
    completion: Completion,
    cancel: CancellationToken,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.options.name)
            .field("flags", &self.state.lock().flags)
            .field("completed", &self.completion.is_done())
            .finish_non_exhaustive()
    }
}

impl Context {
    pub(crate) fn new(options: RunOptions) -> Self {
        Self {
            options,
            state: Mutex::new(State::default()),
            completion: Completion::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Lock the state for a mutation, refusing once the run has completed.
    fn lock_live(&self, op: &'static str) -> MutexGuard<'_, State> {
        let state = self.state.lock();
        if self.completion.is_done() {
            drop(state);
            let err = Error::CompletedRun {
                op,
                name: self.options.name.clone(),
            };
            tracing::error!(error = %err, "context mutated after completion");
            panic!("{err}");
        }
        state
    }

    /* ---------- runner hooks ---------- */

    /// Convert an unwind payload caught at a recovery boundary into outcome state.
    ///
    /// Abrupt exits are expected and leave no trace. Anything else is a panic:
    /// the run is marked panicked and a `panic: <value>` entry is recorded.
    pub(crate) fn recover(&self, payload: Box<dyn Any + Send>) {
        if payload.is::<AbruptExit>() {
            return;
        }

        let frames = stack::capture_frames(self.options.stack_depth);
        let message = panic_message(payload.as_ref());
        tracing::warn!(panic = %message, "recovered panic in function under test");

        let mut state = self.state.lock();
        state.flags.panicked = true;
        if state.recovered.is_none() {
            state.recovered = Some(message.clone());
        }
        state.push_log(format!("panic: {message}"), frames);
    }

    /// Cancel the token handed out by `Tb::context`.
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Drain the cleanup stack, last registered first.
    ///
    /// Entries are popped one at a time so cleanups registered by a running
    /// cleanup are picked up. Each action runs inside its own recovery
    /// boundary: an abrupt exit or panic ends only that action.
    #[inline(never)]
    pub(crate) fn run_cleanups(&self) {
        let root = stack::capture_frames(self.options.stack_depth);
        self.state.lock().cleanup_root = Some(root);

        let mut drained = 0usize;
        loop {
            let action = {
                let mut state = self.state.lock();
                let Some(entry) = state.cleanups.pop() else {
                    break;
                };
                state.current_cleanup = Some(entry.frames);
                entry.action
            };

            let result = panic::catch_unwind(AssertUnwindSafe(|| action(self as &dyn Tb)));
            self.state.lock().current_cleanup = None;
            if let Err(payload) = result {
                self.recover(payload);
            }
            drained += 1;
        }

        tracing::debug!(drained, "cleanups drained");
    }

    pub(crate) fn complete(&self) {
        self.completion.signal();
    }

    pub(crate) fn wait(&self) {
        self.completion.wait();
    }

    pub(crate) fn into_record(self) -> RunRecord {
        let state = self.state.into_inner();
        RunRecord {
            name: self.options.name,
            flags: state.flags,
            recovered: state.recovered,
            logs: state.logs,
            helpers: state.helpers,
            cleanup_root: state.cleanup_root,
        }
    }
}

/// Render a panic payload the way `panic!` messages read.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    if let Some(err) = payload.downcast_ref::<Error>() {
        return err.to_string();
    }
    "Box<dyn Any>".to_string()
}

/* ===================== Capabilities ===================== */

impl Tb for Context {
    fn log(&self, msg: &str) {
        let frames = stack::capture_frames(self.options.stack_depth);
        self.lock_live("log").push_log(msg.to_string(), frames);
    }

    fn logf(&self, args: fmt::Arguments<'_>) {
        let frames = stack::capture_frames(self.options.stack_depth);
        self.lock_live("logf").push_log(args.to_string(), frames);
    }

    fn error(&self, msg: &str) {
        let frames = stack::capture_frames(self.options.stack_depth);
        let mut state = self.lock_live("error");
        state.push_log(msg.to_string(), frames);
        state.flags.failed = true;
    }

    fn errorf(&self, args: fmt::Arguments<'_>) {
        let frames = stack::capture_frames(self.options.stack_depth);
        let mut state = self.lock_live("errorf");
        state.push_log(args.to_string(), frames);
        state.flags.failed = true;
    }

    fn fail(&self) {
        self.lock_live("fail").flags.failed = true;
    }

    fn fail_now(&self) -> ! {
        self.lock_live("fail_now").flags.failed = true;
        abrupt_exit()
    }

    fn failed(&self) -> bool {
        let state = self.state.lock();
        state.flags.failed || state.flags.panicked
    }

    fn fatal(&self, msg: &str) -> ! {
        let frames = stack::capture_frames(self.options.stack_depth);
        {
            let mut state = self.lock_live("fatal");
            state.push_log(msg.to_string(), frames);
            state.flags.failed = true;
        }
        abrupt_exit()
    }

    fn fatalf(&self, args: fmt::Arguments<'_>) -> ! {
        let frames = stack::capture_frames(self.options.stack_depth);
        {
            let mut state = self.lock_live("fatalf");
            state.push_log(args.to_string(), frames);
            state.flags.failed = true;
        }
        abrupt_exit()
    }

    fn skip(&self, msg: &str) -> ! {
        let frames = stack::capture_frames(self.options.stack_depth);
        {
            let mut state = self.lock_live("skip");
            state.push_log(msg.to_string(), frames);
            state.flags.skipped = true;
        }
        abrupt_exit()
    }

    fn skipf(&self, args: fmt::Arguments<'_>) -> ! {
        let frames = stack::capture_frames(self.options.stack_depth);
        {
            let mut state = self.lock_live("skipf");
            state.push_log(args.to_string(), frames);
            state.flags.skipped = true;
        }
        abrupt_exit()
    }

    fn skip_now(&self) -> ! {
        self.lock_live("skip_now").flags.skipped = true;
        abrupt_exit()
    }

    fn skipped(&self) -> bool {
        self.state.lock().flags.skipped
    }

    fn helper(&self) {
        let frames = stack::capture_frames(self.options.stack_depth);
        // frames[0] is this operation, frames[1] the function marking itself.
        let Some(site) = stack::symbolize(&frames).into_iter().nth(1) else {
            return;
        };
        self.state
            .lock()
            .helpers
            .entry(site.ip)
            .or_insert(site.function);
    }

    fn cleanup(&self, f: CleanupFn) {
        let frames = stack::capture_frames(self.options.stack_depth);
        self.lock_live("cleanup").cleanups.push(f, frames);
    }

    fn name(&self) -> String {
        self.options.name.clone()
    }

    fn temp_dir(&self) -> PathBuf {
        self.helper();
        env::temp_dir(self, &self.options.name, self.options.temp_root.as_deref())
    }

    fn setenv(&self, key: &str, value: &str) {
        self.helper();
        env::setenv(self, key, value);
    }

    fn chdir(&self, dir: &Path) {
        self.helper();
        env::chdir(self, dir);
    }

    fn context(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_payloads() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&String::from("boom")), "boom");
        assert_eq!(panic_message(&42u8), "Box<dyn Any>");
    }

    #[test]
    fn test_abrupt_exit_is_not_a_panic() {
        let ctx = Context::new(RunOptions::default());
        let payload = panic::catch_unwind(AssertUnwindSafe(|| ctx.fail_now())).unwrap_err();
        ctx.recover(payload);

        let record = ctx.into_record();
        assert!(record.flags.failed);
        assert!(!record.flags.panicked);
        assert!(record.logs.is_empty());
    }

    #[test]
    #[should_panic(expected = "fail called after test \"fake-tb\" has completed")]
    fn test_fail_after_completion_panics() {
        let ctx = Context::new(RunOptions::default());
        ctx.complete();
        ctx.fail();
    }

    #[test]
    #[should_panic(expected = "log called after test")]
    fn test_log_after_completion_panics() {
        let ctx = Context::new(RunOptions::default());
        ctx.complete();
        ctx.log("late");
    }

    #[test]
    fn test_reads_after_completion_are_allowed() {
        let ctx = Context::new(RunOptions::default());
        ctx.error("before");
        ctx.complete();
        assert!(ctx.failed());
        assert!(!ctx.skipped());
        assert_eq!(ctx.name(), "fake-tb");
    }
}
