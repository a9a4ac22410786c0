//! Result view
//!
//! A [`TestResult`] is produced once a run has completed. Log lines are kept
//! as raw stacks until first inspected; attribution is then resolved once
//! against the final helper set and cached.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::callers::{caller_info, SkipSet};
use crate::context::{OutcomeFlags, RunRecord};
use crate::stack::{self, Frame, Frames};
use crate::tb::Tb;

/// Final outcome of a run, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Panicked,
    Failed,
    Skipped,
    Passed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Panicked => "panicked",
            Outcome::Failed => "failed",
            Outcome::Skipped => "skipped",
            Outcome::Passed => "passed",
        };
        f.write_str(s)
    }
}

/* ===================== Log Lines ===================== */

/// A log entry with its resolved caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLine {
    pub message: String,
    /// Source file of the attributed caller, if it could be resolved.
    pub file: Option<String>,
    pub line: Option<u32>,
    /// Function of the attributed caller. Empty if unknown.
    pub function: String,
    /// Context operation that recorded the entry.
    pub op: String,
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = self
            .file
            .as_deref()
            .map(Path::new)
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy());
        match base {
            Some(base) => write!(f, "{}:{}: {}", base, self.line.unwrap_or(0), self.message),
            None => write!(f, "???:1: {}", self.message),
        }
    }
}

/// Ordered log lines of a run. Displays as `file:line: message`, one per line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Logs {
    lines: Vec<LogLine>,
}

impl Logs {
    pub fn messages(&self) -> Vec<&str> {
        self.lines.iter().map(|l| l.message.as_str()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LogLine> {
        self.lines.iter()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl<'a> IntoIterator for &'a Logs {
    type Item = &'a LogLine;
    type IntoIter = std::slice::Iter<'a, LogLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}

impl fmt::Display for Logs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{line}")?;
        }
        Ok(())
    }
}

/* ===================== Test Result ===================== */

/// Serializable summary of a run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub run_id: Uuid,
    pub name: String,
    pub outcome: Outcome,
    pub failed: bool,
    pub skipped: bool,
    pub panicked: bool,
    pub recovered: Option<String>,
    pub helpers: Vec<String>,
    pub logs: Logs,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Outcome of running a function against a fresh context.
#[derive(Debug)]
pub struct TestResult {
    record: RunRecord,
    run_id: Uuid,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    resolved: OnceLock<Logs>,
}

impl TestResult {
    pub(crate) fn new(
        record: RunRecord,
        run_id: Uuid,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            record,
            run_id,
            started_at,
            finished_at,
            resolved: OnceLock::new(),
        }
    }

    fn flags(&self) -> OutcomeFlags {
        self.record.flags
    }

    /// Whether the run failed. A panic counts as a failure.
    pub fn failed(&self) -> bool {
        self.flags().failed || self.flags().panicked
    }

    /// Whether the run was skipped without failing first.
    ///
    /// A run that failed and was then skipped reports `false` here; see
    /// [`failed_and_skipped`](Self::failed_and_skipped).
    pub fn skipped(&self) -> bool {
        !self.failed() && self.flags().skipped
    }

    /// Whether the run was marked failed and later skipped.
    pub fn failed_and_skipped(&self) -> bool {
        self.flags().failed && self.flags().skipped
    }

    pub fn panicked(&self) -> bool {
        self.flags().panicked
    }

    /// String form of the first value recovered from a panic.
    pub fn recovered(&self) -> Option<&str> {
        self.record.recovered.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn outcome(&self) -> Outcome {
        if self.panicked() {
            Outcome::Panicked
        } else if self.failed() {
            Outcome::Failed
        } else if self.skipped() {
            Outcome::Skipped
        } else {
            Outcome::Passed
        }
    }

    /// Functions that marked themselves as helpers, sorted and deduplicated.
    pub fn helpers(&self) -> Vec<String> {
        let mut funcs: Vec<String> = self
            .record
            .helpers
            .values()
            .filter(|f| !f.is_empty())
            .cloned()
            .collect();
        funcs.sort();
        funcs.dedup();
        funcs
    }

    /// Log lines with their callers resolved.
    pub fn logs(&self) -> &Logs {
        self.resolved.get_or_init(|| self.resolve())
    }

    pub fn report(&self) -> Report {
        Report {
            run_id: self.run_id,
            name: self.record.name.clone(),
            outcome: self.outcome(),
            failed: self.failed(),
            skipped: self.skipped(),
            panicked: self.panicked(),
            recovered: self.record.recovered.clone(),
            helpers: self.helpers(),
            logs: self.logs().clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }

    fn resolve(&self) -> Logs {
        let root = self
            .record
            .cleanup_root
            .as_ref()
            .map(stack::symbolize)
            .unwrap_or_default();
        let skip = SkipSet::new(self.record.helpers.values().cloned(), root.first());

        // Log lines from the same cleanup share one registration stack.
        let mut registrations: HashMap<*const Frames, Vec<Frame>> = HashMap::new();

        let lines = self
            .record
            .logs
            .iter()
            .map(|entry| {
                let frames = stack::symbolize(&entry.frames);
                let cleanup = entry.cleanup_frames.as_ref().map(|reg| {
                    registrations
                        .entry(Arc::as_ptr(reg))
                        .or_insert_with(|| stack::symbolize(reg))
                        .clone()
                });
                let info = caller_info(&frames, cleanup.as_deref(), &skip);
                LogLine {
                    message: entry.message.clone(),
                    file: info.file.map(|f| f.to_string_lossy().into_owned()),
                    line: info.line,
                    function: info.function,
                    op: info.op,
                }
            })
            .collect();

        tracing::trace!(run_id = %self.run_id, "log callers resolved");
        Logs { lines }
    }

    /* ---------- assertions ---------- */

    /// Fail `t` fatally unless the run passed.
    pub fn must_pass(&self, t: &dyn Tb) {
        t.helper();

        if self.failed() {
            t.fatalf(format_args!("test failed, logs:\n{}", self.logs()));
        }
    }

    /// Fail `t` fatally unless the run failed and logged `want_log`.
    pub fn must_fail(&self, t: &dyn Tb, want_log: &str) {
        t.helper();

        if !self.failed() {
            t.fatal("test passed, but expected to fail");
        }

        let logs = self.logs().to_string();
        if !logs.contains(want_log) {
            t.fatalf(format_args!(
                "test expected to fail, missing expected log {want_log:?}. logs:\n{logs}"
            ));
        }
    }

    /// Fail `t` fatally unless the run panicked with a value containing `contains`.
    pub fn must_panic(&self, t: &dyn Tb, contains: &str) {
        t.helper();

        if !self.panicked() {
            t.fatal("test did not panic, but expected to panic");
        }

        let rec = self.recovered().unwrap_or_default();
        if !rec.contains(contains) {
            t.fatalf(format_args!(
                "test expected to panic, panic string doesn't contain {contains:?}. got:\n{rec}"
            ));
        }
    }
}
