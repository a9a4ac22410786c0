//! Caller resolution
//!
//! Decides which frame of a captured stack a log line is attributed to.
//! Resolution only runs after the run is complete, so the helper set it
//! consults is final: a function that calls `helper()` after logging is still
//! excluded from that earlier log's attribution.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::stack::Frame;

/// Function-name prefixes produced by the host's unwind and closure-call machinery.
const TRAMPOLINE_PREFIXES: &[&str] = &[
    "std::panicking::",
    "std::panic::",
    "core::panicking::",
    "core::panic::",
    "core::ops::function::",
    "core::ptr::drop_in_place",
    "panic_unwind::",
    "__rust_",
];

/// Where a log line came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerInfo {
    /// The context operation that recorded the entry (first captured frame).
    pub op: String,
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
    pub function: String,
}

/// Strip trailing closure segments, `a::b::{{closure}}::{{closure}}` -> `a::b`.
pub fn base_function(function: &str) -> &str {
    let mut name = function;
    while let Some(stripped) = name.strip_suffix("::{{closure}}") {
        name = stripped;
    }
    name
}

/// Whether a frame belongs to unwinding or closure-dispatch plumbing.
pub fn is_trampoline(function: &str) -> bool {
    let name = function.trim_start_matches('<');
    TRAMPOLINE_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
        || name.contains(" as core::ops::function::Fn")
}

/* ===================== Skip Set ===================== */

/// Frames that are walked past during attribution.
#[derive(Debug, Clone, Default)]
pub struct SkipSet {
    helpers: HashSet<String>,
    cleanup_root: Option<String>,
}

impl SkipSet {
    pub fn new<I, S>(helpers: I, cleanup_root: Option<&Frame>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            helpers: helpers.into_iter().map(Into::into).collect(),
            cleanup_root: cleanup_root
                .filter(|f| !f.function.is_empty())
                .map(|f| base_function(&f.function).to_string()),
        }
    }

    fn skips(&self, frame: &Frame) -> bool {
        self.helpers.contains(&frame.function) || is_trampoline(&frame.function)
    }

    fn is_cleanup_root(&self, frame: &Frame) -> bool {
        self.cleanup_root
            .as_deref()
            .is_some_and(|root| base_function(&frame.function) == root)
    }
}

/* ===================== Attribution ===================== */

/// Walk `entry` to find the attributed caller.
///
/// The first frame is the context operation and is kept only as metadata.
/// Helper and trampoline frames are walked past. Reaching the cleanup root
/// switches the walk to `cleanup`, the stack captured when the running
/// cleanup was registered, whose own first frame is the `cleanup` operation.
pub fn caller_info(entry: &[Frame], cleanup: Option<&[Frame]>, skip: &SkipSet) -> CallerInfo {
    let mut frames = entry.iter();
    let Some(op) = frames.next() else {
        return CallerInfo::default();
    };

    let mut info = CallerInfo {
        op: op.function.clone(),
        ..CallerInfo::default()
    };
    let mut pending_cleanup = cleanup;

    while let Some(frame) = frames.next() {
        if skip.is_cleanup_root(frame) {
            if let Some(registration) = pending_cleanup.take() {
                frames = registration.iter();
                // Registration stacks start at the `cleanup` operation itself.
                frames.next();
                continue;
            }
        }

        if skip.skips(frame) {
            continue;
        }

        info.file = frame.file.clone();
        info.line = frame.line;
        info.function = frame.function.clone();
        return info;
    }

    info
}
