//! Test helpers shared by the run-level tests

use std::path::Path;

use tracing_subscriber::EnvFilter;

use crate::result::{LogLine, TestResult};

/// Route tracing output through the test harness so it is shown only for failing tests.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Basename of the attributed caller file, or "" if unresolved.
pub fn caller_file(line: &LogLine) -> &str {
    line.file
        .as_deref()
        .map(Path::new)
        .and_then(Path::file_name)
        .and_then(|name| name.to_str())
        .unwrap_or("")
}

/// Resolved log lines as `(file basename, line, message)`.
pub fn located(res: &TestResult) -> Vec<(String, u32, String)> {
    res.logs()
        .iter()
        .map(|l| {
            (
                caller_file(l).to_string(),
                l.line.unwrap_or(0),
                l.message.clone(),
            )
        })
        .collect()
}
