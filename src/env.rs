//! Process-level collaborators
//!
//! The environment and the working directory are shared by every thread in
//! the process. Changes go through one process-wide lock and are undone by a
//! cleanup registered on the run that made them.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::Error;
use crate::tb::Tb;

static PROCESS_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Turn a test name into something usable as a directory prefix.
fn dir_prefix(name: &str) -> String {
    let mut prefix: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(64)
        .collect();
    prefix.push('-');
    prefix
}

pub(crate) fn setenv(t: &dyn Tb, key: &str, value: &str) {
    t.helper();

    let prior = {
        let _guard = PROCESS_LOCK.lock();
        let prior = std::env::var_os(key);
        std::env::set_var(key, value);
        prior
    };
    tracing::debug!(key, restore = prior.is_some(), "environment variable set");

    let key = key.to_string();
    t.cleanup(Box::new(move |_| restore_var(&key, prior)));
}

fn restore_var(key: &str, prior: Option<OsString>) {
    let _guard = PROCESS_LOCK.lock();
    match prior {
        Some(value) => std::env::set_var(key, value),
        None => std::env::remove_var(key),
    }
}

pub(crate) fn temp_dir(t: &dyn Tb, name: &str, root: Option<&Path>) -> PathBuf {
    t.helper();

    let prefix = dir_prefix(name);
    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix);
    let created = match root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
    };
    let dir = match created {
        Ok(dir) => dir,
        Err(e) => t.fatalf(format_args!("TempDir: {}", Error::TempDir(e))),
    };

    let path = dir.path().to_path_buf();
    tracing::debug!(path = %path.display(), "temp dir created");

    t.cleanup(Box::new(move |t| {
        t.helper();
        if let Err(err) = dir.close() {
            t.errorf(format_args!("TempDir RemoveAll cleanup: {err}"));
        }
    }));
    path
}

pub(crate) fn chdir(t: &dyn Tb, dir: &Path) {
    t.helper();

    let changed = {
        let _guard = PROCESS_LOCK.lock();
        std::env::current_dir().and_then(|prior| {
            std::env::set_current_dir(dir)?;
            Ok(prior)
        })
    };
    let prior = match changed {
        Ok(prior) => prior,
        Err(source) => t.fatalf(format_args!(
            "Chdir: {}",
            Error::Chdir {
                path: dir.to_path_buf(),
                source,
            }
        )),
    };
    tracing::debug!(dir = %dir.display(), "working directory changed");

    t.cleanup(Box::new(move |t| {
        t.helper();
        let _guard = PROCESS_LOCK.lock();
        if let Err(err) = std::env::set_current_dir(&prior) {
            t.errorf(format_args!("Chdir: restore {}: {err}", prior.display()));
        }
    }));
}
