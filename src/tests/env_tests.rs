//! Environment, temp dir and working directory collaborators

use std::path::{Path, PathBuf};

use serial_test::serial;

use crate::runner::{run_test, RunBuilder};
use crate::want;

const VAR: &str = "FAKE_TB_ENV_TESTS_VAR";

/* ===================== Setenv ===================== */

#[test]
#[serial]
fn test_setenv_restores_prior_value() {
    std::env::set_var(VAR, "before");

    let res = run_test(|t| {
        t.setenv(VAR, "during");
        want::equal(t, "during run", std::env::var(VAR).ok(), Some("during".to_string()));
    });

    assert!(!res.failed(), "{}", res.logs());
    assert_eq!(std::env::var(VAR).ok(), Some("before".to_string()));
    std::env::remove_var(VAR);
}

#[test]
#[serial]
fn test_setenv_removes_unset_variable() {
    std::env::remove_var(VAR);

    let res = run_test(|t| {
        t.setenv(VAR, "one");
        t.setenv(VAR, "two");
        want::equal(t, "during run", std::env::var(VAR).ok(), Some("two".to_string()));
    });

    assert!(!res.failed(), "{}", res.logs());
    assert_eq!(std::env::var_os(VAR), None);
}

#[test]
#[serial]
fn test_setenv_restored_after_fatal() {
    std::env::remove_var(VAR);

    let res = run_test(|t| {
        t.setenv(VAR, "set");
        t.fatal("abort");
    });

    assert!(res.failed());
    assert_eq!(std::env::var_os(VAR), None);
}

/* ===================== TempDir ===================== */

#[test]
fn test_temp_dir_removed_after_run() {
    let mut dirs: Vec<PathBuf> = Vec::new();
    let res = run_test(|t| {
        let a = t.temp_dir();
        let b = t.temp_dir();
        want::equal(t, "a exists", a.is_dir(), true);
        want::equal(t, "distinct", a == b, false);
        if let Err(err) = std::fs::write(a.join("file.txt"), "contents") {
            t.fatalf(format_args!("write: {err}"));
        }
        dirs.push(a);
        dirs.push(b);
    });

    assert!(!res.failed(), "{}", res.logs());
    assert_eq!(dirs.len(), 2);
    for dir in &dirs {
        assert!(!dir.exists(), "{} still exists", dir.display());
    }
}

#[test]
fn test_temp_dir_under_configured_root() {
    let root = tempfile::tempdir().unwrap();

    let mut created = None;
    let res = RunBuilder::new()
        .name("TestTempRoot/sub")
        .temp_root(root.path())
        .run(|t| created = Some(t.temp_dir()));

    assert!(!res.failed(), "{}", res.logs());
    let created = created.unwrap();
    assert_eq!(created.parent(), Some(root.path()));
    let dir_name = created.file_name().unwrap().to_string_lossy().into_owned();
    assert!(dir_name.starts_with("TestTempRoot_sub-"), "dir = {dir_name}");
    assert!(!created.exists());
}

#[test]
fn test_temp_dir_failure_is_fatal() {
    let root = tempfile::tempdir().unwrap();
    let missing = root.path().join("missing");

    let res = RunBuilder::new().temp_root(&missing).run(|t| {
        t.temp_dir();
        t.log("unreachable");
    });

    assert!(res.failed());
    let messages = res.logs().messages();
    assert_eq!(messages.len(), 1, "logs:\n{}", res.logs());
    assert!(messages[0].starts_with("TempDir: "), "got {:?}", messages[0]);
}

/* ===================== Chdir ===================== */

#[test]
#[serial]
fn test_chdir_restores_working_directory() {
    let before = std::env::current_dir().unwrap();
    let target = tempfile::tempdir().unwrap();
    let target_path = target.path().canonicalize().unwrap();

    let res = run_test(|t| {
        t.chdir(&target_path);
        let now = std::env::current_dir().ok().and_then(|d| d.canonicalize().ok());
        want::equal(t, "cwd", now.as_deref(), Some(target_path.as_path()));
    });

    assert!(!res.failed(), "{}", res.logs());
    assert_eq!(std::env::current_dir().unwrap(), before);
}

#[test]
#[serial]
fn test_chdir_missing_directory_is_fatal() {
    let before = std::env::current_dir().unwrap();

    let res = run_test(|t| {
        t.chdir(Path::new("./does/not/exist"));
        t.log("unreachable");
    });

    assert!(res.failed());
    let messages = res.logs().messages();
    assert_eq!(messages.len(), 1, "logs:\n{}", res.logs());
    assert!(
        messages[0].starts_with("Chdir: failed to change working directory to"),
        "got {:?}",
        messages[0]
    );
    assert!(messages[0].contains("does/not/exist"));
    assert_eq!(std::env::current_dir().unwrap(), before);
}

/* ===================== Context ===================== */

#[test]
fn test_context_cancelled_before_cleanups() {
    let res = run_test(|t| {
        let token = t.context();
        if token.is_cancelled() {
            t.error("cancelled during body");
        }
        t.cleanup(Box::new(move |t| {
            if !token.is_cancelled() {
                t.error("not cancelled in cleanup");
            }
        }));
    });

    assert!(!res.failed(), "{}", res.logs());
}
