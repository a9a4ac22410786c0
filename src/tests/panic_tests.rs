//! Panic recovery tests

use crate::result::Outcome;
use crate::runner::run_test;

#[test]
fn test_panic_is_recovered() {
    let res = run_test(|_| panic!("boom"));

    assert!(res.panicked());
    assert!(res.failed());
    assert!(!res.skipped());
    assert_eq!(res.outcome(), Outcome::Panicked);
    assert_eq!(res.recovered(), Some("boom"));
    assert_eq!(res.logs().messages(), vec!["panic: boom"]);
}

#[test]
fn test_panic_with_formatted_value() {
    let res = run_test(|_| {
        let n = 3;
        panic!("bad value {n}");
    });

    assert_eq!(res.recovered(), Some("bad value 3"));
    assert_eq!(res.logs().messages(), vec!["panic: bad value 3"]);
}

#[test]
fn test_panic_with_non_string_payload() {
    let res = run_test(|_| std::panic::panic_any(42u32));

    assert!(res.panicked());
    assert_eq!(res.logs().messages(), vec!["panic: Box<dyn Any>"]);
}

#[test]
fn test_cleanups_run_after_panic() {
    let res = run_test(|t| {
        t.log("before panic");
        t.cleanup(Box::new(|t| t.log("cleanup after panic")));
        panic!("boom");
    });

    assert!(res.panicked());
    assert_eq!(
        res.logs().messages(),
        vec!["before panic", "panic: boom", "cleanup after panic"]
    );
}

#[test]
fn test_panic_in_cleanup_continues_draining() {
    let res = run_test(|t| {
        t.cleanup(Box::new(|t| t.log("first registered")));
        t.cleanup(Box::new(|_| panic!("cleanup boom")));
        t.log("body");
    });

    assert!(res.panicked());
    assert!(res.failed());
    assert_eq!(
        res.logs().messages(),
        vec!["body", "panic: cleanup boom", "first registered"]
    );
}

#[test]
fn test_first_recovered_value_is_kept() {
    let res = run_test(|t| {
        t.cleanup(Box::new(|_| panic!("second")));
        panic!("first");
    });

    assert_eq!(res.recovered(), Some("first"));
    assert_eq!(res.logs().messages(), vec!["panic: first", "panic: second"]);
}

#[test]
fn test_failed_observes_panic_in_cleanup() {
    let res = run_test(|t| {
        t.cleanup(Box::new(|t| {
            if t.failed() {
                t.log("failed after panic");
            }
        }));
        panic!("boom");
    });

    assert_eq!(
        res.logs().messages(),
        vec!["panic: boom", "failed after panic"]
    );
}
