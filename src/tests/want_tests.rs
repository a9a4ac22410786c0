//! Assertion helper tests

use crate::runner::run_test;
use crate::want;

#[test]
fn test_equal() {
    let res = run_test(|t| want::equal(t, "sum", 1 + 1, 2));
    assert!(!res.failed());

    let res = run_test(|t| {
        want::equal(t, "sum", 1 + 2, 2);
        t.log("unreachable");
    });
    assert!(res.failed());
    assert_eq!(
        res.logs().messages(),
        vec!["sum: expected equal\ngot:  3\nwant: 2"]
    );
}

#[test]
fn test_contains() {
    let res = run_test(|t| want::contains(t, "greeting", "hello world", "world"));
    assert!(!res.failed());

    let res = run_test(|t| want::contains(t, "greeting", "hello world", "moon"));
    assert_eq!(
        res.logs().messages(),
        vec!["greeting: expected contains\ngot: hello world\nwant contains: moon"]
    );
}

#[test]
fn test_not_contains() {
    let res = run_test(|t| want::not_contains(t, "greeting", "hello world", "moon"));
    assert!(!res.failed());

    let res = run_test(|t| want::not_contains(t, "greeting", "hello world", "world"));
    assert_eq!(
        res.logs().messages(),
        vec!["greeting: expected not contains\ngot: hello world\nshould not contain: world"]
    );
}

#[test]
fn test_no_err() {
    let res = run_test(|t| {
        let n: i32 = want::no_err(t, "42".parse::<i32>());
        want::equal(t, "parsed", n, 42);
    });
    assert!(!res.failed(), "{}", res.logs());

    let res = run_test(|t| {
        want::no_err(t, "forty-two".parse::<i32>());
    });
    assert!(res.failed());
    assert_eq!(
        res.logs().messages(),
        vec!["expected no error, got: invalid digit found in string"]
    );
}

#[test]
fn test_failures_attributed_to_caller() {
    let res = run_test(|t| {
        want::equal(t, "x", 1, 2);
    });
    let line = line!() - 2;

    let log = res.logs().iter().next().expect("one log line");
    assert_eq!(log.line, Some(line));
    assert!(log.file.as_deref().is_some_and(|f| f.ends_with("want_tests.rs")));
    assert!(res.helpers().iter().any(|h| h.ends_with("want::equal")));
}
