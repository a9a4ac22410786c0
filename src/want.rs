//! Assertion helpers written against [`Tb`].
//!
//! Each helper marks itself with `helper()`, so a failure is attributed to
//! the line that called it.

use std::fmt::{Debug, Display};

use crate::tb::Tb;

/// Assert that `got == want`.
pub fn equal<T>(t: &dyn Tb, msg: &str, got: T, want: T)
where
    T: PartialEq + Debug,
{
    t.helper();

    if got == want {
        return;
    }

    t.fatalf(format_args!(
        "{msg}: expected equal\ngot:  {got:?}\nwant: {want:?}"
    ));
}

/// Assert that `got` contains `contains`.
pub fn contains(t: &dyn Tb, msg: &str, got: &str, contains: &str) {
    t.helper();

    if got.contains(contains) {
        return;
    }

    t.fatalf(format_args!(
        "{msg}: expected contains\ngot: {got}\nwant contains: {contains}"
    ));
}

pub fn not_contains(t: &dyn Tb, msg: &str, got: &str, not_contains: &str) {
    t.helper();

    if !got.contains(not_contains) {
        return;
    }

    t.fatalf(format_args!(
        "{msg}: expected not contains\ngot: {got}\nshould not contain: {not_contains}"
    ));
}

/// Assert that `result` is `Ok`, returning the value.
pub fn no_err<T, E>(t: &dyn Tb, result: Result<T, E>) -> T
where
    E: Display,
{
    t.helper();

    match result {
        Ok(value) => value,
        Err(err) => t.fatalf(format_args!("expected no error, got: {err}")),
    }
}
