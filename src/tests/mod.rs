mod helpers;

mod env_tests;
mod panic_tests;
mod want_tests;
