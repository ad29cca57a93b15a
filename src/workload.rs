//! Instrumented demo workload driven by `easyprof demo`.

use std::fmt;
use std::hint::black_box;

use easyprof_runtime::profile;

/// Format a line and throw it away, so it can be called often without
/// flooding the terminal.
pub fn log_line(args: fmt::Arguments<'_>) {
    profile!();
    black_box(fmt::format(args));
}

pub fn foo() {
    profile!();
    log_line(format_args!("-- foo()"));
}

pub fn bar() {
    profile!();
    for _ in 0..10 {
        foo();
    }
}

/// Recursive, with the base case instrumented too: `factorial(n)` opens
/// `n + 1` scopes.
pub fn factorial(n: u64) -> u64 {
    profile!();
    if n >= 1 { n * factorial(n - 1) } else { 1 }
}

/// One round is three `bar()` calls and one `factorial(13)`.
pub fn run(iterations: usize) {
    for _ in 0..iterations {
        bar();
        bar();
        bar();
        log_line(format_args!("13! == {}", factorial(13)));
    }
}
