// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Fail-fast abort policy.
//!
//! Every [`DualMemError`] reaching this module terminates the process:
//!
//! 1. pending standard output is flushed, so a report printed just before
//!    the failure stays ahead of the diagnostic;
//! 2. one line `"<component> error: <message>"` goes to standard error;
//! 3. the process exits with status 1.
//!
//! There is no unwinding and no recovery path.
//!
//! Before step 1 the error is also emitted as a `tracing` event under
//! [`ABORT_TARGET`]. A subscriber writing to standard error will print it as
//! a second line; filter the target (e.g. `dual_memory::abort=off`) to keep
//! the abort line alone on that stream.

use crate::DualMemError;
use std::io::Write;

/// Component name used on abort lines unless configured otherwise.
pub const DEFAULT_COMPONENT: &str = "DualMemoryManager";

/// `tracing` target of the event emitted just before an abort.
pub const ABORT_TARGET: &str = "dual_memory::abort";

/// Exit status used for every abort.
pub const ABORT_EXIT_CODE: i32 = 1;

/// Formats the diagnostic line written to standard error.
pub fn abort_line(component: &str, error: &DualMemError) -> String {
    format!("{component} error: {error}")
}

/// Terminates the process after reporting `error`.
pub fn fail_fast(component: &str, error: &DualMemError) -> ! {
    tracing::error!(
        target: ABORT_TARGET,
        component,
        kind = error.kind(),
        label = error.label(),
        "{error}"
    );

    // Best effort: a closed stdout must not mask the real failure.
    let _ = std::io::stdout().flush();

    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{}", abort_line(component, error));
    let _ = stderr.flush();

    std::process::exit(ABORT_EXIT_CODE)
}

/// Unwraps `result`, or aborts through [`fail_fast`].
pub fn or_abort<T>(component: &str, result: Result<T, DualMemError>) -> T {
    match result {
        Ok(value) => value,
        Err(error) => fail_fast(component, &error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_line_format() {
        let e = DualMemError::UntrackedRelease { label: "x".into() };
        assert_eq!(
            abort_line(DEFAULT_COMPONENT, &e),
            "DualMemoryManager error: x was not found by memory manager."
        );
    }

    #[test]
    fn test_or_abort_passes_ok_through() {
        assert_eq!(or_abort(DEFAULT_COMPONENT, Ok::<_, DualMemError>(7)), 7);
    }
}
