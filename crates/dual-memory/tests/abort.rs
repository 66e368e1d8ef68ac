// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Abort-path tests.
//!
//! The aborting API terminates the process, so each case re-runs this test
//! binary filtered to [`abort_child`] with the case name in the
//! environment, then inspects the child's exit status and output.

use dual_memory::{abort, DualMemoryManager, SimulatedAccelerator};
use std::process::{Command, Output};

const CASE_VAR: &str = "DUAL_MEMORY_ABORT_CASE";

fn run_case(case: &str) -> Output {
    Command::new(std::env::current_exe().unwrap())
        .args(["--exact", "abort_child", "--nocapture", "--test-threads=1"])
        .env(CASE_VAR, case)
        .output()
        .unwrap()
}

fn assert_aborted(output: &Output, line: &str) {
    assert_eq!(output.status.code(), Some(1), "child status: {:?}", output.status);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.lines().any(|l| l == line),
        "missing abort line {line:?} in stderr:\n{stderr}"
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("unreachable"), "child kept running:\n{stdout}");
}

/// Child entry point; does nothing unless spawned by `run_case`.
#[test]
fn abort_child() {
    let Ok(case) = std::env::var(CASE_VAR) else {
        return;
    };

    match case.as_str() {
        "configuration" => {
            let mut m = DualMemoryManager::new();
            let _a = m.allocate::<i32>("a", 10, true);
        }
        "duplicate" => {
            let mut m = DualMemoryManager::new();
            let _a = m.allocate::<i32>("a", 5, false);
            let _b = m.allocate::<i32>("a", 5, false);
        }
        "untracked" => {
            let mut owner = DualMemoryManager::new();
            let mut other = DualMemoryManager::new();
            let mut a = owner.allocate::<i32>("a", 1, false);
            other.free(&mut a);
        }
        "double_free" => {
            let mut m = DualMemoryManager::new();
            let mut a = m.allocate::<i32>("a", 1, false);
            m.free(&mut a);
            m.free(&mut a);
        }
        "missing_mirror" => {
            let mut m = DualMemoryManager::with_accelerator(Box::new(SimulatedAccelerator::new()));
            let a = m.allocate::<i32>("a", 4, false);
            m.copy_host_to_device(&a, 0, 4);
        }
        "report_then_abort" => {
            let mut m = DualMemoryManager::new().with_component_name("Solver");
            let _a = m.allocate::<u8>("buf", 16, false);
            m.report_memory_usage();
            let _b = m.allocate::<u8>("buf", 16, false);
        }
        "filtered_event" => {
            let filter = format!("info,{}=off", abort::ABORT_TARGET);
            tracing_subscriber::fmt()
                .with_env_filter(filter.as_str())
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .init();
            let mut m = DualMemoryManager::new();
            let _a = m.allocate::<i32>("a", 5, false);
            let _b = m.allocate::<i32>("a", 5, false);
        }
        "unfiltered_event" => {
            tracing_subscriber::fmt()
                .with_env_filter("error")
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .init();
            let mut m = DualMemoryManager::new();
            let _a = m.allocate::<i32>("a", 5, false);
            let _b = m.allocate::<i32>("a", 5, false);
        }
        other => panic!("unknown abort case {other}"),
    }

    println!("unreachable");
}

#[test]
fn test_configuration_error_aborts() {
    let out = run_case("configuration");
    assert_aborted(
        &out,
        "DualMemoryManager error: a was requested to be allocated on device as well, but accelerator support is not enabled.",
    );
}

#[test]
fn test_duplicate_label_aborts() {
    let out = run_case("duplicate");
    assert_aborted(&out, "DualMemoryManager error: a already exists. Please choose another label.");
}

#[test]
fn test_untracked_release_aborts() {
    let out = run_case("untracked");
    assert_aborted(&out, "DualMemoryManager error: a was not found by memory manager.");
}

#[test]
fn test_double_free_aborts_as_dangling() {
    let out = run_case("double_free");
    assert_aborted(&out, "DualMemoryManager error: a's host pointer is a null pointer.");
}

#[test]
fn test_copy_without_mirror_aborts() {
    let out = run_case("missing_mirror");
    assert_aborted(&out, "DualMemoryManager error: a's device pointer is a null pointer.");
}

#[test]
fn test_report_is_flushed_before_abort_line() {
    let out = run_case("report_then_abort");
    assert_aborted(&out, "Solver error: buf already exists. Please choose another label.");

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Solver Report:"), "report missing:\n{stdout}");
    assert!(stdout.contains("Total host memory used: 16 bytes"));
}

fn count_lines_containing(output: &Output, needle: &str) -> usize {
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .filter(|l| l.contains(needle))
        .count()
}

#[test]
fn test_filtering_abort_target_leaves_single_error_line() {
    let out = run_case("filtered_event");
    assert_aborted(&out, "DualMemoryManager error: a already exists. Please choose another label.");
    assert_eq!(count_lines_containing(&out, "already exists"), 1);
}

#[test]
fn test_abort_event_is_emitted_under_its_target() {
    let out = run_case("unfiltered_event");
    assert_aborted(&out, "DualMemoryManager error: a already exists. Please choose another label.");
    assert_eq!(count_lines_containing(&out, "already exists"), 2);
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains(abort::ABORT_TARGET), "event target missing:\n{stderr}");
}
