//! The flat exit-code taxonomy, observed from outside.

use super::helpers::{run, stderr_of, stdout_of};

#[test]
fn the_child_exit_status_passes_through() {
    let output = run(["sh", "-c", "exit 42"]);
    assert_eq!(output.status.code(), Some(42));
}

#[test]
fn a_successful_child_means_success() {
    let output = run(["true"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout_of(&output).is_empty());
}

#[test]
fn missing_program_prints_usage_and_exits_1() {
    let output = run::<[&str; 0], &str>([]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = stderr_of(&output);
    assert!(stderr.contains("missing program"), "stderr: {stderr}");
    assert!(stderr.contains("Usage"), "stderr: {stderr}");
}

#[test]
fn an_unrunnable_program_exits_4() {
    let output = run(["./zz-no-such-program"]);
    assert_eq!(output.status.code(), Some(4));
    assert!(stderr_of(&output).contains("zz-no-such-program"));
}

#[test]
fn an_unknown_group_exits_11() {
    let output = run(["-g", "zz-no-such-group", "true"]);
    assert_eq!(output.status.code(), Some(11));
    assert!(stderr_of(&output).contains("zz-no-such-group"));
}

#[test]
fn an_unknown_user_exits_13() {
    let output = run(["-u", "zz-no-such-user", "true"]);
    assert_eq!(output.status.code(), Some(13));
    assert!(stderr_of(&output).contains("zz-no-such-user"));
}

#[test]
fn an_unknown_option_is_a_usage_error() {
    let output = run(["-x"]);
    assert_eq!(output.status.code(), Some(10));
}

#[test]
fn an_unknown_long_option_is_a_usage_error_on_stderr() {
    // the scan stops at the unknown token, so the `-1` after it must not
    // merge the streams and the diagnostic must stay off stdout
    let output = run(["--foo", "-1", "prog"]);
    assert_eq!(output.status.code(), Some(10));
    assert!(stdout_of(&output).is_empty());
    assert!(!stderr_of(&output).is_empty());
}

#[test]
fn a_missing_option_value_is_a_usage_error() {
    let output = run(["-u"]);
    assert_eq!(output.status.code(), Some(10));
}

#[test]
fn a_bad_priority_value_is_a_usage_error() {
    let output = run(["-N", "high", "true"]);
    assert_eq!(output.status.code(), Some(10));
}

#[test]
fn help_and_version_are_clean_exits() {
    let help = run(["-h"]);
    assert_eq!(help.status.code(), Some(0));
    assert!(stdout_of(&help).contains("Usage"));

    let version = run(["-V"]);
    assert_eq!(version.status.code(), Some(0));
    assert!(stdout_of(&version).contains("vrunas"));
}

#[test]
fn lowering_priority_is_allowed_for_everyone() {
    let output = run(["-N", "10", "sh", "-c", "exit 0"]);
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn the_options_terminator_protects_hyphen_programs() {
    // everything after -- is the child's command line
    let output = run(["--", "sh", "-c", "exit 3"]);
    assert_eq!(output.status.code(), Some(3));
}
