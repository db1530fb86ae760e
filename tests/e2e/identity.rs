//! Identity resolution, the print-only modes and the privilege switch.

use tempfile::TempDir;

use super::helpers::{run, running_as_root, stderr_of, stdout_of, vrunas};

#[test]
fn print_user_needs_no_program() {
    let output = run(["-U", "root"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_of(&output), "0\n");
    assert!(
        !stderr_of(&output).contains("Usage"),
        "no usage message on the optional-args path"
    );
}

#[test]
fn print_group_needs_no_program() {
    let output = run(["-G", "0"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_of(&output), "0\n");
}

#[test]
fn numeric_ids_print_back_without_lookup() {
    // no user database entry required
    let output = run(["-U", "54321"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_of(&output), "54321\n");
}

#[test]
fn a_printed_uid_feeds_back_as_the_same_identity() {
    let by_name = run(["-U", "root"]);
    let id = stdout_of(&by_name);
    let by_id = run(["-U", id.trim()]);
    assert_eq!(stdout_of(&by_id), id);
}

#[test]
fn a_set_option_alone_still_requires_a_program() {
    // -u resolves but does not make the program optional
    let output = run(["-u", "0"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_of(&output).contains("missing program"));
}

#[test]
fn print_mode_runs_alongside_a_program() {
    let output = run(["-U", "root", "sh", "-c", "echo child"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_of(&output), "0\nchild\n");
}

#[test]
fn switching_uid_without_privilege_exits_2() {
    if running_as_root() {
        return;
    }
    let output = run(["-u", "0", "true"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn the_group_changes_before_the_user() {
    if running_as_root() {
        // after setuid(1) the process could no longer change its gid, so
        // a successful run proves the group changed first
        let output = run(["-u", "1", "-g", "1", "sh", "-c", "id -g"]);
        assert_eq!(output.status.code(), Some(0));
        assert_eq!(stdout_of(&output), "1\n");
    } else {
        // both changes are denied; the failure that surfaces is the one
        // attempted first
        let output = run(["-u", "0", "-g", "0", "true"]);
        assert_eq!(output.status.code(), Some(2));
        assert!(stderr_of(&output).contains("gid"));
    }
}

#[test]
fn with_p_the_switch_precedes_file_creation() {
    if running_as_root() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.txt");
    let output = vrunas()
        .args(["-p", "-u", "0", "-o"])
        .arg(&path)
        .arg("true")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(!path.exists(), "the output file must not open after a failed switch");
}

#[test]
fn without_p_files_open_under_the_invoking_identity() {
    if running_as_root() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.txt");
    let output = vrunas()
        .args(["-u", "0", "-o"])
        .arg(&path)
        .arg("true")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(path.exists(), "the output file opens before the switch runs");
}

#[test]
fn the_child_runs_under_the_target_uid() {
    if !running_as_root() {
        return;
    }
    let output = run(["-u", "1", "sh", "-c", "id -u"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_of(&output), "1\n");
}

#[test]
fn the_child_runs_under_the_target_gid() {
    if !running_as_root() {
        return;
    }
    let output = run(["-g", "1", "sh", "-c", "id -g"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_of(&output), "1\n");
}
