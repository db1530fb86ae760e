//! The launch sequence, from resolved configuration to process replacement.
//!
//! Step order is fixed and every failure is fatal; what moves is the
//! privilege switch, which runs before file binding under `-p` and after
//! it otherwise, and in either case exactly once.

use std::ffi::{CString, OsString};
use std::os::unix::ffi::OsStrExt;

use nix::unistd::execvp;
use tracing::debug;

use crate::bench::{Outcome, Supervisor};
use crate::config::LaunchConfig;
use crate::error::{LaunchError, Result};
use crate::identity;
use crate::redirect::{self, AlternateStream};

/// Drives the pipeline and ends in exec.
///
/// Returns an exit code only on the paths that do not replace the process:
/// the print-only modes with no child program, and the supervising parent
/// of a timed run. Everything else either execs or fails.
pub fn run(config: LaunchConfig, mut alternate: Option<AlternateStream>) -> Result<i32> {
    if config.command.is_empty() {
        if config.optional_args {
            return Ok(0);
        }
        return Err(LaunchError::MissingProgram);
    }

    if let Some(priority) = config.priority {
        set_priority(priority)?;
        debug!(priority, "adjusted scheduling priority");
    }

    if config.files_under_target {
        identity::switch(config.uid, config.gid)?;
    }
    if let Some(spec) = &config.output {
        redirect::bind_output(spec, config.merged_output())?;
    }
    if let Some(path) = &config.input {
        redirect::bind_input(path)?;
    }
    if !config.files_under_target {
        identity::switch(config.uid, config.gid)?;
    }

    match Supervisor::new(config.timing).run(&mut alternate)? {
        Outcome::Exit(code) => return Ok(code),
        Outcome::Continue => {}
    }

    let argv = build_argv(&config.command)?;
    // the alternate stream must not leak into the replaced image
    drop(alternate);
    let source = match execvp(&argv[0], &argv) {
        Ok(never) => match never {},
        Err(errno) => errno,
    };
    Err(LaunchError::Exec {
        program: config.command[0].to_string_lossy().into_owned(),
        source,
    })
}

/// Absolute niceness for this process and, through inheritance, the child.
fn set_priority(priority: i32) -> Result<()> {
    if unsafe { libc::setpriority(libc::PRIO_PROCESS as _, 0, priority) } != 0 {
        return Err(LaunchError::Priority {
            priority,
            source: std::io::Error::last_os_error(),
        });
    }
    Ok(())
}

/// The child's argument vector, verbatim, as owned C strings. The exec
/// wrapper appends the null sentinel.
fn build_argv(command: &[OsString]) -> Result<Vec<CString>> {
    command
        .iter()
        .map(|arg| {
            CString::new(arg.as_bytes())
                .map_err(|_| LaunchError::BuildArgv(arg.to_string_lossy().into_owned()))
        })
        .collect()
}
