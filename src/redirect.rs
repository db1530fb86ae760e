//! Standard stream rearrangement.
//!
//! Runs before anything is printed: the merge decision mutates the
//! process's own descriptor table, preserving one original stream for
//! diagnostic and benchmark text, and the optional input/output files are
//! bound over the standard slots.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::path::Path;

use crate::cli::ScanOutcome;
use crate::config::{MergeRequest, OutputSpec};
use crate::error::LaunchError;

/// The preserved copy of whichever standard stream the merge did not claim.
///
/// Benchmark and diagnostic text goes here, never onto the child's own
/// streams. Dropping it closes the duplicated descriptor.
#[derive(Debug)]
pub struct AlternateStream {
    file: File,
}

impl AlternateStream {
    pub(crate) fn new(file: File) -> Self {
        Self { file }
    }
}

impl Write for AlternateStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Which stream the merge decision preserves, if any redirection applies.
///
/// A timing flag without an explicit merge behaves like `-1`: timing output
/// needs a stream of its own, and the preserved stdout becomes that stream.
fn preserved_stream(scan: &ScanOutcome) -> Option<RawFd> {
    match scan.merge {
        Some(MergeRequest::StdoutIntoStderr) => Some(libc::STDERR_FILENO),
        Some(MergeRequest::StderrIntoStdout) => Some(libc::STDOUT_FILENO),
        None if scan.timing => Some(libc::STDOUT_FILENO),
        None => None,
    }
}

/// Applies the merge decision from the silent scan.
///
/// Must run exactly once, before any diagnostic output and before the full
/// option parse, so no message can land on a stream mid-swap. Both merge
/// directions end with stderr's slot holding a duplicate of stdout; the
/// preserved original is handed back as the alternate stream.
pub fn establish(scan: &ScanOutcome) -> Result<Option<AlternateStream>, LaunchError> {
    let preserved = match preserved_stream(scan) {
        Some(fd) => fd,
        None => return Ok(None),
    };

    let duplicate = unsafe { libc::dup(preserved) };
    if duplicate < 0 {
        return Err(LaunchError::Redirect(io::Error::last_os_error()));
    }
    let alternate = AlternateStream::new(unsafe { File::from_raw_fd(duplicate) });

    if unsafe { libc::dup2(libc::STDOUT_FILENO, libc::STDERR_FILENO) } < 0 {
        return Err(LaunchError::Redirect(io::Error::last_os_error()));
    }
    Ok(Some(alternate))
}

/// Binds the output file over stdout, and over stderr too while the
/// streams are merged. The file descriptor itself is released once the
/// slots hold the target.
pub fn bind_output(spec: &OutputSpec, merged: bool) -> Result<(), LaunchError> {
    let mut options = OpenOptions::new();
    options.write(true).create(true);
    if spec.append {
        options.append(true);
    } else {
        options.truncate(true);
    }
    let file = options.open(&spec.path).map_err(|source| LaunchError::OutputFile {
        path: spec.path.clone(),
        source,
    })?;

    dup_over(file.as_raw_fd(), libc::STDOUT_FILENO).map_err(|source| {
        LaunchError::OutputFile {
            path: spec.path.clone(),
            source,
        }
    })?;
    if merged {
        dup_over(file.as_raw_fd(), libc::STDERR_FILENO).map_err(|source| {
            LaunchError::OutputFile {
                path: spec.path.clone(),
                source,
            }
        })?;
    }
    Ok(())
}

/// Binds the input file over stdin.
pub fn bind_input(path: &Path) -> Result<(), LaunchError> {
    let file = File::open(path).map_err(|source| LaunchError::InputFile {
        path: path.to_path_buf(),
        source,
    })?;
    dup_over(file.as_raw_fd(), libc::STDIN_FILENO).map_err(|source| LaunchError::InputFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn dup_over(fd: RawFd, slot: RawFd) -> io::Result<()> {
    if unsafe { libc::dup2(fd, slot) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
