//! Resolved launch configuration, produced by the second parsing pass.

use std::ffi::OsString;
use std::path::PathBuf;

use nix::unistd::{Gid, Uid};

/// Merge request for the two standard output streams.
///
/// Both requests leave stderr's slot holding a duplicate of stdout, so the
/// child writes both streams to one target; they differ in which original
/// stream is preserved for diagnostic and benchmark text (`-1` keeps
/// stdout, `-2` keeps stderr).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRequest {
    /// `-1`: the original stdout survives as the diagnostic stream.
    StderrIntoStdout,
    /// `-2`: the original stderr survives as the diagnostic stream.
    StdoutIntoStderr,
}

/// Benchmark report flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    /// Three `real`/`user`/`sys` lines.
    Posix,
    /// The posix lines plus every resource-usage counter.
    Extended,
}

/// Output file binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSpec {
    pub path: PathBuf,
    /// Append instead of truncating.
    pub append: bool,
}

/// Everything the launch pipeline needs, resolved from the command line.
#[derive(Debug)]
pub struct LaunchConfig {
    /// Target user id, if a user change was requested.
    pub uid: Option<Uid>,
    /// Target group id, if a group change was requested.
    pub gid: Option<Gid>,
    /// Absolute niceness for the child.
    pub priority: Option<i32>,
    /// Output file for the child's stdout (and stderr while merged).
    pub output: Option<OutputSpec>,
    /// Input file for the child's stdin.
    pub input: Option<PathBuf>,
    /// Stream merge in effect, after last-one-wins resolution.
    pub merge: Option<MergeRequest>,
    /// Benchmark mode, if any.
    pub timing: Option<ReportMode>,
    /// Open redirection files after switching identity, not before.
    pub files_under_target: bool,
    /// A print-only identity option ran; the child program may be absent.
    pub optional_args: bool,
    /// Child program and its arguments, verbatim.
    pub command: Vec<OsString>,
}

impl LaunchConfig {
    /// True when a merge request or a timing flag makes the child's two
    /// output streams share one target; output-file binding then covers
    /// both slots.
    pub fn merged_output(&self) -> bool {
        self.merge.is_some() || self.timing.is_some()
    }
}
