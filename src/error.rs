//! Launch failure taxonomy.
//!
//! Every failure in the launch pipeline is one [`LaunchError`] variant; the
//! flat integer codes the tool reports to the OS are produced only at the
//! process boundary, via [`LaunchError::exit_code`].

use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

/// Exit code for option syntax errors reported by the argument parser.
pub const USAGE: i32 = 10;

/// Result alias for the launch pipeline.
pub type Result<T> = std::result::Result<T, LaunchError>;

/// Failures of the launch pipeline, ordered by exit code.
#[derive(Error, Debug)]
pub enum LaunchError {
    /// No child program was given and the invocation requires one.
    #[error("missing program")]
    MissingProgram,

    /// setgid failed.
    #[error("setting gid to {gid} failed: {source}")]
    SetGid { gid: u32, source: Errno },

    /// setuid failed.
    #[error("setting uid to {uid} failed: {source}")]
    SetUid { uid: u32, source: Errno },

    /// A child argument cannot become a C string.
    #[error("argument `{0}` contains a nul byte")]
    BuildArgv(String),

    /// execvp failed; the child program never started.
    #[error("running `{program}` failed: {source}")]
    Exec { program: String, source: Errno },

    /// Duplicating the standard streams failed.
    #[error("redirecting standard streams failed: {0}")]
    Redirect(io::Error),

    /// Opening or binding the output file failed.
    #[error("opening output `{}` failed: {source}", path.display())]
    OutputFile { path: PathBuf, source: io::Error },

    /// fork for the benchmarked run failed.
    #[error("starting benchmark process failed: {0}")]
    Fork(Errno),

    /// Opening or binding the input file failed.
    #[error("opening input `{}` failed: {source}", path.display())]
    InputFile { path: PathBuf, source: io::Error },

    /// setpriority failed.
    #[error("setting priority to {priority} failed: {source}")]
    Priority { priority: i32, source: io::Error },

    /// A group name did not resolve to a gid.
    #[error("unknown group `{0}`")]
    UnknownGroup(String),

    /// A user name did not resolve to a uid.
    #[error("unknown user `{0}`")]
    UnknownUser(String),
}

impl LaunchError {
    /// Maps the failure to the process exit code reported to the OS.
    ///
    /// The layout is fixed: 1 through 9 for pipeline failures in pipeline
    /// order, 10 and up for option errors. 10 itself ([`USAGE`]) belongs
    /// to the argument parser; 11 and 13 are the name-resolution slots,
    /// with the gaps left by the missing-value cases the parser now
    /// reports under 10.
    pub fn exit_code(&self) -> i32 {
        match self {
            LaunchError::MissingProgram => 1,
            LaunchError::SetGid { .. } | LaunchError::SetUid { .. } => 2,
            LaunchError::BuildArgv(_) => 3,
            LaunchError::Exec { .. } => 4,
            LaunchError::Redirect(_) => 5,
            LaunchError::OutputFile { .. } => 6,
            LaunchError::Fork(_) => 7,
            LaunchError::InputFile { .. } => 8,
            LaunchError::Priority { .. } => 9,
            LaunchError::UnknownGroup(_) => 11,
            LaunchError::UnknownUser(_) => 13,
        }
    }
}
