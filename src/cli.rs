//! Command-line surface: the silent first pass and the full second pass.
//!
//! The first pass ([`scan`]) reads only the flags that decide stream
//! redirection and must not print, resolve names, or fail, because the
//! streams it decides about are still about to move. The redirection
//! engine runs on its result; only then does the full parse
//! ([`Cli`] + [`interpret`]) run, free to print on the final streams.

use std::ffi::OsString;
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use clap::Parser;
use tracing::warn;

use crate::config::{LaunchConfig, MergeRequest, OutputSpec, ReportMode};
use crate::error::Result;
use crate::identity;

/// Short options that consume a value, inline (`-uroot`) or as the next
/// token. The scan must know them to keep its tokenization aligned with
/// the real parser.
const VALUE_OPTS: &[u8] = b"ugUGoOiN";

/// Redirect/timing facts extracted by the silent first pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Active merge request, after last-one-wins resolution.
    pub merge: Option<MergeRequest>,
    /// Both merge flags appeared; pass two reports the warning.
    pub conflict: bool,
    /// At least one timing flag appeared.
    pub timing: bool,
}

/// First pass over the raw arguments.
///
/// Looks only at `-1`, `-2`, `-t` and `-T`, also inside short-flag
/// bundles, and stops at `--`, at the first token that starts the child
/// command line, or at a flag it does not recognize (the real parser owns
/// those). Values of value-taking options are skipped, never read as
/// flags.
pub fn scan<I>(args: I) -> ScanOutcome
where
    I: IntoIterator<Item = OsString>,
{
    let mut outcome = ScanOutcome::default();
    let mut saw_stderr_merge = false;
    let mut saw_stdout_merge = false;

    let mut args = args.into_iter();
    'tokens: while let Some(arg) = args.next() {
        let bytes = arg.as_bytes();
        if bytes == b"--" || !bytes.starts_with(b"-") || bytes.len() == 1 {
            break;
        }
        if bytes.starts_with(b"--") {
            // help and version are the only long options; any other long
            // token belongs to the real parser, and what follows it is
            // not this program's options
            if bytes == b"--help" || bytes == b"--version" {
                continue;
            }
            break;
        }
        let mut shorts = bytes[1..].iter();
        while let Some(&short) = shorts.next() {
            match short {
                b'1' => {
                    saw_stderr_merge = true;
                    outcome.merge = Some(MergeRequest::StderrIntoStdout);
                }
                b'2' => {
                    saw_stdout_merge = true;
                    outcome.merge = Some(MergeRequest::StdoutIntoStderr);
                }
                b't' | b'T' => outcome.timing = true,
                b'p' | b'h' | b'V' => {}
                short if VALUE_OPTS.contains(&short) => {
                    // the rest of the token is the value; otherwise the
                    // next token is
                    if shorts.as_slice().is_empty() {
                        args.next();
                    }
                    break;
                }
                _ => break 'tokens,
            }
        }
    }
    outcome.conflict = saw_stderr_merge && saw_stdout_merge;
    outcome
}

/// Run a program under a chosen user/group, with optional stream
/// redirection, priority adjustment and a timed, resource-measured run.
#[derive(Parser, Debug)]
#[command(name = "vrunas", version)]
#[command(about = "Run a program under a chosen uid/gid, with redirection and timing")]
pub struct Cli {
    /// Run the program with this user (name or numeric id)
    #[arg(short = 'u', value_name = "USER")]
    pub user: Option<String>,

    /// Run the program with this group (name or numeric id)
    #[arg(short = 'g', value_name = "GROUP")]
    pub group: Option<String>,

    /// Print the uid of USER; the program becomes optional
    #[arg(short = 'U', value_name = "USER")]
    pub print_user: Option<String>,

    /// Print the gid of GROUP; the program becomes optional
    #[arg(short = 'G', value_name = "GROUP")]
    pub print_group: Option<String>,

    /// Send the program's stderr to its stdout
    #[arg(short = '1')]
    pub stderr_to_stdout: bool,

    /// Send the program's stdout to its stderr
    #[arg(short = '2')]
    pub stdout_to_stderr: bool,

    /// Print timing of the program after it finishes (real/user/sys)
    #[arg(short = 't')]
    pub time_posix: bool,

    /// Print timing plus all resource-usage counters
    #[arg(short = 'T')]
    pub time_extended: bool,

    /// Write the program's output to FILE, truncating it
    #[arg(short = 'o', value_name = "FILE", conflicts_with = "append_output")]
    pub output: Option<PathBuf>,

    /// Write the program's output to FILE, appending
    #[arg(short = 'O', value_name = "FILE")]
    pub append_output: Option<PathBuf>,

    /// Read the program's stdin from FILE
    #[arg(short = 'i', value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Open redirection files under the target identity instead of the
    /// invoking one
    #[arg(short = 'p')]
    pub files_under_target: bool,

    /// Adjust the program's scheduling priority to this niceness
    #[arg(short = 'N', value_name = "PRIORITY", allow_hyphen_values = true)]
    pub priority: Option<i32>,

    /// Program to run, followed by its arguments, passed through verbatim
    ///
    /// An unrecognized option must stay a usage error, so the program name
    /// itself may not start with a hyphen; spell such a name after `--`.
    /// Once the name is seen, the trailing arguments are captured raw.
    #[arg(value_name = "PROGRAM", trailing_var_arg = true)]
    pub command: Vec<OsString>,
}

/// Writes one resolved id, flushed past the stdout buffer so it reaches
/// the descriptor before a later exec replaces this process.
fn write_id<W: Write>(mut out: W, id: u32) -> std::io::Result<()> {
    writeln!(out, "{id}")?;
    out.flush()
}

/// Second pass: full interpretation with reporting enabled.
///
/// Resolves identities, runs the print-only modes, reports the warning
/// for conflicting merge flags, and assembles the configuration. The
/// merge decision itself comes from the scan, which saw the flag order.
pub fn interpret(cli: Cli, scan: &ScanOutcome) -> Result<LaunchConfig> {
    if scan.conflict {
        let kept = match scan.merge {
            Some(MergeRequest::StdoutIntoStderr) => "-2",
            _ => "-1",
        };
        warn!("both -1 and -2 requested, keeping {kept}");
    }

    let uid = cli.user.as_deref().map(identity::resolve_user).transpose()?;
    let gid = cli.group.as_deref().map(identity::resolve_group).transpose()?;

    let mut optional_args = false;
    if let Some(name) = cli.print_user.as_deref() {
        let id = identity::resolve_user(name)?.as_raw();
        if let Err(err) = write_id(std::io::stdout().lock(), id) {
            warn!("printing uid of `{name}` failed: {err}");
        }
        optional_args = true;
    }
    if let Some(name) = cli.print_group.as_deref() {
        let id = identity::resolve_group(name)?.as_raw();
        if let Err(err) = write_id(std::io::stdout().lock(), id) {
            warn!("printing gid of `{name}` failed: {err}");
        }
        optional_args = true;
    }

    let timing = if cli.time_extended {
        Some(ReportMode::Extended)
    } else if cli.time_posix {
        Some(ReportMode::Posix)
    } else {
        None
    };

    let output = cli
        .output
        .map(|path| OutputSpec {
            path,
            append: false,
        })
        .or(cli.append_output.map(|path| OutputSpec {
            path,
            append: true,
        }));

    Ok(LaunchConfig {
        uid,
        gid,
        priority: cli.priority,
        output,
        input: cli.input,
        merge: scan.merge,
        timing,
        files_under_target: cli.files_under_target,
        optional_args,
        command: cli.command,
    })
}
