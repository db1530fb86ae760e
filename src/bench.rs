//! Benchmark supervision: the optional fork wrapping the child's lifetime.
//!
//! When timing is requested the rest of the launch runs in a forked child,
//! so the measurement covers everything from here through the exec'd
//! program's exit. The parent waits, forwards termination signals to the
//! child, reads the resource accounting and writes the report to the
//! alternate stream, then hands its derived exit status back up the stack
//! so destructors still run before the process exits.

use std::io::Write;
use std::thread;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::time::TimeSpec;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::time::{clock_gettime, ClockId};
use nix::unistd::{fork, ForkResult, Pid};
use signal_hook::consts::{SIGHUP, SIGINT, SIGPIPE, SIGQUIT, SIGTERM, SIGUSR1, SIGUSR2};
use signal_hook::iterator::Signals;
use tracing::{debug, warn};

use crate::config::ReportMode;
use crate::error::{LaunchError, Result};
use crate::redirect::AlternateStream;

/// Termination-class signals the waiting parent passes through to the
/// child, so an interactive interrupt reaches the benchmarked program
/// instead of only the wrapper.
const FORWARDED: &[i32] = &[SIGINT, SIGHUP, SIGTERM, SIGQUIT, SIGUSR1, SIGUSR2, SIGPIPE];

/// The two execution paths around the final exec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Supervisor {
    /// No timing: no fork, the caller execs in this very process.
    Direct,
    /// Timing: fork, measure the child's whole lifetime, report.
    Timed(ReportMode),
}

/// What the caller does after the supervisor returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Proceed to argv build and exec in this process.
    Continue,
    /// The supervised run finished; exit with this derived status.
    Exit(i32),
}

impl Supervisor {
    pub fn new(timing: Option<ReportMode>) -> Self {
        match timing {
            Some(mode) => Supervisor::Timed(mode),
            None => Supervisor::Direct,
        }
    }

    /// Runs the supervision step.
    ///
    /// `Direct` returns [`Outcome::Continue`] immediately. `Timed` forks:
    /// the child yields the processor once and continues the pipeline, the
    /// parent waits out the child and returns [`Outcome::Exit`]. Only a
    /// fork failure is fatal; a clock failure degrades to zero timestamps
    /// and a wait failure still reports whatever accounting exists.
    pub fn run(self, alternate: &mut Option<AlternateStream>) -> Result<Outcome> {
        let mode = match self {
            Supervisor::Direct => return Ok(Outcome::Continue),
            Supervisor::Timed(mode) => mode,
        };

        let start = now_or_zero();
        match unsafe { fork() }.map_err(LaunchError::Fork)? {
            ForkResult::Child => {
                // best-effort hint that the parent should reach its wait
                // before the exec happens
                unsafe { libc::sched_yield() };
                Ok(Outcome::Continue)
            }
            ForkResult::Parent { child } => {
                let forwarding = install_forwarding(child);
                let status = wait_for(child);
                let real = elapsed_between(start, now_or_zero());
                let usage = children_usage();

                if let Some((handle, thread)) = forwarding {
                    handle.close();
                    let _ = thread.join();
                }

                let report = TimeReport::new(real, &usage);
                write_report(alternate, mode, &report, &usage);
                Ok(Outcome::Exit(derived_status(status)))
            }
        }
    }
}

/// Starts the forwarding thread for the waiting parent.
///
/// The closure owns the child's pid; no handler-global state survives the
/// registration. A registration failure is logged and supervision carries
/// on without forwarding.
fn install_forwarding(
    child: Pid,
) -> Option<(signal_hook::iterator::backend::Handle, thread::JoinHandle<()>)> {
    let mut signals = match Signals::new(FORWARDED) {
        Ok(signals) => signals,
        Err(err) => {
            warn!("signal forwarding unavailable: {err}");
            return None;
        }
    };
    let handle = signals.handle();
    let pid = child.as_raw();
    let thread = thread::spawn(move || {
        for signal in signals.forever() {
            debug!(signal, "forwarding to child");
            unsafe { libc::kill(pid, signal) };
        }
    });
    Some((handle, thread))
}

/// Waits for the child, retrying interrupted waits (forwarded signals
/// interrupt the call). A real wait failure is logged, not fatal: the
/// report still goes out with whatever the accounting holds.
fn wait_for(child: Pid) -> Option<WaitStatus> {
    loop {
        match waitpid(child, None) {
            Ok(status) => return Some(status),
            Err(Errno::EINTR) => continue,
            Err(err) => {
                warn!(%child, "waiting for benchmarked child failed: {err}");
                return None;
            }
        }
    }
}

/// The child's exit code, or the negated signal number when it was killed.
fn derived_status(status: Option<WaitStatus>) -> i32 {
    match status {
        Some(WaitStatus::Exited(_, code)) => code,
        Some(WaitStatus::Signaled(_, signal, _)) => -(signal as i32),
        _ => 0,
    }
}

/// Monotonic timestamp; a clock failure degrades to zero rather than
/// aborting a launch over an observational feature.
fn now_or_zero() -> TimeSpec {
    clock_gettime(ClockId::CLOCK_MONOTONIC).unwrap_or_else(|err| {
        warn!("monotonic clock unavailable: {err}");
        TimeSpec::new(0, 0)
    })
}

fn elapsed_between(start: TimeSpec, end: TimeSpec) -> Duration {
    let nanos = (end.tv_sec() - start.tv_sec()) * 1_000_000_000 + (end.tv_nsec() - start.tv_nsec());
    if nanos > 0 {
        Duration::from_nanos(nanos as u64)
    } else {
        Duration::ZERO
    }
}

/// Resource accounting for terminated children, zeroed when the kernel
/// cannot provide it.
fn children_usage() -> libc::rusage {
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    if unsafe { libc::getrusage(libc::RUSAGE_CHILDREN, &mut usage) } < 0 {
        warn!(
            "reading child resource usage failed: {}",
            std::io::Error::last_os_error()
        );
    }
    usage
}

fn timeval_duration(tv: libc::timeval) -> Duration {
    Duration::new(tv.tv_sec.max(0) as u64, (tv.tv_usec.max(0) as u32) * 1_000)
}

/// The three posix timing figures, kept apart from the raw counters so
/// formatting stays pure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeReport {
    pub real: Duration,
    pub user: Duration,
    pub sys: Duration,
}

impl TimeReport {
    fn new(real: Duration, usage: &libc::rusage) -> Self {
        Self {
            real,
            user: timeval_duration(usage.ru_utime),
            sys: timeval_duration(usage.ru_stime),
        }
    }

    /// The `real`/`user`/`sys` lines, seconds with two fractional digits.
    pub fn posix_lines(&self) -> String {
        format!(
            "real {:.2}\nuser {:.2}\nsys {:.2}\n",
            self.real.as_secs_f64(),
            self.user.as_secs_f64(),
            self.sys.as_secs_f64()
        )
    }
}

/// One labeled line per resource counter: fixed-width value, then what the
/// number means.
pub fn counter_lines(usage: &libc::rusage) -> String {
    let rows: &[(&str, i64, &str)] = &[
        ("maxrss", usage.ru_maxrss, "maximum resident set size"),
        ("ixrss", usage.ru_ixrss, "integral shared memory size"),
        ("idrss", usage.ru_idrss, "integral unshared data size"),
        ("isrss", usage.ru_isrss, "integral unshared stack size"),
        ("minflt", usage.ru_minflt, "page reclaims (no I/O)"),
        ("majflt", usage.ru_majflt, "page faults (I/O required)"),
        ("nswap", usage.ru_nswap, "swaps"),
        ("inblock", usage.ru_inblock, "block input operations"),
        ("oublock", usage.ru_oublock, "block output operations"),
        ("msgsnd", usage.ru_msgsnd, "IPC messages sent"),
        ("msgrcv", usage.ru_msgrcv, "IPC messages received"),
        ("nsignals", usage.ru_nsignals, "signals received"),
        ("nvcsw", usage.ru_nvcsw, "voluntary context switches"),
        ("nivcsw", usage.ru_nivcsw, "involuntary context switches"),
    ];
    let mut out = String::new();
    for (label, value, comment) in rows {
        out.push_str(&format!("{label:<9}{value:>12}  {comment}\n"));
    }
    out
}

/// Emits the report on the alternate stream, never on the child's own
/// streams. The alternate exists whenever timing is on; stderr is the
/// conservative fallback should that invariant ever not hold.
fn write_report(
    alternate: &mut Option<AlternateStream>,
    mode: ReportMode,
    report: &TimeReport,
    usage: &libc::rusage,
) {
    let mut text = report.posix_lines();
    if mode == ReportMode::Extended {
        text.push_str(&counter_lines(usage));
    }
    let written = match alternate {
        Some(stream) => stream.write_all(text.as_bytes()).and_then(|_| stream.flush()),
        None => std::io::stderr().lock().write_all(text.as_bytes()),
    };
    if let Err(err) = written {
        warn!("writing benchmark report failed: {err}");
    }
}
