use std::ffi::OsString;
use std::io::IsTerminal;

use clap::{CommandFactory, Parser};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use vrunas::cli::{self, Cli};
use vrunas::error::{LaunchError, USAGE};
use vrunas::{launch, redirect};

fn main() {
    // run() returns instead of exiting so owned descriptors drop first
    std::process::exit(run());
}

fn run() -> i32 {
    let args: Vec<OsString> = std::env::args_os().skip(1).collect();

    // Pass one is silent by contract: nothing may print until the streams
    // it decides about have been rearranged.
    let scan = cli::scan(args.iter().cloned());
    let alternate = match redirect::establish(&scan) {
        Ok(alternate) => alternate,
        Err(err) => return fail(&err),
    };

    init_tracing();

    // Pass two, with streams final and reporting enabled.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // help and version are clean exits; everything else is a
            // syntax error in the usage slot
            return if err.exit_code() == 0 { 0 } else { USAGE };
        }
    };
    let config = match cli::interpret(cli, &scan) {
        Ok(config) => config,
        Err(err) => return fail(&err),
    };

    match launch::run(config, alternate) {
        Ok(code) => code,
        Err(err) => fail(&err),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vrunas=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal())
                .without_time()
                .with_target(false),
        )
        .init();
}

fn fail(err: &LaunchError) -> i32 {
    eprintln!("vrunas: {err}");
    if matches!(err, LaunchError::MissingProgram) {
        let usage = Cli::command().render_usage();
        eprintln!("{usage}");
    }
    err.exit_code()
}
