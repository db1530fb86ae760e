//! vrunas: run a program under a chosen user/group, with optional stream
//! redirection, priority adjustment and a timed, resource-measured run.
//!
//! The pipeline lives here so the binary stays a thin boundary:
//! [`cli::scan`] (silent pass) → [`redirect::establish`] → [`cli::interpret`]
//! (full pass) → [`launch::run`].

pub mod bench;
pub mod cli;
pub mod config;
pub mod error;
pub mod identity;
pub mod launch;
pub mod redirect;
