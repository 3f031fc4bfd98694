//! mysh - a small line-oriented shell
//!
//! Supports `<`, `>`, `>>`, a single `|` and a trailing `&`. Finished children
//! are collected by a SIGCHLD handler and reported to a [`LogSink`].
#![warn(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]

/// Logs the error of a `Result` and discards it.
macro_rules! log_if_err {
    ($result:expr, $fmt:expr) => {
        if let Err(e) = $result {
            ::log::error!(concat!($fmt, ": {}"), e);
        }
    };
    ($result:expr, $fmt:expr, $($arg:tt)+) => {
        if let Err(e) = $result {
            ::log::error!(concat!($fmt, ": {}"), $($arg)+, e);
        }
    };
}

pub mod builtins;
pub mod core;
mod editor;
pub mod errors;
pub mod execute_command;
pub mod job_log;
pub mod reap_channel;
mod shell;
mod util;

pub use crate::job_log::{FileLogSink, LogSink};
pub use crate::shell::{Shell, ShellConfig};
pub use crate::util::MyshExitStatusExt;
