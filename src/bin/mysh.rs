use std::path::PathBuf;
use std::process::{self, ExitStatus};

use atty::Stream;
use docopt::Docopt;
use log::{debug, error, warn};
use mysh::errors::Error;
use mysh::{FileLogSink, LogSink, MyshExitStatusExt, Shell, ShellConfig};
use nix::unistd::Pid;
use serde_derive::Deserialize;

const DEBUG_LOG_FILE_NAME: &str = ".mysh_debug_log";

const USAGE: &str = "
mysh.

Usage:
    mysh [options]
    mysh [options] -c <command>
    mysh [options] <file>
    mysh (-h | --help)
    mysh --version

Options:
    -h --help           Show this screen.
    --version           Show version.
    -c                  If the -c option is present, then commands are read from the first
                            non-option argument command_string.
    --job-log=<path>    File to append completed commands to [default: mysh.log].
    --no-job-log        Do not record completed commands.
    --debug-log=<path>  File to write diagnostics to, defaults to ~/.mysh_debug_log
";

/// Docopts input arguments.
#[derive(Debug, Deserialize)]
struct Args {
    arg_command: Option<String>,
    arg_file: Option<String>,
    flag_version: bool,
    flag_c: bool,
    flag_job_log: String,
    flag_no_job_log: bool,
    flag_debug_log: Option<String>,
}

fn main() {
    let args: Args = Docopt::new(USAGE)
        .and_then(|d| d.deserialize())
        .unwrap_or_else(|e| e.exit());

    init_logger(&args.flag_debug_log);
    debug!("{:?}", args);

    if args.flag_version {
        println!("mysh version {}", env!("CARGO_PKG_VERSION"));
    } else if args.flag_c || args.arg_file.is_some() {
        execute_from_command_string_or_file(&args);
    } else {
        execute_from_stdin(&args);
    }
}

/// Diagnostics are best effort: if the log file cannot be opened the shell
/// runs without them.
fn init_logger(path: &Option<String>) {
    let log_path = match path.clone().map(PathBuf::from).or_else(default_log_path) {
        Some(log_path) => log_path,
        None => return,
    };
    let log_file = match fern::log_file(&log_path) {
        Ok(log_file) => log_file,
        Err(e) => {
            eprintln!("mysh: {}: {}", log_path.display(), e);
            return;
        }
    };

    let pid = Pid::this();
    let result = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                pid,
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Trace)
        .chain(log_file)
        .apply();
    if let Err(e) = result {
        eprintln!("mysh: failed to initialize logging: {}", e);
    }
}

fn default_log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DEBUG_LOG_FILE_NAME))
}

/// A job log that cannot be opened disables job logging, it does not stop
/// the shell.
fn create_sink(args: &Args) -> Box<dyn LogSink> {
    if args.flag_no_job_log {
        return Box::new(FileLogSink::disabled());
    }

    match FileLogSink::open(&args.flag_job_log) {
        Ok(sink) => Box::new(sink),
        Err(e) => {
            warn!("job log {} disabled: {}", args.flag_job_log, e);
            eprintln!("mysh: {}: {}", args.flag_job_log, e);
            Box::new(FileLogSink::disabled())
        }
    }
}

fn execute_from_command_string_or_file(args: &Args) -> ! {
    let shell_config = ShellConfig::noninteractive();
    let mut shell =
        Shell::new(shell_config, create_sink(args)).unwrap_or_else(|e| display_error_and_exit(&e));

    let result = if let Some(ref command) = args.arg_command {
        shell.execute_command_string(command).map(|_| ())
    } else if let Some(ref file_path) = args.arg_file {
        shell.execute_commands_from_file(&file_path)
    } else {
        unreachable!();
    };

    match result {
        Ok(()) => shell.exit(ExitStatus::from_success()),
        Err(e) => {
            error!("{}", e);
            eprintln!("mysh: {}", e);
            shell.exit(ExitStatus::from_failure());
        }
    }
}

fn execute_from_stdin(args: &Args) -> ! {
    let shell_config = if atty::is(Stream::Stdin) {
        ShellConfig::interactive()
    } else {
        ShellConfig::noninteractive()
    };
    let mut shell =
        Shell::new(shell_config, create_sink(args)).unwrap_or_else(|e| display_error_and_exit(&e));
    shell.execute_from_stdin();
    shell.exit(ExitStatus::from_success())
}

fn display_error_and_exit(error: &Error) -> ! {
    error!("failed to create shell: {}", error);
    eprintln!("mysh: {}", error);
    process::exit(ExitStatus::from_failure().code().unwrap_or(1));
}
