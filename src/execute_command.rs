//! The process supervisor: forks, wires up file descriptors and execs.
//!
//! SIGCHLD stays blocked on the control thread from just before the first
//! fork until every new pid is either in the `JobRegistry` or has been waited
//! for, so the reap channel can never collect a child nobody is tracking.

use std::ffi::CString;
use std::os::unix::io::{AsRawFd, RawFd};
use std::ptr;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use failure::ResultExt;
use libc::c_char;
use log::{debug, info, warn};
use nix::errno::Errno;
use nix::fcntl::{self, OFlag};
use nix::libc::{STDERR_FILENO, STDIN_FILENO, STDOUT_FILENO};
use nix::sys::signal::{self, SigHandler, SigSet, SigmaskHow, Signal};
use nix::sys::stat::Mode;
use nix::unistd::{self, ForkResult, Pid};

use crate::core::job::JobRegistry;
use crate::core::parser::{Command, OutputMode, Stage};
use crate::errors::{Error, ErrorKind, Result};
use crate::job_log::LogSink;
use crate::util::unix::{self, SignalMask};

/// `execvp(3)` failed.
pub const COMMAND_NOT_FOUND_EXIT_STATUS: i32 = 127;
/// A redirection could not be set up in the child.
pub const REDIRECT_FAILURE_EXIT_STATUS: i32 = 1;
/// A redirection conflicts with the pipe on that side of a pipeline.
pub const DISALLOWED_REDIRECT_EXIT_STATUS: i32 = 2;

const LEFT_OUTPUT_REDIRECT: &[u8] = b"mysh: output redirection not supported on left side of pipe\n";
const RIGHT_INPUT_REDIRECT: &[u8] = b"mysh: input redirection not supported on right side of pipe\n";

/// Dispositions a child gets back before exec. SIGINT is ignored by the shell
/// and SIGPIPE by the Rust runtime; both would otherwise survive `execvp`.
const RESET_SIGNALS: &[Signal] = &[Signal::SIGINT, Signal::SIGQUIT, Signal::SIGPIPE];

/// Runs `command` to completion (foreground) or starts it (background).
///
/// Foreground completions are sent to `sink` before returning; background
/// children are recorded in `jobs` and logged once the reap channel reports
/// them. Failures only abort this command.
pub fn execute_command(
    command: &Command,
    sink: &mut dyn LogSink,
    jobs: &mut JobRegistry,
) -> Result<()> {
    match command.pipe_to {
        None => execute_simple(command, sink, jobs),
        Some(ref right) => execute_pipeline(command, right, sink, jobs),
    }
}

fn execute_simple(command: &Command, sink: &mut dyn LogSink, jobs: &mut JobRegistry) -> Result<()> {
    let stage = PreparedStage::new(&command.stage)?;

    let _mask = SignalMask::block(Signal::SIGCHLD).context(ErrorKind::Nix)?;
    let pid = match unsafe { unistd::fork() }.context(ErrorKind::Fork)? {
        ForkResult::Child => exec_child(&stage, Plumbing::Inherit),
        ForkResult::Parent { child } => child,
    };
    debug!("forked {} for {:?}", pid, command.line);

    if command.background {
        jobs.add(pid, &command.line);
        println!("[bg] started pid {}", pid);
        return Ok(());
    }

    let status = wait_for_process(pid)?;
    sink.log(pid, &command.line, status);
    Ok(())
}

fn execute_pipeline(
    command: &Command,
    right: &Stage,
    sink: &mut dyn LogSink,
    jobs: &mut JobRegistry,
) -> Result<()> {
    let left = PreparedStage::new(&command.stage)?;
    let right = PreparedStage::new(right)?;

    let (read_end, write_end) = unix::create_pipe().context(ErrorKind::Pipe)?;
    let (read_fd, write_fd) = (read_end.as_raw_fd(), write_end.as_raw_fd());

    let _mask = SignalMask::block(Signal::SIGCHLD).context(ErrorKind::Nix)?;
    let left_pid = match unsafe { unistd::fork() }.context(ErrorKind::Fork)? {
        ForkResult::Child => exec_child(&left, Plumbing::Writer { read_fd, write_fd }),
        ForkResult::Parent { child } => child,
    };
    let right_pid = match unsafe { unistd::fork() } {
        Ok(ForkResult::Child) => exec_child(&right, Plumbing::Reader { read_fd, write_fd }),
        Ok(ForkResult::Parent { child }) => child,
        Err(e) => {
            // The left side is already running. Track it like a background
            // job so its completion is still reported once it sees EPIPE.
            warn!("second fork failed, {} left without a reader", left_pid);
            jobs.add(left_pid, &command.line);
            return Err(e).context(ErrorKind::Fork).map_err(Error::from);
        }
    };

    // Nobody reads EOF until every copy of the write end is closed.
    drop(read_end);
    drop(write_end);
    debug!(
        "forked pipeline {} | {} for {:?}",
        left_pid, right_pid, command.line
    );

    if command.background {
        jobs.add(left_pid, &command.line);
        jobs.add(right_pid, &command.line);
        println!("[bg] started pid {}", right_pid);
        return Ok(());
    }

    let left_status = wait_for_process(left_pid);
    if let Ok(status) = &left_status {
        sink.log(left_pid, &command.line, *status);
    }
    let right_status = wait_for_process(right_pid);
    if let Ok(status) = &right_status {
        sink.log(right_pid, &command.line, *status);
    }
    left_status.and(right_status).map(|_| ())
}

/// Blocks until `pid` terminates, retrying when interrupted.
fn wait_for_process(pid: Pid) -> Result<ExitStatus> {
    loop {
        match unix::waitpid_raw(pid, 0) {
            Ok(Some((_, status))) => {
                let status = ExitStatus::from_raw(status);
                info!("{} exited: {:?}", pid, status);
                return Ok(status);
            }
            Ok(None) | Err(Errno::EINTR) => continue,
            Err(e) => return Err(e).context(ErrorKind::Wait).map_err(Error::from),
        }
    }
}

/// A file to open in the child, with the diagnostic to print if that fails.
#[derive(Debug)]
struct PreparedRedirect {
    path: CString,
    flags: OFlag,
    /// `mysh: <path>: `
    error_prefix: Vec<u8>,
}

impl PreparedRedirect {
    fn new(path: &str, flags: OFlag) -> Result<PreparedRedirect> {
        Ok(PreparedRedirect {
            path: CString::new(path).context(ErrorKind::Io)?,
            flags,
            error_prefix: format!("mysh: {}: ", path).into_bytes(),
        })
    }
}

/// Everything a child needs, built before forking so the child itself never
/// has to allocate.
#[derive(Debug)]
struct PreparedStage {
    argv: Vec<CString>,
    /// Null-terminated pointers into `argv`, as `execvp(3)` takes them.
    argv_ptrs: Vec<*const c_char>,
    input: Option<PreparedRedirect>,
    output: Option<PreparedRedirect>,
    /// `mysh: <argv0>: `
    exec_error_prefix: Vec<u8>,
}

impl PreparedStage {
    fn new(stage: &Stage) -> Result<PreparedStage> {
        let argv = stage
            .argv
            .iter()
            .map(|arg| CString::new(arg.as_str()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .context(ErrorKind::Io)?;
        let argv_ptrs = argv
            .iter()
            .map(|arg| arg.as_ptr())
            .chain(Some(ptr::null()))
            .collect();
        let input = match stage.input {
            Some(ref path) => Some(PreparedRedirect::new(path, OFlag::O_RDONLY)?),
            None => None,
        };
        let output = match stage.output {
            Some(ref output) => {
                let mode = match output.mode {
                    OutputMode::Truncate => OFlag::O_TRUNC,
                    OutputMode::Append => OFlag::O_APPEND,
                };
                let flags = OFlag::O_WRONLY | OFlag::O_CREAT | mode;
                Some(PreparedRedirect::new(&output.path, flags)?)
            }
            None => None,
        };
        Ok(PreparedStage {
            argv,
            argv_ptrs,
            input,
            output,
            exec_error_prefix: format!("mysh: {}: ", stage.program()).into_bytes(),
        })
    }
}

/// How a child is connected to its pipeline partner.
#[derive(Clone, Copy, Debug)]
enum Plumbing {
    Inherit,
    /// Left of `|`: stdout goes into the pipe.
    Writer { read_fd: RawFd, write_fd: RawFd },
    /// Right of `|`: stdin comes from the pipe.
    Reader { read_fd: RawFd, write_fd: RawFd },
}

/// Runs in the forked child and never returns.
fn exec_child(stage: &PreparedStage, plumbing: Plumbing) -> ! {
    // Undo what the shell set up for itself.
    for &sig in RESET_SIGNALS {
        unsafe {
            let _ = signal::signal(sig, SigHandler::SigDfl);
        }
    }
    let _ = signal::sigprocmask(SigmaskHow::SIG_SETMASK, Some(&SigSet::empty()), None);

    match plumbing {
        Plumbing::Inherit => {}
        Plumbing::Writer { read_fd, write_fd } => {
            if stage.output.is_some() {
                die(DISALLOWED_REDIRECT_EXIT_STATUS, LEFT_OUTPUT_REDIRECT);
            }
            let _ = unistd::close(read_fd);
            if let Err(e) = unistd::dup2(write_fd, STDOUT_FILENO) {
                die_errno(REDIRECT_FAILURE_EXIT_STATUS, b"mysh: dup2: ", e);
            }
            let _ = unistd::close(write_fd);
        }
        Plumbing::Reader { read_fd, write_fd } => {
            if stage.input.is_some() {
                die(DISALLOWED_REDIRECT_EXIT_STATUS, RIGHT_INPUT_REDIRECT);
            }
            let _ = unistd::close(write_fd);
            if let Err(e) = unistd::dup2(read_fd, STDIN_FILENO) {
                die_errno(REDIRECT_FAILURE_EXIT_STATUS, b"mysh: dup2: ", e);
            }
            let _ = unistd::close(read_fd);
        }
    }

    if let Some(ref input) = stage.input {
        redirect(input, STDIN_FILENO);
    }
    if let Some(ref output) = stage.output {
        redirect(output, STDOUT_FILENO);
    }

    unsafe {
        libc::execvp(stage.argv[0].as_ptr(), stage.argv_ptrs.as_ptr());
    }
    die_errno(
        COMMAND_NOT_FOUND_EXIT_STATUS,
        &stage.exec_error_prefix,
        Errno::last(),
    )
}

/// Opens `redirect.path` onto `target`, exiting the child on failure.
fn redirect(redirect: &PreparedRedirect, target: RawFd) {
    let fd = match fcntl::open(
        redirect.path.as_c_str(),
        redirect.flags,
        Mode::from_bits_truncate(0o644),
    ) {
        Ok(fd) => fd,
        Err(e) => die_errno(REDIRECT_FAILURE_EXIT_STATUS, &redirect.error_prefix, e),
    };
    if fd != target {
        if let Err(e) = unistd::dup2(fd, target) {
            die_errno(REDIRECT_FAILURE_EXIT_STATUS, b"mysh: dup2: ", e);
        }
        let _ = unistd::close(fd);
    }
}

fn die_errno(code: i32, prefix: &[u8], errno: Errno) -> ! {
    let _ = unistd::write(STDERR_FILENO, prefix);
    let _ = unistd::write(STDERR_FILENO, errno.desc().as_bytes());
    die(code, b"\n")
}

fn die(code: i32, message: &[u8]) -> ! {
    let _ = unistd::write(STDERR_FILENO, message);
    unsafe { libc::_exit(code) }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use std::path::Path;
    use std::thread;
    use std::time::{Duration, Instant};

    use tempdir::TempDir;

    use crate::job_log::Completion;
    use crate::reap_channel::ReapChannel;

    fn run(line: &str) -> Vec<Completion> {
        let mut completions = Vec::new();
        let mut jobs = JobRegistry::new();
        let command = Command::parse(line).unwrap().unwrap();
        execute_command(&command, &mut completions, &mut jobs).unwrap();
        assert!(jobs.is_empty());
        completions
    }

    fn path_str(dir: &TempDir, name: &str) -> String {
        dir.path().join(name).to_str().unwrap().to_string()
    }

    #[test]
    fn foreground_exit_codes_are_logged() {
        let _lock = crate::test_util::process_lock();
        let completions = run("true");
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].command, "true");
        assert_eq!(completions[0].status.code(), Some(0));

        assert_eq!(run("false")[0].status.code(), Some(1));
    }

    #[test]
    fn missing_program_exits_127() {
        let _lock = crate::test_util::process_lock();
        let completions = run("mysh-no-such-program-here");
        assert_eq!(
            completions[0].status.code(),
            Some(COMMAND_NOT_FOUND_EXIT_STATUS)
        );
    }

    #[test]
    fn signal_death_is_reported_as_signal() {
        let _lock = crate::test_util::process_lock();
        let dir = TempDir::new("mysh-exec").unwrap();
        let script = path_str(&dir, "kill-self.sh");
        fs::write(&script, "kill -9 $$\n").unwrap();

        let completions = run(&format!("sh {}", script));
        assert_eq!(completions[0].status.code(), None);
        assert_eq!(completions[0].status.signal(), Some(9));
    }

    #[test]
    fn output_then_input_redirection() {
        let _lock = crate::test_util::process_lock();
        let dir = TempDir::new("mysh-exec").unwrap();
        let out = path_str(&dir, "out.txt");
        let copy = path_str(&dir, "copy.txt");

        run(&format!("echo hello > {}", out));
        run(&format!("cat < {} > {}", out, copy));
        assert_eq!(fs::read_to_string(&copy).unwrap(), "hello\n");
    }

    #[test]
    fn truncate_and_append() {
        let _lock = crate::test_util::process_lock();
        let dir = TempDir::new("mysh-exec").unwrap();
        let out = path_str(&dir, "out.txt");

        run(&format!("echo one > {}", out));
        run(&format!("echo two >> {}", out));
        assert_eq!(fs::read_to_string(&out).unwrap(), "one\ntwo\n");
        run(&format!("echo three > {}", out));
        assert_eq!(fs::read_to_string(&out).unwrap(), "three\n");
    }

    #[test]
    fn missing_input_file_exits_1() {
        let _lock = crate::test_util::process_lock();
        let completions = run("cat < /nonexistent/mysh-input");
        assert_eq!(
            completions[0].status.code(),
            Some(REDIRECT_FAILURE_EXIT_STATUS)
        );
    }

    #[test]
    fn pipeline_logs_both_sides_in_order() {
        let _lock = crate::test_util::process_lock();
        let dir = TempDir::new("mysh-exec").unwrap();
        let out = path_str(&dir, "out.txt");

        let line = format!("echo hello | tr a-z A-Z > {}", out);
        let completions = run(&line);
        assert_eq!(completions.len(), 2);
        assert!(completions.iter().all(|c| c.command == line));
        assert!(completions.iter().all(|c| c.status.success()));
        assert_ne!(completions[0].pid, completions[1].pid);
        assert_eq!(fs::read_to_string(&out).unwrap(), "HELLO\n");
    }

    #[test]
    fn pipeline_reader_sees_eof() {
        let _lock = crate::test_util::process_lock();
        let dir = TempDir::new("mysh-exec").unwrap();
        let input = path_str(&dir, "in.txt");
        let out = path_str(&dir, "out.txt");
        fs::write(&input, "b\na\nc\n").unwrap();

        // sort only writes once its input is closed.
        run(&format!("cat < {} | sort > {}", input, out));
        assert_eq!(fs::read_to_string(&out).unwrap(), "a\nb\nc\n");
    }

    #[test]
    fn pipe_side_redirections_are_refused_in_the_child() {
        let _lock = crate::test_util::process_lock();
        let dir = TempDir::new("mysh-exec").unwrap();
        let left_out = path_str(&dir, "x");
        let right_in = path_str(&dir, "y");
        fs::write(&right_in, "data\n").unwrap();

        let completions = run(&format!("echo hi > {} | cat", left_out));
        assert_eq!(
            completions[0].status.code(),
            Some(DISALLOWED_REDIRECT_EXIT_STATUS)
        );
        assert!(!Path::new(&left_out).exists());

        let completions = run(&format!("echo hi | cat < {}", right_in));
        assert_eq!(
            completions[1].status.code(),
            Some(DISALLOWED_REDIRECT_EXIT_STATUS)
        );
    }

    #[test]
    fn pipeline_writer_dies_of_sigpipe() {
        let _lock = crate::test_util::process_lock();
        let completions = run("yes | head -n 1 > /dev/null");
        assert_eq!(completions[0].status.signal(), Some(libc::SIGPIPE));
        assert!(completions[1].status.success());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn child_starts_with_default_signal_state() {
        fn mask(status: &str, field: &str) -> u64 {
            let line = status
                .lines()
                .find(|line| line.starts_with(field))
                .unwrap();
            u64::from_str_radix(line[field.len()..].trim(), 16).unwrap()
        }

        let _lock = crate::test_util::process_lock();
        // The test harness itself runs with SIGPIPE ignored.
        let dir = TempDir::new("mysh-exec").unwrap();
        let out = path_str(&dir, "status.txt");

        run(&format!("cat /proc/self/status > {}", out));
        let status = fs::read_to_string(&out).unwrap();
        assert_eq!(mask(&status, "SigBlk:"), 0);
        let ignored = mask(&status, "SigIgn:");
        for &sig in RESET_SIGNALS {
            assert_eq!(ignored & (1 << (sig as i32 - 1)), 0, "{:?} is ignored", sig);
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn pipeline_leaves_no_pipe_fds_open() {
        fn pipe_fds() -> usize {
            fs::read_dir("/proc/self/fd")
                .unwrap()
                .filter_map(|entry| fs::read_link(entry.unwrap().path()).ok())
                .filter(|target| target.to_string_lossy().starts_with("pipe:"))
                .count()
        }

        let _lock = crate::test_util::process_lock();
        let before = pipe_fds();
        run("echo hi | cat > /dev/null");
        assert_eq!(pipe_fds(), before);
    }

    #[test]
    fn background_returns_at_once_and_is_reaped_later() {
        let _lock = crate::test_util::process_lock();
        let mut channel = ReapChannel::install().unwrap();
        let mut completions = Vec::new();
        let mut jobs = JobRegistry::new();

        let command = Command::parse("sleep 0.2 &").unwrap().unwrap();
        let started = Instant::now();
        execute_command(&command, &mut completions, &mut jobs).unwrap();
        assert!(started.elapsed() < Duration::from_millis(150));
        assert!(completions.is_empty());
        assert_eq!(jobs.len(), 1);

        let deadline = Instant::now() + Duration::from_secs(10);
        while !jobs.is_empty() {
            for reaped in channel.drain().unwrap() {
                if let Some(line) = jobs.take(reaped.pid) {
                    completions.log(reaped.pid, &line, reaped.status);
                }
            }
            assert!(Instant::now() < deadline, "background child never reaped");
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].command, "sleep 0.2 &");
        assert!(completions[0].status.success());
    }

    #[test]
    fn background_pipeline_registers_both_pids() {
        let _lock = crate::test_util::process_lock();
        let mut channel = ReapChannel::install().unwrap();
        let mut completions = Vec::new();
        let mut jobs = JobRegistry::new();

        let command = Command::parse("echo hi | cat > /dev/null &").unwrap().unwrap();
        execute_command(&command, &mut completions, &mut jobs).unwrap();
        assert_eq!(jobs.len(), 2);

        let deadline = Instant::now() + Duration::from_secs(10);
        while !jobs.is_empty() {
            for reaped in channel.drain().unwrap() {
                jobs.take(reaped.pid);
            }
            assert!(Instant::now() < deadline, "pipeline never reaped");
            thread::sleep(Duration::from_millis(10));
        }
    }
}
