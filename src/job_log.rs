//! Completion records: where finished children are reported.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::ExitStatus;

use failure::ResultExt;
use log::debug;
use nix::unistd::Pid;

use crate::errors::{ErrorKind, Result};

/// Receives one record per reaped child.
///
/// Called only from the control thread, never from a signal handler.
pub trait LogSink {
    fn log(&mut self, pid: Pid, command: &str, status: ExitStatus);
}

/// Appends completion records to a file, one line each.
#[derive(Debug)]
pub struct FileLogSink {
    file: Option<File>,
}

impl FileLogSink {
    /// Opens `path` for appending, creating it with mode 0644 if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<FileLogSink> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .mode(0o644)
            .open(path.as_ref())
            .context(ErrorKind::Io)?;
        debug!("recording completions in {}", path.as_ref().display());
        Ok(FileLogSink { file: Some(file) })
    }

    /// A sink that drops every record.
    pub fn disabled() -> FileLogSink {
        FileLogSink { file: None }
    }
}

impl LogSink for FileLogSink {
    fn log(&mut self, pid: Pid, command: &str, status: ExitStatus) {
        if let Some(ref mut file) = self.file {
            let record = format_record(pid, command, status);
            log_if_err!(
                file.write_all(record.as_bytes()),
                "failed to record completion of {}",
                pid
            );
        }
    }
}

/// A finished child, as handed to a [`LogSink`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completion {
    pub pid: Pid,
    pub command: String,
    pub status: ExitStatus,
}

/// Collects completions in memory.
impl LogSink for Vec<Completion> {
    fn log(&mut self, pid: Pid, command: &str, status: ExitStatus) {
        self.push(Completion {
            pid,
            command: command.to_string(),
            status,
        });
    }
}

/// Formats one completion line. Signal deaths are reported shell-style as
/// `128 + signal`, together with the signal number.
///
/// # Examples
///
/// ```
/// use std::os::unix::process::ExitStatusExt;
/// use std::process::ExitStatus;
///
/// use mysh::job_log::format_record;
/// use nix::unistd::Pid;
///
/// assert_eq!(
///     format_record(Pid::from_raw(12), "true", ExitStatus::from_raw(0)),
///     "[pid=12] cmd=\"true\" status=0\n"
/// );
/// assert_eq!(
///     format_record(Pid::from_raw(12), "sleep 9", ExitStatus::from_raw(9)),
///     "[pid=12] cmd=\"sleep 9\" status=137 signal=9\n"
/// );
/// ```
pub fn format_record(pid: Pid, command: &str, status: ExitStatus) -> String {
    match (status.code(), status.signal()) {
        (Some(code), _) => format!("[pid={}] cmd=\"{}\" status={}\n", pid, command, code),
        (None, Some(signal)) => format!(
            "[pid={}] cmd=\"{}\" status={} signal={}\n",
            pid,
            command,
            128 + signal,
            signal
        ),
        (None, None) => format!("[pid={}] cmd=\"{}\" status=-1\n", pid, command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use tempdir::TempDir;

    use crate::util::MyshExitStatusExt;

    #[test]
    fn exit_code_record() {
        assert_eq!(
            format_record(Pid::from_raw(7), "cat < /nope", ExitStatus::from_status(1)),
            "[pid=7] cmd=\"cat < /nope\" status=1\n"
        );
    }

    #[test]
    fn stopped_status_has_no_code() {
        // WIFSTOPPED with SIGSTOP
        let stopped = ExitStatus::from_raw(0x137f);
        assert_eq!(
            format_record(Pid::from_raw(7), "vi", stopped),
            "[pid=7] cmd=\"vi\" status=-1\n"
        );
    }

    #[test]
    fn file_sink_appends() {
        let _lock = crate::test_util::process_lock();
        let dir = TempDir::new("mysh-log").unwrap();
        let path = dir.path().join("mysh.log");

        let mut sink = FileLogSink::open(&path).unwrap();
        sink.log(Pid::from_raw(1), "true", ExitStatus::from_success());
        drop(sink);
        let mut sink = FileLogSink::open(&path).unwrap();
        sink.log(Pid::from_raw(2), "false", ExitStatus::from_failure());

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "[pid=1] cmd=\"true\" status=0\n[pid=2] cmd=\"false\" status=1\n"
        );
    }

    #[test]
    fn disabled_sink_is_a_no_op() {
        let mut sink = FileLogSink::disabled();
        assert!(sink.file.is_none());
        sink.log(Pid::from_raw(1), "true", ExitStatus::from_success());
    }

    #[test]
    fn open_failure_is_an_io_error() {
        let err = FileLogSink::open("/nonexistent-dir/mysh.log").unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::Io);
    }
}
