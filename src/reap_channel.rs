//! Child reaping driven by SIGCHLD.
//!
//! The handler reaps every exited child with `waitpid(-1, WNOHANG)` and
//! writes one fixed-size record per child into a pipe. The control loop later
//! drains the pipe from ordinary code, so nothing but `waitpid(2)` and
//! `write(2)` ever runs in signal context. signal-hook saves and restores
//! `errno` around the handler.
//!
//! The supervisor blocks SIGCHLD on its own thread while it waits for a
//! foreground child. The handler must therefore not be able to run on any
//! other thread of the process, which holds for the single-threaded shell.

use std::fs::File;
use std::io::{self, Read};
use std::mem::size_of;
use std::os::unix::io::AsRawFd;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use failure::ResultExt;
use log::{debug, trace};
use nix::sys::signal::{self, SigHandler, Signal};
use nix::unistd::{self, Pid};
use signal_hook::consts::SIGCHLD;
use signal_hook::SigId;

use crate::errors::{ErrorKind, Result};
use crate::util::unix;

const RECORD_LEN: usize = 2 * size_of::<i32>();
const RECORDS_PER_READ: usize = 32;

/// A child collected by the SIGCHLD handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reaped {
    pub pid: Pid,
    pub status: ExitStatus,
}

/// Owns the notification pipe and the SIGCHLD handler registration.
///
/// Dropping it unregisters the handler before closing the pipe.
#[derive(Debug)]
pub struct ReapChannel {
    reader: File,
    // Kept open for the handler, which writes to it by raw fd.
    _writer: File,
    sig_id: SigId,
    /// Bytes of a record whose remainder has not arrived yet.
    partial: Vec<u8>,
}

impl ReapChannel {
    /// Creates the pipe and installs the SIGCHLD handler.
    ///
    /// Also makes the shell itself ignore SIGINT; children restore the default
    /// disposition before exec.
    pub fn install() -> Result<ReapChannel> {
        let (reader, writer) = unix::create_pipe().context(ErrorKind::ReapChannel)?;
        unix::set_nonblocking(reader.as_raw_fd()).context(ErrorKind::ReapChannel)?;

        unsafe { signal::signal(Signal::SIGINT, SigHandler::SigIgn) }
            .context(ErrorKind::ReapChannel)?;

        let write_fd = writer.as_raw_fd();
        let action = move || {
            while let Ok(Some((pid, status))) = unix::waitpid_raw(Pid::from_raw(-1), libc::WNOHANG)
            {
                let mut record = [0u8; RECORD_LEN];
                record[..4].copy_from_slice(&pid.as_raw().to_ne_bytes());
                record[4..].copy_from_slice(&status.to_ne_bytes());
                // A full pipe blocks here until the control loop drains it.
                // Pipe writes this small are atomic, so no record is split.
                let _ = unistd::write(write_fd, &record);
            }
        };
        // waitpid(2) and write(2) are async-signal-safe and nothing here
        // allocates or takes a lock.
        let sig_id = unsafe { signal_hook::low_level::register(SIGCHLD, action) }
            .context(ErrorKind::ReapChannel)?;
        debug!("installed SIGCHLD handler writing to fd {}", write_fd);

        Ok(ReapChannel {
            reader,
            _writer: writer,
            sig_id,
            partial: Vec::with_capacity(RECORD_LEN),
        })
    }

    /// Returns every child reaped since the last call, without blocking.
    pub fn drain(&mut self) -> Result<Vec<Reaped>> {
        let mut reaped = Vec::new();
        let mut buf = [0u8; RECORD_LEN * RECORDS_PER_READ];
        loop {
            let n = match self.reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => Err(e).context(ErrorKind::Io)?,
            };
            self.partial.extend_from_slice(&buf[..n]);
            let complete = self.partial.len() - self.partial.len() % RECORD_LEN;
            reaped.extend(self.partial[..complete].chunks(RECORD_LEN).map(decode));
            self.partial.drain(..complete);
            if n < buf.len() {
                break;
            }
        }

        if !reaped.is_empty() {
            trace!("drained {} reaped children", reaped.len());
        }
        Ok(reaped)
    }
}

impl Drop for ReapChannel {
    fn drop(&mut self) {
        signal_hook::low_level::unregister(self.sig_id);
    }
}

fn decode(record: &[u8]) -> Reaped {
    let mut pid = [0u8; 4];
    let mut status = [0u8; 4];
    pid.copy_from_slice(&record[..4]);
    status.copy_from_slice(&record[4..RECORD_LEN]);
    Reaped {
        pid: Pid::from_raw(i32::from_ne_bytes(pid)),
        status: ExitStatus::from_raw(i32::from_ne_bytes(status)),
    }
}
