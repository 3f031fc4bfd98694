//! Thin wrappers over the raw system calls the supervisor and the reap channel
//! share. `waitpid_raw` is async-signal-safe.

use std::fs::File;
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};

use libc::c_int;
use log::error;
use nix::errno::Errno;
use nix::fcntl::{self, FcntlArg, FdFlag, OFlag};
use nix::sys::signal::{self, SigSet, SigmaskHow, Signal};
use nix::unistd::{self, Pid};

/// `waitpid(2)` returning the raw wait status instead of nix's decoded
/// `WaitStatus`, so it can travel through the reap channel unchanged.
///
/// Returns `Ok(None)` when `WNOHANG` is given and no child has changed state.
pub fn waitpid_raw(pid: Pid, options: c_int) -> nix::Result<Option<(Pid, c_int)>> {
    let mut status: c_int = 0;
    let res = unsafe { libc::waitpid(pid.as_raw(), &mut status, options) };
    match Errno::result(res)? {
        0 => Ok(None),
        child => Ok(Some((Pid::from_raw(child), status))),
    }
}

pub fn set_cloexec(fd: RawFd) -> nix::Result<()> {
    let flags = FdFlag::from_bits_truncate(fcntl::fcntl(fd, FcntlArg::F_GETFD)?);
    fcntl::fcntl(fd, FcntlArg::F_SETFD(flags | FdFlag::FD_CLOEXEC))?;
    Ok(())
}

pub fn set_nonblocking(fd: RawFd) -> nix::Result<()> {
    let flags = OFlag::from_bits_truncate(fcntl::fcntl(fd, FcntlArg::F_GETFL)?);
    fcntl::fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
    Ok(())
}

/// Wraps `unistd::pipe()` to return RAII structs instead of raw, owning file
/// descriptors. Both ends are close-on-exec.
/// Returns (`read_end_pipe`, `write_end_pipe`)
pub fn create_pipe() -> nix::Result<(File, File)> {
    // IMPORTANT: immediately pass the RawFds returned by unistd::pipe()
    // into RAII structs (File). If the function returns before they are moved
    // into RAII structs, the fds could be leaked.
    let (read_end_pipe, write_end_pipe) = unistd::pipe()?;
    let (read_end_pipe, write_end_pipe) = unsafe {
        (
            File::from_raw_fd(read_end_pipe),
            File::from_raw_fd(write_end_pipe),
        )
    };

    set_cloexec(read_end_pipe.as_raw_fd())?;
    set_cloexec(write_end_pipe.as_raw_fd())?;
    Ok((read_end_pipe, write_end_pipe))
}

/// RAII struct that blocks a signal for the calling thread and restores the
/// previous mask when dropped.
#[derive(Debug)]
pub struct SignalMask {
    previous: SigSet,
}

impl SignalMask {
    pub fn block(sig: Signal) -> nix::Result<SignalMask> {
        let mut set = SigSet::empty();
        set.add(sig);
        let mut previous = SigSet::empty();
        signal::sigprocmask(SigmaskHow::SIG_BLOCK, Some(&set), Some(&mut previous))?;
        Ok(SignalMask { previous })
    }
}

impl Drop for SignalMask {
    fn drop(&mut self) {
        let temp_result = signal::sigprocmask(SigmaskHow::SIG_SETMASK, Some(&self.previous), None);
        if let Err(e) = temp_result {
            error!("failed to restore signal mask: {}", e);
        }
    }
}
