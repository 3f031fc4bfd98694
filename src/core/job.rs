use std::collections::HashMap;

use log::{debug, warn};
use nix::unistd::Pid;

/// Background processes that have not been reaped yet, keyed by pid.
///
/// Only ever touched from the control thread; the SIGCHLD handler reports
/// through the reap channel instead.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: HashMap<Pid, String>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Records that `pid` was started for `command`.
    pub fn add(&mut self, pid: Pid, command: &str) {
        debug!("registering background job {}: {}", pid, command);
        // The kernel does not recycle the pid of an unreaped child, so this
        // only fires if a completion was lost.
        if let Some(previous) = self.jobs.insert(pid, command.to_string()) {
            warn!("pid {} was already registered for '{}'", pid, previous);
        }
    }

    /// Removes the job for `pid`, handing back its command text.
    pub fn take(&mut self, pid: Pid) -> Option<String> {
        self.jobs.remove(&pid)
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
