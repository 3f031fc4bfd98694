use std::ffi::OsStr;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{self, Command, Stdio};

use tempdir::TempDir;

/// WorkDir represents a directory in which tests are run.
#[derive(Debug)]
pub struct WorkDir {
    /// The directory in which the test will run. Removed on drop.
    dir: TempDir,
}

impl WorkDir {
    /// Creates a fresh, empty directory for one test.
    pub fn new(name: &str) -> WorkDir {
        WorkDir {
            dir: TempDir::new(&format!("mysh-{}", name)).expect("failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Builds a new command to run in this working directory. Diagnostics go
    /// to a file inside it and the job log defaults to `mysh.log` there.
    pub fn command<I, S>(&self, args: I) -> process::Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(self.bin());
        cmd.current_dir(self.path());
        cmd.arg(format!("--debug-log={}", self.path().join("debug.log").display()));
        cmd.args(args);
        cmd
    }

    /// Returns path to executable.
    fn bin(&self) -> PathBuf {
        PathBuf::from(env!("CARGO_BIN_EXE_mysh"))
    }

    /// Runs the shell with `script` on its stdin.
    pub fn run_script(&self, script: &str) -> process::Output {
        let mut cmd = self.command(&[] as &[&str]);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        self.output_with_stdin(&mut cmd, script)
    }

    /// Executes the command with `stdin` piped in and collects whichever of
    /// its stdout and stderr the caller piped.
    ///
    /// Panics if the command fails.
    pub fn output_with_stdin(&self, cmd: &mut process::Command, stdin: &str) -> process::Output {
        cmd.stdin(Stdio::piped());
        let mut child = cmd.spawn().expect("failed to spawn mysh");
        child
            .stdin
            .take()
            .expect("stdin was piped")
            .write_all(stdin.as_bytes())
            .expect("failed to write script");
        let o = child.wait_with_output().expect("failed to wait for mysh");
        self.check(cmd, o)
    }

    /// Executes the command and collects its output.
    ///
    /// Panics if the command fails.
    pub fn output(&self, cmd: &mut process::Command) -> process::Output {
        let o = cmd.output().expect("failed to run mysh");
        self.check(cmd, o)
    }

    fn check(&self, cmd: &process::Command, o: process::Output) -> process::Output {
        if !o.status.success() {
            panic!(
                "\n\n==========\n\
                 command failed but expected success!\
                 \n\ncommand: {:?}\
                 \ncwd: {}\
                 \n\nstatus: {}\
                 \n\nstdout: {}\
                 \n\nstderr: {}\
                 \n\n==========\n",
                cmd,
                self.path().display(),
                o.status,
                String::from_utf8_lossy(&o.stdout),
                String::from_utf8_lossy(&o.stderr)
            );
        }
        o
    }

    /// Contents of a file in this directory, empty if it does not exist.
    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.path().join(name)).unwrap_or_default()
    }

    pub fn write(&self, name: &str, contents: &str) {
        fs::write(self.path().join(name), contents).expect("failed to write file");
    }

    /// Contents of the completion log.
    pub fn job_log(&self) -> String {
        self.read("mysh.log")
    }
}
