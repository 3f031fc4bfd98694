//! mysh - Shell Module
//!
//! The Shell owns the control loop: it reads lines, runs builtins itself,
//! hands everything else to the supervisor, and turns reaped background
//! children into completion records.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process::{self, ExitStatus};

use failure::ResultExt;
use log::{debug, error, info, warn};

use super::ShellConfig;
use crate::{
    builtins::{self, Action},
    core::{job::JobRegistry, parser::Command},
    editor::Editor,
    errors::{ErrorKind, Result},
    execute_command::execute_command,
    job_log::LogSink,
    reap_channel::ReapChannel,
};

const PROMPT: &str = "mysh> ";

/// mysh Shell
pub struct Shell {
    editor: Editor,
    /// Background children not yet reported.
    jobs: JobRegistry,
    reaper: ReapChannel,
    sink: Box<dyn LogSink>,
    config: ShellConfig,
}

impl Shell {
    /// Installs child reaping and prepares to read from stdin.
    ///
    /// Fails only if the SIGCHLD handler or its pipe cannot be set up.
    pub fn new(config: ShellConfig, sink: Box<dyn LogSink>) -> Result<Shell> {
        let editor = Editor::new(config.line_editing);
        Shell::with_editor(config, editor, sink)
    }

    pub(crate) fn with_editor(
        config: ShellConfig,
        editor: Editor,
        sink: Box<dyn LogSink>,
    ) -> Result<Shell> {
        let reaper = ReapChannel::install()?;
        info!("mysh started up");
        Ok(Shell {
            editor,
            jobs: JobRegistry::new(),
            reaper,
            sink,
            config,
        })
    }

    /// Parses and runs one line.
    ///
    /// Syntax errors, builtin failures and supervisor failures are reported
    /// on stderr and do not end the loop.
    pub fn execute_command_string(&mut self, input: &str) -> Result<Action> {
        let command = match Command::parse(input) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(Action::Continue),
            Err(e) => {
                if let ErrorKind::Syntax(_) = *e.kind() {
                    eprintln!("mysh: {}", e);
                    return Ok(Action::Continue);
                }

                return Err(e);
            }
        };

        if !command.is_pipeline() && builtins::is_builtin(command.program()) {
            return match builtins::run(command.program(), command.stage.args()) {
                Ok(action) => Ok(action),
                Err(e) => {
                    warn!("builtin {} failed: {}", command.program(), e);
                    eprintln!("mysh: {}", e);
                    Ok(Action::Continue)
                }
            };
        }

        if let Err(e) = execute_command(&command, self.sink.as_mut(), &mut self.jobs) {
            error!("failed to run {:?}: {}", command.line, e);
            eprintln!("mysh: {}", e);
        }
        Ok(Action::Continue)
    }

    /// Logs every background child reaped since the last call.
    pub fn notify_completed_jobs(&mut self) {
        let reaped = match self.reaper.drain() {
            Ok(reaped) => reaped,
            Err(e) => {
                error!("failed to drain reaped children: {}", e);
                return;
            }
        };

        for child in reaped {
            match self.jobs.take(child.pid) {
                Some(line) => self.sink.log(child.pid, &line, child.status),
                None => debug!("reaped untracked child {}", child.pid),
            }
        }
    }

    /// Runs a mysh script from a file, one command per line.
    pub fn execute_commands_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let mut f = File::open(path).context(ErrorKind::Io)?;
        let mut buffer = String::new();
        f.read_to_string(&mut buffer)
            .with_context(|_| ErrorKind::Io)?;

        for line in buffer.lines() {
            self.notify_completed_jobs();
            let action = self.execute_command_string(line)?;
            if action == Action::Exit {
                break;
            }
        }

        Ok(())
    }

    /// Runs commands from stdin until EOF or `exit` is received.
    pub fn execute_from_stdin(&mut self) {
        loop {
            self.notify_completed_jobs();

            let input = match self.editor.readline(PROMPT) {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    error!("failed to read input: {}", e);
                    eprintln!("mysh: {}", e);
                    break;
                }
            };

            self.notify_completed_jobs();
            match self.execute_command_string(&input) {
                Ok(Action::Exit) => break,
                Ok(Action::Continue) => {}
                temp_result => log_if_err!(temp_result, "execute_command_string"),
            }
        }
    }

    /// Reports what has already finished and forgets the rest. Background
    /// children that are still running are left alone.
    fn shutdown(&mut self) {
        self.notify_completed_jobs();
        if !self.jobs.is_empty() {
            info!("{} background jobs still running at exit", self.jobs.len());
        }
        self.jobs.clear();
    }

    /// Exit the shell with `status`.
    pub fn exit(&mut self, status: ExitStatus) -> ! {
        self.shutdown();
        if self.config.display_messages {
            println!("exit");
        }

        info!("mysh has shut down");
        process::exit(status.code().unwrap_or(1));
    }
}

impl fmt::Debug for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?} jobs", self.editor, self.jobs.len())
    }
}
