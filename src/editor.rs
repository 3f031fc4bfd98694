use std::fmt;
use std::io::{self, BufRead, BufReader};

use failure::{Fail, ResultExt};
use log::debug;
use rustyline::{
    self,
    completion::{Completer, FilenameCompleter, Pair},
    error::ReadlineError,
    highlight::Highlighter,
    hint::Hinter,
    validate::Validator,
    CompletionType, Config, Helper,
};

use crate::errors::{ErrorKind, Result};

struct EditorHelper(FilenameCompleter);

impl Completer for EditorHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        ctx: &rustyline::Context<'_>,
    ) -> ::std::result::Result<(usize, Vec<Pair>), ReadlineError> {
        self.0.complete(line, pos, ctx)
    }
}

impl Hinter for EditorHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        None
    }
}

impl Highlighter for EditorHelper {}

impl Helper for EditorHelper {}

impl Validator for EditorHelper {}

enum Input {
    /// Line editing on a terminal.
    Terminal(rustyline::Editor<EditorHelper>),
    /// Plain lines from a pipe or file, no prompt.
    Stream(Box<dyn BufRead>),
}

/// Source of input lines for the control loop.
pub struct Editor {
    input: Input,
}

impl Editor {
    /// Reads from stdin, with line editing if `interactive`.
    pub fn new(interactive: bool) -> Editor {
        if !interactive {
            return Editor::from_reader(BufReader::new(io::stdin()));
        }

        let config = Config::builder()
            .completion_type(CompletionType::Circular)
            .build();
        let mut internal = rustyline::Editor::with_config(config);
        internal.set_helper(Some(EditorHelper(FilenameCompleter::new())));
        Editor {
            input: Input::Terminal(internal),
        }
    }

    pub fn from_reader<R: BufRead + 'static>(reader: R) -> Editor {
        Editor {
            input: Input::Stream(Box::new(reader)),
        }
    }

    /// Returns the next line without its line terminator, or `None` at end of
    /// input. An interrupted line comes back empty.
    pub fn readline(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.input {
            Input::Terminal(ref mut internal) => match internal.readline(prompt) {
                Ok(line) => Ok(Some(line)),
                Err(ReadlineError::Eof) => Ok(None),
                Err(ReadlineError::Interrupted) => {
                    debug!("line discarded by interrupt");
                    Ok(Some(String::new()))
                }
                Err(e) => Err(e.context(ErrorKind::Readline).into()),
            },
            Input::Stream(ref mut reader) => {
                let mut line = String::new();
                if reader.read_line(&mut line).context(ErrorKind::Io)? == 0 {
                    return Ok(None);
                }
                if line.ends_with('\n') {
                    line.pop();
                }
                Ok(Some(line))
            }
        }
    }
}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.input {
            Input::Terminal(_) => write!(f, "Editor(terminal)"),
            Input::Stream(_) => write!(f, "Editor(stream)"),
        }
    }
}
