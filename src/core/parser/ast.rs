use std::iter;

/// One line of input, ready to be handed to the supervisor.
///
/// A pipeline is at most two stages: `pipe_to` holds the right-hand side and,
/// being a plain [`Stage`], cannot itself be piped any further.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    /// The command (or the left-hand side of a pipeline).
    pub stage: Stage,
    /// The right-hand side of `stage | ...`, if any.
    pub pipe_to: Option<Stage>,
    /// Set by a trailing `&`; applies to the whole pipeline.
    pub background: bool,
    /// The trimmed input line, used when reporting completions.
    pub line: String,
}

impl Command {
    pub fn is_pipeline(&self) -> bool {
        self.pipe_to.is_some()
    }

    /// Name of the program run by the first stage.
    pub fn program(&self) -> &str {
        self.stage.program()
    }
}

/// A single program invocation with its own redirections.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stage {
    /// Never empty.
    pub argv: Vec<String>,
    pub input: Option<String>,
    pub output: Option<OutputRedirect>,
}

impl Stage {
    /// Builds a stage without redirections.
    ///
    /// # Panics
    /// Panics if `program` is empty.
    pub fn new<S1, S2>(program: S1, args: &[S2]) -> Stage
    where
        S1: AsRef<str>,
        S2: AsRef<str>,
    {
        assert!(!program.as_ref().is_empty(), "program must not be empty");
        Stage {
            argv: iter::once(program.as_ref().to_string())
                .chain(args.iter().map(|arg| arg.as_ref().to_string()))
                .collect(),
            input: None,
            output: None,
        }
    }

    pub fn with_input<S: Into<String>>(self, path: S) -> Stage {
        Stage {
            input: Some(path.into()),
            ..self
        }
    }

    pub fn with_output<S: Into<String>>(self, path: S, mode: OutputMode) -> Stage {
        Stage {
            output: Some(OutputRedirect {
                path: path.into(),
                mode,
            }),
            ..self
        }
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputRedirect {
    pub path: String,
    pub mode: OutputMode,
}

/// `>` truncates, `>>` appends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    Truncate,
    Append,
}
