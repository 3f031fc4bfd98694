//! Error module. See the [failure](https://crates.io/crates/failure) crate for details.

use std::fmt;
use std::result;

use failure::{Backtrace, Context, Fail};

pub type Result<T> = result::Result<T, Error>;

#[derive(Debug)]
pub struct Error {
    ctx: Context<ErrorKind>,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.ctx.get_context()
    }

    pub(crate) fn syntax(error: SyntaxError) -> Error {
        Error::from(ErrorKind::Syntax(error))
    }

    pub(crate) fn builtin_command<T: AsRef<str>>(message: T, code: i32) -> Error {
        Error::from(ErrorKind::BuiltinCommand {
            message: message.as_ref().to_string(),
            code,
        })
    }
}

impl Fail for Error {
    fn cause(&self) -> Option<&dyn Fail> {
        self.ctx.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.ctx.backtrace()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ctx.cause() {
            Some(cause) => write!(f, "{}: {}", self.ctx, cause),
            None => fmt::Display::fmt(&self.ctx, f),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Syntax(SyntaxError),
    BuiltinCommand { message: String, code: i32 },
    /// The SIGCHLD notification pipe or handler could not be set up.
    ReapChannel,
    Fork,
    Pipe,
    Wait,
    Io,
    Nix,
    Readline,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ErrorKind::Syntax(ref error) => write!(f, "{}", error),
            ErrorKind::BuiltinCommand { ref message, .. } => write!(f, "{}", message),
            ErrorKind::ReapChannel => write!(f, "failed to set up child reaping"),
            ErrorKind::Fork => write!(f, "fork failed"),
            ErrorKind::Pipe => write!(f, "pipe failed"),
            ErrorKind::Wait => write!(f, "waitpid failed"),
            ErrorKind::Io => write!(f, "I/O error occurred"),
            ErrorKind::Nix => write!(f, "Nix error occurred"),
            ErrorKind::Readline => write!(f, "Readline error occurred"),
        }
    }
}

/// Reasons a line of input is rejected by the parser.
///
/// The `Display` text of each variant is the message shown to the user.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyntaxError {
    /// `<` without a following filename.
    NearInput,
    /// `>` without a following filename.
    NearOutput,
    /// `>>` without a following filename.
    NearAppend,
    /// `|` at the start or end of the line.
    NearPipe,
    /// A line made of nothing but `&`.
    NearBackground,
    BackgroundNotAtEnd,
    OnlyOnePipe,
    EmptyCommand,
    OutOfMemory,
    TokenizeFailed,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match *self {
            SyntaxError::NearInput => "syntax error near <",
            SyntaxError::NearOutput => "syntax error near >",
            SyntaxError::NearAppend => "syntax error near >>",
            SyntaxError::NearPipe => "syntax error near |",
            SyntaxError::NearBackground => "syntax error near &",
            SyntaxError::BackgroundNotAtEnd => "& must be at end of line",
            SyntaxError::OnlyOnePipe => "only one pipe supported",
            SyntaxError::EmptyCommand => "empty command",
            SyntaxError::OutOfMemory => "out of memory",
            SyntaxError::TokenizeFailed => "tokenize failed",
        };
        f.write_str(message)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error::from(Context::new(kind))
    }
}

impl From<Context<ErrorKind>> for Error {
    fn from(ctx: Context<ErrorKind>) -> Error {
        Error { ctx }
    }
}
