//! mysh builtins
//!
//! Commands the shell runs itself instead of forking. They only apply to a
//! command without a pipeline; redirections and `&` on a builtin are ignored.

use crate::errors::Result;

use self::dirs::Cd;
use self::exit::{Exit, Quit};

mod dirs;
mod exit;

const CD_NAME: &str = "cd";
const EXIT_NAME: &str = "exit";
const QUIT_NAME: &str = "quit";

/// What the control loop does after a line has been handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Continue,
    Exit,
}

/// Represents a mysh builtin command such as cd or exit.
pub trait BuiltinCommand {
    /// The NAME of the command.
    const NAME: &'static str;
    /// Runs the command with the given arguments.
    fn run<T: AsRef<str>>(args: &[T]) -> Result<Action>;
}

pub fn is_builtin<T: AsRef<str>>(program: T) -> bool {
    [CD_NAME, EXIT_NAME, QUIT_NAME].contains(&program.as_ref())
}

/// precondition: `program` is a builtin.
pub fn run<S1, S2>(program: S1, args: &[S2]) -> Result<Action>
where
    S1: AsRef<str>,
    S2: AsRef<str>,
{
    debug_assert!(is_builtin(&program));

    match program.as_ref() {
        CD_NAME => Cd::run(args),
        EXIT_NAME => Exit::run(args),
        QUIT_NAME => Quit::run(args),
        _ => unreachable!(),
    }
}
