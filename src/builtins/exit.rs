use super::{Action, BuiltinCommand, EXIT_NAME, QUIT_NAME};
use crate::errors::Result;

/// `exit`: arguments are ignored, the shell always exits 0.
pub struct Exit;

impl BuiltinCommand for Exit {
    const NAME: &'static str = EXIT_NAME;

    fn run<T: AsRef<str>>(_args: &[T]) -> Result<Action> {
        Ok(Action::Exit)
    }
}

/// `quit`: same as `exit`.
pub struct Quit;

impl BuiltinCommand for Quit {
    const NAME: &'static str = QUIT_NAME;

    fn run<T: AsRef<str>>(_args: &[T]) -> Result<Action> {
        Ok(Action::Exit)
    }
}
