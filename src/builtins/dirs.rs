use std::path::PathBuf;

use log::debug;
use nix::unistd;

use super::{Action, BuiltinCommand, CD_NAME};
use crate::errors::{Error, Result};

/// `cd [dir]`: change the working directory, defaulting to the home directory.
pub struct Cd;

impl BuiltinCommand for Cd {
    const NAME: &'static str = CD_NAME;

    fn run<T: AsRef<str>>(args: &[T]) -> Result<Action> {
        let dir = match args.get(0).map(AsRef::as_ref) {
            Some("") | None => {
                ::dirs::home_dir().ok_or_else(|| Error::builtin_command("cd: HOME not set", 1))?
            }
            Some(dir) => PathBuf::from(dir),
        };

        unistd::chdir(&dir).map_err(|e| {
            Error::builtin_command(format!("cd: {}: {}", dir.display(), e.desc()), 1)
        })?;
        debug!("changed directory to {}", dir.display());
        Ok(Action::Continue)
    }
}
