pub use self::shell::Shell;

mod shell;

/// Policy object to control a Shell's behavior
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    /// Read lines with a line editor and a prompt instead of as a plain stream.
    line_editing: bool,

    /// Determines if some messages (e.g. "exit") should be displayed.
    display_messages: bool,
}

impl ShellConfig {
    /// Creates an interactive shell.
    ///
    /// # Complete List
    /// - Input is read with a line editor showing the `mysh> ` prompt
    /// - Some additional messages are displayed
    pub fn interactive() -> ShellConfig {
        ShellConfig {
            line_editing: true,
            display_messages: true,
        }
    }

    /// Creates a noninteractive shell, e.g. for scripts and `-c`.
    ///
    /// # Complete List
    /// - Input is read line by line with no prompt
    /// - Fewer messages are displayed
    pub fn noninteractive() -> ShellConfig {
        Default::default()
    }
}

impl Default for ShellConfig {
    fn default() -> ShellConfig {
        ShellConfig {
            line_editing: false,
            display_messages: false,
        }
    }
}
