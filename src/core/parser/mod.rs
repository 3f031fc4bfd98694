//! mysh Parser
//!
//! Grammar: `cmd args... [< infile] [> outfile | >> outfile] [| cmd2 args... [redir]] [&]`

use log::debug;

pub use self::ast::{Command, OutputMode, OutputRedirect, Stage};
use self::lexer::Token;
use crate::errors::{Error, Result, SyntaxError};

pub mod ast;
pub mod lexer;

impl Command {
    /// Parses one line of input.
    ///
    /// Returns `Ok(None)` for a blank line, which is not an error worth
    /// reporting.
    ///
    /// # Examples
    ///
    /// ```
    /// use mysh::core::parser::{Command, OutputMode, Stage};
    ///
    /// let command = Command::parse("sort < names > sorted &\n").unwrap().unwrap();
    /// assert_eq!(command.line, "sort < names > sorted &");
    /// assert!(command.background);
    /// assert_eq!(
    ///     command.stage,
    ///     Stage::new("sort", &[] as &[&str])
    ///         .with_input("names")
    ///         .with_output("sorted", OutputMode::Truncate)
    /// );
    /// ```
    pub fn parse(input: &str) -> Result<Option<Command>> {
        let result = parse_line(input);
        debug!("parsed Command: {:?}", result);
        result.map_err(Error::syntax)
    }
}

/// Same characters C's parser trimmed: space, tab, CR and LF.
fn trim(input: &str) -> &str {
    input.trim_matches(|c| c == ' ' || c == '\t' || c == '\n' || c == '\r')
}

fn parse_line(input: &str) -> std::result::Result<Option<Command>, SyntaxError> {
    let line = trim(input);
    if line.is_empty() {
        return Ok(None);
    }

    let mut tokens = lexer::tokenize(line)?;
    if tokens.is_empty() {
        return Ok(None);
    }

    let background = tokens.last() == Some(&Token::Background);
    if background {
        tokens.pop();
        if tokens.is_empty() {
            return Err(SyntaxError::NearBackground);
        }
    }
    if tokens.contains(&Token::Background) {
        return Err(SyntaxError::BackgroundNotAtEnd);
    }

    let mut pipes = tokens
        .iter()
        .enumerate()
        .filter(|&(_, token)| *token == Token::Pipe)
        .map(|(i, _)| i);
    let pipe_pos = pipes.next();
    if pipes.next().is_some() {
        return Err(SyntaxError::OnlyOnePipe);
    }

    let (stage, pipe_to) = match pipe_pos {
        None => (parse_stage(&tokens)?, None),
        Some(pos) if pos == 0 || pos == tokens.len() - 1 => return Err(SyntaxError::NearPipe),
        Some(pos) => (
            parse_stage(&tokens[..pos])?,
            Some(parse_stage(&tokens[pos + 1..])?),
        ),
    };

    Ok(Some(Command {
        stage,
        pipe_to,
        background,
        line: line.to_string(),
    }))
}

/// Parses the tokens of one side of a pipeline. A repeated redirection
/// replaces the earlier one.
fn parse_stage(tokens: &[Token]) -> std::result::Result<Stage, SyntaxError> {
    let mut argv: Vec<String> = Vec::new();
    argv.try_reserve(tokens.len())
        .map_err(|_| SyntaxError::OutOfMemory)?;
    let mut input = None;
    let mut output = None;

    let mut iter = tokens.iter();
    while let Some(token) = iter.next() {
        match *token {
            Token::Word(ref word) => argv.push(word.clone()),
            Token::Input => {
                input = Some(filename(iter.next()).ok_or(SyntaxError::NearInput)?);
            }
            Token::Output => {
                output = Some(OutputRedirect {
                    path: filename(iter.next()).ok_or(SyntaxError::NearOutput)?,
                    mode: OutputMode::Truncate,
                });
            }
            Token::Append => {
                output = Some(OutputRedirect {
                    path: filename(iter.next()).ok_or(SyntaxError::NearAppend)?,
                    mode: OutputMode::Append,
                });
            }
            // parse_line splits on these before we get here
            Token::Pipe | Token::Background => unreachable!("operator in stage: {:?}", token),
        }
    }

    if argv.is_empty() {
        return Err(SyntaxError::EmptyCommand);
    }

    Ok(Stage {
        argv,
        input,
        output,
    })
}

fn filename(token: Option<&Token>) -> Option<String> {
    match token {
        Some(Token::Word(word)) => Some(word.clone()),
        _ => None,
    }
}
