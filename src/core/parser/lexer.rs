use crate::errors::SyntaxError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Word(String),
    /// `<`
    Input,
    /// `>`
    Output,
    /// `>>`
    Append,
    /// `|`
    Pipe,
    /// `&`
    Background,
}

/// Matches C `isspace`: space, `\t`, `\n`, `\v`, `\f` and `\r`.
pub fn is_blank(c: char) -> bool {
    c.is_ascii_whitespace() || c == '\x0b'
}

fn is_operator(c: char) -> bool {
    c == '<' || c == '>' || c == '|' || c == '&'
}

/// Splits `line` into words and single-character operators. `>>` is the only
/// two-character operator. There is no quoting or escaping.
pub fn tokenize(line: &str) -> Result<Vec<Token>, SyntaxError> {
    // A NUL byte can never reach execvp(3) intact.
    if line.contains('\0') {
        return Err(SyntaxError::TokenizeFailed);
    }

    let mut tokens = Vec::new();
    let mut chars = line.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        if is_blank(c) {
            chars.next();
            continue;
        }

        if is_operator(c) {
            chars.next();
            let token = match c {
                '<' => Token::Input,
                '>' => {
                    if let Some(&(_, '>')) = chars.peek() {
                        chars.next();
                        Token::Append
                    } else {
                        Token::Output
                    }
                }
                '|' => Token::Pipe,
                _ => Token::Background,
            };
            tokens.push(token);
            continue;
        }

        let mut end = line.len();
        while let Some(&(i, c)) = chars.peek() {
            if is_blank(c) || is_operator(c) {
                end = i;
                break;
            }
            chars.next();
        }
        tokens.push(Token::Word(line[start..end].to_string()));
    }

    Ok(tokens)
}
