//! Lexer (tokenizer) for the netlist DSL.

use crate::error::{Result, SimError};

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The token's text
    pub text: String,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
}

/// Token types in the DSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// An identifier (element name, node name, etc.)
    Identifier,
    /// Anything starting with a digit or sign, e.g. `10k`, `-12`, `1e-9`, `3`
    Number,
    /// A directive (starts with '.')
    Directive,
    /// Open parenthesis '('
    OpenParen,
    /// Close parenthesis ')'
    CloseParen,
    /// Equals sign '='
    Equals,
    /// Newline
    Newline,
    /// End of file
    Eof,
}

/// Lexer for tokenizing netlist input.
pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input.
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace_and_comments();

        let line = self.line;
        let column = self.column;
        let token = |kind, text: String| Token {
            kind,
            text,
            line,
            column,
        };

        let ch = match self.chars.peek().copied() {
            Some(ch) => ch,
            None => return Ok(token(TokenKind::Eof, String::new())),
        };

        let tok = match ch {
            '\n' => {
                self.advance();
                token(TokenKind::Newline, "\n".to_string())
            }
            '.' => {
                self.advance();
                let name = self.read_identifier();
                if name.is_empty() {
                    return Err(SimError::lexer(line, column, "expected directive name after '.'"));
                }
                token(TokenKind::Directive, format!(".{}", name))
            }
            '(' => {
                self.advance();
                token(TokenKind::OpenParen, "(".to_string())
            }
            ')' => {
                self.advance();
                token(TokenKind::CloseParen, ")".to_string())
            }
            '=' => {
                self.advance();
                token(TokenKind::Equals, "=".to_string())
            }
            '-' | '+' | '0'..='9' => token(TokenKind::Number, self.read_number()),
            _ if ch.is_alphabetic() || ch == '_' => {
                token(TokenKind::Identifier, self.read_identifier())
            }
            _ => {
                let message = format!("unexpected character '{}'", ch);
                return Err(SimError::lexer(line, column, message));
            }
        };

        Ok(tok)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(&ch) = self.chars.peek() {
            if ch == ' ' || ch == '\t' || ch == '\r' {
                self.advance();
            } else if ch == '#' || ch == ';' {
                // Skip comment until end of line
                while let Some(&c) = self.chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut text = String::new();
        while let Some(&ch) = self.chars.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        text
    }

    /// Sign, then everything up to the next separator. An exponent sign is
    /// kept when it follows `e`/`E`.
    fn read_number(&mut self) -> String {
        let mut text = String::new();

        if let Some(&ch) = self.chars.peek() {
            if ch == '-' || ch == '+' {
                text.push(ch);
                self.advance();
            }
        }

        while let Some(&ch) = self.chars.peek() {
            let exponent_sign =
                (ch == '-' || ch == '+') && (text.ends_with('e') || text.ends_with('E'));
            if ch.is_alphanumeric() || ch == '.' || ch == '_' || exponent_sign {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        text
    }
}

/// Length of the leading decimal number in `text`, exponent included.
fn numeric_prefix_len(text: &str) -> usize {
    let b = text.as_bytes();
    let mut i = 0;
    if i < b.len() && (b[i] == b'-' || b[i] == b'+') {
        i += 1;
    }
    let digits_start = i;
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
    }
    if i < b.len() && b[i] == b'.' {
        i += 1;
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i == digits_start {
        return 0;
    }
    if i < b.len() && (b[i] == b'e' || b[i] == b'E') {
        let mut j = i + 1;
        if j < b.len() && (b[j] == b'-' || b[j] == b'+') {
            j += 1;
        }
        if j < b.len() && b[j].is_ascii_digit() {
            while j < b.len() && b[j].is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }
    i
}

/// Parse a number with an optional scale suffix and unit.
///
/// Suffixes: f p n u m k M G, plus `meg`. Letters after the suffix are
/// taken as a unit and ignored, so `100nF` and `12V` both parse.
pub fn parse_value(text: &str) -> Option<f64> {
    let text = text.trim();
    let (num, tail) = text.split_at(numeric_prefix_len(text));
    if num.is_empty() || !tail.chars().all(char::is_alphabetic) {
        return None;
    }

    let multiplier = if tail.get(..3).is_some_and(|s| s.eq_ignore_ascii_case("meg")) {
        1e6
    } else {
        match tail.chars().next() {
            Some('f') => 1e-15,
            Some('p') => 1e-12,
            Some('n') => 1e-9,
            Some('u') | Some('µ') => 1e-6,
            Some('m') => 1e-3,
            Some('k') | Some('K') => 1e3,
            Some('M') => 1e6,
            Some('G') => 1e9,
            _ => 1.0,
        }
    };

    num.parse::<f64>().ok().map(|v| v * multiplier)
}
