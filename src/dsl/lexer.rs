//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Piper.
//! The Piper project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

//! # Piper DSL Lexer Module
//!
//! Turns script text into a token stream with source positions. Keywords are
//! not distinguished here; `true`, `from`, `and` and the rest arrive as
//! identifiers and the parser decides what they mean in context. `#` starts
//! a comment running to end of line.

use crate::errors::{PiperError, Result};

/// The kind of one token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int(i64),
    Double(f64),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Pipe,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Eof,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Ident(name) => write!(f, "'{}'", name),
            TokenKind::Int(v) => write!(f, "'{}'", v),
            TokenKind::Double(v) => write!(f, "'{}'", v),
            TokenKind::Str(_) => write!(f, "string literal"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::LBracket => write!(f, "'['"),
            TokenKind::RBracket => write!(f, "']'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Semicolon => write!(f, "';'"),
            TokenKind::Pipe => write!(f, "'|'"),
            TokenKind::Assign => write!(f, "'='"),
            TokenKind::Plus => write!(f, "'+'"),
            TokenKind::Minus => write!(f, "'-'"),
            TokenKind::Star => write!(f, "'*'"),
            TokenKind::Slash => write!(f, "'/'"),
            TokenKind::Eq => write!(f, "'=='"),
            TokenKind::Ne => write!(f, "'!='"),
            TokenKind::Gt => write!(f, "'>'"),
            TokenKind::Lt => write!(f, "'<'"),
            TokenKind::Ge => write!(f, "'>='"),
            TokenKind::Le => write!(f, "'<='"),
            TokenKind::Eof => write!(f, "end of script"),
        }
    }
}

/// One token with its source position, 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

/// Tokenizes a whole script. Returns the token stream terminated by one Eof
/// token, or the first syntax error found.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn run(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            // Skip whitespace and comments between tokens.
            while let Some(c) = self.peek() {
                if c.is_whitespace() {
                    self.bump();
                } else if c == '#' {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                } else {
                    break;
                }
            }

            let (line, column) = (self.line, self.column);
            let c = match self.peek() {
                Some(c) => c,
                None => {
                    tokens.push(Token {
                        kind: TokenKind::Eof,
                        line,
                        column,
                    });
                    return Ok(tokens);
                }
            };

            let kind = if c.is_ascii_alphabetic() || c == '_' {
                self.ident()
            } else if c.is_ascii_digit() {
                self.number(line, column)?
            } else if c == '"' {
                self.string(line, column)?
            } else {
                self.bump();
                match c {
                    '(' => TokenKind::LParen,
                    ')' => TokenKind::RParen,
                    '[' => TokenKind::LBracket,
                    ']' => TokenKind::RBracket,
                    ',' => TokenKind::Comma,
                    ';' => TokenKind::Semicolon,
                    '|' => TokenKind::Pipe,
                    '+' => TokenKind::Plus,
                    '-' => TokenKind::Minus,
                    '*' => TokenKind::Star,
                    '/' => TokenKind::Slash,
                    '=' => {
                        if self.peek() == Some('=') {
                            self.bump();
                            TokenKind::Eq
                        } else {
                            TokenKind::Assign
                        }
                    }
                    '!' => {
                        if self.peek() == Some('=') {
                            self.bump();
                            TokenKind::Ne
                        } else {
                            return Err(PiperError::syntax(
                                line,
                                column,
                                "unexpected character '!'",
                            ));
                        }
                    }
                    '>' => {
                        if self.peek() == Some('=') {
                            self.bump();
                            TokenKind::Ge
                        } else {
                            TokenKind::Gt
                        }
                    }
                    '<' => {
                        if self.peek() == Some('=') {
                            self.bump();
                            TokenKind::Le
                        } else {
                            TokenKind::Lt
                        }
                    }
                    other => {
                        return Err(PiperError::syntax(
                            line,
                            column,
                            format!("unexpected character '{}'", other),
                        ));
                    }
                }
            };
            tokens.push(Token { kind, line, column });
        }
    }

    fn ident(&mut self) -> TokenKind {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        TokenKind::Ident(name)
    }

    fn number(&mut self, line: usize, column: usize) -> Result<TokenKind> {
        let mut text = String::new();
        let mut is_double = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else if c == '.' && !is_double {
                is_double = true;
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if is_double {
            text.parse::<f64>()
                .map(TokenKind::Double)
                .map_err(|_| PiperError::syntax(line, column, format!("invalid number '{}'", text)))
        } else {
            text.parse::<i64>()
                .map(TokenKind::Int)
                .map_err(|_| PiperError::syntax(line, column, format!("invalid number '{}'", text)))
        }
    }

    fn string(&mut self, line: usize, column: usize) -> Result<TokenKind> {
        self.bump(); // opening quote
        let mut text = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(PiperError::syntax(line, column, "unterminated string"));
                }
                Some('"') => return Ok(TokenKind::Str(text)),
                Some('\\') => match self.bump() {
                    Some('"') => text.push('"'),
                    Some('\\') => text.push('\\'),
                    Some('n') => text.push('\n'),
                    Some('r') => text.push('\r'),
                    Some('t') => text.push('\t'),
                    other => {
                        return Err(PiperError::syntax(
                            self.line,
                            self.column,
                            format!(
                                "invalid escape '\\{}'",
                                other.map(String::from).unwrap_or_default()
                            ),
                        ));
                    }
                },
                Some(c) => text.push(c),
            }
        }
    }
}
