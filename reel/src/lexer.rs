use crate::number::{self, Number};
use std::{fmt, str::Chars};
use thiserror::Error;

/// Line and column of a token, both starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub line: usize,
    pub col: usize,
}

impl Default for Pos {
    fn default() -> Self {
        Self { line: 1, col: 1 }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// `(` or `[`
    Open(char),
    /// `)` or `]`
    Close(char),
    Symbol(String),
    Number(Number),
    Str(String),
    Char(char),
    Bool(bool),
    /// '
    Quote,
    Eof,
}

impl TokenKind {
    pub fn sym(s: &str) -> Self {
        Self::Symbol(s.to_owned())
    }

    pub fn int(i: i64) -> Self {
        Self::Number(number::int(i))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub pos: Pos,
}

/// Errors raised while splitting source text into tokens.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    /// Input ended inside a list, string, character or block comment.
    /// More text may complete it.
    #[error("input ended inside an unfinished form")]
    Incomplete,
    #[error("{pos}: unexpected '{found}'")]
    UnexpectedClose { found: char, pos: Pos },
    #[error("{pos}: expected '{expected}' but found '{found}'")]
    Mismatched {
        expected: char,
        found: char,
        pos: Pos,
    },
    #[error("{pos}: unknown escape sequence '\\{found}'")]
    BadEscape { found: char, pos: Pos },
    #[error("{pos}: malformed number literal '{lexeme}'")]
    BadNumber { lexeme: String, pos: Pos },
    #[error("{pos}: unknown character name '{name}'")]
    BadChar { name: String, pos: Pos },
    #[error("{pos}: unknown literal '{lexeme}'")]
    BadHash { lexeme: String, pos: Pos },
}

fn closer(open: char) -> char {
    if open == '[' {
        ']'
    } else {
        ')'
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | '"' | ';' | '\'')
}

/// Lazy tokenizer over a source buffer.
///
/// Tracks the stack of open delimiters so that reaching the end of input
/// inside a list reports [`LexError::Incomplete`] instead of a hard error.
/// The iterator ends after the first error or after yielding [`TokenKind::Eof`].
pub struct Lexer<'src> {
    source: &'src str,
    chars: Chars<'src>,
    pos: Pos,
    open: Vec<char>,
    done: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            chars: source.chars(),
            pos: Pos::default(),
            open: vec![],
            done: false,
        }
    }

    /// Current delimiter nesting depth.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    fn offset(&self) -> usize {
        self.source.len() - self.chars.as_str().len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.chars.clone().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.pos.line += 1;
            self.pos.col = 1;
        } else {
            self.pos.col += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some(';') => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                Some('#') if self.peek_second() == Some('|') => self.skip_block_comment()?,
                _ => return Ok(()),
            }
        }
    }

    /// Block comments nest: `#| a #| b |# c |#`.
    fn skip_block_comment(&mut self) -> Result<(), LexError> {
        self.bump();
        self.bump();
        let mut nesting = 1;
        while nesting > 0 {
            match self.bump().ok_or(LexError::Incomplete)? {
                '|' if self.peek() == Some('#') => {
                    self.bump();
                    nesting -= 1;
                }
                '#' if self.peek() == Some('|') => {
                    self.bump();
                    nesting += 1;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn read_while(&mut self, keep: fn(char) -> bool) {
        while self.peek().is_some_and(keep) {
            self.bump();
        }
    }

    /// A `#` literal cut off by the end of input inside a list may still be
    /// completed by the next line.
    fn pending_or(&self, err: LexError) -> LexError {
        if self.peek().is_none() && !self.open.is_empty() {
            LexError::Incomplete
        } else {
            err
        }
    }

    fn lex_string(&mut self) -> Result<TokenKind, LexError> {
        let mut content = String::new();
        loop {
            let pos = self.pos;
            match self.bump().ok_or(LexError::Incomplete)? {
                '"' => return Ok(TokenKind::Str(content)),
                '\\' => {
                    let escaped = self.bump().ok_or(LexError::Incomplete)?;
                    content.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        '\\' => '\\',
                        '"' => '"',
                        found => return Err(LexError::BadEscape { found, pos }),
                    });
                }
                c => content.push(c),
            }
        }
    }

    /// Everything starting with `#`: characters, booleans.
    fn lex_hash(&mut self, start: usize, pos: Pos) -> Result<TokenKind, LexError> {
        if self.peek() == Some('\\') {
            self.bump();
            let first = self.bump().ok_or(LexError::Incomplete)?;
            let name_start = self.offset();
            if first.is_alphabetic() {
                self.read_while(char::is_alphanumeric);
            }
            let rest = &self.source[name_start..self.offset()];
            if rest.is_empty() {
                return Ok(TokenKind::Char(first));
            }
            let name = format!("{first}{rest}");
            return Ok(TokenKind::Char(match name.as_str() {
                "space" => ' ',
                "newline" => '\n',
                "tab" => '\t',
                "nul" => '\0',
                _ => return Err(LexError::BadChar { name, pos }),
            }));
        }
        self.read_while(|c| !is_delimiter(c));
        let lexeme = &self.source[start..self.offset()];
        match lexeme {
            "#t" | "#true" => Ok(TokenKind::Bool(true)),
            "#f" | "#false" => Ok(TokenKind::Bool(false)),
            _ => Err(LexError::BadHash {
                lexeme: lexeme.to_owned(),
                pos,
            }),
        }
    }

    fn lex_atom(&mut self, start: usize, pos: Pos) -> Result<TokenKind, LexError> {
        self.read_while(|c| !is_delimiter(c));
        let lexeme = &self.source[start..self.offset()];
        if !number::looks_numeric(lexeme) {
            return Ok(TokenKind::sym(lexeme));
        }
        number::parse_number(lexeme)
            .map(TokenKind::Number)
            .ok_or_else(|| LexError::BadNumber {
                lexeme: lexeme.to_owned(),
                pos,
            })
    }

    fn lex_token(&mut self) -> Result<Token, LexError> {
        self.skip_trivia()?;
        let pos = self.pos;
        let start = self.offset();
        let Some(c) = self.bump() else {
            if !self.open.is_empty() {
                return Err(LexError::Incomplete);
            }
            return Ok(Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                pos,
            });
        };
        let kind = match c {
            '(' | '[' => {
                self.open.push(c);
                TokenKind::Open(c)
            }
            ')' | ']' => match self.open.last().copied() {
                None => return Err(LexError::UnexpectedClose { found: c, pos }),
                Some(open) if closer(open) != c => {
                    return Err(LexError::Mismatched {
                        expected: closer(open),
                        found: c,
                        pos,
                    })
                }
                Some(_) => {
                    self.open.pop();
                    TokenKind::Close(c)
                }
            },
            '\'' => TokenKind::Quote,
            '"' => self.lex_string()?,
            '#' => self
                .lex_hash(start, pos)
                .map_err(|e| self.pending_or(e))?,
            _ => self.lex_atom(start, pos)?,
        };
        Ok(Token {
            kind,
            lexeme: self.source[start..self.offset()].to_owned(),
            pos,
        })
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let token = self.lex_token();
        self.done = matches!(
            token,
            Err(_)
                | Ok(Token {
                    kind: TokenKind::Eof,
                    ..
                })
        );
        Some(token)
    }
}

/// Eagerly tokenizes a whole buffer, without the trailing [`TokenKind::Eof`].
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source)
        .filter(|t| !matches!(t, Ok(Token { kind: TokenKind::Eof, .. })))
        .collect()
}
