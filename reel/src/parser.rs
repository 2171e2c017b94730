// "Any sufficiently complicated C or Fortran program contains an ad hoc, informally-specified, bug-ridden, slow implementation of half of Common Lisp."
// - Peter Greenspun
use crate::{
    expr::Form,
    lexer::{LexError, Lexer, Pos, Token, TokenKind},
};
use thiserror::Error;

/// Enum representing parser errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The submission stopped in the middle of a form; more input may finish it.
    #[error("input ended inside an unfinished form")]
    Closing,
    #[error(transparent)]
    Syntax(LexError),
    #[error("{0}: quote must be followed by a datum")]
    DanglingQuote(Pos),
    #[error("unexpected tokens after the expression")]
    UnexpectedTokens,
    #[error("unexpected end of input")]
    UnexpectedEOF,
}

impl From<LexError> for ParseError {
    fn from(value: LexError) -> Self {
        match value {
            LexError::Incomplete => Self::Closing,
            other => Self::Syntax(other),
        }
    }
}

impl ParseError {
    pub fn is_closing(&self) -> bool {
        matches!(self, Self::Closing)
    }
}

/// Lazy stream of top-level forms.
///
/// Each call to `next` pulls only the tokens of one form, so a form can be
/// evaluated before the text after it has even been lexed. The stream ends
/// after the first error.
pub struct Parser<'src> {
    tokens: Lexer<'src>,
    done: bool,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            tokens: Lexer::new(source),
            done: false,
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        match self.tokens.next() {
            Some(token) => Ok(token?),
            None => Err(ParseError::Closing),
        }
    }

    /// Parses the form that starts with `token`.
    fn parse_from(&mut self, token: Token) -> Result<Form, ParseError> {
        let pos = token.pos;
        Ok(match token.kind {
            TokenKind::Symbol(s) => Form::Symbol(s),
            TokenKind::Number(n) => Form::Number(n),
            TokenKind::Str(s) => Form::Str(s),
            TokenKind::Char(c) => Form::Char(c),
            TokenKind::Bool(b) => Form::Bool(b),
            TokenKind::Open(_) => {
                let mut list = vec![];
                loop {
                    let next = self.next_token()?;
                    if let TokenKind::Close(_) = next.kind {
                        break Form::List(list.into());
                    }
                    list.push(self.parse_from(next)?);
                }
            }
            TokenKind::Quote => {
                let next = self.next_token()?;
                match next.kind {
                    TokenKind::Eof => return Err(ParseError::Closing),
                    TokenKind::Close(_) => return Err(ParseError::DanglingQuote(pos)),
                    _ => Form::quote(self.parse_from(next)?),
                }
            }
            TokenKind::Close(found) => {
                return Err(ParseError::Syntax(LexError::UnexpectedClose { found, pos }))
            }
            TokenKind::Eof => return Err(ParseError::UnexpectedEOF),
        })
    }
}

impl Iterator for Parser<'_> {
    type Item = Result<Form, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = match self.next_token() {
            Ok(Token {
                kind: TokenKind::Eof,
                ..
            }) => {
                self.done = true;
                return None;
            }
            Ok(token) => self.parse_from(token),
            Err(e) => Err(e),
        };
        self.done = result.is_err();
        Some(result)
    }
}

/// Parses a buffer without keeping the forms, reporting the first error.
/// The REPL uses this to find out whether a submission is still open.
pub fn probe(source: &str) -> Result<(), ParseError> {
    Parser::new(source).try_for_each(|form| form.map(drop))
}

/// Parses exactly one form.
pub fn parse_expr(source: &str) -> Result<Form, ParseError> {
    let mut parser = Parser::new(source);
    let exp = parser.next().ok_or(ParseError::UnexpectedEOF)??;
    if parser.next().is_some() {
        return Err(ParseError::UnexpectedTokens);
    }
    Ok(exp)
}

pub fn parse_script(source: &str) -> Result<Vec<Form>, ParseError> {
    Parser::new(source).collect()
}
