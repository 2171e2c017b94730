use crate::number::{self, Number};
use crate::prelude::*;
use std::{fmt, rc::Rc};
use variantly::Variantly;

/// A parsed, immutable piece of syntax.
///
/// Forms are what the parser hands to the evaluator; runtime results are
/// [`crate::value::Value`]s.
#[derive(Variantly, Debug, Clone, PartialEq)]
pub enum Form {
    Symbol(String),
    Number(Number),
    Str(String),
    Char(char),
    Bool(bool),
    /// Shared so tail positions can be handed around without deep copies.
    List(Rc<[Form]>),
}

impl Form {
    pub fn sym(s: &str) -> Self {
        Self::Symbol(s.to_owned())
    }

    pub fn int(i: i64) -> Self {
        Self::Number(number::int(i))
    }

    pub fn quote(quoted: Form) -> Self {
        Self::List(Rc::new([Self::sym("quote"), quoted]))
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Self::Symbol(s) => Some(s),
            _ => None,
        }
    }
}

/// Writes a string literal the way the lexer reads it back.
pub(crate) fn write_escaped(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            '\0' => f.write_str("\\0")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

pub(crate) fn write_char(f: &mut fmt::Formatter<'_>, c: char) -> fmt::Result {
    match c {
        ' ' => f.write_str("#\\space"),
        '\n' => f.write_str("#\\newline"),
        '\t' => f.write_str("#\\tab"),
        '\0' => f.write_str("#\\nul"),
        c => write!(f, "#\\{c}"),
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Form::Symbol(s) => f.write_str(s),
            Form::Number(n) => write!(f, "{n}"),
            Form::Str(s) => write_escaped(f, s),
            Form::Char(c) => write_char(f, *c),
            Form::Bool(true) => f.write_str("#t"),
            Form::Bool(false) => f.write_str("#f"),
            Form::List(l) => write!(f, "({})", l.iter().join(" ")),
        }
    }
}

/// Creates a [`Form::List`] like `vec!`.
///
/// ```
/// # use reel::expr::{form_list, Form};
/// let l = form_list![Form::sym("+"), Form::int(1)].unwrap_list();
/// assert_eq!(l[0], Form::sym("+"));
/// assert_eq!(l[1], Form::int(1));
/// ```
#[macro_export]
macro_rules! form_list {
    [] => (
        $crate::expr::Form::List(::std::rc::Rc::from(::std::vec::Vec::new()))
    );
    [$($x:expr),+ $(,)?] => (
        $crate::expr::Form::List(::std::rc::Rc::from(vec![$($x),+]))
    );
}

pub use form_list;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_as_source() {
        let form = form_list![
            Form::sym("list"),
            Form::Str("a\"b".to_owned()),
            Form::Char(' '),
            Form::Bool(false),
            Form::Number(number::ratio(1, 3)),
            form_list![],
        ];
        assert_eq!(form.to_string(), r#"(list "a\"b" #\space #f 1/3 ())"#);
    }

    #[test]
    fn quote_wraps() {
        assert_eq!(
            Form::quote(Form::sym("x")),
            form_list![Form::sym("quote"), Form::sym("x")]
        );
    }
}
