use crate::{
    env::{Env, EnvRef},
    eval,
    expr::Form,
    parser::{self, Parser},
    value::Value,
};
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    ParseErr(#[from] parser::ParseError),
    #[error(transparent)]
    EvalErr(#[from] eval::EvalError),
    #[error(transparent)]
    IOErr(#[from] io::Error),
}

impl Error {
    /// True for the recoverable "input ended inside a form" condition.
    pub fn is_closing(&self) -> bool {
        matches!(self, Self::ParseErr(e) if e.is_closing())
    }

    pub fn exit_code(&self) -> Option<u8> {
        match self {
            Self::EvalErr(eval::EvalError::Signal(eval::Signal::ExitSignal(code))) => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T = Value> = std::result::Result<T, Error>;

/// Lazily evaluates the forms of one submission.
///
/// Each `next` parses one form, evaluates it against the shared scope and
/// yields its value. Forms after the first failure are never parsed or
/// evaluated, while everything before it has already taken effect.
pub struct Interpret<'src> {
    forms: Parser<'src>,
    env: EnvRef,
    done: bool,
}

impl Interpret<'_> {
    /// Like `next`, but first shows `on_form` the form about to be evaluated.
    pub fn step(&mut self, on_form: impl FnOnce(&Form)) -> Option<Result> {
        if self.done {
            return None;
        }
        let result = self.forms.next()?.map_err(Error::from).and_then(|form| {
            on_form(&form);
            Ok(eval::eval(&form, self.env.clone())?)
        });
        self.done = result.is_err();
        Some(result)
    }
}

impl Iterator for Interpret<'_> {
    type Item = Result;

    fn next(&mut self) -> Option<Self::Item> {
        self.step(|_| {})
    }
}

pub fn interpret(env: EnvRef, code: &str) -> Interpret<'_> {
    Interpret {
        forms: Parser::new(code),
        env,
        done: false,
    }
}

/// Evaluates a whole script and returns the value of its last form.
pub fn eval_with_env(code: &str, env: EnvRef) -> Result {
    interpret(env, code).try_fold(Value::Void, |_, val| val)
}

#[derive(Debug)]
pub struct Interpreter {
    env: EnvRef,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self {
            env: Env::new_global_rc(),
        }
    }
}

impl Interpreter {
    pub fn with_env(env: EnvRef) -> Self {
        Self { env }
    }

    pub fn env(&self) -> &EnvRef {
        &self.env
    }

    pub fn eval(&mut self, code: &str) -> Result {
        eval_with_env(code, self.env.clone())
    }

    pub fn run(&mut self, mut source: impl io::Read) -> Result {
        let code = {
            let mut s = String::new();
            source.read_to_string(&mut s)?;
            s
        };
        self.eval(&code)
    }
}

pub fn eval(code: &str) -> Result {
    Interpreter::default().eval(code)
}

pub fn run(source: impl io::Read) -> Result {
    Interpreter::default().run(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::number::int;
    use anyhow::Result;

    #[test]
    fn last_value_wins() -> Result<()> {
        assert_eq!(eval("(define x 2) (* x 21)")?, Value::Number(int(42)));
        assert_eq!(eval("")?, Value::Void);
        Ok(())
    }

    #[test]
    fn run_reads_the_whole_source() -> Result<()> {
        let source = "(define (twice f x) (f (f x)))\n(twice (lambda (n) (+ n 3)) 1)";
        assert_eq!(run(source.as_bytes())?, Value::Number(int(7)));
        Ok(())
    }

    #[test]
    fn interpreter_keeps_its_scope() -> Result<()> {
        let mut interpreter = Interpreter::default();
        interpreter.eval("(define x 5)")?;
        assert_eq!(interpreter.eval("x")?, Value::Number(int(5)));
        Ok(())
    }

    #[test]
    fn yields_one_value_per_form() {
        let env = Env::new_global_rc();
        let values: Vec<String> = interpret(env, "1 (define a 2) a 'b")
            .map(|v| v.map(|v| v.to_string()).unwrap_or_else(|e| e.to_string()))
            .collect();
        assert_eq!(values, ["1", "", "2", "b"]);
    }

    #[test]
    fn stops_at_the_first_error() {
        let env = Env::new_global_rc();
        let mut values = interpret(env.clone(), "(define y 1) (car y) (define z 2)");
        assert!(matches!(values.next(), Some(Ok(Value::Void))));
        assert!(matches!(values.next(), Some(Err(Error::EvalErr(_)))));
        assert!(values.next().is_none());
        assert_eq!(env.borrow().get("y"), Some(Value::Number(int(1))));
        assert_eq!(env.borrow().get("z"), None);
    }

    #[test]
    fn forms_before_an_open_one_are_evaluated() {
        let env = Env::new_global_rc();
        let results: Vec<_> = interpret(env, "(+ 1 2) (+ 1").collect();
        assert!(matches!(&results[..], [Ok(_), Err(e)] if e.is_closing()));
    }

    #[test]
    fn step_shows_each_form_first() {
        let env = Env::new_global_rc();
        let mut forms = interpret(env, "(+ 1 2) x");
        let mut seen = vec![];
        while let Some(_) = forms.step(|form| seen.push(form.to_string())) {}
        // `x` is unbound but was still parsed and shown
        assert_eq!(seen, ["(+ 1 2)", "x"]);
    }

    #[test]
    fn exit_codes() {
        let err = eval("(exit 3)").unwrap_err();
        assert_eq!(err.exit_code(), Some(3));
        assert!(!err.is_closing());
    }
}
