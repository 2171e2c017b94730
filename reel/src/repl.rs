//! Line-oriented read-eval-print state machine.
//!
//! A [`Session`] is either idle or accumulating an unfinished submission.
//! Terminal handling lives elsewhere: anything that implements [`LineReader`]
//! can drive it.
use crate::{
    env::{EnvRef, LAST_RESULT},
    interpreter::{self, Error},
    parser,
    value::Value,
};
use std::{env, io};

/// Prompt shown while a submission is still open.
pub const CONTINUE_PROMPT: &str = "   ";

const BOLD_PINK: &str = "\x1b[1;95m";
const BOLD_RED: &str = "\x1b[1;31m";
const RESET: &str = "\x1b[0m";

/// Whether prompts and error labels carry ANSI styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    pub color: bool,
}

impl Style {
    pub const PLAIN: Self = Self { color: false };
    pub const COLOR: Self = Self { color: true };

    /// Colored unless `no_color` is set, the output isn't a terminal, or
    /// `NO_COLOR` / `AV_LOG_FORCE_NOCOLOR` is set to something non-empty.
    pub fn detect(no_color: bool, is_tty: bool) -> Self {
        let env_says_no = ["NO_COLOR", "AV_LOG_FORCE_NOCOLOR"]
            .iter()
            .any(|var| env::var_os(var).is_some_and(|v| !v.is_empty()));
        Self {
            color: is_tty && !no_color && !env_says_no,
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("{code}{text}{RESET}")
        } else {
            text.to_owned()
        }
    }

    pub fn prompt(&self) -> String {
        format!("{} ", self.paint(BOLD_PINK, ">"))
    }

    pub fn error_label(&self) -> String {
        self.paint(BOLD_RED, "error")
    }
}

/// One read from the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Line(String),
    /// The user pressed Ctrl-C.
    Interrupted,
    Eof,
}

pub trait LineReader {
    fn read_line(&mut self, prompt: &str) -> io::Result<Input>;
}

/// Where the session stands after handling one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Idle again, waiting for a fresh submission.
    Ready,
    /// The submission is unfinished, more lines are needed.
    Continue,
    /// The loop should end with this status.
    Exit(u8),
}

#[derive(Debug)]
pub struct Session {
    env: EnvRef,
    buffer: Option<String>,
    debug: bool,
    style: Style,
}

impl Session {
    /// `env` should be the root scope, `_` is bound there.
    pub fn new(env: EnvRef) -> Self {
        Self {
            env,
            buffer: None,
            debug: false,
            style: Style::PLAIN,
        }
    }

    /// Echo each form as `parser: <form>` before evaluating it.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn env(&self) -> &EnvRef {
        &self.env
    }

    pub fn is_accumulating(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn prompt(&self) -> String {
        match self.buffer {
            Some(_) => CONTINUE_PROMPT.to_owned(),
            None => self.style.prompt(),
        }
    }

    /// Handles one line typed at the prompt.
    ///
    /// Values are written to `out` as soon as their form is evaluated, so a
    /// failing form still leaves the output and definitions of the forms
    /// before it in place.
    pub fn submit(&mut self, line: &str, out: &mut impl io::Write) -> io::Result<Step> {
        let source = match self.buffer.take() {
            Some(mut buffer) => {
                buffer.push('\n');
                buffer.push_str(line);
                buffer
            }
            None => line.to_owned(),
        };

        // nothing runs until the whole buffer is closed
        if matches!(parser::probe(&source), Err(e) if e.is_closing()) {
            self.buffer = Some(source);
            return Ok(Step::Continue);
        }

        let mut forms = interpreter::interpret(self.env.clone(), &source);
        loop {
            let mut echo = Ok(());
            let Some(result) = forms.step(|form| {
                if self.debug {
                    echo = writeln!(out, "parser: {form}");
                }
            }) else {
                break;
            };
            echo?;
            match result {
                Ok(Value::Void) => {}
                Ok(val) => {
                    writeln!(out, "{val}")?;
                    self.env.borrow_mut().define(LAST_RESULT, val);
                }
                Err(e) => return self.report(e, out),
            }
        }
        Ok(Step::Ready)
    }

    fn report(&self, err: Error, out: &mut impl io::Write) -> io::Result<Step> {
        if let Some(code) = err.exit_code() {
            return Ok(Step::Exit(code));
        }
        writeln!(out, "{}: {err}", self.style.error_label())?;
        Ok(Step::Ready)
    }

    /// Ctrl-C drops an unfinished submission, or ends the loop when idle.
    pub fn interrupt(&mut self) -> Step {
        match self.buffer.take() {
            Some(_) => Step::Ready,
            None => Step::Exit(0),
        }
    }

    /// Reads and evaluates until end of input, an interrupt at the fresh
    /// prompt, or `(exit)`. Returns the exit status.
    pub fn run(&mut self, reader: &mut impl LineReader, out: &mut impl io::Write) -> io::Result<u8> {
        loop {
            let step = match reader.read_line(&self.prompt())? {
                Input::Line(line) => self.submit(&line, out)?,
                Input::Interrupted => self.interrupt(),
                Input::Eof => Step::Exit(0),
            };
            out.flush()?;
            if let Step::Exit(code) = step {
                return Ok(code);
            }
        }
    }
}
