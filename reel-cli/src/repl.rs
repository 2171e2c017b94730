use reel::repl::{Input, LineReader, Session};
use rustyline::{error::ReadlineError, history::History, Editor, Helper};
use std::io;

const HISTORY_FILE: &str = ".reelhistory";

pub fn greet() {
    eprintln!("Reel {}", env!("CARGO_PKG_VERSION"))
}

pub type Error = ReadlineError;

/// Feeds rustyline input into a [`Session`].
struct Terminal<H: Helper, I: History> {
    editor: Editor<H, I>,
}

impl<H: Helper, I: History> LineReader for Terminal<H, I> {
    fn read_line(&mut self, prompt: &str) -> io::Result<Input> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(Input::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(Input::Interrupted),
            Err(ReadlineError::Eof) => Ok(Input::Eof),
            Err(ReadlineError::Io(err)) => Err(err),
            Err(err) => Err(io::Error::new(io::ErrorKind::Other, err.to_string())),
        }
    }
}

/// Runs the REPL until it asks to exit, returning the exit status.
pub fn run(session: &mut Session) -> Result<u8, Error> {
    let mut editor = {
        let config = rustyline::Config::builder()
            .auto_add_history(true)
            .completion_type(rustyline::CompletionType::List)
            .build();
        rustyline::Editor::<(), _>::with_config(config)?
    };
    _ = editor.load_history(HISTORY_FILE);
    let mut terminal = Terminal { editor };
    let res = session.run(&mut terminal, &mut io::stdout().lock());
    _ = terminal.editor.save_history(HISTORY_FILE);
    // leave the shell prompt on a fresh line
    println!();
    Ok(res?)
}
