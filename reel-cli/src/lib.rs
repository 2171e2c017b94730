/// Module representing high-level entry-point of the REPL.
pub mod repl;

pub mod run {

    /// Module that holds implementation detail of [`crate::run::run`].
    /// It glues [`reel::interpreter`] and [`crate::repl`] together.
    mod glue {
        use super::{Mode, Opts};
        use crate::repl;
        use reel::{
            env::{Env, EnvRef},
            eval, interpreter,
            levels::{bind_levels, FrameLevels},
            repl::Session,
            value::Value,
        };
        use std::{fs::File, io};
        use thiserror::Error;

        #[derive(Error, Debug)]
        pub enum Error {
            #[error(transparent)]
            Run(interpreter::Error),
            #[error(transparent)]
            Repl(#[from] rustyline::error::ReadlineError),
            #[error(transparent)]
            Signal(#[from] eval::Signal),
        }

        impl From<interpreter::Error> for Error {
            fn from(value: interpreter::Error) -> Self {
                if let interpreter::Error::EvalErr(eval::EvalError::Signal(sig)) = value {
                    Self::Signal(sig)
                } else {
                    Self::Run(value)
                }
            }
        }

        pub type Result<T> = std::result::Result<T, Error>;

        fn open_file(path: &std::path::Path) -> std::result::Result<File, interpreter::Error> {
            File::open(path).map_err(interpreter::Error::from)
        }

        /// No media is loaded from the command line, so `@levels` has no streams.
        fn root_env(opts: &Opts) -> EnvRef {
            let mut env = Env::new_global();
            if let Some(tb) = &opts.timebase {
                bind_levels(&mut env, FrameLevels::new(tb.clone()));
            }
            env.into_rc()
        }

        pub fn run(opts: Opts) -> Result<Value> {
            let env = root_env(&opts);
            let mut interpreter = interpreter::Interpreter::with_env(env.clone());
            Ok(match opts.mode {
                Mode::Script(path) => interpreter.run(open_file(&path)?)?,
                Mode::Stdin => interpreter.run(io::stdin())?,
                Mode::Repl => {
                    repl::greet();
                    let mut session = Session::new(env)
                        .with_debug(opts.debug_parser)
                        .with_style(opts.style);
                    let code = repl::run(&mut session)?;
                    return Err(eval::Signal::ExitSignal(code).into());
                }
            })
        }
    }

    use reel::{
        eval::{Signal, EVAL_STACK_BYTES},
        number::Number,
        repl::Style,
        value::Value,
    };
    use std::{path::PathBuf, process::exit, thread};

    #[derive(Debug)]
    pub enum Mode {
        Script(PathBuf),
        Repl,
        Stdin,
    }

    impl Mode {
        /// Piped input is read as a script, a terminal gets the REPL.
        pub fn stdin_or_repl() -> Self {
            if atty::is(atty::Stream::Stdin) {
                Self::Repl
            } else {
                Self::Stdin
            }
        }
    }

    #[derive(Debug)]
    pub struct Opts {
        pub mode: Mode,
        pub debug_parser: bool,
        pub timebase: Option<Number>,
        pub style: Style,
    }

    /// Prints the outcome and turns it into an exit status.
    fn report(result: glue::Result<Value>) -> i32 {
        match result {
            Ok(Value::Void) => 0,
            Ok(val) => {
                println!("{}", val);
                0
            }
            Err(glue::Error::Signal(Signal::ExitSignal(code))) => code.into(),
            Err(err) => {
                eprintln!("error: {}", err);
                1
            }
        }
    }

    pub fn run(opts: Opts) {
        let status = thread::Builder::new()
            .name("reel".to_owned())
            .stack_size(EVAL_STACK_BYTES)
            .spawn(move || report(glue::run(opts)))
            .map_err(|e| format!("failed to start evaluation thread: {e}"))
            .and_then(|worker| {
                worker
                    .join()
                    .map_err(|_| "evaluation thread panicked".to_owned())
            });
        match status {
            Ok(0) => {}
            Ok(code) => exit(code),
            Err(e) => {
                eprintln!("error: {e}");
                exit(1);
            }
        }
    }
}

pub mod parse {
    use itertools::Itertools;
    use reel::{expr::Form, parser};
    use std::{fs, io, path::PathBuf};
    use thiserror::Error;

    #[derive(Error, Debug)]
    enum Error {
        #[error(transparent)]
        ParseErr(#[from] parser::ParseError),
        #[error(transparent)]
        IOErr(#[from] io::Error),
    }

    fn inner(file: PathBuf) -> Result<Vec<Form>, Error> {
        Ok(parser::parse_script(&fs::read_to_string(file)?)?)
    }

    pub fn run(file: PathBuf) {
        match inner(file) {
            Ok(x) => println!("{}", x.iter().join("\n")),
            Err(e) => eprintln!("error: {}", e),
        }
    }
}

pub mod lex {
    use itertools::Itertools;
    use reel::lexer;
    use std::{fs, io, path::PathBuf};
    use thiserror::Error;

    #[derive(Error, Debug)]
    enum Error {
        #[error(transparent)]
        LexErr(#[from] lexer::LexError),
        #[error(transparent)]
        IOErr(#[from] io::Error),
    }

    fn inner(file: PathBuf) -> Result<Vec<lexer::Token>, Error> {
        Ok(lexer::tokenize(&fs::read_to_string(file)?)?)
    }

    fn to_str(tok: &lexer::Token) -> String {
        format!("{} {:?}", tok.pos, tok.kind).replace("TokenKind::", "")
    }

    pub fn run(file: PathBuf) {
        match inner(file) {
            Ok(x) => println!("{}", x.iter().map(to_str).join("\n")),
            Err(e) => eprintln!("error: {}", e),
        }
    }
}

use clap::{Parser, Subcommand};
use reel::{number, repl::Style};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version)]
/// An interactive Lisp for querying media timelines with exact timebases.
pub struct Args {
    /// Print each parsed form before evaluating it.
    #[arg(long)]
    debug_parser: bool,

    /// Bind `timebase` to this frame rate, e.g. 30000/1001, 29.97 or ntsc.
    #[arg(long, visible_alias = "tb", value_name = "NUM", value_parser = number::parse_timebase)]
    timebase: Option<number::Number>,

    /// Never style the prompt or error messages.
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run program from a script file.
    Run {
        /// Program to run.
        file: PathBuf,
    },
    /// Parse program from a script file.
    Parse {
        /// Program to parse.
        file: PathBuf,
    },

    /// Lex (tokenize) program from a script file.
    Lex {
        /// Program to lex.
        file: PathBuf,
    },
}

pub fn run() {
    let args = Args::parse();
    let opts = |mode| run::Opts {
        mode,
        debug_parser: args.debug_parser,
        timebase: args.timebase.clone(),
        style: Style::detect(args.no_color, atty::is(atty::Stream::Stdout)),
    };
    let Some(command) = &args.command else {
        return run::run(opts(run::Mode::stdin_or_repl()));
    };
    match command {
        Commands::Run { file } => run::run(opts(run::Mode::Script(file.clone()))),
        Commands::Parse { file } => parse::run(file.clone()),
        Commands::Lex { file } => lex::run(file.clone()),
    }
}
