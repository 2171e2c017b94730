mod prelude {
    pub use itertools::Itertools;
    pub use tap::prelude::*;
}

pub mod builtins;
pub mod env;
pub mod eval;
pub mod expr;
/// Module representing high-level entry-point of the interpreter.
pub mod interpreter;
pub mod levels;
pub mod lexer;
pub mod number;
pub mod parser;
pub mod repl;
pub mod value;

/// Runs `test` on a thread with the stack hosts give the evaluator.
#[cfg(test)]
fn on_eval_stack(test: impl FnOnce() + Send + 'static) {
    std::thread::Builder::new()
        .stack_size(eval::EVAL_STACK_BYTES)
        .spawn(test)
        .expect("spawn evaluation thread")
        .join()
        .expect("evaluation thread passes");
}
