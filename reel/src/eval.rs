use crate::{
    env::{self, Env, EnvRef},
    expr::Form,
    levels::LevelsError,
    value::{Arity, Closure, Procedure, Value},
};
use std::rc::Rc;
use thiserror::Error;

/// Control flow requests that travel through the error channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    #[error("exit requested with status {0}")]
    ExitSignal(u8),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("unbound symbol: {0}")]
    UnboundSymbol(String),
    #[error("{name}: arity mismatch, expected {expected} argument(s), received {received}")]
    Arity {
        name: String,
        expected: Arity,
        received: usize,
    },
    #[error("not a procedure: {0}")]
    NotCallable(String),
    #[error("set!: cannot mutate unbound symbol: {0}")]
    SetUnbound(String),
    #[error("{form}: ill-formed special form: {reason}")]
    IllFormed {
        form: &'static str,
        reason: &'static str,
    },
    #[error("{name}: expected {expected}, got {found}")]
    WrongType {
        name: &'static str,
        expected: &'static str,
        found: String,
    },
    #[error("{0}: division by zero")]
    DivisionByZero(&'static str),
    #[error("recursion too deep: more than {0} nested evaluations")]
    TooDeep(usize),
    #[error(transparent)]
    Levels(#[from] LevelsError),
    #[error(transparent)]
    Signal(#[from] Signal),
}

impl EvalError {
    pub fn wrong_type(name: &'static str, expected: &'static str, found: &Value) -> Self {
        Self::WrongType {
            name,
            expected,
            found: found.to_string(),
        }
    }

    fn ill_formed(form: &'static str, reason: &'static str) -> Self {
        Self::IllFormed { form, reason }
    }
}

type Result<T, E = EvalError> = std::result::Result<T, E>;

/// Deepest nesting of non-tail evaluations before [`EvalError::TooDeep`].
pub const MAX_EVAL_DEPTH: usize = 10_000;

/// Native stack size that fits [`MAX_EVAL_DEPTH`] nested evaluations.
/// Hosts run the evaluator on a thread with at least this much stack.
pub const EVAL_STACK_BYTES: usize = 256 * 1024 * 1024;

/// What is left to do after one evaluation step.
///
/// Special forms and closure calls hand their tail expression back instead of
/// evaluating it, and [`eval`] keeps looping on it.
enum Tail {
    Done(Value),
    Eval(Form, EnvRef),
}

fn get_sym(sym: &str, env: &EnvRef) -> Result<Value> {
    env.borrow()
        .get(sym)
        .ok_or_else(|| EvalError::UnboundSymbol(sym.to_owned()))
}

/// special forms that require different evaluation than normal procedures
pub mod special {
    use super::*;
    use std::{collections::HashSet, str::FromStr};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum SpecialForm {
        Define,
        Set,
        If,
        Lambda,
        Begin,
        Let,
        And,
        Or,
        Quote,
    }

    impl FromStr for SpecialForm {
        type Err = (); // no need for more here for now

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            Ok(match s {
                "define" => Self::Define,
                "set!" => Self::Set,
                "if" => Self::If,
                "lambda" => Self::Lambda,
                "begin" => Self::Begin,
                "let" => Self::Let,
                "and" => Self::And,
                "or" => Self::Or,
                "quote" => Self::Quote,
                _ => return Err(()),
            })
        }
    }

    pub(super) fn eval_special(
        form: SpecialForm,
        rest: &[Form],
        env: &EnvRef,
        depth: usize,
    ) -> Result<Tail> {
        match form {
            SpecialForm::Define => eval_define(rest, env, depth),
            SpecialForm::Set => eval_set(rest, env, depth),
            SpecialForm::If => eval_if(rest, env, depth),
            SpecialForm::Lambda => {
                let [params, body @ ..] = rest else {
                    return Err(EvalError::ill_formed("lambda", "missing parameter list"));
                };
                make_lambda(None, params, body, env).map(Tail::Done)
            }
            SpecialForm::Begin => eval_body(rest, env.clone(), depth),
            SpecialForm::Let => eval_let(rest, env, depth),
            SpecialForm::And => eval_and(rest, env, depth),
            SpecialForm::Or => eval_or(rest, env, depth),
            SpecialForm::Quote => {
                let [datum] = rest else {
                    return Err(EvalError::ill_formed("quote", "expected exactly one datum"));
                };
                Ok(Tail::Done(Value::from(datum)))
            }
        }
    }

    fn eval_define(rest: &[Form], env: &EnvRef, depth: usize) -> Result<Tail> {
        let (name, val) = match rest {
            [Form::Symbol(name), exp] => {
                let val = match exp {
                    // named so it prints as `#<procedure:name>`
                    Form::List(l) if is_lambda(l) => {
                        make_lambda(Some(name.clone()), &l[1], &l[2..], env)?
                    }
                    _ => eval_at(exp, env.clone(), depth + 1)?,
                };
                (name, val)
            }
            [Form::List(sig), body @ ..] => {
                let [Form::Symbol(name), params @ ..] = &sig[..] else {
                    return Err(EvalError::ill_formed("define", "expected a procedure name"));
                };
                let params = Form::List(params.into());
                (name, make_lambda(Some(name.clone()), &params, body, env)?)
            }
            [Form::Symbol(_), ..] | [] => {
                return Err(EvalError::ill_formed("define", "expected a name and a value"))
            }
            _ => return Err(EvalError::ill_formed("define", "expected an identifier")),
        };
        env.borrow_mut().define(name, val);
        Ok(Tail::Done(Value::Void))
    }

    fn is_lambda(list: &[Form]) -> bool {
        list.len() >= 2 && list[0].as_symbol() == Some("lambda")
    }

    fn eval_set(rest: &[Form], env: &EnvRef, depth: usize) -> Result<Tail> {
        let [sym, exp] = rest else {
            return Err(EvalError::ill_formed("set!", "expected a name and a value"));
        };
        let Form::Symbol(name) = sym else {
            return Err(EvalError::ill_formed("set!", "expected an identifier"));
        };
        let val = eval_at(exp, env.clone(), depth + 1)?;
        if !env.borrow_mut().set(name, val) {
            return Err(EvalError::SetUnbound(name.clone()));
        }
        Ok(Tail::Done(Value::Void))
    }

    /// Only `#f` counts as false, no actual type coercion is happening.
    fn eval_if(rest: &[Form], env: &EnvRef, depth: usize) -> Result<Tail> {
        let (cond, then, otherwise) = match rest {
            [cond, then] => (cond, then, None),
            [cond, then, otherwise] => (cond, then, Some(otherwise)),
            _ => {
                return Err(EvalError::ill_formed(
                    "if",
                    "expected a test, a consequent and an optional alternative",
                ))
            }
        };
        let branch = if eval_at(cond, env.clone(), depth + 1)?.is_truthy() {
            Some(then)
        } else {
            otherwise
        };
        Ok(match branch {
            Some(form) => Tail::Eval(form.clone(), env.clone()),
            None => Tail::Done(Value::Void),
        })
    }

    fn eval_let(rest: &[Form], env: &EnvRef, depth: usize) -> Result<Tail> {
        let [Form::List(bindings), body @ ..] = rest else {
            return Err(EvalError::ill_formed("let", "expected a binding list"));
        };
        let mut scope = Env::child(env.clone());
        for binding in bindings.iter() {
            let Form::List(pair) = binding else {
                return Err(EvalError::ill_formed("let", "binding must be a list"));
            };
            let [Form::Symbol(name), init] = &pair[..] else {
                return Err(EvalError::ill_formed("let", "binding must be (name expr)"));
            };
            // inits see the enclosing scope, never each other
            scope.define(name, eval_at(init, env.clone(), depth + 1)?);
        }
        if body.is_empty() {
            return Err(EvalError::ill_formed("let", "empty body"));
        }
        eval_body(body, scope.into_rc(), depth)
    }

    fn eval_and(rest: &[Form], env: &EnvRef, depth: usize) -> Result<Tail> {
        let Some((last, init)) = rest.split_last() else {
            return Ok(Tail::Done(Value::Bool(true)));
        };
        for form in init {
            let val = eval_at(form, env.clone(), depth + 1)?;
            if !val.is_truthy() {
                return Ok(Tail::Done(val));
            }
        }
        Ok(Tail::Eval(last.clone(), env.clone()))
    }

    fn eval_or(rest: &[Form], env: &EnvRef, depth: usize) -> Result<Tail> {
        let Some((last, init)) = rest.split_last() else {
            return Ok(Tail::Done(Value::Bool(false)));
        };
        for form in init {
            let val = eval_at(form, env.clone(), depth + 1)?;
            if val.is_truthy() {
                return Ok(Tail::Done(val));
            }
        }
        Ok(Tail::Eval(last.clone(), env.clone()))
    }

    /// Builds a closure over `env`. `params` is either a list of symbols,
    /// optionally ending in `. rest`, or a single symbol taking every argument.
    pub(super) fn make_lambda(
        name: Option<String>,
        params: &Form,
        body: &[Form],
        env: &EnvRef,
    ) -> Result<Value> {
        if body.is_empty() {
            return Err(EvalError::ill_formed("lambda", "empty body"));
        }
        let (params, rest) = match params {
            Form::Symbol(rest) => (vec![], Some(rest.clone())),
            Form::List(list) => parse_params(list)?,
            _ => return Err(EvalError::ill_formed("lambda", "expected a parameter list")),
        };
        let mut seen = HashSet::new();
        if !params.iter().chain(&rest).all(|p| seen.insert(p)) {
            return Err(EvalError::ill_formed("lambda", "duplicate parameter"));
        }
        Ok(Value::Procedure(Procedure::Closure(Rc::new(Closure {
            name,
            params,
            rest,
            body: body.into(),
            env: env.clone(),
        }))))
    }

    fn parse_params(list: &[Form]) -> Result<(Vec<String>, Option<String>)> {
        let mut params = vec![];
        let mut iter = list.iter();
        while let Some(param) = iter.next() {
            match param.as_symbol() {
                Some(".") => {
                    let (Some(Form::Symbol(rest)), None) = (iter.next(), iter.next()) else {
                        return Err(EvalError::ill_formed(
                            "lambda",
                            "expected exactly one rest parameter after `.`",
                        ));
                    };
                    return Ok((params, Some(rest.clone())));
                }
                Some(name) => params.push(name.to_owned()),
                None => return Err(EvalError::ill_formed("lambda", "parameter must be a symbol")),
            }
        }
        Ok((params, None))
    }
}

fn eval_list(list: &[Form], env: &EnvRef, depth: usize) -> Result<Tail> {
    let [head, args @ ..] = list else {
        return Err(EvalError::ill_formed("()", "empty application"));
    };

    // handle special procedures
    if let Form::Symbol(sym) = head {
        if let Ok(form) = sym.parse() {
            return special::eval_special(form, args, env, depth);
        }
    }

    let op = eval_at(head, env.clone(), depth + 1)?;
    let args = args
        .iter()
        .map(|arg| eval_at(arg, env.clone(), depth + 1))
        .collect::<Result<Vec<_>>>()?;
    apply_tail(op, args, depth)
}

fn check_arity(proc: &Procedure, received: usize) -> Result<()> {
    let expected = proc.arity();
    if expected.accepts(received) {
        return Ok(());
    }
    Err(EvalError::Arity {
        name: proc.name().unwrap_or("#<procedure>").to_owned(),
        expected,
        received,
    })
}

fn apply_tail(op: Value, args: Vec<Value>, depth: usize) -> Result<Tail> {
    let Value::Procedure(proc) = op else {
        return Err(EvalError::NotCallable(op.to_string()));
    };
    check_arity(&proc, args.len())?;
    match proc {
        Procedure::Native(native) => native.call(&args).map(Tail::Done),
        Procedure::Closure(closure) => {
            let scope = bind_args(&closure, args);
            eval_body(&closure.body, scope, depth)
        }
    }
}

/// Evaluates every form but the last for effect and hands the last one back.
fn eval_body(body: &[Form], env: EnvRef, depth: usize) -> Result<Tail> {
    let Some((last, init)) = body.split_last() else {
        env::release(env);
        return Ok(Tail::Done(Value::Void));
    };
    for form in init {
        if let Err(err) = eval_at(form, env.clone(), depth + 1) {
            env::release(env);
            return Err(err);
        }
    }
    Ok(Tail::Eval(last.clone(), env))
}

/// Fresh child of the closure's scope with parameters bound to `args`.
/// The arity has been checked already.
fn bind_args(closure: &Closure, mut args: Vec<Value>) -> EnvRef {
    let mut scope = Env::child(closure.env.clone());
    let rest = args.split_off(closure.params.len());
    for (param, arg) in closure.params.iter().zip(args) {
        scope.define(param, arg);
    }
    if let Some(name) = &closure.rest {
        scope.define(name, Value::List(rest));
    }
    scope.into_rc()
}

fn eval_atom(form: &Form, env: &EnvRef, depth: usize) -> Result<Value> {
    Ok(match form {
        Form::Symbol(sym) => get_sym(sym, env)?,
        Form::Number(n) => Value::Number(n.clone()),
        Form::Str(s) => Value::Str(s.clone()),
        Form::Char(c) => Value::Char(*c),
        Form::Bool(b) => Value::Bool(*b),
        Form::List(_) => eval_at(form, env.clone(), depth)?,
    })
}

/// Evaluates one form. Tail positions are followed in a loop, so a
/// tail-recursive procedure runs in constant native stack.
pub fn eval(form: &Form, env: EnvRef) -> Result<Value> {
    eval_at(form, env, 0)
}

/// [`eval`] nested `depth` non-tail evaluations deep. Every scope the loop
/// leaves goes through [`env::release`].
fn eval_at(form: &Form, env: EnvRef, depth: usize) -> Result<Value> {
    if depth > MAX_EVAL_DEPTH {
        return Err(EvalError::TooDeep(MAX_EVAL_DEPTH));
    }
    let Form::List(list) = form else {
        return eval_atom(form, &env, depth);
    };
    let mut list = list.clone();
    let mut env = env;
    loop {
        let step = eval_list(&list, &env, depth);
        match step {
            Ok(Tail::Eval(Form::List(next), next_env)) => {
                list = next;
                env::release(std::mem::replace(&mut env, next_env));
            }
            Ok(Tail::Eval(atom, next_env)) => {
                let val = eval_atom(&atom, &next_env, depth);
                env::release(next_env);
                env::release(env);
                return val;
            }
            Ok(Tail::Done(val)) => {
                env::release(env);
                return Ok(val);
            }
            Err(err) => {
                env::release(env);
                return Err(err);
            }
        }
    }
}

/// Calls `proc` with already evaluated arguments.
pub fn apply(proc: &Value, args: Vec<Value>) -> Result<Value> {
    match apply_tail(proc.clone(), args, 0)? {
        Tail::Done(val) => Ok(val),
        Tail::Eval(form, env) => eval(&form, env),
    }
}

/// Evaluates `forms` in order and returns the last value, [`Value::Void`] if
/// there are none.
pub fn eval_script(forms: &[Form], env: EnvRef) -> Result<Value> {
    forms
        .iter()
        .try_fold(Value::Void, |_, form| eval(form, env.clone()))
}
