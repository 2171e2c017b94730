use crate::{
    eval::EvalError,
    number::Number,
    prelude::*,
    value::{Arity, NativeFn, Value},
};

type Result<T = Value> = std::result::Result<T, EvalError>;

/// Natives merged into every root scope, with the arity checked before each call.
const NATIVES: &[(&str, Arity, NativeFn)] = &[
    // core
    ("not", Arity::exact(1), core::not),
    ("eq?", Arity::exact(2), core::eq),
    ("number?", Arity::exact(1), core::is_number),
    ("string?", Arity::exact(1), core::is_string),
    ("symbol?", Arity::exact(1), core::is_symbol),
    ("list?", Arity::exact(1), core::is_list),
    ("procedure?", Arity::exact(1), core::is_procedure),
    ("display", Arity::exact(1), core::display),
    ("exit", Arity::range(0, 1), core::exit),
    // math
    ("+", Arity::at_least(0), math::add),
    ("-", Arity::at_least(1), math::sub),
    ("*", Arity::at_least(0), math::mul),
    ("/", Arity::at_least(1), math::div),
    ("=", Arity::at_least(1), math::eq),
    ("<", Arity::at_least(1), math::lt),
    (">", Arity::at_least(1), math::gt),
    ("<=", Arity::at_least(1), math::le),
    (">=", Arity::at_least(1), math::ge),
    ("round", Arity::exact(1), math::round),
    ("floor", Arity::exact(1), math::floor),
    ("ceiling", Arity::exact(1), math::ceiling),
    ("abs", Arity::exact(1), math::abs),
    // lists
    ("list", Arity::at_least(0), lists::list),
    ("cons", Arity::exact(2), lists::cons),
    ("car", Arity::exact(1), lists::car),
    ("cdr", Arity::exact(1), lists::cdr),
    ("null?", Arity::exact(1), lists::is_null),
    ("length", Arity::exact(1), lists::length),
    ("append", Arity::at_least(0), lists::append),
    ("count-true", Arity::exact(1), lists::count_true),
    // strings
    ("string-append", Arity::at_least(0), strings::append),
    ("number->string", Arity::exact(1), strings::from_number),
    // timeline
    ("seconds->frames", Arity::exact(2), time::seconds_to_frames),
    ("frames->seconds", Arity::exact(2), time::frames_to_seconds),
    ("levels", Arity::range(2, 3), time::levels),
    ("levels-length", Arity::exact(1), time::levels_length),
    ("levels-timebase", Arity::exact(1), time::levels_timebase),
];

/// Bindings for [`crate::env::Env::register`].
pub fn standard_env() -> impl Iterator<Item = (String, Value)> {
    NATIVES
        .iter()
        .map(|&(name, arity, func)| (name.to_owned(), Value::native(name, arity, func)))
}

/// Destructures `args` into exactly `N` values.
fn fixed<'a, const N: usize>(name: &str, args: &'a [Value]) -> Result<&'a [Value; N]> {
    args.try_into().map_err(|_| EvalError::Arity {
        name: name.to_owned(),
        expected: Arity::exact(N),
        received: args.len(),
    })
}

fn number<'a>(name: &'static str, arg: &'a Value) -> Result<&'a Number> {
    match arg {
        Value::Number(n) => Ok(n),
        other => Err(EvalError::wrong_type(name, "a number", other)),
    }
}

fn as_list<'a>(name: &'static str, arg: &'a Value) -> Result<&'a [Value]> {
    match arg {
        Value::List(l) => Ok(l),
        other => Err(EvalError::wrong_type(name, "a list", other)),
    }
}

pub mod core {
    use super::*;
    use crate::eval::Signal;
    use crate::number::to_index;
    use std::io::Write;

    pub fn not(args: &[Value]) -> Result {
        let [arg] = fixed::<1>("not", args)?;
        Ok(Value::Bool(!arg.is_truthy()))
    }

    pub fn eq(args: &[Value]) -> Result {
        let [a, b] = fixed::<2>("eq?", args)?;
        Ok(Value::Bool(a == b))
    }

    macro_rules! predicate {
        ($fn_name:ident, $name:literal, $pattern:pat) => {
            pub fn $fn_name(args: &[Value]) -> Result {
                let [arg] = fixed::<1>($name, args)?;
                Ok(Value::Bool(matches!(arg, $pattern)))
            }
        };
    }

    predicate!(is_number, "number?", Value::Number(_));
    predicate!(is_string, "string?", Value::Str(_));
    predicate!(is_symbol, "symbol?", Value::Symbol(_));
    predicate!(is_list, "list?", Value::List(_));
    predicate!(is_procedure, "procedure?", Value::Procedure(_));

    /// Writes strings and characters without quotes.
    pub fn display(args: &[Value]) -> Result {
        let [arg] = fixed::<1>("display", args)?;
        let mut out = std::io::stdout().lock();
        _ = write!(out, "{}", arg.display()).and_then(|_| out.flush());
        Ok(Value::Void)
    }

    pub fn exit(args: &[Value]) -> Result {
        let status = match args {
            [] => 0,
            [code] => number("exit", code)
                .ok()
                .and_then(to_index)
                .and_then(|i| u8::try_from(i).ok())
                .ok_or_else(|| EvalError::wrong_type("exit", "an exit code from 0 to 255", code))?,
            _ => {
                return Err(EvalError::Arity {
                    name: "exit".to_owned(),
                    expected: Arity::range(0, 1),
                    received: args.len(),
                })
            }
        };
        Err(Signal::ExitSignal(status).into())
    }
}

/// NOTE: math ops do NOT short-circuit
pub mod math {
    use super::*;
    use num_traits::{One, Signed, Zero};
    use std::{cmp::Ordering, ops::*};

    #[inline]
    /// Creates an iterator that checks every argument is a number
    fn numbers<'a>(
        name: &'static str,
        args: &'a [Value],
    ) -> impl Iterator<Item = Result<&'a Number>> + 'a {
        args.iter().map(move |a| number(name, a))
    }

    pub fn add(args: &[Value]) -> Result {
        numbers("+", args)
            .fold_ok(Number::zero(), |acc, n| acc + n)
            .map(Value::Number)
    }

    pub fn mul(args: &[Value]) -> Result {
        numbers("*", args)
            .fold_ok(Number::one(), |acc, n| acc * n)
            .map(Value::Number)
    }

    /// `(- x)` negates, otherwise subtracts the rest from the first.
    pub fn sub(args: &[Value]) -> Result {
        let nums = numbers("-", args).collect::<Result<Vec<_>>>()?;
        Ok(Value::Number(match nums.split_first() {
            Some((first, [])) => -(*first).clone(),
            Some((first, rest)) => rest.iter().fold((*first).clone(), |acc, n| acc - *n),
            None => Number::zero(),
        }))
    }

    /// `(/ x)` is the reciprocal, otherwise divides the first by the rest.
    pub fn div(args: &[Value]) -> Result {
        let nums = numbers("/", args).collect::<Result<Vec<_>>>()?;
        let (acc, divisors) = match nums.split_first() {
            Some((first, [])) => (Number::one(), vec![*first]),
            Some((first, rest)) => ((*first).clone(), rest.to_vec()),
            None => return Ok(Value::Number(Number::one())),
        };
        divisors
            .into_iter()
            .try_fold(acc, |acc, n| {
                if n.is_zero() {
                    Err(EvalError::DivisionByZero("/"))
                } else {
                    Ok(acc.div(n))
                }
            })
            .map(Value::Number)
    }

    /// True when every adjacent pair satisfies `ok`.
    fn compare(name: &'static str, args: &[Value], ok: fn(Ordering) -> bool) -> Result {
        let nums = numbers(name, args).collect::<Result<Vec<_>>>()?;
        Ok(Value::Bool(
            nums.iter().tuple_windows().all(|(a, b)| ok(a.cmp(b))),
        ))
    }

    pub fn eq(args: &[Value]) -> Result {
        compare("=", args, Ordering::is_eq)
    }

    pub fn lt(args: &[Value]) -> Result {
        compare("<", args, Ordering::is_lt)
    }

    pub fn gt(args: &[Value]) -> Result {
        compare(">", args, Ordering::is_gt)
    }

    pub fn le(args: &[Value]) -> Result {
        compare("<=", args, Ordering::is_le)
    }

    pub fn ge(args: &[Value]) -> Result {
        compare(">=", args, Ordering::is_ge)
    }

    macro_rules! unary {
        ($fn_name:ident, $name:literal, $op:expr) => {
            pub fn $fn_name(args: &[Value]) -> Result {
                let [arg] = fixed::<1>($name, args)?;
                let f: fn(&Number) -> Number = $op;
                Ok(Value::Number(f(number($name, arg)?)))
            }
        };
    }

    // halves round away from zero
    unary!(round, "round", Number::round);
    unary!(floor, "floor", Number::floor);
    unary!(ceiling, "ceiling", Number::ceil);
    unary!(abs, "abs", |n| n.abs());
}

pub mod lists {
    use super::*;

    pub fn list(args: &[Value]) -> Result {
        Ok(Value::List(args.to_vec()))
    }

    pub fn cons(args: &[Value]) -> Result {
        let [head, tail] = fixed::<2>("cons", args)?;
        let tail = as_list("cons", tail)?;
        Ok(Value::List(
            std::iter::once(head).chain(tail).cloned().collect(),
        ))
    }

    fn non_empty<'a>(name: &'static str, args: &'a [Value]) -> Result<(&'a Value, &'a [Value])> {
        let [arg] = fixed::<1>(name, args)?;
        let parts = match arg {
            Value::List(l) => l.split_first(),
            _ => None,
        };
        parts.ok_or_else(|| EvalError::wrong_type(name, "a non-empty list", arg))
    }

    pub fn car(args: &[Value]) -> Result {
        non_empty("car", args).map(|(head, _)| head.clone())
    }

    pub fn cdr(args: &[Value]) -> Result {
        non_empty("cdr", args).map(|(_, tail)| Value::List(tail.to_vec()))
    }

    pub fn is_null(args: &[Value]) -> Result {
        let [arg] = fixed::<1>("null?", args)?;
        Ok(Value::Bool(matches!(arg, Value::List(l) if l.is_empty())))
    }

    pub fn length(args: &[Value]) -> Result {
        let [arg] = fixed::<1>("length", args)?;
        let len = as_list("length", arg)?.len();
        Ok(Number::from_integer(len.into()).pipe(Value::Number))
    }

    pub fn append(args: &[Value]) -> Result {
        args.iter()
            .map(|a| as_list("append", a))
            .fold_ok(vec![], |mut acc, l| {
                acc.extend_from_slice(l);
                acc
            })
            .map(Value::List)
    }

    /// Number of `#t` elements, e.g. silent frames in a levels list.
    pub fn count_true(args: &[Value]) -> Result {
        let [arg] = fixed::<1>("count-true", args)?;
        as_list("count-true", arg)?
            .iter()
            .filter(|v| matches!(v, Value::Bool(true)))
            .count()
            .pipe(|count| Number::from_integer(count.into()))
            .pipe(Value::Number)
            .pipe(Ok)
    }
}

pub mod strings {
    use super::*;

    pub fn append(args: &[Value]) -> Result {
        args.iter()
            .map(|a| match a {
                Value::Str(s) => Ok(s.as_str()),
                other => Err(EvalError::wrong_type("string-append", "a string", other)),
            })
            .fold_ok(String::new(), |acc, s| acc + s)
            .map(Value::Str)
    }

    pub fn from_number(args: &[Value]) -> Result {
        let [arg] = fixed::<1>("number->string", args)?;
        Ok(Value::Str(number("number->string", arg)?.to_string()))
    }
}

/// Timebase conversions and queries against a levels provider.
pub mod time {
    use super::*;
    use crate::{
        levels::LevelsHandle,
        number::{self, to_index},
    };
    use num_traits::Signed;

    fn timebase<'a>(name: &'static str, arg: &'a Value) -> Result<&'a Number> {
        match arg {
            Value::Number(n) if n.is_positive() => Ok(n),
            other => Err(EvalError::wrong_type(name, "a positive timebase", other)),
        }
    }

    pub fn seconds_to_frames(args: &[Value]) -> Result {
        let [secs, tb] = fixed::<2>("seconds->frames", args)?;
        let secs = number("seconds->frames", secs)?;
        let tb = timebase("seconds->frames", tb)?;
        Ok(Value::Number(number::seconds_to_frames(secs, tb)))
    }

    pub fn frames_to_seconds(args: &[Value]) -> Result {
        let [frames, tb] = fixed::<2>("frames->seconds", args)?;
        let frames = number("frames->seconds", frames)?;
        let tb = timebase("frames->seconds", tb)?;
        Ok(Value::Number(number::frames_to_seconds(frames, tb)))
    }

    /// `(levels provider kind [stream])`, `kind` being a symbol or string.
    pub fn levels(args: &[Value]) -> Result {
        let (provider, kind, stream) = match args {
            [p, k] => (p, k, 0),
            [p, k, s] => {
                let stream = number("levels", s)
                    .ok()
                    .and_then(to_index)
                    .ok_or_else(|| EvalError::wrong_type("levels", "a stream index", s))?;
                (p, k, stream)
            }
            _ => {
                return Err(EvalError::Arity {
                    name: "levels".to_owned(),
                    expected: Arity::range(2, 3),
                    received: args.len(),
                })
            }
        };
        let kind = match kind {
            Value::Symbol(s) | Value::Str(s) => s,
            other => return Err(EvalError::wrong_type("levels", "a kind name", other)),
        };
        let handle = LevelsHandle::from_value(provider)?;
        Ok(handle.provider().levels(kind, stream)?.into())
    }

    pub fn levels_length(args: &[Value]) -> Result {
        let [provider] = fixed::<1>("levels-length", args)?;
        let len = LevelsHandle::from_value(provider)?.provider().len();
        Ok(Number::from_integer(len.into()).pipe(Value::Number))
    }

    pub fn levels_timebase(args: &[Value]) -> Result {
        let [provider] = fixed::<1>("levels-timebase", args)?;
        let tb = LevelsHandle::from_value(provider)?.provider().timebase();
        Ok(Value::Number(tb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        env::Env,
        eval::{eval_script, Signal},
        levels::{bind_levels, FrameLevels, Levels, LevelsError},
        number::{int, ratio},
        parser,
    };
    use anyhow::Result;

    fn test_eval(code: &str) -> Result<Value, EvalError> {
        let mut env = Env::new_global();
        let levels = FrameLevels::new(ratio(30000, 1001))
            .with_stream("silence", Levels::Bools(vec![true, true, false, true]))
            .with_stream("motion", Levels::Numbers(vec![int(0), ratio(1, 4)]));
        bind_levels(&mut env, levels);
        let forms = parser::parse_script(code).expect("test source parses");
        eval_script(&forms, env.into_rc())
    }

    /// macro to setup test boilerplate comparing printed results
    macro_rules! builtin_test {
        ($fn_name:ident, $code:literal, $expected:literal) => {
            #[test]
            fn $fn_name() -> Result<()> {
                let result = test_eval($code)?;
                assert_eq!(result.to_string(), $expected);
                Ok(())
            }
        };
    }

    mod math {
        use super::*;

        builtin_test!(addition, "(+ 2 3)", "5");

        builtin_test!(addition_default, "(+)", "0");

        builtin_test!(exact_decimals, "(+ 0.1 0.2)", "3/10");

        builtin_test!(substraction, "(- 4 3)", "1");

        builtin_test!(substraction_neg, "(- 6 10)", "-4");

        builtin_test!(substraction_one_arg, "(- 3)", "-3");

        builtin_test!(multiplication_one_arg, "(* 20)", "20");

        builtin_test!(division, "(/ 3 5)", "3/5");

        builtin_test!(division_neg, "(/ -6 7)", "-6/7");

        builtin_test!(division_one_arg, "(/ 2)", "1/2");

        builtin_test!(division_many, "(/ 60 2 3)", "10");

        builtin_test!(eq, "(= 1 1 2/2)", "#t");

        builtin_test!(chained_lt, "(< 1 2 3)", "#t");

        builtin_test!(chained_lt_fails, "(< 1 3 2)", "#f");

        builtin_test!(ge, "(>= 3 3 1)", "#t");

        builtin_test!(round_half_away, "(round 5/2)", "3");

        builtin_test!(floor, "(floor -1/2)", "-1");

        builtin_test!(ceiling, "(ceiling 1/3)", "1");

        builtin_test!(abs, "(abs -3/4)", "3/4");

        #[test]
        fn division_by_zero() {
            assert_eq!(test_eval("(/ 1 0)"), Err(EvalError::DivisionByZero("/")));
            assert_eq!(test_eval("(/ 0)"), Err(EvalError::DivisionByZero("/")));
        }

        #[test]
        fn wrong_type() {
            assert_eq!(
                test_eval("(+ 1 \"a\")").map_err(|e| e.to_string()),
                Err("+: expected a number, got \"a\"".to_owned())
            );
        }

        #[test]
        fn sub_needs_an_argument() {
            assert!(matches!(
                test_eval("(-)"),
                Err(EvalError::Arity { received: 0, .. })
            ));
        }
    }

    mod core {
        use super::*;

        builtin_test!(not, "(not #f)", "#t");

        builtin_test!(not_empty_list, "(not '())", "#f");

        builtin_test!(eq_structural, "(eq? '(1 a) (list 1 'a))", "#t");

        builtin_test!(predicates, "(list (number? 1) (string? 1) (symbol? 'a) (procedure? car))", "(#t #f #t #t)");

        builtin_test!(display_is_void, "(display \"\")", "");

        #[test]
        fn exit() {
            assert_eq!(
                test_eval("(exit)"),
                Err(EvalError::Signal(Signal::ExitSignal(0)))
            );
        }

        #[test]
        fn exit_custom_code() {
            assert_eq!(
                test_eval("(exit 1)"),
                Err(EvalError::Signal(Signal::ExitSignal(1)))
            );
        }

        #[test]
        fn exit_bad_code() {
            assert!(matches!(
                test_eval("(exit 256)"),
                Err(EvalError::WrongType { name: "exit", .. })
            ));
        }

        #[test]
        fn exit_too_many_args() {
            assert_eq!(
                test_eval("(exit 1 5)"),
                Err(EvalError::Arity {
                    name: "exit".to_owned(),
                    expected: Arity::range(0, 1),
                    received: 2
                })
            );
        }
    }

    mod lists {
        use super::*;

        builtin_test!(cons, "(cons 1 '(2 3))", "(1 2 3)");

        builtin_test!(car, "(car '(a b))", "a");

        builtin_test!(cdr, "(cdr '(a b))", "(b)");

        builtin_test!(null, "(list (null? '()) (null? '(1)))", "(#t #f)");

        builtin_test!(length, "(length '(1 2 3))", "3");

        builtin_test!(append, "(append '(1) '() '(2 3))", "(1 2 3)");

        builtin_test!(count_true, "(count-true '(#t #f #t 1))", "2");

        #[test]
        fn car_of_number() {
            assert_eq!(
                test_eval("(car 1)").map_err(|e| e.to_string()),
                Err("car: expected a non-empty list, got 1".to_owned())
            );
        }

        builtin_test!(list_native, "(list 1 (list) 'x)", "(1 () x)");

        #[test]
        fn list_arguments_are_checked() {
            for (code, name) in [
                ("(cons 1 2)", "cons"),
                ("(length \"abc\")", "length"),
                ("(append '(1) 2)", "append"),
                ("(count-true #t)", "count-true"),
            ] {
                match test_eval(code) {
                    Err(EvalError::WrongType { name: n, expected, .. }) => {
                        assert_eq!((n, expected), (name, "a list"), "{code}")
                    }
                    other => panic!("{code}: {other:?}"),
                }
            }
        }

        #[test]
        fn car_of_empty() {
            assert!(matches!(
                test_eval("(car '())"),
                Err(EvalError::WrongType { name: "car", .. })
            ));
        }
    }

    mod strings {
        use super::*;

        builtin_test!(append, "(string-append \"a\" \"b c\")", "\"ab c\"");

        builtin_test!(from_number, "(number->string 30000/1001)", "\"30000/1001\"");
    }

    mod time {
        use super::*;

        builtin_test!(one_ntsc_frame, "(seconds->frames 1001/30000 30000/1001)", "1");

        builtin_test!(rounds_to_nearest, "(seconds->frames 1/2 25)", "13");

        builtin_test!(frames_to_seconds, "(frames->seconds 48 24)", "2");

        builtin_test!(bound_timebase, "timebase", "30000/1001");

        builtin_test!(levels_default_stream, "(levels @levels 'silence)", "(#t #t #f #t)");

        builtin_test!(levels_by_string, "(levels @levels \"motion\" 0)", "(0 1/4)");

        builtin_test!(
            silent_frames,
            "(count-true (levels @levels 'silence))",
            "3"
        );

        builtin_test!(levels_length, "(levels-length @levels)", "4");

        builtin_test!(levels_timebase, "(levels-timebase @levels)", "30000/1001");

        #[test]
        fn zero_timebase() {
            assert!(matches!(
                test_eval("(seconds->frames 1 0)"),
                Err(EvalError::WrongType { name: "seconds->frames", .. })
            ));
        }

        #[test]
        fn missing_stream() {
            assert_eq!(
                test_eval("(levels @levels 'silence 3)"),
                Err(EvalError::Levels(LevelsError::NoStream {
                    kind: "silence".into(),
                    stream: 3
                }))
            );
        }

        #[test]
        fn not_a_provider() {
            assert!(matches!(
                test_eval("(levels-length 5)"),
                Err(EvalError::Levels(LevelsError::NotAProvider(_)))
            ));
        }
    }

    #[test]
    fn every_native_is_registered() {
        let env = Env::new_global();
        for (name, ..) in NATIVES {
            assert!(env.get(name).is_some(), "{name} missing");
        }
        assert_eq!(standard_env().count(), NATIVES.len());
    }
}
