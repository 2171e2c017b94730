use crate::{
    env::EnvRef,
    eval::EvalError,
    expr::{self, Form},
    number::Number,
    prelude::*,
};
use std::{any::Any, fmt, rc::Rc};
use variantly::Variantly;

pub type NativeFn = fn(&[Value]) -> Result<Value, EvalError>;

/// How many arguments a procedure accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: Option<usize>,
}

impl Arity {
    pub const fn exact(n: usize) -> Self {
        Self {
            min: n,
            max: Some(n),
        }
    }

    pub const fn at_least(n: usize) -> Self {
        Self { min: n, max: None }
    }

    pub const fn range(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    pub fn accepts(&self, n: usize) -> bool {
        n >= self.min && self.max.map_or(true, |max| n <= max)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{max}"),
            Some(max) => write!(f, "{} to {max}", self.min),
            None => write!(f, "at least {}", self.min),
        }
    }
}

/// A procedure implemented by the host.
#[derive(Clone, Copy)]
pub struct Native {
    pub name: &'static str,
    pub arity: Arity,
    pub func: NativeFn,
}

impl Native {
    pub fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        (self.func)(args)
    }
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Native({})", self.name)
    }
}

/// A user procedure together with the scope it was created in.
pub struct Closure {
    pub name: Option<String>,
    pub params: Vec<String>,
    /// Collects any arguments past `params` into a list.
    pub rest: Option<String>,
    pub body: Rc<[Form]>,
    pub env: EnvRef,
}

impl Closure {
    pub fn arity(&self) -> Arity {
        match self.rest {
            Some(_) => Arity::at_least(self.params.len()),
            None => Arity::exact(self.params.len()),
        }
    }
}

// the captured scope is left out, it usually contains the closure itself
impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("rest", &self.rest)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum Procedure {
    Closure(Rc<Closure>),
    Native(Native),
}

impl Procedure {
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Closure(c) => c.name.as_deref(),
            Self::Native(n) => Some(n.name),
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            Self::Closure(c) => c.arity(),
            Self::Native(n) => n.arity,
        }
    }
}

impl PartialEq for Procedure {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Closure(a), Self::Closure(b)) => Rc::ptr_eq(a, b),
            (Self::Native(a), Self::Native(b)) => a.name == b.name,
            _ => false,
        }
    }
}

/// An object owned by the host that the language can pass around but not
/// look inside.
#[derive(Clone)]
pub struct Host {
    name: &'static str,
    object: Rc<dyn Any>,
}

impl Host {
    pub fn new<T: Any>(name: &'static str, object: T) -> Self {
        Self {
            name,
            object: Rc::new(object),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.object.downcast_ref()
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Host({})", self.name)
    }
}

impl PartialEq for Host {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.object), Rc::as_ptr(&other.object))
    }
}

#[derive(Variantly, Debug, Clone, PartialEq)]
pub enum Value {
    Number(Number),
    Str(String),
    Char(char),
    Bool(bool),
    Symbol(String),
    List(Vec<Value>),
    Procedure(Procedure),
    /// Result of forms evaluated for effect; the REPL prints nothing for it.
    Void,
    Opaque(Host),
}

impl Value {
    pub fn sym(s: &str) -> Self {
        Self::Symbol(s.to_owned())
    }

    pub fn string(s: &str) -> Self {
        Self::Str(s.to_owned())
    }

    pub fn native(name: &'static str, arity: Arity, func: NativeFn) -> Self {
        Self::Procedure(Procedure::Native(Native { name, arity, func }))
    }

    /// Only `#f` is false.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Self::Bool(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Char(_) => "char",
            Self::Bool(_) => "bool",
            Self::Symbol(_) => "symbol",
            Self::List(_) => "list",
            Self::Procedure(_) => "procedure",
            Self::Void => "void",
            Self::Opaque(h) => h.name(),
        }
    }

    /// Renders strings and characters without quoting, for `display`.
    pub fn display(&self) -> Raw<'_> {
        Raw(self)
    }
}

impl From<&Form> for Value {
    fn from(form: &Form) -> Self {
        match form {
            Form::Symbol(s) => Self::Symbol(s.clone()),
            Form::Number(n) => Self::Number(n.clone()),
            Form::Str(s) => Self::Str(s.clone()),
            Form::Char(c) => Self::Char(*c),
            Form::Bool(b) => Self::Bool(*b),
            Form::List(l) => Self::List(l.iter().map(Self::from).collect()),
        }
    }
}

macro_rules! impl_from {
    ($type:ty, $body:expr) => {
        impl From<$type> for Value {
            fn from(value: $type) -> Self {
                $body(value)
            }
        }
    };
}

impl_from!(Number, Value::Number);
impl_from!(bool, Value::Bool);
impl_from!(char, Value::Char);
impl_from!(Vec<Value>, Value::List);
impl_from!(Host, Value::Opaque);

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Void
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Str(s) => expr::write_escaped(f, s),
            Value::Char(c) => expr::write_char(f, *c),
            Value::Bool(true) => f.write_str("#t"),
            Value::Bool(false) => f.write_str("#f"),
            Value::Symbol(s) => f.write_str(s),
            Value::List(l) => write!(f, "({})", l.iter().join(" ")),
            Value::Procedure(p) => match p.name() {
                Some(name) => write!(f, "#<procedure:{name}>"),
                None => f.write_str("#<procedure>"),
            },
            Value::Void => Ok(()),
            Value::Opaque(h) => write!(f, "#<{}>", h.name()),
        }
    }
}

pub struct Raw<'a>(&'a Value);

impl fmt::Display for Raw<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::Str(s) => f.write_str(s),
            Value::Char(c) => write!(f, "{c}"),
            Value::List(l) => write!(f, "({})", l.iter().map(Value::display).join(" ")),
            other => write!(f, "{other}"),
        }
    }
}
