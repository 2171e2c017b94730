use crate::{
    prelude::*,
    value::{Procedure, Value},
};
use std::{cell::RefCell, collections::HashMap, fmt, rc::Rc};

/// Shared handle to a scope. Closures and call frames hold these, so a scope
/// lives as long as its longest-lived holder.
pub type EnvRef = Rc<RefCell<Env>>;

/// Symbol that always holds the last value the REPL printed.
pub const LAST_RESULT: &str = "_";

#[derive(Default)]
pub struct Env {
    vars: HashMap<String, Value>,
    parent: Option<EnvRef>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(parent: EnvRef) -> Self {
        Self {
            vars: HashMap::new(),
            parent: Some(parent),
        }
    }

    /// Root scope preloaded with the standard library.
    pub fn new_global() -> Self {
        let mut env = Self::new();
        env.register(crate::builtins::standard_env());
        env
    }

    pub fn new_global_rc() -> EnvRef {
        Rc::new(RefCell::new(Self::new_global()))
    }

    pub fn into_rc(self) -> EnvRef {
        Rc::new(RefCell::new(self))
    }

    /// Looks `name` up in this scope, then in each enclosing one.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(val) = self.vars.get(name) {
            return Some(val.clone());
        }
        let mut scope = self.parent.clone();
        while let Some(env) = scope {
            let env = env.borrow();
            if let Some(val) = env.vars.get(name) {
                return Some(val.clone());
            }
            scope = env.parent.clone();
        }
        None
    }

    /// Binds `name` in this scope, replacing any binding it already has here.
    pub fn define(&mut self, name: &str, val: Value) -> Option<Value> {
        self.vars.insert(name.to_owned(), val)
    }

    /// Replaces the nearest existing binding of `name`.
    /// Returns `false` when no scope in the chain binds it.
    pub fn set(&mut self, name: &str, val: Value) -> bool {
        if let Some(slot) = self.vars.get_mut(name) {
            *slot = val;
            return true;
        }
        let mut scope = self.parent.clone();
        while let Some(env) = scope {
            let mut env = env.borrow_mut();
            if let Some(slot) = env.vars.get_mut(name) {
                *slot = val;
                return true;
            }
            scope = env.parent.clone();
        }
        false
    }

    /// Merges `bindings` into this scope without touching names that are
    /// already bound, so registering twice is harmless and never clobbers
    /// user definitions.
    pub fn register(&mut self, bindings: impl IntoIterator<Item = (String, Value)>) {
        for (name, val) in bindings {
            self.vars.entry(name).or_insert(val);
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Closures bound here that capture `this` scope and are held nowhere else.
    fn own_closures(&self, this: &EnvRef) -> usize {
        self.vars
            .values()
            .filter(|val| {
                matches!(val, Value::Procedure(Procedure::Closure(c))
                    if Rc::strong_count(c) == 1 && Rc::ptr_eq(&c.env, this))
            })
            .count()
    }

    /// Names bound directly in this scope, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.vars
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .tap_mut(|names| names.sort_unstable())
    }
}

/// Hands back a scope that evaluation is done with.
///
/// A procedure defined inside a call frame captures that frame, so the two
/// keep each other alive. When those closures are the only holders left, the
/// frame is unreachable and its bindings are dropped. Enclosing scopes are
/// checked the same way. Root scopes are never touched.
pub fn release(scope: EnvRef) {
    let mut scope = scope;
    loop {
        let Some(parent) = scope.borrow().parent.clone() else {
            return;
        };
        let own = scope.borrow().own_closures(&scope);
        if Rc::strong_count(&scope) != 1 + own {
            return;
        }
        let vars = std::mem::take(&mut scope.borrow_mut().vars);
        drop(vars);
        scope = parent;
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env")
            .field("names", &self.names())
            .field("root", &self.is_root())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::number::int;

    fn num(i: i64) -> Value {
        Value::Number(int(i))
    }

    #[test]
    fn lookup_walks_outward() {
        let root = Env::new().into_rc();
        root.borrow_mut().define("x", num(1));
        let mid = Env::child(root.clone()).into_rc();
        let inner = Env::child(mid.clone());
        assert_eq!(inner.get("x"), Some(num(1)));
        assert_eq!(inner.get("y"), None);
    }

    #[test]
    fn define_shadows_in_innermost_scope() {
        let root = Env::new().into_rc();
        root.borrow_mut().define("x", num(1));
        let mut inner = Env::child(root.clone());
        inner.define("x", num(2));
        assert_eq!(inner.get("x"), Some(num(2)));
        assert_eq!(root.borrow().get("x"), Some(num(1)));
    }

    #[test]
    fn set_mutates_nearest_binding() {
        let root = Env::new().into_rc();
        root.borrow_mut().define("x", num(1));
        let mid = Env::child(root.clone()).into_rc();
        mid.borrow_mut().define("x", num(2));
        let mut inner = Env::child(mid.clone());
        assert!(inner.set("x", num(3)));
        assert_eq!(mid.borrow().get("x"), Some(num(3)));
        assert_eq!(root.borrow().get("x"), Some(num(1)));
    }

    #[test]
    fn set_fails_when_unbound() {
        let root = Env::new().into_rc();
        let mut inner = Env::child(root.clone());
        assert!(!inner.set("nope", num(1)));
        assert_eq!(inner.get("nope"), None);
    }

    fn self_capturing(scope: &EnvRef) -> Value {
        Value::Procedure(Procedure::Closure(Rc::new(crate::value::Closure {
            name: Some("g".to_owned()),
            params: vec![],
            rest: None,
            body: vec![crate::expr::Form::Bool(true)].into(),
            env: scope.clone(),
        })))
    }

    #[test]
    fn release_breaks_frame_cycles() {
        let root = Env::new().into_rc();
        let frame = Env::child(root.clone()).into_rc();
        frame.borrow_mut().define("x", num(1));
        let g = self_capturing(&frame);
        frame.borrow_mut().define("g", g);
        let watch = Rc::downgrade(&frame);
        release(frame);
        assert!(watch.upgrade().is_none());
        assert_eq!(Rc::strong_count(&root), 1);
    }

    #[test]
    fn release_keeps_escaped_frames() {
        let root = Env::new().into_rc();
        let frame = Env::child(root.clone()).into_rc();
        let g = self_capturing(&frame);
        frame.borrow_mut().define("g", g.clone());
        let watch = Rc::downgrade(&frame);
        release(frame);
        let frame = watch.upgrade().expect("frame is still reachable through g");
        assert!(frame.borrow().get("g").is_some());
    }

    #[test]
    fn release_leaves_roots_alone() {
        let root = Env::new().into_rc();
        let g = self_capturing(&root);
        root.borrow_mut().define("g", g);
        release(root.clone());
        assert!(root.borrow().get("g").is_some());
    }

    #[test]
    fn register_keeps_existing_bindings() {
        let mut env = Env::new_global();
        env.define("car", num(7));
        env.register(crate::builtins::standard_env());
        assert_eq!(env.get("car"), Some(num(7)));
        assert!(env.get("cdr").is_some());
    }
}
