//! Lexical environments.
//!
//! An [`Environment`] is a cheap-to-clone handle to a frame of bindings plus
//! an optional link to the enclosing frame. Closures and child frames share
//! frames by reference counting, so a binding changed through one handle is
//! visible through every other handle to the same frame.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use crate::Error;
use crate::ast::{Params, Value};
use crate::builtinops::{Arity, Builtin, OperationFn};

struct Frame {
    bindings: RefCell<HashMap<String, Value>>,
    outer: Option<Environment>,
}

/// Environment for variable bindings
#[derive(Clone)]
pub struct Environment {
    frame: Rc<Frame>,
}

impl Environment {
    /// Create an empty environment with no enclosing frame
    pub fn new() -> Self {
        Self::from_parts(HashMap::new(), None)
    }

    /// Create an empty frame enclosed by `outer`
    pub fn with_outer(outer: &Environment) -> Self {
        Self::from_parts(HashMap::new(), Some(outer.clone()))
    }

    fn from_parts(bindings: HashMap<String, Value>, outer: Option<Environment>) -> Self {
        Environment {
            frame: Rc::new(Frame {
                bindings: RefCell::new(bindings),
                outer,
            }),
        }
    }

    /// Build the frame for a procedure call: parameters are bound to
    /// arguments by position, surplus arguments go to the rest parameter.
    pub fn for_call(
        params: &Params,
        args: Vec<Value>,
        outer: &Environment,
    ) -> Result<Environment, Error> {
        let arity = params.arity();
        if !arity.accepts(args.len()) {
            return Err(Error::arity_error(arity, args.len()));
        }

        let mut args = args.into_iter();
        let mut bindings: HashMap<String, Value> = params
            .required
            .iter()
            .cloned()
            .zip(args.by_ref())
            .collect();
        if let Some(rest) = &params.rest {
            bindings.insert(rest.clone(), Value::list(args.collect()));
        }
        Ok(Self::from_parts(bindings, Some(outer.clone())))
    }

    /// The enclosing environment, if any
    pub fn outer(&self) -> Option<&Environment> {
        self.frame.outer.as_ref()
    }

    /// Move this frame's values into `out` if no other handle shares the frame
    pub(crate) fn take_unique_bindings(&mut self, out: &mut Vec<Value>) {
        if let Some(frame) = Rc::get_mut(&mut self.frame) {
            out.extend(frame.bindings.get_mut().drain().map(|(_, value)| value));
        }
    }

    /// Bind `name` in this frame, shadowing any outer binding.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.frame.bindings.borrow_mut().insert(name.into(), value);
    }

    /// Look up `name` in this frame, then in each enclosing frame.
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut env = self;
        loop {
            if let Some(value) = env.frame.bindings.borrow().get(name) {
                return Some(value.clone());
            }
            env = env.frame.outer.as_ref()?;
        }
    }

    pub fn lookup(&self, name: &str) -> Result<Value, Error> {
        self.get(name)
            .ok_or_else(|| Error::UnboundVariable(name.to_owned()))
    }

    /// Rebind `name` in the nearest frame that binds it. Never creates a
    /// binding; fails with `UnboundVariable` if no frame binds `name`.
    pub fn set(&self, name: &str, value: Value) -> Result<(), Error> {
        let mut env = self;
        loop {
            if let Some(slot) = env.frame.bindings.borrow_mut().get_mut(name) {
                *slot = value;
                return Ok(());
            }
            match env.frame.outer.as_ref() {
                Some(outer) => env = outer,
                None => return Err(Error::UnboundVariable(name.to_owned())),
            }
        }
    }

    /// Register a custom builtin function in the environment.
    ///
    /// # Example
    /// ```
    /// use lispy::Error;
    /// use lispy::ast::{Value, val};
    /// use lispy::builtinops::Arity;
    /// use lispy::evaluator::{eval, standard_environment};
    /// use lispy::reader::read;
    ///
    /// fn double(args: &[Value]) -> Result<Value, Error> {
    ///     let n = i64::try_from(&args[0])?;
    ///     Ok(val(n * 2))
    /// }
    ///
    /// let env = standard_environment();
    /// env.register_builtin_function("double", Arity::Exact(1), double);
    /// let result = eval(&read("(double 21)").unwrap(), &env).unwrap();
    /// assert_eq!(result, val(42));
    /// ```
    pub fn register_builtin_function(
        &self,
        name: &str,
        arity: Arity,
        func: fn(&[Value]) -> Result<Value, Error>,
    ) {
        let wrapped: Arc<OperationFn> = Arc::new(func);
        let builtin = Builtin::function(name, arity, wrapped);
        self.define(name, Value::Builtin(Rc::new(builtin)));
    }

    /// All bindings visible from this frame, sorted by name. Inner bindings
    /// hide outer bindings of the same name.
    pub fn get_all_bindings(&self) -> Vec<(String, Value)> {
        let mut visible: HashMap<String, Value> = HashMap::new();
        let mut env = Some(self);
        while let Some(current) = env {
            for (name, value) in current.frame.bindings.borrow().iter() {
                visible
                    .entry(name.clone())
                    .or_insert_with(|| value.clone());
            }
            env = current.frame.outer.as_ref();
        }
        let mut bindings: Vec<_> = visible.into_iter().collect();
        bindings.sort_by(|a, b| a.0.cmp(&b.0));
        bindings
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

/// Environments are equal when they are the same frame
impl PartialEq for Environment {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.frame, &other.frame)
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Frames may hold closures that capture them; print names only.
        let mut names: Vec<String> = self.frame.bindings.borrow().keys().cloned().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("bindings", &names)
            .field("has_outer", &self.frame.outer.is_some())
            .finish()
    }
}
