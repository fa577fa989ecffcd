//! Named, type-erased functions that can be called with JSON arguments.
//!
//! A worker process cannot receive a closure, so the caller and its workers
//! share a registry and tasks refer to functions by name.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::args::{unpack, TaskFn};

type ErasedFn = dyn Fn(Value) -> Result<Value, String> + Send + Sync;

/// Name-to-function table.
#[derive(Clone, Default)]
pub struct Registry {
    funcs: HashMap<String, Arc<ErasedFn>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an infallible function. Its parameters are decoded from the
    /// positional argument list, its return value is encoded back to JSON.
    pub fn register<F, Args>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: TaskFn<Args>,
        F::Output: Serialize,
        Args: DeserializeOwned + 'static,
    {
        let name = name.into();
        let label = name.clone();
        let erased = move |args: Value| -> Result<Value, String> {
            let args: Args = decode_args(&label, args)?;
            serde_json::to_value(func.call(args)).map_err(|e| e.to_string())
        };
        self.funcs.insert(name, Arc::new(erased));
        self
    }

    /// Register a function returning `Result`; an `Err` becomes the task's
    /// invocation error, rendered with `Display`.
    pub fn register_fallible<F, Args, V, E>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: TaskFn<Args, Output = Result<V, E>>,
        Args: DeserializeOwned + 'static,
        V: Serialize + 'static,
        E: fmt::Display + 'static,
    {
        let name = name.into();
        let label = name.clone();
        let erased = move |args: Value| -> Result<Value, String> {
            let args: Args = decode_args(&label, args)?;
            let value = func.call(args).map_err(|e| e.to_string())?;
            serde_json::to_value(value).map_err(|e| e.to_string())
        };
        self.funcs.insert(name, Arc::new(erased));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.funcs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }

    /// Call `name` with one input item. Arrays are spread as positional
    /// arguments; any other value is passed as the only argument.
    pub fn call(&self, name: &str, item: Value) -> Result<Value, String> {
        let func = self
            .funcs
            .get(name)
            .ok_or_else(|| format!("unknown function `{}`", name))?;
        (**func)(unpack(item))
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("funcs", &self.names()).finish()
    }
}

fn decode_args<Args: DeserializeOwned>(name: &str, args: Value) -> Result<Args, String> {
    serde_json::from_value(args).map_err(|e| format!("bad arguments for `{}`: {}", name, e))
}
