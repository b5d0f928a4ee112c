//! Task functions
//!
//! A [`TaskFn`] is the type-erased callable stored on a node. Every wrapped
//! function shares the signature `Fn(&Args) -> Result<Value, BoxError>`, which
//! keeps the graph homogeneous no matter what the functions compute.

use std::fmt;
use std::sync::Arc;

use crate::error::BoxError;
use crate::value::{Args, Value};

type TaskBody = dyn Fn(&Args) -> Result<Value, BoxError> + Send + Sync;

/// A named, shareable task function.
///
/// Cloning is cheap; clones share the same underlying closure.
#[derive(Clone)]
pub struct TaskFn {
    name: Arc<str>,
    body: Arc<TaskBody>,
}

impl TaskFn {
    /// Wrap a fallible function.
    ///
    /// The name is only used for logging, error messages and snapshots.
    pub fn new<F>(name: impl Into<Arc<str>>, body: F) -> Self
    where
        F: Fn(&Args) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            body: Arc::new(body),
        }
    }

    /// Wrap a function that cannot fail.
    pub fn infallible<F, T>(name: impl Into<Arc<str>>, body: F) -> Self
    where
        F: Fn(&Args) -> T + Send + Sync + 'static,
        T: Into<Value>,
    {
        Self::new(name, move |args| Ok(body(args).into()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the function.
    pub fn call(&self, args: &Args) -> Result<Value, BoxError> {
        (self.body)(args)
    }

    /// Whether two handles share the same closure.
    pub fn ptr_eq(&self, other: &TaskFn) -> bool {
        Arc::ptr_eq(&self.body, &other.body)
    }
}

impl fmt::Debug for TaskFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFn").field("name", &self.name).finish()
    }
}

/// How a node finds its function.
#[derive(Debug, Clone)]
pub enum Callable {
    /// A function handed over directly through `register`.
    Direct(TaskFn),

    /// A name looked up in the registry's task table at evaluation time,
    /// created through `add_task`.
    Named(Arc<str>),
}

impl Callable {
    /// Display name of the function.
    pub fn name(&self) -> &str {
        match self {
            Callable::Direct(task) => task.name(),
            Callable::Named(name) => name,
        }
    }

    pub fn is_named(&self, name: &str) -> bool {
        matches!(self, Callable::Named(n) if &**n == name)
    }
}
