//! Bindings
//!
//! A [`Binding`] describes where one argument slot of a node gets its value:
//! either a literal stored on the node, or a reference to another node whose
//! resolved value is substituted at evaluation time.
//!
//! Callers do not build bindings directly. They pass [`Arg`]s (usually
//! through [`Arguments`] or the [`args!`](crate::args) macro) and the registry
//! converts every node handle into a `Reference` and everything else into a
//! `Literal`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::graph::NodeId;
use crate::registry::Node;
use crate::value::Value;

/// The value source of one argument slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Binding {
    /// A value stored on the node itself.
    Literal(Value),
    /// The resolved value of another node in the same registry.
    Reference(NodeId),
}

impl Binding {
    /// The referenced node, if this is a `Reference`.
    pub fn reference(&self) -> Option<NodeId> {
        match self {
            Binding::Reference(id) => Some(*id),
            Binding::Literal(_) => None,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Binding::Reference(_))
    }
}

/// An argument as supplied by the caller, before it becomes a [`Binding`].
#[derive(Debug, Clone)]
pub enum Arg {
    Value(Value),
    Node(Node),
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Value(value)
    }
}

impl From<Node> for Arg {
    fn from(node: Node) -> Self {
        Arg::Node(node)
    }
}

impl From<&Node> for Arg {
    fn from(node: &Node) -> Self {
        Arg::Node(node.clone())
    }
}

macro_rules! arg_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Arg::Value(Value::from(value))
                }
            }
        )*
    };
}

arg_from_value!((), bool, i64, i32, u32, f64, &str, String);

impl<T: Into<Value>> From<Vec<T>> for Arg {
    fn from(items: Vec<T>) -> Self {
        Arg::Value(Value::from(items))
    }
}

/// Positional and named arguments for one node.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    pub(crate) positional: Vec<Arg>,
    pub(crate) named: IndexMap<String, Arg>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.positional.push(arg.into());
        self
    }

    /// Set a named argument. Setting the same name twice keeps the last
    /// value in the original slot.
    pub fn named(mut self, name: impl Into<String>, arg: impl Into<Arg>) -> Self {
        self.named.insert(name.into(), arg.into());
        self
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Every node handle among the arguments, positional first.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.positional
            .iter()
            .chain(self.named.values())
            .filter_map(|arg| match arg {
                Arg::Node(node) => Some(node),
                Arg::Value(_) => None,
            })
    }
}

impl From<Vec<Arg>> for Arguments {
    fn from(positional: Vec<Arg>) -> Self {
        Self {
            positional,
            named: IndexMap::new(),
        }
    }
}

impl FromIterator<Arg> for Arguments {
    fn from_iter<I: IntoIterator<Item = Arg>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

/// Build an [`Arguments`] list.
///
/// Positional arguments come first; named arguments follow a `;`.
///
/// ```rust,ignore
/// let total = add.call(args![1, &previous])?;
/// let scaled = scale.call(args![&total; factor = 2.5])?;
/// ```
#[macro_export]
macro_rules! args {
    () => {
        $crate::Arguments::new()
    };
    ($($arg:expr),+ $(,)?) => {
        $crate::Arguments::new()$(.arg($arg))+
    };
    ($($arg:expr),* ; $($name:ident = $value:expr),+ $(,)?) => {
        $crate::Arguments::new()$(.arg($arg))*$(.named(stringify!($name), $value))+
    };
}
