//! Named callables: functions and methods that a call node may target.

use std::str::FromStr;

use derive_more::Display;
use itertools::Itertools;
use smol_str::SmolStr;
use thiserror::Error;

use crate::Graph;

/// A fully-qualified dotted name, e.g. `__torch__.torch.nn.functional.interpolate`.
///
/// The last atom is the local [name](Self::name); the preceding atoms form
/// the [prefix](Self::prefix) (the namespace).
#[derive(
    Clone, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[display("{}", _0.iter().join("."))]
#[serde(try_from = "String", into = "String")]
pub struct QualifiedName(Vec<SmolStr>);

/// Error parsing a [`QualifiedName`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("Invalid qualified name {0:?}: atoms must be non-empty")]
pub struct InvalidQualifiedName(pub String);

impl QualifiedName {
    /// Creates a qualified name from its atoms.
    ///
    /// # Errors
    ///
    /// If there are no atoms, or any atom is empty or contains a `.`.
    pub fn new(
        atoms: impl IntoIterator<Item = impl Into<SmolStr>>,
    ) -> Result<Self, InvalidQualifiedName> {
        let atoms = atoms.into_iter().map_into::<SmolStr>().collect_vec();
        if atoms.is_empty() || atoms.iter().any(|a| a.is_empty() || a.contains('.')) {
            return Err(InvalidQualifiedName(atoms.iter().join(".")));
        }
        Ok(Self(atoms))
    }

    /// Creates a qualified name from atoms known to be valid.
    ///
    /// # Panics
    ///
    /// If there are no atoms.
    pub fn new_unchecked(atoms: impl IntoIterator<Item = impl Into<SmolStr>>) -> Self {
        let atoms = atoms.into_iter().map_into::<SmolStr>().collect_vec();
        assert!(!atoms.is_empty(), "Qualified names need at least one atom");
        Self(atoms)
    }

    /// The local name, i.e. the last atom.
    #[must_use]
    pub fn name(&self) -> &str {
        // Never empty by construction.
        self.0.last().map_or("", SmolStr::as_str)
    }

    /// The namespace atoms preceding the local name.
    #[must_use]
    pub fn prefix(&self) -> &[SmolStr] {
        &self.0[..self.0.len() - 1]
    }

    /// All atoms of the name.
    #[must_use]
    pub fn atoms(&self) -> &[SmolStr] {
        &self.0
    }

    /// Returns a new name with `name` appended as the last atom.
    ///
    /// # Errors
    ///
    /// If `name` is not a valid atom.
    pub fn child(&self, name: impl Into<SmolStr>) -> Result<Self, InvalidQualifiedName> {
        Self::new(self.0.iter().cloned().chain([name.into()]))
    }
}

impl FromStr for QualifiedName {
    type Err = InvalidQualifiedName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.split('.'))
    }
}

impl TryFrom<String> for QualifiedName {
    type Error = InvalidQualifiedName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<QualifiedName> for String {
    fn from(value: QualifiedName) -> Self {
        value.to_string()
    }
}

/// A callable whose implementation is an IR graph, available for inlining.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GraphFunction {
    qualname: QualifiedName,
    graph: Graph,
}

impl GraphFunction {
    /// Creates a graph function with the given body.
    pub fn new(qualname: QualifiedName, graph: Graph) -> Self {
        Self { qualname, graph }
    }

    /// The fully-qualified name of the function.
    pub fn qualname(&self) -> &QualifiedName {
        &self.qualname
    }

    /// The body of the function. Its root block inputs are the arguments
    /// (including the receiver, for methods) and its outputs the results.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }
}

/// A callable implemented outside of the IR, e.g. a builtin operator.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BuiltinFunction {
    qualname: QualifiedName,
}

impl BuiltinFunction {
    /// Creates an opaque builtin callable.
    pub fn new(qualname: QualifiedName) -> Self {
        Self { qualname }
    }
}

/// A function or method that can be the target of a call node.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize, derive_more::From)]
#[non_exhaustive]
pub enum Callable {
    /// A callable with an inlinable graph body.
    Graph(GraphFunction),
    /// An opaque callable without a graph body.
    Builtin(BuiltinFunction),
}

impl Callable {
    /// The fully-qualified name of the callable.
    pub fn qualname(&self) -> &QualifiedName {
        match self {
            Callable::Graph(f) => &f.qualname,
            Callable::Builtin(f) => &f.qualname,
        }
    }

    /// The local name of the callable.
    pub fn name(&self) -> &str {
        self.qualname().name()
    }

    /// Returns `true` if the callable has a graph body.
    pub fn is_graph_function(&self) -> bool {
        matches!(self, Callable::Graph(_))
    }

    /// If the callable has a graph body, return it.
    pub fn as_graph_function(&self) -> Option<&GraphFunction> {
        match self {
            Callable::Graph(f) => Some(f),
            Callable::Builtin(_) => None,
        }
    }
}
