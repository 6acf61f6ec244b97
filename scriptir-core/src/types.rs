//! The types carried by values.

use std::sync::Arc;

use derive_more::Display;
use indexmap::IndexMap;
use itertools::Itertools;
use smol_str::SmolStr;

use crate::callable::{Callable, QualifiedName};

/// The type of a [`Value`](crate::Value).
#[derive(Clone, Debug, Display, PartialEq, serde::Serialize, serde::Deserialize)]
#[non_exhaustive]
pub enum Type {
    /// A tensor.
    #[display("Tensor")]
    Tensor,
    /// A machine integer.
    #[display("int")]
    Int,
    /// A floating point number.
    #[display("float")]
    Float,
    /// A boolean.
    #[display("bool")]
    Bool,
    /// A string.
    #[display("str")]
    Str,
    /// The type of `None`.
    #[display("NoneType")]
    None,
    /// A fixed-size tuple.
    #[display("({})", _0.iter().join(", "))]
    Tuple(Vec<Type>),
    /// A homogeneous list.
    #[display("{_0}[]")]
    List(Box<Type>),
    /// A reference to a callable.
    Function(FunctionType),
    /// An instance of a class.
    Class(ClassType),
}

impl Type {
    /// If this is a function reference, return its type.
    pub fn as_function(&self) -> Option<&FunctionType> {
        match self {
            Type::Function(f) => Some(f),
            _ => None,
        }
    }

    /// If this is a class instance, return its type.
    pub fn as_class(&self) -> Option<&ClassType> {
        match self {
            Type::Class(c) => Some(c),
            _ => None,
        }
    }
}

/// The type of a reference to a (single, statically known) callable.
#[derive(Clone, Debug, Display, PartialEq, serde::Serialize, serde::Deserialize)]
#[display("Function<{}>", _0.qualname())]
#[serde(transparent)]
pub struct FunctionType(Arc<Callable>);

impl FunctionType {
    /// Creates the type of a reference to `callable`.
    pub fn new(callable: impl Into<Arc<Callable>>) -> Self {
        Self(callable.into())
    }

    /// The referenced callable.
    pub fn callable(&self) -> &Arc<Callable> {
        &self.0
    }
}

impl From<FunctionType> for Type {
    fn from(value: FunctionType) -> Self {
        Type::Function(value)
    }
}

/// The definition of a class: its name and method table.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClassDef {
    qualname: QualifiedName,
    methods: IndexMap<SmolStr, Arc<Callable>>,
}

impl ClassDef {
    /// Creates a class without methods.
    pub fn new(qualname: QualifiedName) -> Self {
        Self {
            qualname,
            methods: IndexMap::new(),
        }
    }

    /// Adds a method under `name`, replacing any method of the same name.
    pub fn with_method(mut self, name: impl Into<SmolStr>, method: impl Into<Arc<Callable>>) -> Self {
        self.methods.insert(name.into(), method.into());
        self
    }

    /// The fully-qualified name of the class.
    pub fn qualname(&self) -> &QualifiedName {
        &self.qualname
    }

    /// Looks up a method by name.
    pub fn method(&self, name: &str) -> Option<&Arc<Callable>> {
        self.methods.get(name)
    }

    /// Iterates over the methods in definition order.
    pub fn methods(&self) -> impl Iterator<Item = (&str, &Arc<Callable>)> {
        self.methods.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// The type of an instance of a class.
#[derive(Clone, Debug, Display, PartialEq, serde::Serialize, serde::Deserialize)]
#[display("{}", _0.qualname)]
#[serde(transparent)]
pub struct ClassType(Arc<ClassDef>);

impl ClassType {
    /// Creates the type of instances of `class`.
    pub fn new(class: impl Into<Arc<ClassDef>>) -> Self {
        Self(class.into())
    }

    /// The class definition.
    pub fn class(&self) -> &Arc<ClassDef> {
        &self.0
    }

    /// Looks up a method by name.
    pub fn get_method(&self, name: &str) -> Option<&Arc<Callable>> {
        self.0.method(name)
    }
}

impl From<ClassType> for Type {
    fn from(value: ClassType) -> Self {
        Type::Class(value)
    }
}
