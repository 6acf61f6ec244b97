//! The operation types for the nodes of a graph.

use std::str::FromStr;

use derive_more::Display;
use itertools::Itertools;
use smol_str::SmolStr;
use thiserror::Error;

/// Name of the attribute holding the method name of a [`OpType::CallMethod`].
pub const NAME_ATTR: &str = "name";

/// Name of the attribute holding the literal of a [`OpType::Constant`].
pub const VALUE_ATTR: &str = "value";

/// A namespaced operator identifier, written `namespace::name`.
#[derive(
    Clone, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[display("{namespace}::{name}")]
#[serde(try_from = "String", into = "String")]
pub struct Symbol {
    namespace: SmolStr,
    name: SmolStr,
}

/// Error parsing a [`Symbol`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("Invalid operator symbol {0:?}, expected `namespace::name`")]
pub struct InvalidSymbol(pub String);

impl Symbol {
    /// Creates a new symbol.
    pub fn new(namespace: impl Into<SmolStr>, name: impl Into<SmolStr>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Creates a symbol in the `aten` namespace.
    pub fn aten(name: impl Into<SmolStr>) -> Self {
        Self::new("aten", name)
    }

    /// The namespace of the operator.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The local name of the operator.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for Symbol {
    type Err = InvalidSymbol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once("::") {
            Some((ns, name)) if !ns.is_empty() && !name.is_empty() && !name.contains("::") => {
                Ok(Self::new(ns, name))
            }
            _ => Err(InvalidSymbol(s.to_owned())),
        }
    }
}

impl TryFrom<String> for Symbol {
    type Error = InvalidSymbol;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.to_string()
    }
}

/// The operation performed by a node.
#[derive(Clone, Debug, Display, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[non_exhaustive]
pub enum OpType {
    /// Sentinel at the start of every block; its outputs are the block inputs.
    #[display("prim::Param")]
    Param,
    /// Sentinel at the end of every block; its inputs are the block outputs.
    #[display("prim::Return")]
    Return,
    /// A constant. Literals are stored in the [`VALUE_ATTR`] attribute;
    /// function references are carried by the type of the output.
    #[display("prim::Constant")]
    Constant,
    /// A call to the function referenced by the first input.
    #[display("prim::CallFunction")]
    CallFunction,
    /// A call to the method named by [`NAME_ATTR`] on the receiver (first input).
    #[display("prim::CallMethod")]
    CallMethod,
    /// A conditional with two nested blocks.
    #[display("prim::If")]
    If,
    /// A loop with one nested body block.
    #[display("prim::Loop")]
    Loop,
    /// Any other operator.
    #[display("{_0}")]
    Op(Symbol),
}

impl OpType {
    /// Returns `true` for the block sentinels [`OpType::Param`] and [`OpType::Return`].
    pub fn is_sentinel(&self) -> bool {
        matches!(self, OpType::Param | OpType::Return)
    }

    /// Returns `true` for [`OpType::CallFunction`] and [`OpType::CallMethod`].
    pub fn is_call(&self) -> bool {
        matches!(self, OpType::CallFunction | OpType::CallMethod)
    }
}

impl From<Symbol> for OpType {
    fn from(value: Symbol) -> Self {
        OpType::Op(value)
    }
}

/// A node attribute.
#[derive(Clone, Debug, Display, PartialEq, serde::Serialize, serde::Deserialize, derive_more::From)]
#[non_exhaustive]
pub enum Attribute {
    /// An integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A boolean.
    Bool(bool),
    /// A string.
    #[display("{_0:?}")]
    Str(SmolStr),
    /// A list of integers.
    #[display("[{}]", _0.iter().join(", "))]
    Ints(Vec<i64>),
}

impl Attribute {
    /// If the attribute is a string, return it.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Attribute::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Attribute {
    fn from(value: &str) -> Self {
        Attribute::Str(value.into())
    }
}
