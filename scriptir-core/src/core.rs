//! Definitions for the handle types used in the graph.
//!
//! These types are re-exported in the root of the crate.

/// A handle to a node in a [`Graph`](crate::Graph).
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct Node {
    index: u32,
}

/// A handle to a value, i.e. a typed def-use edge of a [`Graph`](crate::Graph).
///
/// Every value is either an output of a node, or an input of a block (which
/// is stored as an output of the block's parameter node).
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct Value {
    index: u32,
}

/// A handle to a block, an ordered sequence of nodes.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct Block {
    index: u32,
}

/// A single consumer of a [`Value`]: the node using it, and the input offset
/// at which it is used.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Use {
    /// The consuming node.
    pub user: Node,
    /// The input offset of the consuming node.
    pub offset: usize,
}

impl Use {
    /// Creates a new use.
    #[inline]
    #[must_use]
    pub fn new(user: Node, offset: usize) -> Self {
        Self { user, offset }
    }
}

macro_rules! impl_handle {
    ($($t:ident),*) => {
        $(
            impl $t {
                #[inline]
                pub(crate) fn new(index: usize) -> Self {
                    Self {
                        index: index as u32,
                    }
                }

                /// Returns the arena index of the handle.
                #[inline]
                #[must_use]
                pub fn index(self) -> usize {
                    self.index as usize
                }
            }

            impl std::fmt::Debug for $t {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.debug_tuple(stringify!($t)).field(&self.index()).finish()
                }
            }

            impl std::fmt::Display for $t {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    <Self as std::fmt::Debug>::fmt(self, f)
                }
            }
        )*
    };
}
impl_handle!(Node, Value, Block);
