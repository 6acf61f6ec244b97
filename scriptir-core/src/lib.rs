//! Graph intermediate representation for scripted tensor programs.
//!
//! A [`Graph`] is a list of nodes in a root [`Block`]. Nodes consume and
//! produce typed [`Value`]s, and control-flow nodes own nested blocks. Call
//! nodes refer to [`callable::Callable`]s, which may carry a graph body of
//! their own.
//!
//! This crate contains the data structure, its validation and textual dump,
//! a [`builder`], and the [patches](graph::patch) used by the passes in
//! `scriptir-passes`.

pub mod builder;
pub mod callable;
pub mod core;
pub mod graph;
pub mod ops;
pub mod types;

pub use crate::core::{Block, Node, Use, Value};
pub use crate::graph::Graph;
