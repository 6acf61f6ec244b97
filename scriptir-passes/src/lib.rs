//! Compilation passes acting on the `scriptir` graph IR, preparing graphs for
//! export to operator sets without function calls.

pub mod call_graph;
pub mod call_substitution;
pub mod composable;
pub mod validation;

pub use call_substitution::{
    CallRule, CallSubstitutionError, CallSubstitutionPass, SubstitutionReport, SubstitutionTable,
    substitute_calls,
};
pub use composable::ComposablePass;
