//! Rewrite operations on a [`Graph`].

pub mod inline_call;
pub mod replace_op;

pub use inline_call::{InlineCall, InlineCallError};
pub use replace_op::{ReplaceOp, ReplaceOpError};

use super::Graph;

/// Verify that a patch application would succeed.
pub trait PatchVerification {
    /// The type of Error with which this patch may fail.
    type Error: std::error::Error;

    /// Checks whether the patch would succeed on the specified graph.
    /// If this call succeeds, [`Patch::apply`] should also succeed on the same
    /// graph. If this call fails, [`Patch::apply`] would fail with the same
    /// error.
    fn verify(&self, graph: &Graph) -> Result<(), Self::Error>;
}

/// A patch that can be applied to a mutable [`Graph`].
pub trait Patch: PatchVerification {
    /// The type returned on successful application of the patch.
    type Outcome;

    /// If `true`, [`Patch::apply`]'s of this patch guarantee that they do not
    /// mutate the graph when they return an Err. If `false`, there is no
    /// guarantee; the graph should be assumed invalid when Err is returned.
    const UNCHANGED_ON_FAILURE: bool;

    /// Mutate the specified graph, or fail with an error.
    ///
    /// Returns [`Self::Outcome`] if successful. If
    /// [`Patch::UNCHANGED_ON_FAILURE`] is true, then `graph` must be unchanged
    /// if Err is returned. See also [`PatchVerification::verify`].
    ///
    /// # Panics
    ///
    /// May panic if-and-only-if `graph` would have failed
    /// [`Graph::validate`].
    fn apply(self, graph: &mut Graph) -> Result<Self::Outcome, Self::Error>;
}

impl Graph {
    /// Applies a patch to the graph.
    ///
    /// # Errors
    ///
    /// If the patch fails to apply. See [`Patch::UNCHANGED_ON_FAILURE`] for
    /// the state of the graph in that case.
    pub fn apply_patch<P: Patch>(&mut self, patch: P) -> Result<P::Outcome, P::Error> {
        patch.apply(self)
    }
}
