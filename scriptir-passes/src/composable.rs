//! Compiler passes and utilities for composing them

use std::{error::Error, marker::PhantomData};

use itertools::Either;
use scriptir_core::Graph;

/// An optimization pass that can be sequenced with another and/or wrapped
/// e.g. by [`map_err`](ComposablePass::map_err).
pub trait ComposablePass: Sized {
    /// Error thrown by this pass.
    type Error: Error;
    /// Result returned by this pass.
    type Result;

    /// Run the pass on the given graph.
    fn run(&self, graph: &mut Graph) -> Result<Self::Result, Self::Error>;

    /// Apply a function to the error type of this pass, returning a new
    /// [`ComposablePass`] that has the same result type.
    fn map_err<E2: Error>(
        self,
        f: impl Fn(Self::Error) -> E2,
    ) -> impl ComposablePass<Error = E2, Result = Self::Result> {
        ErrMapper::new(self, f)
    }

    /// Returns a [`ComposablePass`] that runs `self` and then `other`,
    /// returning both results. Stops at the first error.
    fn then<P: ComposablePass<Error = Self::Error>>(
        self,
        other: P,
    ) -> impl ComposablePass<Error = Self::Error, Result = (Self::Result, P::Result)> {
        (self, other)
    }

    /// Like [`then`](ComposablePass::then), for passes with different error
    /// types.
    fn then_either<P: ComposablePass>(
        self,
        other: P,
    ) -> impl ComposablePass<Error = Either<Self::Error, P::Error>, Result = (Self::Result, P::Result)>
    {
        self.map_err(Either::Left)
            .then(other.map_err(Either::Right))
    }
}

struct ErrMapper<P, E, F>(P, F, PhantomData<E>);

impl<P: ComposablePass, E: Error, F: Fn(P::Error) -> E> ErrMapper<P, E, F> {
    fn new(pass: P, err_fn: F) -> Self {
        Self(pass, err_fn, PhantomData)
    }
}

impl<P: ComposablePass, E: Error, F: Fn(P::Error) -> E> ComposablePass for ErrMapper<P, E, F> {
    type Error = E;
    type Result = P::Result;

    fn run(&self, graph: &mut Graph) -> Result<P::Result, Self::Error> {
        self.0.run(graph).map_err(&self.1)
    }
}

impl<E: Error, P1: ComposablePass<Error = E>, P2: ComposablePass<Error = E>> ComposablePass
    for (P1, P2)
{
    type Error = E;
    type Result = (P1::Result, P2::Result);

    fn run(&self, graph: &mut Graph) -> Result<Self::Result, Self::Error> {
        let res1 = self.0.run(graph)?;
        let res2 = self.1.run(graph)?;
        Ok((res1, res2))
    }
}
