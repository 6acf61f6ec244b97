//! Checking the graph a pass is given and the graph it leaves behind.

use derive_more::Display;
use thiserror::Error;
use tracing::debug;

use scriptir_core::Graph;
use scriptir_core::graph::ValidationError;

/// How much a pass checks the graph it rewrites.
///
/// The default is [`ValidationLevel::None`], except in this crate's tests.
#[derive(Debug, Clone, Copy, Ord, Eq, PartialOrd, PartialEq)]
pub enum ValidationLevel {
    /// Trust the graph.
    None,
    /// Run [`Graph::validate`] before and after the pass.
    Validate,
}

impl Default for ValidationLevel {
    fn default() -> Self {
        if cfg!(test) {
            Self::Validate
        } else {
            Self::None
        }
    }
}

/// When a graph was found invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ValidationStage {
    /// Before the pass ran.
    #[display("input")]
    Input,
    /// After the pass succeeded.
    #[display("output")]
    Output,
}

/// The graph given to, or produced by, a pass is invalid.
///
/// The textual form of an invalid output graph is logged at `DEBUG` level
/// rather than carried by the error.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Failed to validate {stage} graph: {err}")]
pub struct ValidatePassError {
    /// Whether the input or the output was invalid.
    pub stage: ValidationStage,
    /// The first violation found.
    #[source]
    pub err: ValidationError,
}

impl ValidationLevel {
    /// Checks `graph` at `stage`, according to the level.
    ///
    /// # Errors
    ///
    /// If the level is [`ValidationLevel::Validate`] and `graph` is invalid.
    pub fn check(&self, graph: &Graph, stage: ValidationStage) -> Result<(), ValidatePassError> {
        if *self == ValidationLevel::None {
            return Ok(());
        }
        graph.validate().map_err(|err| {
            match stage {
                // An invalid input may have dangling handles and cannot be rendered.
                ValidationStage::Input => debug!("Invalid {stage} graph: {err}"),
                ValidationStage::Output => debug!("Invalid {stage} graph ({err}):\n{graph}"),
            }
            ValidatePassError { stage, err }
        })
    }

    /// Runs `pass` on `graph`, checking the graph before, and after `pass`
    /// succeeds.
    ///
    /// # Errors
    ///
    /// The error of `pass`, or a [`ValidatePassError`] converted into it.
    pub fn run_validated_pass<T, E>(
        &self,
        graph: &mut Graph,
        pass: impl FnOnce(&mut Graph) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<ValidatePassError>,
    {
        self.check(graph, ValidationStage::Input)?;
        let result = pass(graph)?;
        self.check(graph, ValidationStage::Output)?;
        Ok(result)
    }
}
