//! Error types for the exact solver.
//!
//! Every variant is fatal to the in-progress solve: each recursion step
//! depends on exact accumulated state from all prior steps, so nothing is
//! recovered locally and no partial results are published.

use qn_model::ModelError;
use thiserror::Error;

use crate::blocks::BlockFamily;

/// Errors raised while solving a network.
#[derive(Error, Debug)]
pub enum SolverError {
    /// Malformed or unsupported input, or results requested before a solve.
    #[error("{0}")]
    Model(#[from] ModelError),

    /// A diagonal block turned out structurally singular. Not retried:
    /// a retry cannot change a singular system.
    #[error("singular {family} block at class {class}, population {population}")]
    InconsistentLinearSystem {
        class: usize,
        population: u32,
        family: BlockFamily,
    },

    /// Basis or index contract violation. An implementation defect, never a
    /// user-facing condition.
    #[error("internal solver defect: {what}")]
    Internal { what: String },

    /// Arithmetic attempted on a basis value not written in the current
    /// step. Same severity as an internal defect.
    #[error("read of unwritten basis value at index {index}")]
    UndefinedValue { index: usize },
}

pub type SolverResult<T> = Result<T, SolverError>;
