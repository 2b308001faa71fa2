use thiserror::Error;

use crate::optimizer::BoxError;

/// Main error type for the optimizer
#[derive(Error, Debug)]
pub enum NesError {
    /// Hyperparameters or the initial guess were rejected before the first iteration
    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    /// The initial guess does not have the dimensionality the objective expects
    #[error("Dimension mismatch: objective expects {expected} parameters, initial guess has {actual}")]
    DimensionMismatch {
        /// Dimensionality reported by the objective
        expected: usize,
        /// Length of the initial guess
        actual: usize,
    },

    /// A population member could not be evaluated
    #[error("Evaluation of population member {member} failed at iteration {iteration}: {source}")]
    Evaluation {
        /// Iteration the failure happened in
        iteration: usize,
        /// Row of the population matrix
        member: usize,
        /// Error raised by the objective
        #[source]
        source: BoxError,
    },

    /// The current parameter vector itself could not be evaluated for reporting
    #[error("Evaluation of the current parameters failed at iteration {iteration}: {source}")]
    CenterEvaluation {
        /// Iteration the failure happened in
        iteration: usize,
        /// Error raised by the objective
        #[source]
        source: BoxError,
    },
}

/// Result alias for optimizer operations
pub type Result<T> = std::result::Result<T, NesError>;
