use crate::result::SolutionStatus;
use optikit_expr::{EvalError, ModelError, ParseError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolveError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error("dimension mismatch: expected {expected}, got {got}")]
    Dimension { expected: usize, got: usize },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("numeric failure: {0}")]
    Numeric(String),
    #[error("{0}")]
    Infeasible(String),
    #[error("not implemented: {0}")]
    NotImplemented(String),
    #[error("no applicable solution method: {0}")]
    Unclassifiable(String),
}

impl SolveError {
    /// The status a failed solve reports for this error.
    pub fn status(&self) -> SolutionStatus {
        match self {
            SolveError::Infeasible(_) => SolutionStatus::Infeasible,
            SolveError::NotImplemented(_) => SolutionStatus::NotImplemented,
            _ => SolutionStatus::Error,
        }
    }
}
