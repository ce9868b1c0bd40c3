pub mod analyzer;
pub mod differential;
pub mod engine;
pub mod error;
pub mod gradient;
pub mod kkt;
pub mod lagrange;
pub mod problem;
pub mod qp;
pub mod result;
pub mod selector;
pub mod stationary;

pub use analyzer::{Analysis, analyze};
pub use engine::{SolveRequest, classify, solve};
pub use error::SolveError;
pub use gradient::GradientOptions;
pub use problem::{Constraint, ConstraintKind, Problem};
pub use qp::{QpMatrices, QpStrategy};
pub use result::{Candidate, IterationRecord, SolutionResult, SolutionStatus};
pub use selector::{Hints, Method, MethodDecision, RuleBook};
