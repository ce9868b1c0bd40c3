use crate::selector::Method;
use std::fmt;

/// Closed set of outcome statuses reported by the solvers.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// Iterative solve converged.
    Ok,
    /// Analytic solve produced a verified result.
    Success,
    Error,
    Infeasible,
    NotImplemented,
    EducationalOnly,
}

impl SolutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SolutionStatus::Ok => "ok",
            SolutionStatus::Success => "success",
            SolutionStatus::Error => "error",
            SolutionStatus::Infeasible => "infeasible",
            SolutionStatus::NotImplemented => "not_implemented",
            SolutionStatus::EducationalOnly => "educational_only",
        }
    }
}

impl fmt::Display for SolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of an iterative solver's trace.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct IterationRecord {
    pub k: usize,
    pub x: Vec<f64>,
    pub f: f64,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub grad_norm: Option<f64>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub alpha: Option<f64>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub eq_violation: Option<f64>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub ineq_violation: Option<f64>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub note: Option<String>,
}

impl IterationRecord {
    pub fn new(k: usize, x: Vec<f64>, f: f64) -> Self {
        Self {
            k,
            x,
            f,
            grad_norm: None,
            alpha: None,
            eq_violation: None,
            ineq_violation: None,
            note: None,
        }
    }
}

/// A candidate point examined by an analytic solver (a stationary point, a
/// KKT case solution, and so on), kept for the explanation even when it is
/// not the one selected.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub label: String,
    pub x: Vec<f64>,
    pub f: f64,
    /// Multiplier values by name (`lambda1`, `mu2`, ...).
    pub multipliers: Vec<(String, f64)>,
    pub eigenvalues: Vec<f64>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub classification: Option<String>,
    pub feasible: bool,
}

impl Candidate {
    pub fn new(label: impl Into<String>, x: Vec<f64>, f: f64) -> Self {
        Self {
            label: label.into(),
            x,
            f,
            multipliers: Vec::new(),
            eigenvalues: Vec::new(),
            classification: None,
            feasible: true,
        }
    }
}

/// The full outcome of a solve: the selected method, the answer if any, the
/// iteration trace, the candidate set, and the step-by-step explanation.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SolutionResult {
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub method: Option<Method>,
    pub status: SolutionStatus,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub x_star: Option<Vec<f64>>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub f_star: Option<f64>,
    pub multipliers: Vec<(String, f64)>,
    pub iterations: Vec<IterationRecord>,
    pub candidates: Vec<Candidate>,
    /// Plain-text narration of the solve, one step per entry.
    pub explanation: Vec<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub message: Option<String>,
}

impl SolutionResult {
    pub fn new(method: Method, status: SolutionStatus) -> Self {
        Self {
            method: Some(method),
            status,
            x_star: None,
            f_star: None,
            multipliers: Vec::new(),
            iterations: Vec::new(),
            candidates: Vec::new(),
            explanation: Vec::new(),
            message: None,
        }
    }

    /// A failed solve carrying the error text and its mapped status.
    pub fn failure(method: Option<Method>, status: SolutionStatus, message: String) -> Self {
        Self {
            method,
            status,
            x_star: None,
            f_star: None,
            multipliers: Vec::new(),
            iterations: Vec::new(),
            candidates: Vec::new(),
            explanation: Vec::new(),
            message: Some(message),
        }
    }

    pub fn explain(&mut self, line: impl Into<String>) {
        self.explanation.push(line.into());
    }
}
