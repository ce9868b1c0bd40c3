//! Problem intake: analyze the structure, pick a method, dispatch to the
//! matching solver, and fold any error into the result's status and message.

use crate::analyzer::{Analysis, analyze};
use crate::differential;
use crate::error::SolveError;
use crate::gradient::{self, GradientOptions};
use crate::kkt;
use crate::lagrange;
use crate::problem::Problem;
use crate::qp::{self, QpStrategy};
use crate::result::SolutionResult;
use crate::selector::{Hints, Method, MethodDecision, RuleBook};

#[derive(Debug, Clone, PartialEq)]
pub struct SolveRequest {
    pub problem: Problem,
    pub hints: Hints,
    pub gradient: GradientOptions,
    pub qp_strategy: QpStrategy,
}

impl SolveRequest {
    pub fn new(problem: Problem) -> Self {
        Self {
            problem,
            hints: Hints::default(),
            gradient: GradientOptions::default(),
            qp_strategy: QpStrategy::default(),
        }
    }

    pub fn with_hints(mut self, hints: Hints) -> Self {
        self.hints = hints;
        self
    }

    pub fn with_gradient_options(mut self, options: GradientOptions) -> Self {
        self.gradient = options;
        self
    }

    pub fn with_qp_strategy(mut self, strategy: QpStrategy) -> Self {
        self.qp_strategy = strategy;
        self
    }
}

/// Analysis plus the rule decision, without running a solver.
pub fn classify(request: &SolveRequest) -> Result<(Analysis, MethodDecision), SolveError> {
    let analysis = analyze(&request.problem);
    let decision = RuleBook::select(&analysis, &request.hints)?;
    Ok((analysis, decision))
}

/// Runs the full pipeline. Never returns `Err`: failures become results with
/// an error-bearing status and a message, so callers always get the method
/// and explanation context that was available.
pub fn solve(request: &SolveRequest) -> SolutionResult {
    let analysis = analyze(&request.problem);
    let decision = match RuleBook::select(&analysis, &request.hints) {
        Ok(decision) => decision,
        Err(error) => {
            return SolutionResult::failure(None, error.status(), error.to_string());
        }
    };

    let outcome = match decision.method {
        Method::Gradient => gradient::solve(&request.problem, &request.gradient),
        Method::Lagrange => lagrange::solve(&request.problem),
        Method::Kkt => kkt::solve(&request.problem),
        Method::Qp => qp::solve(&request.problem, request.qp_strategy),
        Method::Differential => differential::solve(&request.problem),
    };

    let mut result = match outcome {
        Ok(result) => result,
        Err(error) => {
            SolutionResult::failure(Some(decision.method), error.status(), error.to_string())
        }
    };

    let mut preamble = vec![format!(
        "Selected method `{}` by rule {} of rule book v{}: {}.",
        decision.method,
        decision.rule,
        RuleBook::VERSION,
        decision.rationale
    )];
    preamble.push(format!(
        "Problem structure: {} variable(s), {} equality(ies), {} inequality(ies), objective degree {}.",
        analysis.vars.len(),
        analysis.n_eq,
        analysis.n_ineq,
        match analysis.objective_degree {
            Some(d) => d.to_string(),
            None => "non-polynomial".to_string(),
        }
    ));
    preamble.append(&mut result.explanation);
    result.explanation = preamble;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::ConstraintKind;
    use crate::result::SolutionStatus;
    use approx::assert_relative_eq;

    #[test]
    fn test_dispatch_lagrange() {
        let p = Problem::parse("x^2 + y^2", &[("x + y - 1", ConstraintKind::Eq)], false).unwrap();
        let r = solve(&SolveRequest::new(p));
        assert_eq!(r.method, Some(Method::Lagrange));
        assert_eq!(r.status, SolutionStatus::Success);
        assert_relative_eq!(r.f_star.unwrap(), 0.5, epsilon = 1e-6);
        assert!(r.explanation[0].contains("rule 4"));
    }

    #[test]
    fn test_dispatch_gradient_unconstrained() {
        let p = Problem::parse("x^2 + y^2", &[], false).unwrap();
        let r = solve(&SolveRequest::new(p));
        assert_eq!(r.method, Some(Method::Gradient));
        assert_eq!(r.status, SolutionStatus::Ok);
    }

    #[test]
    fn test_failure_keeps_method_and_message() {
        // Infeasible inequalities route to KKT and fail there.
        let p = Problem::parse(
            "x^2",
            &[("x", ConstraintKind::Le), ("x - 1", ConstraintKind::Ge)],
            false,
        )
        .unwrap();
        let r = solve(&SolveRequest::new(p));
        assert_eq!(r.method, Some(Method::Kkt));
        assert_eq!(r.status, SolutionStatus::Error);
        assert_eq!(
            r.message.as_deref(),
            Some("numeric failure: no valid KKT candidates")
        );
    }

    #[test]
    fn test_method_hint_forces_dispatch() {
        let p = Problem::parse("x^4 - 2*x^2", &[], false).unwrap();
        let r = solve(&SolveRequest::new(p).with_hints(Hints {
            method_hint: Some(Method::Differential),
            ..Hints::default()
        }));
        assert_eq!(r.method, Some(Method::Differential));
        assert_eq!(r.candidates.len(), 3);
    }

    #[test]
    fn test_classify_does_not_solve() {
        let p = Problem::parse(
            "x^2 + y^2",
            &[
                ("x + y - 1", ConstraintKind::Eq),
                ("x - 2", ConstraintKind::Le),
            ],
            false,
        )
        .unwrap();
        let (analysis, decision) = classify(&SolveRequest::new(p)).unwrap();
        assert!(analysis.objective_is_quadratic);
        assert_eq!(decision.method, Method::Qp);
    }

    #[test]
    fn test_solve_is_deterministic() {
        let p = Problem::parse(
            "x^2 + y^2",
            &[
                ("x + y - 1", ConstraintKind::Eq),
                ("x - 2", ConstraintKind::Le),
            ],
            false,
        )
        .unwrap();
        let request = SolveRequest::new(p);
        let a = solve(&request);
        let b = solve(&request);
        assert_eq!(a, b);
    }
}
