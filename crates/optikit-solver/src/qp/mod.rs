//! Quadratic programming over linear constraints.
//!
//! Two strategies share the same matrix extraction: the default active-set
//! iteration solves the QP properly, while the tableau strategy walks the
//! constraint polytope with a two-phase simplex on the linearized objective
//! and is kept for step-by-step teaching.

pub mod matrices;
pub mod numeric;
pub mod tableau;

pub use matrices::QpMatrices;
pub use numeric::{ActiveSetOptions, ActiveSetOutcome};
pub use tableau::{TableauOutcome, TableauSolver};

use crate::error::SolveError;
use crate::gradient::format_point;
use crate::problem::Problem;
use crate::result::{Candidate, SolutionResult, SolutionStatus};
use crate::selector::Method;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QpStrategy {
    #[default]
    ActiveSet,
    Tableau,
}

pub fn solve(problem: &Problem, strategy: QpStrategy) -> Result<SolutionResult, SolveError> {
    let matrices = QpMatrices::extract(problem)?;
    let sign = if matrices.negated { -1.0 } else { 1.0 };

    let mut result = match strategy {
        QpStrategy::ActiveSet => SolutionResult::new(Method::Qp, SolutionStatus::Success),
        QpStrategy::Tableau => SolutionResult::new(Method::Qp, SolutionStatus::EducationalOnly),
    };

    result.explain(format!(
        "Standard form: {} variable(s), {} equality row(s), {} inequality row(s), x >= 0.",
        matrices.dim(),
        matrices.a_eq.nrows(),
        matrices.a_ineq.nrows()
    ));
    if matrices.negated {
        result.explain("Maximization: minimizing the negated objective.".to_string());
    }
    result.explain(if matrices.is_convex() {
        "The Hessian D is positive semidefinite, so the QP is convex.".to_string()
    } else {
        "The Hessian D has a negative eigenvalue; only local optimality is claimed.".to_string()
    });

    match strategy {
        QpStrategy::ActiveSet => {
            let outcome = numeric::solve(&matrices, &ActiveSetOptions::default())?;
            result.explain(format!(
                "Active-set iteration finished after {} step(s).",
                outcome.iterations.len().saturating_sub(1)
            ));

            result.iterations = outcome.iterations;
            for rec in &mut result.iterations {
                rec.f *= sign;
            }

            let mut multipliers: Vec<(String, f64)> = Vec::new();
            for (j, value) in outcome.eq_multipliers.iter().enumerate() {
                multipliers.push((format!("mu{}", j + 1), *value));
            }
            for (i, value) in outcome.ineq_multipliers.iter().enumerate() {
                multipliers.push((format!("lambda{}", i + 1), *value));
            }

            let f = sign * outcome.f;
            result.explain(format!(
                "Solution: {} with objective value {:.6}.",
                format_point(&matrices.vars, &outcome.x),
                f
            ));
            result.x_star = Some(outcome.x);
            result.f_star = Some(f);
            result.multipliers = multipliers;
        }
        QpStrategy::Tableau => {
            let outcome = TableauSolver::new().solve(&matrices)?;
            result.explain(format!(
                "Two-phase simplex on the linearized objective C'x took {} pivot(s).",
                outcome.pivots
            ));
            result.explain(
                "The tableau optimizes the linear part only; the quadratic objective is \
                 evaluated at the final vertex."
                    .to_string(),
            );

            let f = sign * outcome.f;
            let mut candidate =
                Candidate::new("final simplex vertex", outcome.x.clone(), f);
            candidate.classification = Some("vertex of the feasible polytope".to_string());
            result.candidates.push(candidate);

            result.explain(format!(
                "Vertex: {} with quadratic objective value {:.6}.",
                format_point(&matrices.vars, &outcome.x),
                f
            ));
            result.x_star = Some(outcome.x);
            result.f_star = Some(f);
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::ConstraintKind;
    use approx::assert_relative_eq;

    #[test]
    fn test_active_set_result() {
        let p = Problem::parse(
            "x^2 + y^2",
            &[
                ("x + y - 1", ConstraintKind::Eq),
                ("x - 2", ConstraintKind::Le),
            ],
            false,
        )
        .unwrap();
        let r = solve(&p, QpStrategy::ActiveSet).unwrap();

        assert_eq!(r.status, SolutionStatus::Success);
        assert_eq!(r.method, Some(Method::Qp));
        let x = r.x_star.unwrap();
        assert_relative_eq!(x[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(x[1], 0.5, epsilon = 1e-6);
        assert_relative_eq!(r.f_star.unwrap(), 0.5, epsilon = 1e-6);
        assert!(!r.iterations.is_empty());
        assert!(r.multipliers.iter().any(|(name, _)| name == "mu1"));
    }

    #[test]
    fn test_tableau_result_is_educational() {
        let p = Problem::parse(
            "x^2 + y^2",
            &[
                ("x + y - 1", ConstraintKind::Eq),
                ("x - 0.25", ConstraintKind::Ge),
            ],
            false,
        )
        .unwrap();
        let r = solve(&p, QpStrategy::Tableau).unwrap();
        assert_eq!(r.status, SolutionStatus::EducationalOnly);
        assert_eq!(r.candidates.len(), 1);
        assert!(r.x_star.is_some());
    }

    #[test]
    fn test_infeasible_maps_through() {
        let p = Problem::parse(
            "x^2 + y^2",
            &[
                ("x + y - 1", ConstraintKind::Eq),
                ("x - 5", ConstraintKind::Ge),
                ("x - 3", ConstraintKind::Le),
            ],
            false,
        )
        .unwrap();
        assert!(matches!(
            solve(&p, QpStrategy::ActiveSet),
            Err(SolveError::Infeasible(_))
        ));
    }
}
