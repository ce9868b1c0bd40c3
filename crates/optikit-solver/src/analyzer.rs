use crate::problem::{ConstraintKind, Problem};

/// Structural facts about a problem, computed symbolically before any
/// method is chosen.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub vars: Vec<String>,
    /// Total polynomial degree of the objective, `None` when non-polynomial.
    pub objective_degree: Option<u32>,
    pub objective_is_quadratic: bool,
    pub has_constraints: bool,
    pub n_eq: usize,
    pub n_ineq: usize,
    /// True only when there is at least one constraint and every constraint
    /// has total degree at most one.
    pub constraints_are_linear: bool,
    /// The symbolic Hessian of the objective, printed row by row. Meant for
    /// the explanation text, not for computation.
    pub convexity_hint: String,
}

/// Inspects the objective and constraints of `problem`.
pub fn analyze(problem: &Problem) -> Analysis {
    let objective_degree = problem.objective.total_degree();
    let objective_is_quadratic = objective_degree == Some(2);

    let n_eq = problem
        .constraints
        .iter()
        .filter(|c| c.kind == ConstraintKind::Eq)
        .count();
    let n_ineq = problem.constraints.len() - n_eq;
    let has_constraints = !problem.constraints.is_empty();

    let constraints_are_linear = has_constraints
        && problem
            .constraints
            .iter()
            .all(|c| matches!(c.model.total_degree(), Some(d) if d <= 1));

    let hessian = problem.objective.hessian();
    let convexity_hint = format!(
        "[{}]",
        hessian
            .iter()
            .map(|row| {
                format!(
                    "[{}]",
                    row.iter()
                        .map(|e| e.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    );

    Analysis {
        vars: problem.vars().to_vec(),
        objective_degree,
        objective_is_quadratic,
        has_constraints,
        n_eq,
        n_ineq,
        constraints_are_linear,
        convexity_hint,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::ConstraintKind;

    #[test]
    fn test_quadratic_objective() {
        let p = Problem::parse("x^2 + 2*x*y + y^2", &[], false).unwrap();
        let a = analyze(&p);
        assert_eq!(a.objective_degree, Some(2));
        assert!(a.objective_is_quadratic);
        assert!(!a.has_constraints);
    }

    #[test]
    fn test_non_polynomial_objective() {
        let p = Problem::parse("exp(x) + y^2", &[], false).unwrap();
        let a = analyze(&p);
        assert_eq!(a.objective_degree, None);
        assert!(!a.objective_is_quadratic);
    }

    #[test]
    fn test_no_constraints_not_linear() {
        // With zero constraints the linearity flag stays false so selector
        // rules keyed on "all linear" cannot fire vacuously.
        let p = Problem::parse("x^2", &[], false).unwrap();
        assert!(!analyze(&p).constraints_are_linear);
    }

    #[test]
    fn test_linear_constraints() {
        let p = Problem::parse(
            "x^2 + y^2",
            &[
                ("x + y - 1", ConstraintKind::Eq),
                ("x - 3", ConstraintKind::Le),
            ],
            false,
        )
        .unwrap();
        let a = analyze(&p);
        assert!(a.constraints_are_linear);
        assert_eq!(a.n_eq, 1);
        assert_eq!(a.n_ineq, 1);
    }

    #[test]
    fn test_nonlinear_constraint_detected() {
        let p = Problem::parse(
            "x + y",
            &[("x^2 + y^2 - 1", ConstraintKind::Le)],
            false,
        )
        .unwrap();
        assert!(!analyze(&p).constraints_are_linear);
    }

    #[test]
    fn test_convexity_hint_shows_hessian() {
        let p = Problem::parse("x^2 + y^2", &[], false).unwrap();
        assert_eq!(analyze(&p).convexity_hint, "[[2, 0], [0, 2]]");
    }
}
