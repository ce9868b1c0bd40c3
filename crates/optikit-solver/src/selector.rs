use crate::analyzer::Analysis;
use crate::error::SolveError;
use std::fmt;

/// The solution methods the engine can dispatch to.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Gradient,
    Lagrange,
    Kkt,
    Qp,
    Differential,
}

impl Method {
    pub fn name(self) -> &'static str {
        match self {
            Method::Gradient => "gradient",
            Method::Lagrange => "lagrange",
            Method::Kkt => "kkt",
            Method::Qp => "qp",
            Method::Differential => "differential",
        }
    }

    pub fn parse(name: &str) -> Option<Method> {
        match name {
            "gradient" => Some(Method::Gradient),
            "lagrange" => Some(Method::Lagrange),
            "kkt" => Some(Method::Kkt),
            "qp" => Some(Method::Qp),
            "differential" => Some(Method::Differential),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Caller-supplied hints that steer selection ahead of the structural rules.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hints {
    /// The caller wants an iterative trace rather than an analytic solve.
    pub iterative: bool,
    /// The caller only wants critical-point analysis of an unconstrained
    /// objective.
    pub derivative_only: bool,
    /// Forces a specific method, bypassing the rules.
    pub method_hint: Option<Method>,
}

/// The outcome of method selection: which method, which rule fired, and a
/// one-line rationale for the explanation text.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecision {
    pub method: Method,
    pub rule: u8,
    pub rationale: String,
}

/// The deterministic selection rules. First match wins; the rule order is a
/// compatibility contract, so changes must bump [`RuleBook::VERSION`].
pub struct RuleBook;

impl RuleBook {
    pub const VERSION: &'static str = "1.0";

    pub fn select(analysis: &Analysis, hints: &Hints) -> Result<MethodDecision, SolveError> {
        if let Some(method) = hints.method_hint {
            return Ok(MethodDecision {
                method,
                rule: 0,
                rationale: format!("method `{method}` requested by caller"),
            });
        }

        if hints.iterative {
            return Ok(MethodDecision {
                method: Method::Gradient,
                rule: 1,
                rationale: "iterative solve requested, using gradient descent".to_string(),
            });
        }

        if analysis.has_constraints && !analysis.constraints_are_linear {
            return Ok(MethodDecision {
                method: Method::Kkt,
                rule: 2,
                rationale: "nonlinear constraints present, using KKT conditions".to_string(),
            });
        }

        if analysis.objective_is_quadratic
            && analysis.constraints_are_linear
            && analysis.n_eq >= 1
            && analysis.n_ineq >= 1
        {
            return Ok(MethodDecision {
                method: Method::Qp,
                rule: 3,
                rationale:
                    "quadratic objective with mixed linear constraints, using quadratic programming"
                        .to_string(),
            });
        }

        if analysis.n_eq >= 1 && analysis.n_ineq == 0 {
            return Ok(MethodDecision {
                method: Method::Lagrange,
                rule: 4,
                rationale: "equality constraints only, using Lagrange multipliers".to_string(),
            });
        }

        if analysis.n_ineq >= 1 {
            return Ok(MethodDecision {
                method: Method::Kkt,
                rule: 5,
                rationale: "inequality constraints present, using KKT conditions".to_string(),
            });
        }

        if !analysis.has_constraints {
            let (method, rationale) = if hints.derivative_only {
                (
                    Method::Differential,
                    "unconstrained critical-point analysis requested",
                )
            } else {
                (
                    Method::Gradient,
                    "unconstrained problem, using gradient descent",
                )
            };
            return Ok(MethodDecision {
                method,
                rule: 6,
                rationale: rationale.to_string(),
            });
        }

        Err(SolveError::Unclassifiable(
            "no selection rule matched the problem structure".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze;
    use crate::problem::{ConstraintKind, Problem};

    fn decide(
        objective: &str,
        constraints: &[(&str, ConstraintKind)],
        hints: Hints,
    ) -> MethodDecision {
        let p = Problem::parse(objective, constraints, false).unwrap();
        RuleBook::select(&analyze(&p), &hints).unwrap()
    }

    #[test]
    fn test_hint_overrides_rules() {
        let d = decide(
            "x^2",
            &[],
            Hints {
                method_hint: Some(Method::Differential),
                ..Hints::default()
            },
        );
        assert_eq!(d.method, Method::Differential);
        assert_eq!(d.rule, 0);
    }

    #[test]
    fn test_iterative_hint_selects_gradient() {
        let d = decide(
            "x^2 + y^2",
            &[("x + y - 1", ConstraintKind::Eq)],
            Hints {
                iterative: true,
                ..Hints::default()
            },
        );
        assert_eq!(d.method, Method::Gradient);
        assert_eq!(d.rule, 1);
    }

    #[test]
    fn test_nonlinear_constraints_select_kkt() {
        let d = decide(
            "x + y",
            &[("x^2 + y^2 - 1", ConstraintKind::Eq)],
            Hints::default(),
        );
        assert_eq!(d.method, Method::Kkt);
        assert_eq!(d.rule, 2);
    }

    #[test]
    fn test_mixed_linear_quadratic_selects_qp() {
        let d = decide(
            "x^2 + y^2",
            &[
                ("x + y - 1", ConstraintKind::Eq),
                ("x - 2", ConstraintKind::Le),
            ],
            Hints::default(),
        );
        assert_eq!(d.method, Method::Qp);
        assert_eq!(d.rule, 3);
    }

    #[test]
    fn test_equalities_only_select_lagrange() {
        let d = decide(
            "x^2 + y^2",
            &[("x + y - 1", ConstraintKind::Eq)],
            Hints::default(),
        );
        assert_eq!(d.method, Method::Lagrange);
        assert_eq!(d.rule, 4);
    }

    #[test]
    fn test_inequalities_select_kkt() {
        let d = decide(
            "x^2 + y^2",
            &[("1 - x - y", ConstraintKind::Le)],
            Hints::default(),
        );
        assert_eq!(d.method, Method::Kkt);
        assert_eq!(d.rule, 5);
    }

    #[test]
    fn test_unconstrained_defaults_to_gradient() {
        let d = decide("x^2 + y^2", &[], Hints::default());
        assert_eq!(d.method, Method::Gradient);
        assert_eq!(d.rule, 6);
    }

    #[test]
    fn test_derivative_only_selects_differential() {
        let d = decide(
            "x^4 - 2*x^2",
            &[],
            Hints {
                derivative_only: true,
                ..Hints::default()
            },
        );
        assert_eq!(d.method, Method::Differential);
        assert_eq!(d.rule, 6);
    }

    #[test]
    fn test_cubic_objective_with_mixed_linear_constraints_is_kkt() {
        // Rule 3 requires a quadratic objective, so a cubic falls through to
        // the inequality rule.
        let d = decide(
            "x^3 + y^2",
            &[
                ("x + y - 1", ConstraintKind::Eq),
                ("x - 2", ConstraintKind::Le),
            ],
            Hints::default(),
        );
        assert_eq!(d.method, Method::Kkt);
        assert_eq!(d.rule, 5);
    }
}
