//! Extraction of standard-form QP matrices from the symbolic problem.
//!
//! The objective must be quadratic with a constant Hessian, so
//! f(x) = f0 + C'x + x'Dx/2 exactly. Linear constraints become rows of
//! A_eq x = b_eq and A_ineq x >= b_ineq (<= rows are negated).

use crate::error::SolveError;
use crate::problem::{ConstraintKind, Problem};
use nalgebra::{DMatrix, DVector};
use optikit_expr::SymbolicModel;

const CONVEXITY_TOL: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct QpMatrices {
    pub vars: Vec<String>,
    /// Gradient of the objective at the origin.
    pub c: DVector<f64>,
    /// Constant Hessian of the objective.
    pub d: DMatrix<f64>,
    /// Objective value at the origin.
    pub f0: f64,
    pub a_eq: DMatrix<f64>,
    pub b_eq: DVector<f64>,
    pub a_ineq: DMatrix<f64>,
    pub b_ineq: DVector<f64>,
    /// True when the objective is maximized; `c`, `d`, and `f0` are already
    /// negated in that case so the matrices always describe a minimization.
    pub negated: bool,
}

impl QpMatrices {
    pub fn extract(problem: &Problem) -> Result<Self, SolveError> {
        let n = problem.dim();
        let vars = problem.vars().to_vec();
        let origin = vec![0.0; n];

        if problem.objective.total_degree() != Some(2) {
            return Err(SolveError::InvalidInput(
                "quadratic programming requires a quadratic objective".to_string(),
            ));
        }

        // The Hessian must be constant for f = f0 + C'x + x'Dx/2 to be exact.
        let hessian = problem.objective.hessian();
        for row in &hessian {
            for entry in row {
                if !matches!(optikit_expr::total_degree(entry), Some(0)) {
                    return Err(SolveError::InvalidInput(
                        "the objective Hessian is not constant".to_string(),
                    ));
                }
            }
        }

        let sign = if problem.maximize { -1.0 } else { 1.0 };
        let gradient = problem.objective.to_numeric_gradient()?;
        let grad0 = gradient.call(&origin)?;
        let c = DVector::from_iterator(n, grad0.iter().map(|v| sign * v));
        let hessian0 = problem.objective.to_numeric_hessian()?.call(&origin)?;
        let d = DMatrix::from_fn(n, n, |i, j| sign * hessian0[i][j]);
        let f0 = sign * problem.objective.eval(&origin)?;

        let mut eq_rows: Vec<(Vec<f64>, f64)> = Vec::new();
        let mut ineq_rows: Vec<(Vec<f64>, f64)> = Vec::new();

        for constraint in &problem.constraints {
            if !matches!(constraint.model.total_degree(), Some(d) if d <= 1) {
                return Err(SolveError::InvalidInput(
                    "quadratic programming requires linear constraints".to_string(),
                ));
            }
            let (row, b) = linear_row(&constraint.model, &origin)?;
            match constraint.kind {
                ConstraintKind::Eq => eq_rows.push((row, b)),
                ConstraintKind::Ge => ineq_rows.push((row, b)),
                ConstraintKind::Le => {
                    let negated: Vec<f64> = row.iter().map(|v| -v).collect();
                    ineq_rows.push((negated, -b));
                }
            }
        }

        Ok(Self {
            vars,
            c,
            d,
            f0,
            a_eq: rows_to_matrix(&eq_rows, n),
            b_eq: DVector::from_iterator(eq_rows.len(), eq_rows.iter().map(|(_, b)| *b)),
            a_ineq: rows_to_matrix(&ineq_rows, n),
            b_ineq: DVector::from_iterator(ineq_rows.len(), ineq_rows.iter().map(|(_, b)| *b)),
            negated: problem.maximize,
        })
    }

    pub fn dim(&self) -> usize {
        self.vars.len()
    }

    /// f at `x` through the matrix form (internal minimization sign).
    pub fn objective_value(&self, x: &DVector<f64>) -> f64 {
        self.f0 + self.c.dot(x) + 0.5 * (x.transpose() * &self.d * x)[(0, 0)]
    }

    /// Gradient C + D x (internal minimization sign).
    pub fn objective_gradient(&self, x: &DVector<f64>) -> DVector<f64> {
        &self.c + &self.d * x
    }

    /// The QP is convex when D has no significantly negative eigenvalue.
    pub fn is_convex(&self) -> bool {
        self.d
            .clone()
            .symmetric_eigen()
            .eigenvalues
            .iter()
            .all(|&e| e >= -CONVEXITY_TOL)
    }
}

/// Splits a degree-at-most-one expression `row . x + k` into its coefficient
/// row and the bound `b = -k`.
fn linear_row(model: &SymbolicModel, origin: &[f64]) -> Result<(Vec<f64>, f64), SolveError> {
    let gradient = model.to_numeric_gradient()?;
    let row = gradient.call(origin)?;
    let k = model.eval(origin)?;
    Ok((row, -k))
}

fn rows_to_matrix(rows: &[(Vec<f64>, f64)], n: usize) -> DMatrix<f64> {
    DMatrix::from_fn(rows.len(), n, |i, j| rows[i].0[j])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_extract_simple_qp() {
        // f = x^2 + y^2 - 2x: C = (-2, 0), D = 2I
        let p = Problem::parse(
            "x^2 + y^2 - 2*x",
            &[
                ("x + y - 1", ConstraintKind::Eq),
                ("x - 3", ConstraintKind::Le),
                ("y - 0.5", ConstraintKind::Ge),
            ],
            false,
        )
        .unwrap();
        let q = QpMatrices::extract(&p).unwrap();

        assert_relative_eq!(q.c[0], -2.0);
        assert_relative_eq!(q.c[1], 0.0);
        assert_relative_eq!(q.d[(0, 0)], 2.0);
        assert_relative_eq!(q.d[(1, 1)], 2.0);
        assert_relative_eq!(q.d[(0, 1)], 0.0);

        // x + y = 1
        assert_relative_eq!(q.a_eq[(0, 0)], 1.0);
        assert_relative_eq!(q.b_eq[0], 1.0);
        // x <= 3 becomes -x >= -3
        assert_relative_eq!(q.a_ineq[(0, 0)], -1.0);
        assert_relative_eq!(q.b_ineq[0], -3.0);
        // y >= 0.5 kept as-is
        assert_relative_eq!(q.a_ineq[(1, 1)], 1.0);
        assert_relative_eq!(q.b_ineq[1], 0.5);

        assert!(q.is_convex());
    }

    #[test]
    fn test_objective_value_matches_expression() {
        let p = Problem::parse("x^2 + 3*x*y + y^2 + x - 4", &[], false).unwrap();
        let q = QpMatrices::extract(&p).unwrap();
        let point = DVector::from_vec(vec![1.5, -2.0]);
        let direct = p.objective.eval(&[1.5, -2.0]).unwrap();
        assert_relative_eq!(q.objective_value(&point), direct, epsilon = 1e-12);
    }

    #[test]
    fn test_cross_terms_in_hessian() {
        let p = Problem::parse("x^2 + 3*x*y + y^2", &[], false).unwrap();
        let q = QpMatrices::extract(&p).unwrap();
        assert_relative_eq!(q.d[(0, 1)], 3.0);
        assert_relative_eq!(q.d[(1, 0)], 3.0);
    }

    #[test]
    fn test_nonconvex_detected() {
        let p = Problem::parse("x^2 - y^2", &[], false).unwrap();
        let q = QpMatrices::extract(&p).unwrap();
        assert!(!q.is_convex());
    }

    #[test]
    fn test_rejects_cubic_objective() {
        let p = Problem::parse("x^3", &[], false).unwrap();
        assert!(matches!(
            QpMatrices::extract(&p),
            Err(SolveError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rejects_nonlinear_constraint() {
        let p = Problem::parse("x^2 + y^2", &[("x*y - 1", ConstraintKind::Eq)], false).unwrap();
        assert!(matches!(
            QpMatrices::extract(&p),
            Err(SolveError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_maximization_negates() {
        let p = Problem::parse("-x^2 + 4*x", &[], true).unwrap();
        let q = QpMatrices::extract(&p).unwrap();
        assert!(q.negated);
        assert_relative_eq!(q.c[0], -4.0);
        assert_relative_eq!(q.d[(0, 0)], 2.0);
        assert!(q.is_convex());
    }
}
