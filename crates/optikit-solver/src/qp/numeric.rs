//! Primal active-set solver for the standard-form QP.
//!
//! Works on min f0 + C'x + x'Dx/2 subject to A_eq x = b_eq,
//! A_ineq x >= b_ineq, and x >= 0. Each iteration solves an equality-
//! constrained subproblem on the current working set, takes the longest
//! feasible step along the resulting direction, and adds the blocking
//! constraint; a null step either proves optimality or drops the working-set
//! constraint with the most negative multiplier.

use crate::error::SolveError;
use crate::qp::matrices::QpMatrices;
use crate::result::IterationRecord;
use nalgebra::{DMatrix, DVector};

const ACTIVE_TOL: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSetOptions {
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for ActiveSetOptions {
    fn default() -> Self {
        Self {
            max_iter: 100,
            tol: 1e-8,
        }
    }
}

/// Result of the active-set iteration, still in the internal minimization
/// sign convention.
#[derive(Debug, Clone)]
pub struct ActiveSetOutcome {
    pub x: Vec<f64>,
    pub f: f64,
    pub iterations: Vec<IterationRecord>,
    /// Estimated multipliers for the equality rows.
    pub eq_multipliers: Vec<f64>,
    /// Estimated multipliers for the inequality rows (zero when inactive).
    pub ineq_multipliers: Vec<f64>,
}

pub fn solve(
    matrices: &QpMatrices,
    options: &ActiveSetOptions,
) -> Result<ActiveSetOutcome, SolveError> {
    let n = matrices.dim();

    // Inequalities and the x >= 0 bounds share one G x >= h block.
    let m_user = matrices.a_ineq.nrows();
    let m_total = m_user + n;
    let mut g_rows = DMatrix::zeros(m_total, n);
    let mut h = DVector::zeros(m_total);
    g_rows
        .view_mut((0, 0), (m_user, n))
        .copy_from(&matrices.a_ineq);
    h.rows_mut(0, m_user).copy_from(&matrices.b_ineq);
    for i in 0..n {
        g_rows[(m_user + i, i)] = 1.0;
    }

    let mut x = feasible_start(matrices, &g_rows, &h)?;
    let mut active: Vec<bool> = (0..m_total)
        .map(|i| (g_rows.row(i).transpose().dot(&x) - h[i]).abs() <= ACTIVE_TOL)
        .collect();

    let mut iterations = Vec::new();

    for k in 0..=options.max_iter {
        let grad = matrices.objective_gradient(&x);
        iterations.push(record(matrices, &g_rows, &h, k, &x, &grad));
        if k == options.max_iter {
            break;
        }

        // Working-set rows: all equalities plus the active inequalities.
        let active_rows: Vec<usize> = (0..m_total).filter(|&i| active[i]).collect();
        let p_eq = matrices.a_eq.nrows();
        let w = p_eq + active_rows.len();
        let mut n_mat = DMatrix::zeros(w, n);
        n_mat
            .view_mut((0, 0), (p_eq, n))
            .copy_from(&matrices.a_eq);
        for (r, &i) in active_rows.iter().enumerate() {
            n_mat.row_mut(p_eq + r).copy_from(&g_rows.row(i));
        }

        let (step, workset_multipliers) = subproblem(&matrices.d, &n_mat, &grad, options.tol);

        if step.norm() < options.tol {
            // Null step: optimal unless some active inequality pulls the
            // wrong way.
            let mut worst: Option<(usize, f64)> = None;
            for (r, &i) in active_rows.iter().enumerate() {
                let lambda = workset_multipliers[p_eq + r];
                if lambda < -options.tol
                    && worst.map(|(_, w)| lambda < w).unwrap_or(true)
                {
                    worst = Some((i, lambda));
                }
            }
            match worst {
                Some((i, _)) => {
                    active[i] = false;
                    continue;
                }
                None => break,
            }
        }

        // Longest feasible step along `step`, at most the full step.
        let mut alpha = 1.0;
        let mut blocking = None;
        for i in 0..m_total {
            if active[i] {
                continue;
            }
            let direction = g_rows.row(i).transpose().dot(&step);
            if direction < -options.tol {
                let slack = (g_rows.row(i).transpose().dot(&x) - h[i]).max(0.0);
                let limit = slack / -direction;
                if limit < alpha {
                    alpha = limit;
                    blocking = Some(i);
                }
            }
        }

        x += &step * alpha;
        if let Some(i) = blocking {
            active[i] = true;
        }
    }

    let grad = matrices.objective_gradient(&x);
    let eq_multipliers = estimate_eq_multipliers(&matrices.a_eq, &grad);
    let ineq_multipliers = estimate_ineq_multipliers(&matrices.a_ineq, &matrices.b_ineq, &x, &grad);

    Ok(ActiveSetOutcome {
        f: matrices.objective_value(&x),
        x: x.iter().copied().collect(),
        iterations,
        eq_multipliers,
        ineq_multipliers,
    })
}

/// Solves the equality-constrained subproblem
/// min p'Dp/2 + g'p s.t. N p = 0 via the KKT system
/// [[D, N'], [N, 0]] [p; v] = [-g; 0], returning the step and the
/// working-set multipliers lambda = -v. A singular KKT matrix falls back to
/// projecting the steepest-descent direction onto the null space of N.
fn subproblem(
    d: &DMatrix<f64>,
    n_mat: &DMatrix<f64>,
    grad: &DVector<f64>,
    tol: f64,
) -> (DVector<f64>, DVector<f64>) {
    let n = d.nrows();
    let w = n_mat.nrows();
    let size = n + w;

    let mut kkt = DMatrix::zeros(size, size);
    kkt.view_mut((0, 0), (n, n)).copy_from(d);
    kkt.view_mut((0, n), (n, w)).copy_from(&n_mat.transpose());
    kkt.view_mut((n, 0), (w, n)).copy_from(n_mat);

    let mut rhs = DVector::zeros(size);
    rhs.rows_mut(0, n).copy_from(&(-grad));

    if let Some(solution) = kkt.lu().solve(&rhs) {
        let step = solution.rows(0, n).into_owned();
        let multipliers = -solution.rows(n, w).into_owned();
        return (step, multipliers);
    }

    // Fallback: p = -(g - N' v) with v from the least-squares stationarity
    // fit, then p forced into the null space of N.
    let v = if w > 0 {
        n_mat
            .transpose()
            .svd(true, true)
            .solve(&(-grad), tol)
            .unwrap_or_else(|_| DVector::zeros(w))
    } else {
        DVector::zeros(0)
    };
    let mut step = -(grad + n_mat.transpose() * &v);
    if w > 0 {
        let correction = n_mat
            .clone()
            .svd(true, true)
            .solve(&(n_mat * &step), tol)
            .unwrap_or_else(|_| DVector::zeros(n));
        step -= correction;
    }
    (step, -v)
}

/// Moves the all-tens start into the feasible region by alternating
/// projections: exactly onto the equality subspace, then onto each violated
/// half-space.
fn feasible_start(
    matrices: &QpMatrices,
    g_rows: &DMatrix<f64>,
    h: &DVector<f64>,
) -> Result<DVector<f64>, SolveError> {
    let n = matrices.dim();
    let mut x = DVector::from_element(n, 10.0);

    for _ in 0..500 {
        x = project_equalities(matrices, &x)?;

        let mut violation: f64 = 0.0;
        for i in 0..g_rows.nrows() {
            let slack = g_rows.row(i).transpose().dot(&x) - h[i];
            if slack < 0.0 {
                violation = violation.max(-slack);
                let row_norm_sq = g_rows.row(i).norm_squared();
                if row_norm_sq > 0.0 {
                    x += g_rows.row(i).transpose() * (-slack / row_norm_sq);
                }
            }
        }
        if violation <= 1e-10 {
            let eq_residual = (&matrices.a_eq * &x - &matrices.b_eq).norm();
            if eq_residual <= ACTIVE_TOL {
                return Ok(x);
            }
        }
    }

    Err(SolveError::Infeasible(
        "could not find a feasible starting point".to_string(),
    ))
}

fn project_equalities(
    matrices: &QpMatrices,
    x: &DVector<f64>,
) -> Result<DVector<f64>, SolveError> {
    let p = matrices.a_eq.nrows();
    if p == 0 {
        return Ok(x.clone());
    }
    // Least-norm correction onto A x = b through the normal equations:
    // x + A' (A A')^-1 (b - A x).
    let residual = &matrices.b_eq - &matrices.a_eq * x;
    let gram = &matrices.a_eq * matrices.a_eq.transpose();
    let y = gram
        .svd(true, true)
        .solve(&residual, 1e-12)
        .map_err(|e| SolveError::Numeric(e.to_string()))?;
    Ok(x + matrices.a_eq.transpose() * y)
}

fn record(
    matrices: &QpMatrices,
    g_rows: &DMatrix<f64>,
    h: &DVector<f64>,
    k: usize,
    x: &DVector<f64>,
    grad: &DVector<f64>,
) -> IterationRecord {
    let mut rec = IterationRecord::new(k, x.iter().copied().collect(), matrices.objective_value(x));
    rec.grad_norm = Some(grad.norm());
    rec.eq_violation = Some((&matrices.a_eq * x - &matrices.b_eq).norm());
    let ineq_violation = (0..g_rows.nrows())
        .map(|i| (h[i] - g_rows.row(i).transpose().dot(x)).max(0.0))
        .map(|v| v * v)
        .sum::<f64>()
        .sqrt();
    rec.ineq_violation = Some(ineq_violation);
    rec
}

/// Least-squares fit of A_eq' mu = -grad, matching the stationarity
/// condition at the solution.
fn estimate_eq_multipliers(a_eq: &DMatrix<f64>, grad: &DVector<f64>) -> Vec<f64> {
    let p = a_eq.nrows();
    if p == 0 {
        return Vec::new();
    }
    a_eq.transpose()
        .svd(true, true)
        .solve(&(-grad), 1e-12)
        .map(|v| v.iter().copied().collect())
        .unwrap_or_else(|_| vec![0.0; p])
}

/// Heuristic magnitudes |grad . a_i| / |a_i| for inequality rows active at
/// the solution; inactive rows get zero.
fn estimate_ineq_multipliers(
    a_ineq: &DMatrix<f64>,
    b_ineq: &DVector<f64>,
    x: &DVector<f64>,
    grad: &DVector<f64>,
) -> Vec<f64> {
    (0..a_ineq.nrows())
        .map(|i| {
            let row = a_ineq.row(i).transpose();
            let slack = row.dot(x) - b_ineq[i];
            if slack.abs() <= ACTIVE_TOL && row.norm() > 0.0 {
                grad.dot(&row).abs() / row.norm()
            } else {
                0.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{ConstraintKind, Problem};
    use approx::assert_relative_eq;

    fn extract(objective: &str, constraints: &[(&str, ConstraintKind)]) -> QpMatrices {
        let p = Problem::parse(objective, constraints, false).unwrap();
        QpMatrices::extract(&p).unwrap()
    }

    #[test]
    fn test_projection_with_bounds() {
        // min x^2 + y^2 s.t. x + y = 1, x,y >= 0 -> (0.5, 0.5), f = 0.5
        let matrices = extract("x^2 + y^2", &[("x + y - 1", ConstraintKind::Eq)]);
        let outcome = solve(&matrices, &ActiveSetOptions::default()).unwrap();

        assert_relative_eq!(outcome.x[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(outcome.x[1], 0.5, epsilon = 1e-6);
        assert_relative_eq!(outcome.f, 0.5, epsilon = 1e-6);
        // Stationarity gives A_eq' mu = -grad: mu = -1 for grad (1, 1).
        assert_relative_eq!(outcome.eq_multipliers[0], -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_active_inequality() {
        // min (x - 2)^2 + (y - 2)^2 s.t. x + y = 3, x <= 1
        // -> x = 1, y = 2.
        let matrices = extract(
            "(x - 2)^2 + (y - 2)^2",
            &[
                ("x + y - 3", ConstraintKind::Eq),
                ("x - 1", ConstraintKind::Le),
            ],
        );
        let outcome = solve(&matrices, &ActiveSetOptions::default()).unwrap();
        assert_relative_eq!(outcome.x[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(outcome.x[1], 2.0, epsilon = 1e-6);
        assert!(outcome.ineq_multipliers[0] > 0.0);
    }

    #[test]
    fn test_every_iteration_is_logged() {
        let matrices = extract("x^2 + y^2", &[("x + y - 1", ConstraintKind::Eq)]);
        let outcome = solve(&matrices, &ActiveSetOptions::default()).unwrap();
        assert!(!outcome.iterations.is_empty());
        for (k, rec) in outcome.iterations.iter().enumerate() {
            assert_eq!(rec.k, k);
            assert!(rec.grad_norm.is_some());
            assert!(rec.eq_violation.is_some());
            assert!(rec.ineq_violation.is_some());
        }
        // The trace starts feasible and stays feasible.
        for rec in &outcome.iterations {
            assert!(rec.eq_violation.unwrap() < 1e-6);
            assert!(rec.ineq_violation.unwrap() < 1e-6);
        }
    }

    #[test]
    fn test_infeasible_start_reported() {
        // x >= 5 and x <= 3 (as -x >= -3) cannot both hold.
        let matrices = extract(
            "x^2",
            &[
                ("x - 5", ConstraintKind::Ge),
                ("x - 3", ConstraintKind::Le),
            ],
        );
        let err = solve(&matrices, &ActiveSetOptions::default()).unwrap_err();
        assert!(matches!(err, SolveError::Infeasible(_)));
    }
}
