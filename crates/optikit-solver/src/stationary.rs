//! Root finding for the square systems produced by stationarity conditions.
//!
//! Affine systems (linear constraints, quadratic objectives) are recognized
//! structurally and solved exactly with a factorization. Everything else goes
//! through damped Newton iteration from a fixed set of starting points, with
//! duplicate roots merged.

use crate::error::SolveError;
use nalgebra::{DMatrix, DVector};
use optikit_expr::{BoundExpr, Expr, diff, total_degree};

const NEWTON_MAX_ITER: usize = 100;
const NEWTON_START_VALUES: [f64; 9] = [0.0, 1.0, -1.0, 2.0, -2.0, 0.5, -0.5, 3.0, -3.0];
/// Iterate well past the residual tolerance so roots of high multiplicity,
/// where the residual flattens early, still land close to the true root.
const NEWTON_STRICT_TOL: f64 = 1e-12;
/// Roots closer than this are treated as the same point.
const ROOT_MERGE_RADIUS: f64 = 1e-3;

/// Solves `equations = 0` for `vars`. Returns every distinct real root
/// found; an empty vector means no root was located.
pub fn solve_system(
    equations: &[Expr],
    vars: &[String],
    tol: f64,
) -> Result<Vec<Vec<f64>>, SolveError> {
    if equations.len() != vars.len() {
        return Err(SolveError::Dimension {
            expected: vars.len(),
            got: equations.len(),
        });
    }
    if vars.is_empty() {
        return Ok(Vec::new());
    }

    if is_affine(equations) {
        return solve_affine(equations, vars, tol);
    }
    solve_newton(equations, vars, tol)
}

/// A system is affine when each equation has total degree at most one.
fn is_affine(equations: &[Expr]) -> bool {
    equations
        .iter()
        .all(|e| matches!(total_degree(e), Some(d) if d <= 1))
}

/// Extracts `A x + c = 0` by differentiating for the rows of `A` and
/// evaluating at the origin for `c`, then solves with LU. A singular matrix
/// falls back to the SVD least-norm solution, accepted only when it actually
/// satisfies the system.
fn solve_affine(
    equations: &[Expr],
    vars: &[String],
    tol: f64,
) -> Result<Vec<Vec<f64>>, SolveError> {
    let n = vars.len();
    let origin = vec![0.0; n];

    let mut a = DMatrix::zeros(n, n);
    let mut c = DVector::zeros(n);
    for (i, equation) in equations.iter().enumerate() {
        for (j, var) in vars.iter().enumerate() {
            let coefficient = BoundExpr::bind(&diff(equation, var), vars)?.eval(&origin)?;
            a[(i, j)] = coefficient;
        }
        c[i] = BoundExpr::bind(equation, vars)?.eval(&origin)?;
    }

    let rhs = -c.clone();
    let x = match a.clone().lu().solve(&rhs) {
        Some(x) => x,
        None => {
            let svd = a.clone().svd(true, true);
            svd.solve(&rhs, tol)
                .map_err(|e| SolveError::Numeric(e.to_string()))?
        }
    };

    let residual = (&a * &x + &c).norm();
    if residual > tol * (1.0 + c.norm()) {
        return Ok(Vec::new());
    }
    Ok(vec![x.iter().copied().collect()])
}

fn solve_newton(equations: &[Expr], vars: &[String], tol: f64) -> Result<Vec<Vec<f64>>, SolveError> {
    let n = vars.len();

    let system = equations
        .iter()
        .map(|e| BoundExpr::bind(e, vars))
        .collect::<Result<Vec<_>, _>>()?;
    let jacobian = equations
        .iter()
        .map(|e| {
            vars.iter()
                .map(|v| BoundExpr::bind(&diff(e, v), vars))
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut roots: Vec<Vec<f64>> = Vec::new();
    for start in start_points(n) {
        let Some(root) = newton_from(&system, &jacobian, &start, tol) else {
            continue;
        };
        let is_new = roots
            .iter()
            .all(|r| distance(r, &root) > ROOT_MERGE_RADIUS);
        if is_new {
            roots.push(root);
        }
    }
    Ok(roots)
}

/// Deterministic start set: each seed value replicated across coordinates,
/// plus sign-alternating variants to break symmetric basins.
fn start_points(n: usize) -> Vec<Vec<f64>> {
    let mut points = Vec::new();
    for v in NEWTON_START_VALUES {
        points.push(vec![v; n]);
    }
    for v in [1.0, 2.0] {
        let alternating: Vec<f64> = (0..n)
            .map(|i| if i % 2 == 0 { v } else { -v })
            .collect();
        points.push(alternating);
    }
    points
}

fn newton_from(
    system: &[BoundExpr],
    jacobian: &[Vec<BoundExpr>],
    start: &[f64],
    tol: f64,
) -> Option<Vec<f64>> {
    let n = start.len();
    let mut x = DVector::from_column_slice(start);

    let mut f = eval_vector(system, x.as_slice())?;
    for _ in 0..NEWTON_MAX_ITER {
        if f.amax() < NEWTON_STRICT_TOL.min(tol) {
            return Some(x.iter().copied().collect());
        }

        let mut j = DMatrix::zeros(n, n);
        for (i, row) in jacobian.iter().enumerate() {
            for (k, entry) in row.iter().enumerate() {
                j[(i, k)] = entry.eval(x.as_slice()).ok()?;
            }
        }

        let rhs = -f.clone();
        let step = match j.clone().lu().solve(&rhs) {
            Some(step) => step,
            None => j.svd(true, true).solve(&rhs, 1e-12).ok()?,
        };

        // Halve the step until the residual norm improves.
        let mut damping = 1.0;
        let mut accepted = false;
        for _ in 0..20 {
            let trial = &x + &step * damping;
            if let Some(trial_f) = eval_vector(system, trial.as_slice()) {
                if trial_f.norm() < f.norm() {
                    x = trial;
                    f = trial_f;
                    accepted = true;
                    break;
                }
            }
            damping *= 0.5;
        }
        if !accepted {
            break;
        }
    }

    if f.amax() < tol {
        Some(x.iter().copied().collect())
    } else {
        None
    }
}

fn eval_vector(system: &[BoundExpr], x: &[f64]) -> Option<DVector<f64>> {
    let values = system
        .iter()
        .map(|e| e.eval(x).ok())
        .collect::<Option<Vec<_>>>()?;
    Some(DVector::from_vec(values))
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use optikit_expr::parse;

    fn vars(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn exprs(srcs: &[&str]) -> Vec<Expr> {
        srcs.iter().map(|s| parse(s).unwrap()).collect()
    }

    #[test]
    fn test_affine_system() {
        // x + y = 3, x - y = 1 -> (2, 1)
        let roots = solve_system(
            &exprs(&["x + y - 3", "x - y - 1"]),
            &vars(&["x", "y"]),
            1e-9,
        )
        .unwrap();
        assert_eq!(roots.len(), 1);
        assert_relative_eq!(roots[0][0], 2.0, epsilon = 1e-9);
        assert_relative_eq!(roots[0][1], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_affine_inconsistent_has_no_roots() {
        let roots = solve_system(
            &exprs(&["x + y - 1", "x + y - 2"]),
            &vars(&["x", "y"]),
            1e-9,
        )
        .unwrap();
        assert!(roots.is_empty());
    }

    #[test]
    fn test_newton_finds_both_roots() {
        // x^2 = 4 has roots at 2 and -2.
        let mut roots =
            solve_system(&exprs(&["x^2 - 4"]), &vars(&["x"]), 1e-9).unwrap();
        roots.sort_by(|a, b| a[0].partial_cmp(&b[0]).unwrap());
        assert_eq!(roots.len(), 2);
        assert_relative_eq!(roots[0][0], -2.0, epsilon = 1e-6);
        assert_relative_eq!(roots[1][0], 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_linear_gradient_system() {
        // Gradient of x^2 + y^2 - 2x: unique root at (1, 0).
        let roots = solve_system(
            &exprs(&["2*x - 2", "2*y"]),
            &vars(&["x", "y"]),
            1e-9,
        )
        .unwrap();
        assert_eq!(roots.len(), 1);
        assert_relative_eq!(roots[0][0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(roots[0][1], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = solve_system(&exprs(&["x - 1"]), &vars(&["x", "y"]), 1e-9).unwrap_err();
        assert!(matches!(err, SolveError::Dimension { expected: 2, got: 1 }));
    }
}
