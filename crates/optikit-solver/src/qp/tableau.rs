//! Two-phase simplex over the QP constraint polytope.
//!
//! Phase I drives the artificial variables out to find a basic feasible
//! vertex; Phase II pivots on the linearized objective C'x. The quadratic
//! objective is then evaluated at the final vertex. Variables are
//! non-negative in this form.

use crate::error::SolveError;
use crate::qp::matrices::QpMatrices;

const FEASIBILITY_TOL: f64 = 1e-6;

pub struct TableauSolver {
    max_iterations: usize,
    tolerance: f64,
}

impl Default for TableauSolver {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            tolerance: 1e-9,
        }
    }
}

/// The vertex the tableau ended on, with the quadratic objective evaluated
/// there (internal minimization sign).
#[derive(Debug, Clone)]
pub struct TableauOutcome {
    pub x: Vec<f64>,
    pub f: f64,
    pub pivots: usize,
}

struct Tableau {
    data: Vec<Vec<f64>>,
    basic_vars: Vec<usize>,
    n_vars: usize,
    n_slack: usize,
    n_artificial: usize,
}

impl TableauSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn solve(&self, matrices: &QpMatrices) -> Result<TableauOutcome, SolveError> {
        let mut tableau = self.build_tableau(matrices);
        let mut pivots = 0;

        if tableau.n_artificial > 0 && !self.phase1(&mut tableau, &mut pivots) {
            return Err(SolveError::Infeasible(
                "the constraint system has no feasible point".to_string(),
            ));
        }
        self.load_objective(&mut tableau, matrices);
        if !self.phase2(&mut tableau, &mut pivots) {
            return Err(SolveError::Numeric(
                "the linearized objective is unbounded over the feasible region".to_string(),
            ));
        }

        let x = self.extract_vertex(&tableau);
        let point = nalgebra::DVector::from_column_slice(&x);
        Ok(TableauOutcome {
            f: matrices.objective_value(&point),
            x,
            pivots,
        })
    }

    fn build_tableau(&self, matrices: &QpMatrices) -> Tableau {
        let n_vars = matrices.dim();
        let n_eq = matrices.a_eq.nrows();
        let n_ineq = matrices.a_ineq.nrows();
        let n_constraints = n_eq + n_ineq;

        // One surplus per inequality; one artificial per row (flipped
        // inequality rows keep theirs, which is harmless).
        let n_slack = n_ineq;
        let n_artificial = n_constraints;
        let total_cols = n_vars + n_slack + n_artificial + 1;

        let mut tableau = Tableau {
            data: vec![vec![0.0; total_cols]; n_constraints + 1],
            basic_vars: vec![0; n_constraints],
            n_vars,
            n_slack,
            n_artificial,
        };

        let mut slack_idx = n_vars;
        let artificial_start = n_vars + n_slack;

        for i in 0..n_constraints {
            let (row, rhs, is_eq) = if i < n_eq {
                (matrices.a_eq.row(i), matrices.b_eq[i], true)
            } else {
                (
                    matrices.a_ineq.row(i - n_eq),
                    matrices.b_ineq[i - n_eq],
                    false,
                )
            };

            let flip = rhs < 0.0;
            let sign = if flip { -1.0 } else { 1.0 };
            for j in 0..n_vars {
                tableau.data[i][j] = sign * row[j];
            }
            tableau.data[i][total_cols - 1] = sign * rhs;

            if !is_eq {
                // a x - s = b becomes -a x + s = -b after a flip.
                tableau.data[i][slack_idx] = -sign;
                slack_idx += 1;
            }
            tableau.data[i][artificial_start + i] = 1.0;
            tableau.basic_vars[i] = artificial_start + i;
        }

        tableau
    }

    /// Minimizes the sum of artificials. Feasible when that sum reaches zero.
    fn phase1(&self, tableau: &mut Tableau, pivots: &mut usize) -> bool {
        let n_constraints = tableau.data.len() - 1;
        let n_cols = tableau.data[0].len();
        let artificial_start = tableau.n_vars + tableau.n_slack;

        // Cost row: 1 on each artificial, reduced against the basis (every
        // row starts with a basic artificial).
        for j in 0..n_cols {
            tableau.data[n_constraints][j] = 0.0;
        }
        for j in artificial_start..(artificial_start + tableau.n_artificial) {
            tableau.data[n_constraints][j] = 1.0;
        }
        for i in 0..n_constraints {
            for j in 0..n_cols {
                tableau.data[n_constraints][j] -= tableau.data[i][j];
            }
        }

        for _ in 0..self.max_iterations {
            let Some(pivot_col) = self.entering_column(tableau, n_cols - 1) else {
                break;
            };
            let Some(pivot_row) = self.leaving_row(tableau, pivot_col) else {
                return false;
            };
            self.pivot(tableau, pivot_row, pivot_col);
            *pivots += 1;
        }

        // The cost-row RHS holds -W after the reductions.
        tableau.data[n_constraints][n_cols - 1].abs() < FEASIBILITY_TOL
    }

    /// Installs the linearized objective C and reduces it against the
    /// current basis.
    fn load_objective(&self, tableau: &mut Tableau, matrices: &QpMatrices) {
        let n_constraints = tableau.data.len() - 1;
        let n_cols = tableau.data[0].len();

        for j in 0..n_cols {
            tableau.data[n_constraints][j] = 0.0;
        }
        for j in 0..tableau.n_vars {
            tableau.data[n_constraints][j] = matrices.c[j];
        }
        for i in 0..n_constraints {
            let basic = tableau.basic_vars[i];
            let cost = tableau.data[n_constraints][basic];
            if cost.abs() > self.tolerance {
                for j in 0..n_cols {
                    tableau.data[n_constraints][j] -= cost * tableau.data[i][j];
                }
            }
        }
    }

    /// Pivots until no reduced cost is negative. Artificial columns are
    /// excluded from entering. Returns false on an unbounded direction.
    fn phase2(&self, tableau: &mut Tableau, pivots: &mut usize) -> bool {
        let artificial_start = tableau.n_vars + tableau.n_slack;

        for _ in 0..self.max_iterations {
            let Some(pivot_col) = self.entering_column(tableau, artificial_start) else {
                return true;
            };
            let Some(pivot_row) = self.leaving_row(tableau, pivot_col) else {
                return false;
            };
            self.pivot(tableau, pivot_row, pivot_col);
            *pivots += 1;
        }
        true
    }

    /// Most negative reduced cost among the first `limit` columns.
    fn entering_column(&self, tableau: &Tableau, limit: usize) -> Option<usize> {
        let cost_row = tableau.data.len() - 1;
        let mut best = -self.tolerance;
        let mut best_col = None;
        for j in 0..limit {
            if tableau.data[cost_row][j] < best {
                best = tableau.data[cost_row][j];
                best_col = Some(j);
            }
        }
        best_col
    }

    /// Minimum-ratio test over rows with a positive pivot entry.
    fn leaving_row(&self, tableau: &Tableau, col: usize) -> Option<usize> {
        let n_constraints = tableau.data.len() - 1;
        let rhs_col = tableau.data[0].len() - 1;

        let mut min_ratio = f64::INFINITY;
        let mut min_row = None;
        for i in 0..n_constraints {
            let value = tableau.data[i][col];
            if value > self.tolerance {
                let ratio = tableau.data[i][rhs_col] / value;
                if ratio >= 0.0 && ratio < min_ratio {
                    min_ratio = ratio;
                    min_row = Some(i);
                }
            }
        }
        min_row
    }

    fn pivot(&self, tableau: &mut Tableau, row: usize, col: usize) {
        let n_rows = tableau.data.len();
        let n_cols = tableau.data[0].len();

        tableau.basic_vars[row] = col;
        let pivot_value = tableau.data[row][col];
        for j in 0..n_cols {
            tableau.data[row][j] /= pivot_value;
        }
        for i in 0..n_rows {
            if i != row {
                let factor = tableau.data[i][col];
                if factor != 0.0 {
                    for j in 0..n_cols {
                        tableau.data[i][j] -= factor * tableau.data[row][j];
                    }
                }
            }
        }
    }

    fn extract_vertex(&self, tableau: &Tableau) -> Vec<f64> {
        let n_constraints = tableau.data.len() - 1;
        let rhs_col = tableau.data[0].len() - 1;
        let mut x = vec![0.0; tableau.n_vars];
        for i in 0..n_constraints {
            let basic = tableau.basic_vars[i];
            if basic < tableau.n_vars {
                x[basic] = tableau.data[i][rhs_col];
            }
        }
        x
    }
}
