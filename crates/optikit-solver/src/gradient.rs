//! Gradient descent with Armijo backtracking line search.
//!
//! The solver minimizes; maximization is handled by descending on the
//! negated objective and reporting sign-corrected values. Constraints are
//! ignored here, the method exists to show the unconstrained iteration.

use crate::error::SolveError;
use crate::problem::Problem;
use crate::result::{IterationRecord, SolutionResult, SolutionStatus};
use crate::selector::Method;

const ARMIJO_C: f64 = 1e-4;
const ARMIJO_SHRINK: f64 = 0.5;
const ALPHA_FLOOR: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct GradientOptions {
    /// Starting point; defaults to the origin.
    pub x0: Option<Vec<f64>>,
    pub tol: f64,
    pub max_iter: usize,
}

impl Default for GradientOptions {
    fn default() -> Self {
        Self {
            x0: None,
            tol: 1e-6,
            max_iter: 200,
        }
    }
}

pub fn solve(problem: &Problem, options: &GradientOptions) -> Result<SolutionResult, SolveError> {
    let n = problem.dim();
    let objective = problem.objective.to_numeric()?;
    let gradient = problem.objective.to_numeric_gradient()?;
    let sign = if problem.maximize { -1.0 } else { 1.0 };

    let mut x = match &options.x0 {
        Some(x0) => {
            if x0.len() != n {
                return Err(SolveError::Dimension {
                    expected: n,
                    got: x0.len(),
                });
            }
            x0.clone()
        }
        None => vec![0.0; n],
    };

    let mut result = SolutionResult::new(Method::Gradient, SolutionStatus::Ok);
    result.explain(format!(
        "Gradient descent on {} variable(s), tolerance {:.1e}, at most {} iterations.",
        n, options.tol, options.max_iter
    ));
    result.explain(format!(
        "Starting point: {}.",
        format_point(problem.vars(), &x)
    ));
    if problem.maximize {
        result.explain("Maximization: descending on the negated objective.".to_string());
    }

    let mut fx = sign * objective.call(&x)?;
    let mut last_alpha: Option<f64> = None;
    let mut stop_note: Option<String> = None;

    for k in 0..=options.max_iter {
        let g: Vec<f64> = gradient.call(&x)?.iter().map(|v| sign * v).collect();
        let grad_norm = norm(&g);

        let mut record = IterationRecord::new(k, x.clone(), sign * fx);
        record.grad_norm = Some(grad_norm);
        record.alpha = last_alpha;

        if grad_norm < options.tol {
            record.note = Some("gradient norm below tolerance".to_string());
            result.iterations.push(record);
            stop_note = Some(format!(
                "Converged after {k} iteration(s): gradient norm {grad_norm:.3e} is below tolerance."
            ));
            break;
        }
        if k == options.max_iter {
            record.note = Some("iteration limit reached".to_string());
            result.iterations.push(record);
            stop_note = Some(format!(
                "Stopped at the iteration limit ({}) with gradient norm {grad_norm:.3e}.",
                options.max_iter
            ));
            break;
        }

        // Armijo backtracking: shrink alpha until the sufficient-decrease
        // condition f(x - a g) <= f(x) - c a |g|^2 holds.
        let g_sq = grad_norm * grad_norm;
        let mut alpha = 1.0;
        let step = loop {
            let trial: Vec<f64> = x.iter().zip(&g).map(|(xi, gi)| xi - alpha * gi).collect();
            match objective.call(&trial) {
                Ok(f_trial) => {
                    let f_trial = sign * f_trial;
                    if f_trial <= fx - ARMIJO_C * alpha * g_sq {
                        break Some((trial, f_trial));
                    }
                }
                Err(_) => {}
            }
            alpha *= ARMIJO_SHRINK;
            if alpha < ALPHA_FLOOR {
                break None;
            }
        };

        let Some((x_new, f_new)) = step else {
            record.note = Some("line search stalled".to_string());
            result.iterations.push(record);
            stop_note = Some(format!(
                "Line search stalled at iteration {k}: no step above {ALPHA_FLOOR:.0e} gave sufficient decrease."
            ));
            break;
        };

        result.iterations.push(record);
        let converged_by_change = (f_new - fx).abs() < options.tol * (1.0 + fx.abs());
        x = x_new;
        fx = f_new;
        last_alpha = Some(alpha);

        if converged_by_change {
            let g_final: Vec<f64> = gradient.call(&x)?.iter().map(|v| sign * v).collect();
            let mut terminal = IterationRecord::new(k + 1, x.clone(), sign * fx);
            terminal.grad_norm = Some(norm(&g_final));
            terminal.alpha = Some(alpha);
            terminal.note = Some("relative objective change below tolerance".to_string());
            result.iterations.push(terminal);
            stop_note = Some(format!(
                "Converged after {} iteration(s): relative objective change is below tolerance.",
                k + 1
            ));
            break;
        }
    }

    if let Some(note) = stop_note {
        result.explain(note);
    }
    result.explain(format!(
        "Final point: {} with objective value {:.6}.",
        format_point(problem.vars(), &x),
        sign * fx
    ));

    result.x_star = Some(x);
    result.f_star = Some(sign * fx);
    Ok(result)
}

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

pub(crate) fn format_point(vars: &[String], x: &[f64]) -> String {
    vars.iter()
        .zip(x)
        .map(|(name, value)| format!("{name} = {value:.6}"))
        .collect::<Vec<_>>()
        .join(", ")
}
