//! Lagrange multipliers for equality-constrained problems.
//!
//! Builds L = f - sum(lambda_i * g_i), solves the stationarity system in the
//! original variables and the multipliers, then classifies every stationary
//! point with the objective Hessian and reports the best one.

use crate::error::SolveError;
use crate::gradient::format_point;
use crate::problem::Problem;
use crate::result::{Candidate, SolutionResult, SolutionStatus};
use crate::selector::Method;
use crate::stationary::solve_system;
use nalgebra::DMatrix;
use optikit_expr::{Expr, diff, simplify};

const EIGEN_TOL: f64 = 1e-6;
const SYSTEM_TOL: f64 = 1e-9;

pub fn solve(problem: &Problem) -> Result<SolutionResult, SolveError> {
    let equalities: Vec<_> = problem.equalities().collect();
    if equalities.is_empty() {
        return Err(SolveError::InvalidInput(
            "Lagrange multipliers require at least one equality constraint".to_string(),
        ));
    }
    if problem.inequalities().count() > 0 {
        return Err(SolveError::InvalidInput(
            "Lagrange multipliers handle equality constraints only".to_string(),
        ));
    }

    let n = problem.dim();
    let m = equalities.len();
    let vars = problem.vars().to_vec();

    let multiplier_names: Vec<String> = (1..=m).map(|i| format!("lambda{i}")).collect();
    for name in &multiplier_names {
        if vars.contains(name) {
            return Err(SolveError::InvalidInput(format!(
                "variable name `{name}` collides with a multiplier name"
            )));
        }
    }

    let mut extended_vars = vars.clone();
    extended_vars.extend(multiplier_names.iter().cloned());

    // L = f - sum(lambda_i * g_i)
    let mut lagrangian = problem.objective.expr().clone();
    for (i, constraint) in equalities.iter().enumerate() {
        lagrangian = Expr::Sub(
            lagrangian.boxed(),
            Expr::Mul(
                Expr::var(multiplier_names[i].clone()).boxed(),
                constraint.model.expr().clone().boxed(),
            )
            .boxed(),
        );
    }

    let mut result = SolutionResult::new(Method::Lagrange, SolutionStatus::Success);
    result.explain(format!(
        "Variables: {}; multipliers: {}.",
        vars.join(", "),
        multiplier_names.join(", ")
    ));
    result.explain(format!("Lagrangian: L = {}.", simplify(&lagrangian)));

    // Stationarity in the original variables plus the original constraints.
    let mut equations: Vec<Expr> = vars
        .iter()
        .map(|v| simplify(&diff(&lagrangian, v)))
        .collect();
    for constraint in &equalities {
        equations.push(constraint.model.expr().clone());
    }
    for (i, equation) in equations.iter().enumerate() {
        if i < n {
            result.explain(format!("dL/d{} = {} = 0.", vars[i], equation));
        } else {
            result.explain(format!("Constraint: {} = 0.", equation));
        }
    }

    let solutions = solve_system(&equations, &extended_vars, SYSTEM_TOL)?;
    if solutions.is_empty() {
        // An empty solution set is an answer, not a failure: report it with
        // the conditions that were derived.
        result.explain("The stationarity system has no real solutions.".to_string());
        result.message = Some("no stationary points found".to_string());
        return Ok(result);
    }
    result.explain(format!(
        "The stationarity system has {} solution(s).",
        solutions.len()
    ));

    let hessian = problem.objective.to_numeric_hessian()?;
    let objective = problem.objective.to_numeric()?;

    for (index, solution) in solutions.iter().enumerate() {
        let x = solution[..n].to_vec();
        let multipliers: Vec<(String, f64)> = multiplier_names
            .iter()
            .cloned()
            .zip(solution[n..].iter().copied())
            .collect();

        let f = objective.call(&x)?;
        let eigenvalues = hessian_eigenvalues(&hessian, &x)?;
        let classification = classify(&eigenvalues);

        result.explain(format!(
            "Candidate {}: {} with f = {:.6} ({}).",
            index + 1,
            format_point(&vars, &x),
            f,
            classification
        ));

        let mut candidate = Candidate::new(format!("stationary point {}", index + 1), x, f);
        candidate.multipliers = multipliers;
        candidate.eigenvalues = eigenvalues;
        candidate.classification = Some(classification.to_string());
        result.candidates.push(candidate);
    }

    // All stationary points are feasible by construction, so the best one
    // is picked by objective value alone.
    let best = result
        .candidates
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            let (fa, fb) = if problem.maximize {
                (-a.f, -b.f)
            } else {
                (a.f, b.f)
            };
            fa.partial_cmp(&fb).unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
        .ok_or_else(|| SolveError::Numeric("no candidate to select".to_string()))?;

    let chosen = result.candidates[best].clone();
    result.explain(format!(
        "Selected candidate {} as the {} over all stationary points.",
        best + 1,
        if problem.maximize { "maximum" } else { "minimum" }
    ));
    result.x_star = Some(chosen.x.clone());
    result.f_star = Some(chosen.f);
    result.multipliers = chosen.multipliers.clone();
    Ok(result)
}

pub(crate) fn hessian_eigenvalues(
    hessian: &optikit_expr::NumericHessian,
    x: &[f64],
) -> Result<Vec<f64>, SolveError> {
    let rows = hessian.call(x)?;
    let n = rows.len();
    let matrix = DMatrix::from_fn(n, n, |i, j| rows[i][j]);
    let mut eigenvalues: Vec<f64> = matrix
        .symmetric_eigen()
        .eigenvalues
        .iter()
        .copied()
        .collect();
    eigenvalues.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Ok(eigenvalues)
}

pub(crate) fn classify(eigenvalues: &[f64]) -> &'static str {
    if eigenvalues.iter().all(|&e| e > EIGEN_TOL) {
        "local minimum"
    } else if eigenvalues.iter().all(|&e| e < -EIGEN_TOL) {
        "local maximum"
    } else {
        "saddle point"
    }
}
