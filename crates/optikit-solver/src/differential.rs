//! Critical-point analysis of an unconstrained objective.
//!
//! Solves grad f = 0, classifies each root with the Hessian eigenvalues
//! (including the degenerate case), and reports the best point whose
//! classification matches the optimization direction.

use crate::error::SolveError;
use crate::gradient::format_point;
use crate::lagrange::hessian_eigenvalues;
use crate::problem::Problem;
use crate::result::{Candidate, SolutionResult, SolutionStatus};
use crate::selector::Method;
use crate::stationary::solve_system;

const EIGEN_TOL: f64 = 1e-6;
const DEGENERATE_TOL: f64 = 1e-10;
const SYSTEM_TOL: f64 = 1e-9;

pub fn solve(problem: &Problem) -> Result<SolutionResult, SolveError> {
    if !problem.constraints.is_empty() {
        return Err(SolveError::InvalidInput(
            "critical-point analysis applies to unconstrained problems only".to_string(),
        ));
    }

    let vars = problem.vars().to_vec();
    let gradient = problem.objective.gradient();

    let mut result = SolutionResult::new(Method::Differential, SolutionStatus::Success);
    for (var, partial) in vars.iter().zip(&gradient) {
        result.explain(format!("df/d{var} = {partial} = 0."));
    }

    let roots = solve_system(&gradient, &vars, SYSTEM_TOL)?;
    if roots.is_empty() {
        return Err(SolveError::Numeric(
            "no critical points found".to_string(),
        ));
    }
    result.explain(format!("Found {} critical point(s).", roots.len()));

    let objective = problem.objective.to_numeric()?;
    let hessian = problem.objective.to_numeric_hessian()?;

    for (index, root) in roots.iter().enumerate() {
        let f = objective.call(root)?;
        let eigenvalues = hessian_eigenvalues(&hessian, root)?;
        let classification = classify(&eigenvalues);

        result.explain(format!(
            "Critical point {}: {} with f = {:.6}, Hessian eigenvalues [{}] ({}).",
            index + 1,
            format_point(&vars, root),
            f,
            eigenvalues
                .iter()
                .map(|e| format!("{e:.6}"))
                .collect::<Vec<_>>()
                .join(", "),
            classification
        ));

        let mut candidate = Candidate::new(format!("critical point {}", index + 1), root.clone(), f);
        candidate.eigenvalues = eigenvalues;
        candidate.classification = Some(classification.to_string());
        result.candidates.push(candidate);
    }

    // Pick the best candidate whose classification matches the direction of
    // optimization; plain critical-point listings stay useful even when no
    // candidate qualifies.
    let wanted = if problem.maximize {
        "local maximum"
    } else {
        "local minimum"
    };
    let best = result
        .candidates
        .iter()
        .filter(|c| c.classification.as_deref() == Some(wanted))
        .min_by(|a, b| {
            let (fa, fb) = if problem.maximize {
                (-a.f, -b.f)
            } else {
                (a.f, b.f)
            };
            fa.partial_cmp(&fb).unwrap_or(std::cmp::Ordering::Equal)
        })
        .cloned();

    match best {
        Some(candidate) => {
            result.explain(format!(
                "Best {} at {} with f = {:.6}.",
                wanted,
                format_point(&vars, &candidate.x),
                candidate.f
            ));
            result.x_star = Some(candidate.x);
            result.f_star = Some(candidate.f);
        }
        None => {
            result.explain(format!("No critical point classifies as a {wanted}."));
            result.message = Some(format!("no critical point is a {wanted}"));
        }
    }
    Ok(result)
}

fn classify(eigenvalues: &[f64]) -> &'static str {
    if eigenvalues.iter().any(|e| e.abs() < DEGENERATE_TOL) {
        "degenerate, second-order test inconclusive"
    } else if eigenvalues.iter().all(|&e| e > EIGEN_TOL) {
        "local minimum"
    } else if eigenvalues.iter().all(|&e| e < -EIGEN_TOL) {
        "local maximum"
    } else {
        "saddle point"
    }
}
