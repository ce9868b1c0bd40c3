//! Karush-Kuhn-Tucker analysis by active-set case enumeration.
//!
//! Inequalities are normalized to `g <= 0` and every subset of them is tried
//! as the active set. Each case yields a square stationarity system; its
//! solutions are then checked numerically against all four KKT conditions.

use crate::error::SolveError;
use crate::gradient::format_point;
use crate::lagrange::hessian_eigenvalues;
use crate::problem::{ConstraintKind, Problem};
use crate::result::{Candidate, SolutionResult, SolutionStatus};
use crate::selector::Method;
use crate::stationary::solve_system;
use optikit_expr::{BoundExpr, Expr, diff, simplify};

const KKT_TOL: f64 = 1e-6;
const SYSTEM_TOL: f64 = 1e-9;
const EIGEN_TOL: f64 = 1e-6;
/// Case enumeration is 2^m; refuse problems past this many inequalities.
const MAX_INEQUALITIES: usize = 16;

pub fn solve(problem: &Problem) -> Result<SolutionResult, SolveError> {
    let n = problem.dim();
    let vars = problem.vars().to_vec();

    // Normalize: h = 0 for equalities, g <= 0 for inequalities (>= rows are
    // negated).
    let equalities: Vec<Expr> = problem
        .equalities()
        .map(|c| c.model.expr().clone())
        .collect();
    let inequalities: Vec<Expr> = problem
        .inequalities()
        .map(|c| match c.kind {
            ConstraintKind::Le => c.model.expr().clone(),
            ConstraintKind::Ge => Expr::Neg(c.model.expr().clone().boxed()),
            ConstraintKind::Eq => unreachable!(),
        })
        .collect();

    let m = inequalities.len();
    let p = equalities.len();
    if problem.constraints.is_empty() {
        return Err(SolveError::InvalidInput(
            "KKT analysis requires at least one constraint".to_string(),
        ));
    }
    if m > MAX_INEQUALITIES {
        return Err(SolveError::InvalidInput(format!(
            "{m} inequality constraints exceed the case-enumeration limit of {MAX_INEQUALITIES}"
        )));
    }

    let lambda_names: Vec<String> = (1..=m).map(|i| format!("lambda{i}")).collect();
    let mu_names: Vec<String> = (1..=p).map(|i| format!("mu{i}")).collect();
    for name in lambda_names.iter().chain(&mu_names) {
        if vars.contains(name) {
            return Err(SolveError::InvalidInput(format!(
                "variable name `{name}` collides with a multiplier name"
            )));
        }
    }

    let mut extended_vars = vars.clone();
    extended_vars.extend(lambda_names.iter().cloned());
    extended_vars.extend(mu_names.iter().cloned());

    // Internally always minimize; flip the objective for maximization and
    // undo the sign when reporting values.
    let sign = if problem.maximize { -1.0 } else { 1.0 };
    let internal_objective = if problem.maximize {
        Expr::Neg(problem.objective.expr().clone().boxed())
    } else {
        problem.objective.expr().clone()
    };

    // L = f + sum(lambda_i g_i) + sum(mu_j h_j)
    let mut lagrangian = internal_objective.clone();
    for (i, g) in inequalities.iter().enumerate() {
        lagrangian = Expr::Add(
            lagrangian.boxed(),
            Expr::Mul(Expr::var(lambda_names[i].clone()).boxed(), g.clone().boxed()).boxed(),
        );
    }
    for (j, h) in equalities.iter().enumerate() {
        lagrangian = Expr::Add(
            lagrangian.boxed(),
            Expr::Mul(Expr::var(mu_names[j].clone()).boxed(), h.clone().boxed()).boxed(),
        );
    }

    let mut result = SolutionResult::new(Method::Kkt, SolutionStatus::Success);
    if problem.maximize {
        result.explain("Maximization: analyzing the negated objective.".to_string());
    }
    result.explain(format!(
        "Normalized constraints: {} inequality(ies) g <= 0, {} equality(ies) h = 0.",
        m, p
    ));
    result.explain(format!("Lagrangian: L = {}.", simplify(&lagrangian)));
    result.explain(format!(
        "Enumerating {} active-set case(s).",
        1usize << m
    ));

    let stationarity: Vec<Expr> = vars
        .iter()
        .map(|v| simplify(&diff(&lagrangian, v)))
        .collect();

    let hessian = problem.objective.to_numeric_hessian()?;
    let objective_fn = BoundExpr::bind(&internal_objective, &vars)?;
    let g_fns = inequalities
        .iter()
        .map(|g| BoundExpr::bind(g, &vars))
        .collect::<Result<Vec<_>, _>>()?;
    let h_fns = equalities
        .iter()
        .map(|h| BoundExpr::bind(h, &vars))
        .collect::<Result<Vec<_>, _>>()?;

    // (internal f, candidate) pairs; sorted ascending by internal value so
    // maximization picks the right point before sign correction.
    let mut valid: Vec<(f64, Candidate)> = Vec::new();

    for case in 0..(1usize << m) {
        let active: Vec<usize> = (0..m).filter(|i| case & (1 << i) != 0).collect();

        let mut equations = stationarity.clone();
        for h in &equalities {
            equations.push(h.clone());
        }
        for i in 0..m {
            if active.contains(&i) {
                equations.push(inequalities[i].clone());
            } else {
                equations.push(Expr::var(lambda_names[i].clone()));
            }
        }

        let Ok(solutions) = solve_system(&equations, &extended_vars, SYSTEM_TOL) else {
            continue;
        };

        for solution in solutions {
            let x = solution[..n].to_vec();
            let lambdas = &solution[n..n + m];
            let mus = &solution[n + m..];

            if !verify_candidate(&x, lambdas, &g_fns, &h_fns) {
                continue;
            }
            let Ok(f_internal) = objective_fn.eval(&x) else {
                continue;
            };

            let label = if active.is_empty() {
                "no active inequalities".to_string()
            } else {
                format!(
                    "active: {}",
                    active
                        .iter()
                        .map(|i| format!("g{}", i + 1))
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            };
            let eigenvalues = hessian_eigenvalues(&hessian, &x)?;
            let mut candidate = Candidate::new(label, x, sign * f_internal);
            candidate.classification = Some(definiteness(&eigenvalues).to_string());
            candidate.eigenvalues = eigenvalues;
            candidate.multipliers = lambda_names
                .iter()
                .cloned()
                .zip(lambdas.iter().copied())
                .chain(mu_names.iter().cloned().zip(mus.iter().copied()))
                .collect();
            valid.push((f_internal, candidate));
        }
    }

    if valid.is_empty() {
        return Err(SolveError::Numeric("no valid KKT candidates".to_string()));
    }
    valid.sort_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    result.explain(format!(
        "{} candidate(s) satisfy all KKT conditions.",
        valid.len()
    ));
    for (index, (_, candidate)) in valid.iter().enumerate() {
        result.explain(format!(
            "Candidate {} ({}): {} with f = {:.6}; objective Hessian eigenvalues [{}] ({}).",
            index + 1,
            candidate.label,
            format_point(&vars, &candidate.x),
            candidate.f,
            candidate
                .eigenvalues
                .iter()
                .map(|e| format!("{e:.6}"))
                .collect::<Vec<_>>()
                .join(", "),
            candidate.classification.as_deref().unwrap_or("unclassified")
        ));
    }

    let best = valid[0].1.clone();
    result.explain(format!(
        "Selected the candidate with the best objective value, f = {:.6}.",
        best.f
    ));
    result.x_star = Some(best.x.clone());
    result.f_star = Some(best.f);
    result.multipliers = best.multipliers.clone();
    result.candidates = valid.into_iter().map(|(_, c)| c).collect();
    Ok(result)
}

/// Definiteness of the objective Hessian from its sorted eigenvalues.
fn definiteness(eigenvalues: &[f64]) -> &'static str {
    if eigenvalues.iter().all(|&e| e > EIGEN_TOL) {
        "positive definite, the objective is locally convex"
    } else if eigenvalues.iter().all(|&e| e >= -EIGEN_TOL) {
        "positive semidefinite"
    } else if eigenvalues.iter().all(|&e| e < -EIGEN_TOL) {
        "negative definite, the objective is locally concave"
    } else if eigenvalues.iter().all(|&e| e <= EIGEN_TOL) {
        "negative semidefinite"
    } else {
        "indefinite"
    }
}

/// Checks primal feasibility, dual feasibility, and complementary slackness
/// at numeric tolerance. Stationarity already holds because the point solves
/// the case system.
fn verify_candidate(
    x: &[f64],
    lambdas: &[f64],
    g_fns: &[BoundExpr],
    h_fns: &[BoundExpr],
) -> bool {
    for h in h_fns {
        match h.eval(x) {
            Ok(value) if value.abs() <= KKT_TOL => {}
            _ => return false,
        }
    }
    for (i, g) in g_fns.iter().enumerate() {
        let Ok(value) = g.eval(x) else {
            return false;
        };
        if value > KKT_TOL {
            return false;
        }
        if lambdas[i] < -KKT_TOL {
            return false;
        }
        if (lambdas[i] * value).abs() > KKT_TOL {
            return false;
        }
    }
    true
}
