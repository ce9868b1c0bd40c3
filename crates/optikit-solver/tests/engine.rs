use approx::assert_relative_eq;
use optikit_solver::{
    ConstraintKind, GradientOptions, Hints, Method, Problem, QpStrategy, SolutionStatus,
    SolveRequest,
};

fn portfolio() -> Problem {
    // Allocate 100 units across three assets A, B, F: minimize the
    // quadratic risk subject to a minimum return and per-asset limits.
    Problem::parse(
        "0.04*A^2 + 0.02*B^2 + 0.03*F^2 + 0.01*A*B + 0.015*A*F + 0.005*B*F",
        &[
            ("A + B + F - 100", ConstraintKind::Eq),
            ("0.10*A + 0.05*B + 0.08*F - 7.5", ConstraintKind::Ge),
            ("A - 20", ConstraintKind::Ge),
            ("B - 50", ConstraintKind::Le),
            ("F - 10", ConstraintKind::Ge),
            ("F - 40", ConstraintKind::Le),
            ("B + F - 45", ConstraintKind::Ge),
        ],
        false,
    )
    .unwrap()
}

#[test]
fn portfolio_routes_to_qp() {
    let (analysis, decision) =
        optikit_solver::classify(&SolveRequest::new(portfolio())).unwrap();
    assert!(analysis.objective_is_quadratic);
    assert!(analysis.constraints_are_linear);
    assert_eq!(decision.method, Method::Qp);
    assert_eq!(decision.rule, 3);
}

#[test]
fn portfolio_solution_is_feasible() {
    let r = optikit_solver::solve(&SolveRequest::new(portfolio()));
    assert_eq!(r.status, SolutionStatus::Success);

    let x = r.x_star.unwrap();
    let (a, b, f) = (x[0], x[1], x[2]);
    assert_relative_eq!(a + b + f, 100.0, epsilon = 1e-6);
    assert!(0.10 * a + 0.05 * b + 0.08 * f >= 7.5 - 1e-6);
    assert!(a >= 20.0 - 1e-6);
    assert!(b <= 50.0 + 1e-6);
    assert!((10.0 - 1e-6..=40.0 + 1e-6).contains(&f));
    assert!(b + f >= 45.0 - 1e-6);

    assert!(!r.iterations.is_empty());
    assert!(r.multipliers.iter().any(|(name, _)| name == "mu1"));
}

#[test]
fn portfolio_solve_is_repeatable() {
    let a = optikit_solver::solve(&SolveRequest::new(portfolio()));
    let b = optikit_solver::solve(&SolveRequest::new(portfolio()));
    assert_eq!(a.x_star, b.x_star);
    assert_eq!(a.f_star, b.f_star);
}

#[test]
fn portfolio_tableau_strategy_reports_vertex() {
    let r = optikit_solver::solve(
        &SolveRequest::new(portfolio()).with_qp_strategy(QpStrategy::Tableau),
    );
    assert_eq!(r.status, SolutionStatus::EducationalOnly);
    let x = r.x_star.unwrap();
    assert_relative_eq!(x[0] + x[1] + x[2], 100.0, epsilon = 1e-6);
}

#[test]
fn equality_problem_end_to_end() {
    let p = Problem::parse(
        "x^2 + y^2",
        &[("x + y - 1", ConstraintKind::Eq)],
        false,
    )
    .unwrap();
    let r = optikit_solver::solve(&SolveRequest::new(p));

    assert_eq!(r.method, Some(Method::Lagrange));
    let x = r.x_star.unwrap();
    assert_relative_eq!(x[0], 0.5, epsilon = 1e-6);
    assert_relative_eq!(x[1], 0.5, epsilon = 1e-6);
    assert_relative_eq!(r.multipliers[0].1, 1.0, epsilon = 1e-6);
    assert!(!r.explanation.is_empty());
    assert!(r.explanation[0].contains("lagrange"));
}

#[test]
fn kkt_maximization_end_to_end() {
    let p = Problem::parse("-(x - 2)^2", &[("x - 1", ConstraintKind::Le)], true).unwrap();
    let r = optikit_solver::solve(&SolveRequest::new(p));

    assert_eq!(r.method, Some(Method::Kkt));
    assert_relative_eq!(r.x_star.unwrap()[0], 1.0, epsilon = 1e-6);
    assert_relative_eq!(r.f_star.unwrap(), -1.0, epsilon = 1e-6);
}

#[test]
fn iterative_hint_traces_objective_only() {
    // With the iterative hint the constraint is not enforced; the trace
    // descends the raw objective from the given start.
    let p = Problem::parse(
        "x^2 + y^2",
        &[("x + y - 1", ConstraintKind::Eq)],
        false,
    )
    .unwrap();
    let r = optikit_solver::solve(
        &SolveRequest::new(p)
            .with_hints(Hints {
                iterative: true,
                ..Hints::default()
            })
            .with_gradient_options(GradientOptions {
                x0: Some(vec![2.0, 2.0]),
                ..GradientOptions::default()
            }),
    );

    assert_eq!(r.method, Some(Method::Gradient));
    assert_eq!(r.status, SolutionStatus::Ok);
    let x = r.x_star.unwrap();
    assert!(x[0].abs() < 1e-3 && x[1].abs() < 1e-3);
    assert_eq!(r.iterations[0].x, vec![2.0, 2.0]);
}

#[test]
fn derivative_only_hint_lists_critical_points() {
    let p = Problem::parse("x^4 - 2*x^2", &[], false).unwrap();
    let r = optikit_solver::solve(&SolveRequest::new(p).with_hints(Hints {
        derivative_only: true,
        ..Hints::default()
    }));

    assert_eq!(r.method, Some(Method::Differential));
    assert_eq!(r.candidates.len(), 3);
    assert_relative_eq!(r.f_star.unwrap(), -1.0, epsilon = 1e-6);
}

#[test]
fn parse_error_surfaces_before_solving() {
    let err = Problem::parse("x^2 +", &[], false).unwrap_err();
    assert!(!err.to_string().is_empty());
}

#[test]
fn infeasible_qp_reports_infeasible_status() {
    let p = Problem::parse(
        "x^2 + y^2",
        &[
            ("x + y - 1", ConstraintKind::Eq),
            ("x - 5", ConstraintKind::Ge),
            ("x - 3", ConstraintKind::Le),
        ],
        false,
    )
    .unwrap();
    let r = optikit_solver::solve(&SolveRequest::new(p));
    assert_eq!(r.method, Some(Method::Qp));
    assert_eq!(r.status, SolutionStatus::Infeasible);
    assert!(r.message.is_some());
}
