use clap::{Parser, Subcommand};
use optikit_solver::{
    ConstraintKind, GradientOptions, Hints, Method, Problem, QpStrategy, SolveRequest,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "optikit")]
#[command(about = "Analyze and solve nonlinear programming problems", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report the problem structure and the method the rules would pick
    Analyze {
        /// The problem file (JSON)
        file: PathBuf,
    },
    /// Solve a problem and output the full result
    Solve {
        /// The problem file (JSON)
        file: PathBuf,
        /// Force a method instead of using the selection rules
        #[arg(short, long)]
        method: Option<String>,
        /// Use the step-by-step simplex tableau for QP problems
        #[arg(long)]
        tableau: bool,
        /// Ask for an iterative gradient trace
        #[arg(long)]
        iterative: bool,
    },
    /// Check a problem file for errors
    Check {
        /// The file to check
        file: PathBuf,
    },
}

/// On-disk problem description.
#[derive(serde::Deserialize)]
struct ProblemFile {
    objective: String,
    /// Declared variable list; when absent, variables are inferred from the
    /// free symbols of the objective and constraints.
    #[serde(default)]
    variables: Option<Vec<String>>,
    #[serde(default)]
    maximize: bool,
    #[serde(default)]
    constraints: Vec<ConstraintEntry>,
    #[serde(default)]
    derivative_only: bool,
    #[serde(default)]
    x0: Option<Vec<f64>>,
    #[serde(default)]
    tol: Option<f64>,
    #[serde(default)]
    max_iter: Option<usize>,
}

#[derive(serde::Deserialize)]
struct ConstraintEntry {
    expr: String,
    kind: ConstraintKind,
}

fn main() {
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Analyze { file } => analyze(&file),
        Commands::Solve {
            file,
            method,
            tableau,
            iterative,
        } => solve(&file, method.as_deref(), tableau, iterative),
        Commands::Check { file } => check(&file),
    };

    if let Err(message) = outcome {
        eprintln!("Error: {message}");
        std::process::exit(1);
    }
}

fn load(path: &Path) -> Result<(ProblemFile, Problem), String> {
    let source =
        fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let desc: ProblemFile =
        serde_json::from_str(&source).map_err(|e| format!("invalid problem file: {e}"))?;

    let constraints: Vec<(&str, ConstraintKind)> = desc
        .constraints
        .iter()
        .map(|c| (c.expr.as_str(), c.kind))
        .collect();
    let problem = match &desc.variables {
        Some(vars) => Problem::parse_with_vars(&desc.objective, &constraints, vars, desc.maximize),
        None => Problem::parse(&desc.objective, &constraints, desc.maximize),
    }
    .map_err(|e| e.to_string())?;
    Ok((desc, problem))
}

fn analyze(path: &Path) -> Result<(), String> {
    let (desc, problem) = load(path)?;
    let request = SolveRequest::new(problem).with_hints(Hints {
        derivative_only: desc.derivative_only,
        ..Hints::default()
    });
    let (analysis, decision) = optikit_solver::classify(&request).map_err(|e| e.to_string())?;

    let report = serde_json::json!({
        "analysis": analysis,
        "decision": decision,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?
    );
    Ok(())
}

fn solve(path: &Path, method: Option<&str>, tableau: bool, iterative: bool) -> Result<(), String> {
    let (desc, problem) = load(path)?;

    let method_hint = match method {
        Some(name) => {
            Some(Method::parse(name).ok_or_else(|| format!("unknown method `{name}`"))?)
        }
        None => None,
    };
    let strategy = if tableau {
        QpStrategy::Tableau
    } else {
        QpStrategy::ActiveSet
    };

    let request = SolveRequest::new(problem)
        .with_hints(Hints {
            iterative,
            derivative_only: desc.derivative_only,
            method_hint,
        })
        .with_gradient_options({
            let defaults = GradientOptions::default();
            GradientOptions {
                x0: desc.x0.clone(),
                tol: desc.tol.unwrap_or(defaults.tol),
                max_iter: desc.max_iter.unwrap_or(defaults.max_iter),
            }
        })
        .with_qp_strategy(strategy);

    let result = optikit_solver::solve(&request);
    println!(
        "{}",
        serde_json::to_string_pretty(&result).map_err(|e| e.to_string())?
    );
    Ok(())
}

fn check(path: &Path) -> Result<(), String> {
    let (_, problem) = load(path)?;
    println!(
        "OK: objective over {} variable(s), {} constraint(s)",
        problem.dim(),
        problem.constraints.len()
    );
    Ok(())
}
