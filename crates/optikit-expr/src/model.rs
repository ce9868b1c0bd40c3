use crate::ast::Expr;
use crate::calculus::{diff, simplify, total_degree};
use crate::eval::{BoundExpr, EvalError};
use crate::parser::{ParseError, parse};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error("expression uses undeclared variable `{0}`")]
    UndeclaredSymbol(String),
}

/// A parsed expression together with its ordered variable list.
///
/// The variable order is fixed at construction and shared by every gradient,
/// Hessian, and numeric view derived from the model, so vector positions line
/// up across all of them.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolicModel {
    expr: Expr,
    vars: Vec<String>,
}

impl SymbolicModel {
    /// Parses `src` against a declared variable list. Every free symbol in
    /// the expression must appear in `vars`; unused declared variables are
    /// fine.
    pub fn parse(src: &str, vars: &[String]) -> Result<Self, ModelError> {
        let expr = parse(src)?;
        Self::from_expr(expr, vars.to_vec())
    }

    /// Parses `src` and takes the expression's own free symbols, sorted, as
    /// the variable list.
    pub fn parse_inferring(src: &str) -> Result<Self, ModelError> {
        let expr = parse(src)?;
        let vars = expr.free_symbols();
        Ok(Self { expr, vars })
    }

    pub fn from_expr(expr: Expr, vars: Vec<String>) -> Result<Self, ModelError> {
        for name in expr.free_symbols() {
            if !vars.contains(&name) {
                return Err(ModelError::UndeclaredSymbol(name));
            }
        }
        Ok(Self { expr, vars })
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn vars(&self) -> &[String] {
        &self.vars
    }

    pub fn dim(&self) -> usize {
        self.vars.len()
    }

    /// Partial derivative with respect to the `i`-th variable, as a model
    /// over the same variable list.
    pub fn partial(&self, i: usize) -> SymbolicModel {
        SymbolicModel {
            expr: simplify(&diff(&self.expr, &self.vars[i])),
            vars: self.vars.clone(),
        }
    }

    /// Symbolic gradient, one entry per variable in declaration order.
    pub fn gradient(&self) -> Vec<Expr> {
        self.vars
            .iter()
            .map(|v| simplify(&diff(&self.expr, v)))
            .collect()
    }

    /// Symbolic Hessian as a row-major n by n matrix of expressions.
    pub fn hessian(&self) -> Vec<Vec<Expr>> {
        let gradient = self.gradient();
        gradient
            .iter()
            .map(|g| {
                self.vars
                    .iter()
                    .map(|v| simplify(&diff(g, v)))
                    .collect()
            })
            .collect()
    }

    /// Replaces every occurrence of `name` with `replacement`. The variable
    /// list is unchanged.
    pub fn substitute(&self, name: &str, replacement: &Expr) -> SymbolicModel {
        SymbolicModel {
            expr: simplify(&substitute_expr(&self.expr, name, replacement)),
            vars: self.vars.clone(),
        }
    }

    /// Total polynomial degree, or `None` when the expression is not a
    /// polynomial.
    pub fn total_degree(&self) -> Option<u32> {
        total_degree(&self.expr)
    }

    pub fn eval(&self, x: &[f64]) -> Result<f64, EvalError> {
        BoundExpr::bind(&self.expr, &self.vars)?.eval(x)
    }

    /// Compiles to an index-bound evaluator for use in solver loops.
    pub fn to_numeric(&self) -> Result<NumericFn, EvalError> {
        Ok(NumericFn {
            bound: BoundExpr::bind(&self.expr, &self.vars)?,
            dim: self.vars.len(),
        })
    }

    /// Compiles the gradient to index-bound evaluators.
    pub fn to_numeric_gradient(&self) -> Result<NumericGradient, EvalError> {
        let parts = self
            .gradient()
            .iter()
            .map(|g| BoundExpr::bind(g, &self.vars))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NumericGradient { parts })
    }

    /// Compiles the Hessian to index-bound evaluators, row major.
    pub fn to_numeric_hessian(&self) -> Result<NumericHessian, EvalError> {
        let rows = self
            .hessian()
            .iter()
            .map(|row| {
                row.iter()
                    .map(|h| BoundExpr::bind(h, &self.vars))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NumericHessian { rows })
    }
}

fn substitute_expr(expr: &Expr, name: &str, replacement: &Expr) -> Expr {
    match expr {
        Expr::Num(_) => expr.clone(),
        Expr::Var(v) => {
            if v == name {
                replacement.clone()
            } else {
                expr.clone()
            }
        }
        Expr::Neg(u) => Expr::Neg(substitute_expr(u, name, replacement).boxed()),
        Expr::Add(a, b) => Expr::Add(
            substitute_expr(a, name, replacement).boxed(),
            substitute_expr(b, name, replacement).boxed(),
        ),
        Expr::Sub(a, b) => Expr::Sub(
            substitute_expr(a, name, replacement).boxed(),
            substitute_expr(b, name, replacement).boxed(),
        ),
        Expr::Mul(a, b) => Expr::Mul(
            substitute_expr(a, name, replacement).boxed(),
            substitute_expr(b, name, replacement).boxed(),
        ),
        Expr::Div(a, b) => Expr::Div(
            substitute_expr(a, name, replacement).boxed(),
            substitute_expr(b, name, replacement).boxed(),
        ),
        Expr::Pow(a, b) => Expr::Pow(
            substitute_expr(a, name, replacement).boxed(),
            substitute_expr(b, name, replacement).boxed(),
        ),
        Expr::Call(func, arg) => {
            Expr::Call(*func, substitute_expr(arg, name, replacement).boxed())
        }
    }
}

/// Index-bound scalar function of `dim` variables.
#[derive(Debug, Clone)]
pub struct NumericFn {
    bound: BoundExpr,
    dim: usize,
}

impl NumericFn {
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn call(&self, x: &[f64]) -> Result<f64, EvalError> {
        self.bound.eval(x)
    }
}

/// Index-bound gradient; evaluates to a vector of partials.
#[derive(Debug, Clone)]
pub struct NumericGradient {
    parts: Vec<BoundExpr>,
}

impl NumericGradient {
    pub fn dim(&self) -> usize {
        self.parts.len()
    }

    pub fn call(&self, x: &[f64]) -> Result<Vec<f64>, EvalError> {
        self.parts.iter().map(|p| p.eval(x)).collect()
    }
}

/// Index-bound Hessian; evaluates to a row-major matrix of second partials.
#[derive(Debug, Clone)]
pub struct NumericHessian {
    rows: Vec<Vec<BoundExpr>>,
}

impl NumericHessian {
    pub fn dim(&self) -> usize {
        self.rows.len()
    }

    pub fn call(&self, x: &[f64]) -> Result<Vec<Vec<f64>>, EvalError> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|h| h.eval(x)).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_inferring_orders_vars() {
        let m = SymbolicModel::parse_inferring("y^2 + x").unwrap();
        assert_eq!(m.vars(), &["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_parse_rejects_undeclared() {
        let vars = vec!["x".to_string()];
        let err = SymbolicModel::parse("x + y", &vars).unwrap_err();
        assert_eq!(err, ModelError::UndeclaredSymbol("y".to_string()));
    }

    #[test]
    fn test_parse_allows_unused_declared() {
        let vars = vec!["x".to_string(), "y".to_string()];
        let m = SymbolicModel::parse("x^2", &vars).unwrap();
        assert_eq!(m.dim(), 2);
        assert_relative_eq!(m.eval(&[3.0, 99.0]).unwrap(), 9.0);
    }

    #[test]
    fn test_gradient_and_hessian() {
        let m = SymbolicModel::parse_inferring("x^2 + 3*x*y").unwrap();
        let g = m.gradient();
        assert_eq!(g[0].to_string(), "2*x + 3*y");
        assert_eq!(g[1].to_string(), "3*x");

        let h = m.hessian();
        assert_eq!(h[0][0].to_string(), "2");
        assert_eq!(h[0][1].to_string(), "3");
        assert_eq!(h[1][0].to_string(), "3");
        assert_eq!(h[1][1].to_string(), "0");
    }

    #[test]
    fn test_numeric_gradient_matches_symbolic() {
        let m = SymbolicModel::parse_inferring("x^2 + y^2").unwrap();
        let g = m.to_numeric_gradient().unwrap();
        let value = g.call(&[3.0, -2.0]).unwrap();
        assert_relative_eq!(value[0], 6.0);
        assert_relative_eq!(value[1], -4.0);
    }

    #[test]
    fn test_numeric_fn_rejects_short_point() {
        let m = SymbolicModel::parse_inferring("x + y").unwrap();
        let f = m.to_numeric().unwrap();
        assert!(f.call(&[1.0]).is_err());
        assert_relative_eq!(f.call(&[1.0, 2.0]).unwrap(), 3.0);
    }

    #[test]
    fn test_substitute() {
        let m = SymbolicModel::parse_inferring("x^2 + y").unwrap();
        let s = m.substitute("y", &Expr::Num(5.0));
        assert_relative_eq!(s.eval(&[2.0, 0.0]).unwrap(), 9.0);
    }

    #[test]
    fn test_total_degree() {
        let m = SymbolicModel::parse_inferring("x^2 + x*y + 1").unwrap();
        assert_eq!(m.total_degree(), Some(2));
        let m = SymbolicModel::parse_inferring("sin(x)").unwrap();
        assert_eq!(m.total_degree(), None);
    }
}
