use crate::ast::{Expr, Func};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("`{func}` is undefined at {arg}")]
    Domain { func: &'static str, arg: f64 },
    #[error("evaluation produced a non-finite value")]
    NonFinite,
    #[error("variable `{0}` is not bound")]
    UnboundVariable(String),
    #[error("point has {got} coordinate(s), expected at least {expected}")]
    ShortPoint { expected: usize, got: usize },
}

/// An expression with variable names resolved to slot indices, so repeated
/// evaluation inside solver loops avoids name lookups.
#[derive(Debug, Clone)]
pub enum BoundExpr {
    Num(f64),
    Var(usize),
    Neg(Box<BoundExpr>),
    Add(Box<BoundExpr>, Box<BoundExpr>),
    Sub(Box<BoundExpr>, Box<BoundExpr>),
    Mul(Box<BoundExpr>, Box<BoundExpr>),
    Div(Box<BoundExpr>, Box<BoundExpr>),
    Pow(Box<BoundExpr>, Box<BoundExpr>),
    Call(Func, Box<BoundExpr>),
}

impl BoundExpr {
    /// Resolves every variable in `expr` against `vars`. Any name missing
    /// from `vars` is an error.
    pub fn bind(expr: &Expr, vars: &[String]) -> Result<BoundExpr, EvalError> {
        Ok(match expr {
            Expr::Num(v) => BoundExpr::Num(*v),
            Expr::Var(name) => {
                let index = vars
                    .iter()
                    .position(|v| v == name)
                    .ok_or_else(|| EvalError::UnboundVariable(name.clone()))?;
                BoundExpr::Var(index)
            }
            Expr::Neg(u) => BoundExpr::Neg(Self::bind(u, vars)?.into()),
            Expr::Add(a, b) => {
                BoundExpr::Add(Self::bind(a, vars)?.into(), Self::bind(b, vars)?.into())
            }
            Expr::Sub(a, b) => {
                BoundExpr::Sub(Self::bind(a, vars)?.into(), Self::bind(b, vars)?.into())
            }
            Expr::Mul(a, b) => {
                BoundExpr::Mul(Self::bind(a, vars)?.into(), Self::bind(b, vars)?.into())
            }
            Expr::Div(a, b) => {
                BoundExpr::Div(Self::bind(a, vars)?.into(), Self::bind(b, vars)?.into())
            }
            Expr::Pow(a, b) => {
                BoundExpr::Pow(Self::bind(a, vars)?.into(), Self::bind(b, vars)?.into())
            }
            Expr::Call(func, arg) => BoundExpr::Call(*func, Self::bind(arg, vars)?.into()),
        })
    }

    /// Evaluates at the point `x`, where `x[i]` is the value of the variable
    /// bound to slot `i`.
    pub fn eval(&self, x: &[f64]) -> Result<f64, EvalError> {
        let value = match self {
            BoundExpr::Num(v) => *v,
            BoundExpr::Var(i) => match x.get(*i) {
                Some(v) => *v,
                None => {
                    return Err(EvalError::ShortPoint {
                        expected: *i + 1,
                        got: x.len(),
                    });
                }
            },
            BoundExpr::Neg(u) => -u.eval(x)?,
            BoundExpr::Add(a, b) => a.eval(x)? + b.eval(x)?,
            BoundExpr::Sub(a, b) => a.eval(x)? - b.eval(x)?,
            BoundExpr::Mul(a, b) => a.eval(x)? * b.eval(x)?,
            BoundExpr::Div(a, b) => {
                let denominator = b.eval(x)?;
                if denominator == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                a.eval(x)? / denominator
            }
            BoundExpr::Pow(a, b) => a.eval(x)?.powf(b.eval(x)?),
            BoundExpr::Call(func, arg) => {
                let u = arg.eval(x)?;
                match func {
                    Func::Sin => u.sin(),
                    Func::Cos => u.cos(),
                    Func::Tan => u.tan(),
                    Func::Exp => u.exp(),
                    Func::Log => {
                        if u <= 0.0 {
                            return Err(EvalError::Domain { func: "log", arg: u });
                        }
                        u.ln()
                    }
                    Func::Sqrt => {
                        if u < 0.0 {
                            return Err(EvalError::Domain { func: "sqrt", arg: u });
                        }
                        u.sqrt()
                    }
                    Func::Abs => u.abs(),
                }
            }
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(EvalError::NonFinite)
        }
    }
}

/// Evaluates `expr` at the named point without pre-binding. Convenient for
/// one-off evaluations; solver loops should bind once and reuse.
pub fn eval_at(expr: &Expr, vars: &[String], x: &[f64]) -> Result<f64, EvalError> {
    BoundExpr::bind(expr, vars)?.eval(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use approx::assert_relative_eq;

    fn vars(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_eval_polynomial() {
        let e = parse("x^2 + 2*x*y + y^2").unwrap();
        let value = eval_at(&e, &vars(&["x", "y"]), &[1.0, 2.0]).unwrap();
        assert_relative_eq!(value, 9.0);
    }

    #[test]
    fn test_eval_functions() {
        let e = parse("exp(log(x)) + sqrt(y)").unwrap();
        let value = eval_at(&e, &vars(&["x", "y"]), &[3.0, 4.0]).unwrap();
        assert_relative_eq!(value, 5.0, max_relative = 1e-12);
    }

    #[test]
    fn test_eval_division_by_zero() {
        let e = parse("1/x").unwrap();
        assert_eq!(
            eval_at(&e, &vars(&["x"]), &[0.0]),
            Err(EvalError::DivisionByZero)
        );
    }

    #[test]
    fn test_eval_log_domain() {
        let e = parse("log(x)").unwrap();
        assert!(matches!(
            eval_at(&e, &vars(&["x"]), &[-1.0]),
            Err(EvalError::Domain { func: "log", .. })
        ));
    }

    #[test]
    fn test_eval_sqrt_domain() {
        let e = parse("sqrt(x)").unwrap();
        assert!(matches!(
            eval_at(&e, &vars(&["x"]), &[-4.0]),
            Err(EvalError::Domain { func: "sqrt", .. })
        ));
    }

    #[test]
    fn test_eval_overflow_is_non_finite() {
        let e = parse("exp(x)").unwrap();
        assert_eq!(
            eval_at(&e, &vars(&["x"]), &[1e6]),
            Err(EvalError::NonFinite)
        );
    }

    #[test]
    fn test_eval_short_point() {
        let e = parse("x + y").unwrap();
        let err = eval_at(&e, &vars(&["x", "y"]), &[1.0]).unwrap_err();
        assert_eq!(err, EvalError::ShortPoint { expected: 2, got: 1 });
    }

    #[test]
    fn test_bind_unknown_variable() {
        let e = parse("x + z").unwrap();
        assert_eq!(
            BoundExpr::bind(&e, &vars(&["x", "y"])).unwrap_err(),
            EvalError::UnboundVariable("z".to_string())
        );
    }
}
