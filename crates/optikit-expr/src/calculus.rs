//! Symbolic differentiation and structural analysis over [`Expr`] trees.
//!
//! Derivatives come out of the standard structural rules and are passed
//! through constant-folding constructors so that gradients of polynomials
//! stay readable.

use crate::ast::{Expr, Func};

/// `a + b` with constant folding and identity elimination.
pub fn add(a: Expr, b: Expr) -> Expr {
    match (a, b) {
        (Expr::Num(x), Expr::Num(y)) => Expr::Num(x + y),
        (a, b) if a.is_zero() => b,
        (a, b) if b.is_zero() => a,
        (a, b) => Expr::Add(a.boxed(), b.boxed()),
    }
}

/// `a - b` with constant folding and identity elimination.
pub fn sub(a: Expr, b: Expr) -> Expr {
    match (a, b) {
        (Expr::Num(x), Expr::Num(y)) => Expr::Num(x - y),
        (a, b) if b.is_zero() => a,
        (a, b) if a.is_zero() => neg(b),
        (a, b) => Expr::Sub(a.boxed(), b.boxed()),
    }
}

/// `a * b` with constant folding, zero annihilation, and unit elimination.
pub fn mul(a: Expr, b: Expr) -> Expr {
    match (a, b) {
        (Expr::Num(x), Expr::Num(y)) => Expr::Num(x * y),
        (a, _) if a.is_zero() => Expr::Num(0.0),
        (_, b) if b.is_zero() => Expr::Num(0.0),
        (a, b) if a.is_one() => b,
        (a, b) if b.is_one() => a,
        (a, b) => Expr::Mul(a.boxed(), b.boxed()),
    }
}

/// `a / b`. Division by a literal zero is left in the tree for the evaluator
/// to report.
pub fn div(a: Expr, b: Expr) -> Expr {
    match (a, b) {
        (Expr::Num(x), Expr::Num(y)) if y != 0.0 => Expr::Num(x / y),
        (a, b) if a.is_zero() && !b.is_zero() => Expr::Num(0.0),
        (a, b) if b.is_one() => a,
        (a, b) => Expr::Div(a.boxed(), b.boxed()),
    }
}

/// `a ^ b` with the usual unit cases folded away.
pub fn pow(a: Expr, b: Expr) -> Expr {
    match (a, b) {
        (Expr::Num(x), Expr::Num(y)) => Expr::Num(x.powf(y)),
        (a, b) if b.is_zero() && !a.is_zero() => Expr::Num(1.0),
        (a, b) if b.is_one() => a,
        (a, b) => Expr::Pow(a.boxed(), b.boxed()),
    }
}

/// `-a` with double negation and constant folding.
pub fn neg(a: Expr) -> Expr {
    match a {
        Expr::Num(x) => Expr::Num(-x),
        Expr::Neg(inner) => *inner,
        a => Expr::Neg(a.boxed()),
    }
}

/// Partial derivative of `expr` with respect to `var`.
pub fn diff(expr: &Expr, var: &str) -> Expr {
    match expr {
        Expr::Num(_) => Expr::Num(0.0),
        Expr::Var(name) => {
            if name == var {
                Expr::Num(1.0)
            } else {
                Expr::Num(0.0)
            }
        }
        Expr::Neg(u) => neg(diff(u, var)),
        Expr::Add(a, b) => add(diff(a, var), diff(b, var)),
        Expr::Sub(a, b) => sub(diff(a, var), diff(b, var)),
        Expr::Mul(a, b) => add(
            mul(diff(a, var), (**b).clone()),
            mul((**a).clone(), diff(b, var)),
        ),
        Expr::Div(a, b) => div(
            sub(
                mul(diff(a, var), (**b).clone()),
                mul((**a).clone(), diff(b, var)),
            ),
            pow((**b).clone(), Expr::Num(2.0)),
        ),
        Expr::Pow(base, exponent) => diff_pow(base, exponent, var),
        Expr::Call(func, arg) => mul(diff_call(*func, arg), diff(arg, var)),
    }
}

fn diff_pow(base: &Expr, exponent: &Expr, var: &str) -> Expr {
    let db = diff(base, var);
    match exponent {
        // d/dx u^n = n * u^(n-1) * u'
        Expr::Num(n) => mul(
            mul(Expr::Num(*n), pow(base.clone(), Expr::Num(n - 1.0))),
            db,
        ),
        // d/dx u^v = u^v * (v' * log(u) + v * u'/u)
        exponent => {
            let de = diff(exponent, var);
            mul(
                pow(base.clone(), exponent.clone()),
                add(
                    mul(de, Expr::Call(Func::Log, base.clone().boxed())),
                    mul(exponent.clone(), div(db, base.clone())),
                ),
            )
        }
    }
}

/// Derivative of `func(u)` with respect to `u` (the chain-rule outer factor).
fn diff_call(func: Func, arg: &Expr) -> Expr {
    let u = arg.clone();
    match func {
        Func::Sin => Expr::Call(Func::Cos, u.boxed()),
        Func::Cos => neg(Expr::Call(Func::Sin, u.boxed())),
        Func::Tan => div(
            Expr::Num(1.0),
            pow(Expr::Call(Func::Cos, u.boxed()), Expr::Num(2.0)),
        ),
        Func::Exp => Expr::Call(Func::Exp, u.boxed()),
        Func::Log => div(Expr::Num(1.0), u),
        Func::Sqrt => div(
            Expr::Num(1.0),
            mul(Expr::Num(2.0), Expr::Call(Func::Sqrt, u.boxed())),
        ),
        Func::Abs => div(u.clone(), Expr::Call(Func::Abs, u.boxed())),
    }
}

/// One bottom-up pass through the folding constructors.
pub fn simplify(expr: &Expr) -> Expr {
    match expr {
        Expr::Num(_) | Expr::Var(_) => expr.clone(),
        Expr::Neg(u) => neg(simplify(u)),
        Expr::Add(a, b) => add(simplify(a), simplify(b)),
        Expr::Sub(a, b) => sub(simplify(a), simplify(b)),
        Expr::Mul(a, b) => mul(simplify(a), simplify(b)),
        Expr::Div(a, b) => div(simplify(a), simplify(b)),
        Expr::Pow(a, b) => pow(simplify(a), simplify(b)),
        Expr::Call(func, arg) => Expr::Call(*func, simplify(arg).boxed()),
    }
}

/// Total polynomial degree of the expression, or `None` when the expression
/// is not a polynomial in its variables.
///
/// Division is only polynomial when the divisor is constant. Powers must
/// have a non-negative integer literal exponent. A function call with a
/// constant argument is a constant; any other call disqualifies the tree.
pub fn total_degree(expr: &Expr) -> Option<u32> {
    match expr {
        Expr::Num(_) => Some(0),
        Expr::Var(_) => Some(1),
        Expr::Neg(u) => total_degree(u),
        Expr::Add(a, b) | Expr::Sub(a, b) => Some(total_degree(a)?.max(total_degree(b)?)),
        Expr::Mul(a, b) => Some(total_degree(a)? + total_degree(b)?),
        Expr::Div(a, b) => match total_degree(b)? {
            0 => total_degree(a),
            _ => None,
        },
        Expr::Pow(base, exponent) => match **exponent {
            Expr::Num(n) if n >= 0.0 && n.fract() == 0.0 => {
                Some(total_degree(base)? * n as u32)
            }
            _ => None,
        },
        Expr::Call(_, arg) => match total_degree(arg)? {
            0 => Some(0),
            _ => None,
        },
    }
}
