use std::fmt;

/// A parsed algebraic expression.
///
/// Binary nodes are boxed pairs; the tree is immutable after parsing and all
/// transformations (differentiation, simplification) build new trees.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Var(String),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Call(Func, Box<Expr>),
}

/// The fixed vocabulary of allowed functions. Anything else is a parse error.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Exp,
    Log,
    Sqrt,
    Abs,
}

impl Func {
    pub fn from_name(name: &str) -> Option<Func> {
        match name {
            "sin" => Some(Func::Sin),
            "cos" => Some(Func::Cos),
            "tan" => Some(Func::Tan),
            "exp" => Some(Func::Exp),
            "log" => Some(Func::Log),
            "sqrt" => Some(Func::Sqrt),
            "abs" => Some(Func::Abs),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tan => "tan",
            Func::Exp => "exp",
            Func::Log => "log",
            Func::Sqrt => "sqrt",
            Func::Abs => "abs",
        }
    }
}

impl Expr {
    pub fn num(value: f64) -> Expr {
        Expr::Num(value)
    }

    pub fn var(name: impl Into<String>) -> Expr {
        Expr::Var(name.into())
    }

    pub fn boxed(self) -> Box<Expr> {
        Box::new(self)
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Num(v) if *v == 0.0)
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Expr::Num(v) if *v == 1.0)
    }

    /// Collects every variable name referenced by the expression, sorted and
    /// deduplicated.
    pub fn free_symbols(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_symbols(&mut names);
        names.sort();
        names.dedup();
        names
    }

    fn collect_symbols(&self, out: &mut Vec<String>) {
        match self {
            Expr::Num(_) => {}
            Expr::Var(name) => out.push(name.clone()),
            Expr::Neg(inner) | Expr::Call(_, inner) => inner.collect_symbols(out),
            Expr::Add(a, b)
            | Expr::Sub(a, b)
            | Expr::Mul(a, b)
            | Expr::Div(a, b)
            | Expr::Pow(a, b) => {
                a.collect_symbols(out);
                b.collect_symbols(out);
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Num(v) => write!(f, "{v}"),
            Expr::Var(name) => write!(f, "{name}"),
            Expr::Neg(inner) => write!(f, "-{}", paren(inner)),
            Expr::Add(a, b) => write!(f, "{a} + {b}"),
            Expr::Sub(a, b) => write!(f, "{a} - {}", paren_add(b)),
            Expr::Mul(a, b) => write!(f, "{}*{}", paren_add(a), paren_add(b)),
            Expr::Div(a, b) => write!(f, "{}/{}", paren_add(a), paren(b)),
            Expr::Pow(a, b) => write!(f, "{}^{}", paren(a), paren(b)),
            Expr::Call(func, arg) => write!(f, "{}({arg})", func.name()),
        }
    }
}

fn paren(e: &Expr) -> String {
    match e {
        Expr::Num(v) if *v >= 0.0 => format!("{v}"),
        Expr::Var(_) | Expr::Call(..) => format!("{e}"),
        _ => format!("({e})"),
    }
}

fn paren_add(e: &Expr) -> String {
    match e {
        Expr::Add(..) | Expr::Sub(..) | Expr::Neg(..) => format!("({e})"),
        Expr::Num(v) if *v < 0.0 => format!("({e})"),
        _ => format!("{e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_symbols_sorted_unique() {
        let e = Expr::Add(
            Expr::Mul(Expr::var("y").boxed(), Expr::var("x").boxed()).boxed(),
            Expr::var("x").boxed(),
        );
        assert_eq!(e.free_symbols(), vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_display_precedence() {
        let e = Expr::Mul(
            Expr::Add(Expr::var("x").boxed(), Expr::num(1.0).boxed()).boxed(),
            Expr::var("y").boxed(),
        );
        assert_eq!(e.to_string(), "(x + 1)*y");
    }

    #[test]
    fn test_display_call() {
        let e = Expr::Call(Func::Sqrt, Expr::var("x").boxed());
        assert_eq!(e.to_string(), "sqrt(x)");
    }
}
