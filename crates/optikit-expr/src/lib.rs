pub mod ast;
pub mod calculus;
pub mod eval;
pub mod lexer;
pub mod model;
pub mod parser;

pub use ast::{Expr, Func};
pub use calculus::{diff, simplify, total_degree};
pub use eval::{BoundExpr, EvalError, eval_at};
pub use lexer::{Lexer, Span, Token, TokenKind, tokenize};
pub use model::{ModelError, NumericFn, NumericGradient, NumericHessian, SymbolicModel};
pub use parser::{ParseError, Parser, parse};
