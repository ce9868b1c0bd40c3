use crate::ast::{Expr, Func};
use crate::lexer::{Span, Token, TokenKind, tokenize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected token at {}..{}: expected {expected}, found {found:?}", span.start, span.end)]
    UnexpectedToken {
        expected: String,
        found: TokenKind,
        span: Span,
    },
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unknown function `{name}` at {}..{}", span.start, span.end)]
    UnknownFunction { name: String, span: Span },
    #[error("invalid character `{ch}` at {}..{}", span.start, span.end)]
    InvalidCharacter { ch: char, span: Span },
}

/// Recursive-descent parser over the token stream.
///
/// Precedence, loosest to tightest: `+ -`, `* /`, unary `-`, `^`/`**`
/// (right-associative). Function calls accept exactly one argument and only
/// names from [`Func`].
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse_str(input: &str) -> Result<Expr, ParseError> {
        Parser::new(tokenize(input)).parse()
    }

    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expr()?;
        match self.peek_kind() {
            TokenKind::Eof => Ok(expr),
            _ => Err(self.unexpected("end of input")),
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        if *self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        match &token.kind {
            TokenKind::Eof => ParseError::UnexpectedEof,
            TokenKind::Error(ch) => ParseError::InvalidCharacter {
                ch: *ch,
                span: token.span,
            },
            kind => ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: kind.clone(),
                span: token.span,
            },
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_term()?;
        loop {
            match self.peek_kind() {
                TokenKind::Plus => {
                    self.advance();
                    let rhs = self.parse_term()?;
                    lhs = Expr::Add(lhs.boxed(), rhs.boxed());
                }
                TokenKind::Minus => {
                    self.advance();
                    let rhs = self.parse_term()?;
                    lhs = Expr::Sub(lhs.boxed(), rhs.boxed());
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            match self.peek_kind() {
                TokenKind::Star => {
                    self.advance();
                    let rhs = self.parse_unary()?;
                    lhs = Expr::Mul(lhs.boxed(), rhs.boxed());
                }
                TokenKind::Slash => {
                    self.advance();
                    let rhs = self.parse_unary()?;
                    lhs = Expr::Div(lhs.boxed(), rhs.boxed());
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if *self.peek_kind() == TokenKind::Minus {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Neg(inner.boxed()));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_atom()?;
        match self.peek_kind() {
            TokenKind::Caret | TokenKind::StarStar => {
                self.advance();
                // Right-associative, and `-` binds looser than the exponent
                // so x^-2 parses as x^(-2).
                let exponent = self.parse_unary()?;
                Ok(Expr::Pow(base.boxed(), exponent.boxed()))
            }
            _ => Ok(base),
        }
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::Number(value) => {
                self.advance();
                Ok(Expr::Num(value))
            }
            TokenKind::Ident(name) => {
                let token = self.advance();
                if *self.peek_kind() == TokenKind::LParen {
                    let Some(func) = Func::from_name(&name) else {
                        return Err(ParseError::UnknownFunction {
                            name,
                            span: token.span,
                        });
                    };
                    self.advance();
                    let arg = self.parse_expr()?;
                    self.expect(TokenKind::RParen, "`)`")?;
                    Ok(Expr::Call(func, arg.boxed()))
                } else {
                    Ok(Expr::Var(name))
                }
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen, "`)`")?;
                Ok(expr)
            }
            _ => Err(self.unexpected("a number, variable, or `(`")),
        }
    }
}

/// Parses a single expression from source text.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    Parser::parse_str(input)
}
