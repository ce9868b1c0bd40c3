#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Caret,
    LParen,
    RParen,
    Comma,
    Eof,
    Error(char),
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

pub struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            pos: 0,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn advance(&mut self) -> Option<char> {
        let (i, c) = self.chars.next()?;
        self.pos = i + c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let start = self.pos;
        let Some(c) = self.advance() else {
            return Token::new(TokenKind::Eof, Span::new(start, start));
        };

        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => {
                if self.peek() == Some('*') {
                    self.advance();
                    TokenKind::StarStar
                } else {
                    TokenKind::Star
                }
            }
            '/' => TokenKind::Slash,
            '^' => TokenKind::Caret,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            c if c.is_ascii_digit() || c == '.' => return self.lex_number(start),
            c if c.is_alphabetic() || c == '_' => return self.lex_ident(start),
            other => TokenKind::Error(other),
        };

        Token::new(kind, Span::new(start, self.pos))
    }

    fn lex_number(&mut self, start: usize) -> Token {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '.' {
                self.advance();
            } else {
                break;
            }
        }
        // Exponent suffix only when followed by a digit or signed digit,
        // so "2e" in "2exp(x)" stays two tokens.
        if matches!(self.peek(), Some('e') | Some('E')) {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            if let Some((_, d)) = lookahead.peek() {
                if d.is_ascii_digit() || *d == '+' || *d == '-' {
                    self.advance();
                    if matches!(self.peek(), Some('+') | Some('-')) {
                        self.advance();
                    }
                    while let Some(d) = self.peek() {
                        if d.is_ascii_digit() {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
            }
        }

        let text = &self.input[start..self.pos];
        let kind = match text.parse::<f64>() {
            Ok(value) => TokenKind::Number(value),
            Err(_) => TokenKind::Error(text.chars().next().unwrap_or('?')),
        };
        Token::new(kind, Span::new(start, self.pos))
    }

    fn lex_ident(&mut self, start: usize) -> Token {
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let text = self.input[start..self.pos].to_string();
        Token::new(TokenKind::Ident(text), Span::new(start, self.pos))
    }
}

/// Tokenizes the whole input, ending with an `Eof` token.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            break;
        }
    }
    tokens
}
