mod token;

pub use token::{Span, Token, TokenWithSpan};

use m2n_diags::DiagnosticError;

pub struct Lexer {
    input: Vec<char>,
    current: usize,
    tokens: Vec<TokenWithSpan>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            current: 0,
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<TokenWithSpan>, DiagnosticError> {
        loop {
            self.skip_trivia()?;
            if self.is_at_end() {
                break;
            }

            let start = self.current;

            match self.advance() {
                '(' => self.add_token(Token::LeftParen, start),
                ')' => self.add_token(Token::RightParen, start),
                '{' => self.add_token(Token::LeftBrace, start),
                '}' => self.add_token(Token::RightBrace, start),
                '[' => self.add_token(Token::LeftBracket, start),
                ']' => self.add_token(Token::RightBracket, start),
                ';' => self.add_token(Token::Semicolon, start),
                ',' => self.add_token(Token::Comma, start),
                ':' => self.add_token(Token::Colon, start),
                '.' => self.add_token(Token::Dot, start),
                '=' => self.add_token(Token::Assign, start),
                '-' => self.add_token(Token::Minus, start),
                '|' => self.add_token(Token::Pipe, start),
                '?' => self.add_token(Token::Question, start),
                '>' => self.add_token(Token::Greater, start),
                '<' => {
                    if self.peek() == Some('<') {
                        self.advance();
                        self.add_token(Token::ShiftLeft, start);
                    } else {
                        self.add_token(Token::Less, start);
                    }
                }
                c if c.is_ascii_digit() => self.scan_number(start)?,
                c if c.is_ascii_alphabetic() || c == '_' => self.scan_identifier(start),
                c => {
                    return Err(DiagnosticError::syntax(
                        format!("Unexpected character '{}'", c),
                        Span::new(start, self.current),
                    ));
                }
            }
        }

        self.add_token(Token::Eof, self.current);
        Ok(self.tokens)
    }

    fn advance(&mut self) -> char {
        let c = self.input[self.current];
        self.current += 1;
        c
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.current).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.input.get(self.current + 1).copied()
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.input.len()
    }

    fn skip_trivia(&mut self) -> Result<(), DiagnosticError> {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else if c == '/' && self.peek_next() == Some('/') {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.advance();
                }
            } else if c == '/' && self.peek_next() == Some('*') {
                self.skip_block_comment()?;
            } else {
                break;
            }
        }
        Ok(())
    }

    fn skip_block_comment(&mut self) -> Result<(), DiagnosticError> {
        let start = self.current;
        self.advance();
        self.advance();

        loop {
            match self.peek() {
                None => {
                    return Err(DiagnosticError::syntax(
                        "Unterminated block comment",
                        Span::new(start, self.current),
                    ));
                }
                Some('*') if self.peek_next() == Some('/') => {
                    self.advance();
                    self.advance();
                    return Ok(());
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }

    fn scan_number(&mut self, start: usize) -> Result<(), DiagnosticError> {
        let hex = self.input[start] == '0' && matches!(self.peek(), Some('x') | Some('X'));
        let digits_start = if hex {
            self.advance();
            self.current
        } else {
            start
        };

        while let Some(c) = self.peek() {
            if (c.is_ascii_hexdigit() && (hex || c.is_ascii_digit())) || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let digits: String = self.input[digits_start..self.current]
            .iter()
            .filter(|c| **c != '_')
            .collect();

        // Integer suffixes (u, l, ul, lu) carry no meaning in metadata.
        while matches!(self.peek(), Some('u') | Some('U') | Some('l') | Some('L')) {
            self.advance();
        }

        let span = Span::new(start, self.current);
        if digits.is_empty() || self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(DiagnosticError::syntax("Invalid number literal", span));
        }

        let radix = if hex { 16 } else { 10 };
        let value = u64::from_str_radix(&digits, radix).map_err(|_| {
            DiagnosticError::syntax("Integer literal does not fit in 64 bits", span)
        })?;

        self.add_token(Token::IntLiteral(value), start);
        Ok(())
    }

    fn scan_identifier(&mut self, start: usize) {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let text: String = self.input[start..self.current].iter().collect();

        let token = Token::keyword_from_str(&text).unwrap_or(Token::Ident(text));

        self.add_token(token, start);
    }

    fn add_token(&mut self, token: Token, start: usize) {
        let span = Span::new(start, self.current);
        self.tokens.push(TokenWithSpan { token, span });
    }
}
