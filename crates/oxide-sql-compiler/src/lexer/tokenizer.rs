//! SQL tokenizer implementation.

use super::{Keyword, Span, Token, TokenKind};

/// A lexer that tokenizes SQL input.
pub struct Lexer<'a> {
    /// The input source code.
    input: &'a str,
    /// The current byte position.
    pos: usize,
    /// The byte position of the start of the current token.
    start: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            start: 0,
        }
    }

    /// Returns the current character without advancing.
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Returns the next character without advancing.
    fn peek_next(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    /// Advances to the next character and returns it.
    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Skips whitespace, `--` line comments and `/* */` block comments.
    fn skip_trivia(&mut self) {
        loop {
            while self.peek().is_some_and(char::is_whitespace) {
                self.advance();
            }

            if self.peek() == Some('-') && self.peek_next() == Some('-') {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.advance();
                }
                continue;
            }

            if self.peek() == Some('/') && self.peek_next() == Some('*') {
                self.advance();
                self.advance();
                loop {
                    match self.advance() {
                        Some('*') if self.peek() == Some('/') => {
                            self.advance();
                            break;
                        }
                        None => break,
                        _ => {}
                    }
                }
                continue;
            }

            break;
        }
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, Span::new(self.start, self.pos))
    }

    fn error(&self, message: impl Into<String>) -> Token {
        self.make_token(TokenKind::Error(message.into()))
    }

    /// Scans an identifier or keyword. Unquoted words fold to upper case.
    fn scan_word(&mut self) -> Token {
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
        {
            self.advance();
        }

        let text = &self.input[self.start..self.pos];
        match Keyword::from_str(text) {
            Some(keyword) => self.make_token(TokenKind::Keyword(keyword)),
            None => self.make_token(TokenKind::Identifier(text.to_uppercase())),
        }
    }

    /// Scans a double-quoted identifier, keeping its case.
    fn scan_quoted_identifier(&mut self) -> Token {
        self.advance();
        let mut name = String::new();

        loop {
            match self.advance() {
                Some('"') if self.peek() == Some('"') => {
                    self.advance();
                    name.push('"');
                }
                Some('"') => break,
                Some(c) => name.push(c),
                None => return self.error("Unterminated quoted identifier"),
            }
        }

        if name.is_empty() {
            return self.error("Zero-length delimited identifier");
        }
        self.make_token(TokenKind::QuotedIdentifier(name))
    }

    /// Scans a numeric literal.
    ///
    /// Digits without a fraction are integers, digits with a fraction are exact
    /// decimals, and anything with an exponent is approximate.
    fn scan_number(&mut self) -> Token {
        let mut exact_fraction = false;

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        if self.peek() == Some('.') {
            exact_fraction = true;
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        if self.peek().is_some_and(|c| c == 'e' || c == 'E') {
            self.advance();
            if self.peek().is_some_and(|c| c == '+' || c == '-') {
                self.advance();
            }
            if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
                return self.error("Malformed numeric literal");
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
            let text = &self.input[self.start..self.pos];
            return match text.parse::<f64>() {
                Ok(v) => self.make_token(TokenKind::Double(v)),
                Err(e) => self.error(format!("Invalid approximate number: {e}")),
            };
        }

        let text = &self.input[self.start..self.pos];
        if exact_fraction {
            return self.make_token(TokenKind::Decimal(text.to_string()));
        }
        match text.parse::<i64>() {
            Ok(n) => self.make_token(TokenKind::Integer(n)),
            // Too wide for BIGINT: keep it as an exact decimal.
            Err(_) => self.make_token(TokenKind::Decimal(text.to_string())),
        }
    }

    /// Scans a character string literal; `''` stands for one quote.
    fn scan_string(&mut self) -> Token {
        self.advance();
        let mut value = String::new();

        loop {
            match self.advance() {
                Some('\'') if self.peek() == Some('\'') => {
                    self.advance();
                    value.push('\'');
                }
                Some('\'') => break,
                Some(c) => value.push(c),
                None => return self.error("Unterminated string literal"),
            }
        }

        self.make_token(TokenKind::String(value))
    }

    /// Scans a binary literal (`X'0AFF'`).
    fn scan_binary(&mut self) -> Token {
        self.advance();
        self.advance();

        let mut bytes = Vec::new();
        let mut pending: Option<u32> = None;

        loop {
            match self.advance() {
                Some('\'') => break,
                Some(c) if c.is_ascii_hexdigit() => {
                    let digit = c.to_digit(16).unwrap_or_default();
                    match pending.take() {
                        Some(high) => {
                            bytes.push(u8::try_from(high * 16 + digit).unwrap_or_default());
                        }
                        None => pending = Some(digit),
                    }
                }
                Some(c) if c.is_whitespace() => {}
                Some(_) => return self.error("Invalid character in binary literal"),
                None => return self.error("Unterminated binary literal"),
            }
        }

        if pending.is_some() {
            return self.error("Odd number of hex digits in binary literal");
        }
        self.make_token(TokenKind::Binary(bytes))
    }

    /// Scans the next token.
    #[must_use]
    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();
        self.start = self.pos;

        let Some(c) = self.peek() else {
            return self.make_token(TokenKind::Eof);
        };

        match c {
            '\'' => return self.scan_string(),
            '"' => return self.scan_quoted_identifier(),
            'X' | 'x' if self.peek_next() == Some('\'') => return self.scan_binary(),
            c if c.is_ascii_digit() => return self.scan_number(),
            '.' if self.peek_next().is_some_and(|n| n.is_ascii_digit()) => {
                return self.scan_number();
            }
            c if c.is_alphabetic() || c == '_' => return self.scan_word(),
            _ => {}
        }

        self.advance();
        let kind = match c {
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            '?' => TokenKind::Question,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '=' => TokenKind::Eq,
            '<' => match self.peek() {
                Some('=') => {
                    self.advance();
                    TokenKind::LtEq
                }
                Some('>') => {
                    self.advance();
                    TokenKind::NotEq
                }
                _ => TokenKind::Lt,
            },
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '!' if self.peek() == Some('=') => {
                self.advance();
                TokenKind::NotEq
            }
            '|' if self.peek() == Some('|') => {
                self.advance();
                TokenKind::Concat
            }
            other => TokenKind::Error(format!("Unexpected character: {other}")),
        };
        self.make_token(kind)
    }

    /// Tokenizes the entire input. The last token is always `Eof`.
    #[must_use]
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.is_eof();
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }
}
