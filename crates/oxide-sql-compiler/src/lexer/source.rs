//! Rewindable token stream.

use super::{Lexer, Span, Token, TokenKind};

/// An eagerly tokenized statement with a movable cursor.
///
/// The parser saves `position()` before a speculative production and calls
/// `rewind` when the production does not match. Rewinding is O(1).
#[derive(Debug, Clone)]
pub struct TokenSource {
    tokens: Vec<Token>,
    position: usize,
}

impl TokenSource {
    /// Tokenizes `sql`.
    #[must_use]
    pub fn new(sql: &str) -> Self {
        Self::from_tokens(Lexer::new(sql).tokenize())
    }

    /// Wraps an existing token vector, appending `Eof` if it is missing.
    #[must_use]
    pub fn from_tokens(mut tokens: Vec<Token>) -> Self {
        if !tokens.last().is_some_and(Token::is_eof) {
            let end = tokens.last().map_or(0, |t| t.span.end);
            tokens.push(Token::new(TokenKind::Eof, Span::new(end, end)));
        }
        Self {
            tokens,
            position: 0,
        }
    }

    /// The index of the current token.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Moves the cursor back (or forward) to a previously seen position.
    pub fn rewind(&mut self, position: usize) {
        self.position = position.min(self.tokens.len() - 1);
    }

    /// The current token.
    #[must_use]
    pub fn current(&self) -> &Token {
        self.peek(0)
    }

    /// The token `n` places after the current one; `Eof` past the end.
    #[must_use]
    pub fn peek(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.position + n).min(last)]
    }

    /// The most recently consumed token.
    #[must_use]
    pub fn previous(&self) -> Option<&Token> {
        self.position
            .checked_sub(1)
            .and_then(|index| self.tokens.get(index))
    }

    /// Consumes the current token and returns it. `Eof` is never consumed.
    pub fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if !token.is_eof() {
            self.position += 1;
        }
        token
    }

    /// All tokens, including the trailing `Eof`.
    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Keyword;

    #[test]
    fn test_rewind_restores_cursor() {
        let mut source = TokenSource::new("SELECT a FROM t");
        let start = source.position();
        source.advance();
        source.advance();
        assert!(source.current().is_keyword(Keyword::From));
        source.rewind(start);
        assert!(source.current().is_keyword(Keyword::Select));
    }

    #[test]
    fn test_eof_is_sticky() {
        let mut source = TokenSource::new("a");
        source.advance();
        assert!(source.current().is_eof());
        source.advance();
        assert!(source.current().is_eof());
        assert!(source.peek(10).is_eof());
    }

    #[test]
    fn test_from_tokens_appends_eof() {
        let source = TokenSource::from_tokens(vec![Token::new(
            TokenKind::Integer(1),
            Span::new(0, 1),
        )]);
        assert_eq!(source.tokens().len(), 2);
        assert!(source.tokens()[1].is_eof());
    }
}
