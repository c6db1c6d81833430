//! Parser error types.

use core::cmp::Ordering;

use crate::lexer::{Span, TokenKind};

/// A syntax error, tagged with the nesting depth it was raised at.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// The error message.
    pub message: String,
    /// The location of the error.
    pub span: Span,
    /// Expected tokens (if applicable).
    pub expected: Option<String>,
    /// The actual token found.
    pub found: Option<TokenKind>,
    /// Parenthesis and subquery nesting at the failure point.
    pub depth: usize,
}

impl ParseError {
    /// Creates a new parse error.
    #[must_use]
    pub fn new(message: impl Into<String>, span: Span, depth: usize) -> Self {
        Self {
            message: message.into(),
            span,
            expected: None,
            found: None,
            depth,
        }
    }

    /// Creates an "unexpected token" error.
    #[must_use]
    pub fn unexpected(
        expected: impl Into<String>,
        found: TokenKind,
        span: Span,
        depth: usize,
    ) -> Self {
        let expected: String = expected.into();
        let message = if matches!(found, TokenKind::Eof) {
            format!("Unexpected end of input: expected {expected}")
        } else {
            format!("Unexpected token: expected {expected}, found {found}")
        };
        Self {
            message,
            span,
            expected: Some(expected),
            found: Some(found),
            depth,
        }
    }

    /// Orders two failures by how informative they are.
    ///
    /// The deeper one wins; at equal depth the one further into the input wins.
    #[must_use]
    pub fn specificity(&self, other: &Self) -> Ordering {
        self.depth
            .cmp(&other.depth)
            .then(self.span.start.cmp(&other.span.start))
    }
}

impl core::fmt::Display for ParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} at position {}..{}",
            self.message, self.span.start, self.span.end
        )
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_message() {
        let err = ParseError::unexpected("expression", TokenKind::RightParen, Span::new(4, 5), 1);
        assert_eq!(
            err.to_string(),
            "Unexpected token: expected expression, found ) at position 4..5"
        );
    }

    #[test]
    fn test_unexpected_eof_message() {
        let err = ParseError::unexpected("FROM", TokenKind::Eof, Span::new(9, 9), 0);
        assert!(err.message.starts_with("Unexpected end of input"));
    }

    #[test]
    fn test_deeper_error_is_more_specific() {
        let shallow = ParseError::new("a", Span::new(20, 21), 0);
        let deep = ParseError::new("b", Span::new(3, 4), 2);
        assert_eq!(deep.specificity(&shallow), Ordering::Greater);
    }

    #[test]
    fn test_position_breaks_depth_ties() {
        let early = ParseError::new("a", Span::new(2, 3), 1);
        let late = ParseError::new("b", Span::new(8, 9), 1);
        assert_eq!(late.specificity(&early), Ordering::Greater);
        assert_eq!(early.specificity(&early.clone()), Ordering::Equal);
    }
}
