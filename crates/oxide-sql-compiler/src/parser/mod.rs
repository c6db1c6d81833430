//! Speculative recursive-descent parser.
//!
//! Productions that share a prefix are tried one after another: the parser
//! saves the token position, attempts the first alternative and rewinds on a
//! syntax error. Only [`CompileError::Parse`] is recoverable this way; any
//! other error ends the statement.
//!
//! The most informative syntax error seen while speculating is kept in
//! `last_error`, scoped to the alternative that produced it, so that a
//! statement failing deep inside a parenthesized construct reports that
//! failure and not a generic error from a shallower alternative.

mod data_type;
mod error;
mod expression;
mod function;
mod pratt;
mod predicate;
mod query;
mod table;

use core::cmp::Ordering;

use tracing::trace;

pub use error::ParseError;

use crate::catalog::{Catalog, EmptyCatalog};
use crate::config::CompileOptions;
use crate::context::CompileContext;
use crate::error::{CompileError, ErrorCode, Result};
use crate::expression::Expression;
use crate::lexer::{Keyword, Token, TokenKind, TokenSource};
use crate::types::DataType;

/// Statement parser over a rewindable token source.
pub struct Parser<'c> {
    source: TokenSource,
    context: CompileContext,
    catalog: &'c dyn Catalog,
    options: &'c CompileOptions,
    last_error: Option<ParseError>,
    nesting: usize,
}

impl<'c> Parser<'c> {
    /// Creates a parser over `sql`.
    #[must_use]
    pub fn new(sql: &str, catalog: &'c dyn Catalog, options: &'c CompileOptions) -> Self {
        Self::from_source(TokenSource::new(sql), catalog, options)
    }

    /// Creates a parser over an already tokenized statement.
    #[must_use]
    pub fn from_source(
        source: TokenSource,
        catalog: &'c dyn Catalog,
        options: &'c CompileOptions,
    ) -> Self {
        Self {
            source,
            context: CompileContext::new(),
            catalog,
            options,
            last_error: None,
            nesting: 0,
        }
    }

    /// Parse-time state: parameters, referenced objects, WITH scopes.
    #[must_use]
    pub const fn context(&self) -> &CompileContext {
        &self.context
    }

    /// Consumes the parser and returns its context.
    #[must_use]
    pub fn into_context(self) -> CompileContext {
        self.context
    }

    /// Index of the current token.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.source.position()
    }

    // --- Complete statements ---

    /// Parses a complete query statement, optionally ended by `;`.
    ///
    /// # Errors
    ///
    /// Returns the most specific syntax error recorded, or the first
    /// non-syntactic error.
    pub fn parse_query(&mut self) -> Result<crate::query::QueryExpression> {
        let result = self.read_query_expression().and_then(|query| {
            self.finish_statement()?;
            Ok(query)
        });
        result.map_err(|error| self.most_specific(error))
    }

    /// Parses a complete boolean expression, as used by CHECK constraints.
    ///
    /// # Errors
    ///
    /// Same as [`Parser::parse_query`].
    pub fn parse_condition(&mut self) -> Result<Expression> {
        let result = self.read_boolean_expression().and_then(|condition| {
            self.finish_statement()?;
            Ok(condition)
        });
        result.map_err(|error| self.most_specific(error))
    }

    fn finish_statement(&mut self) -> Result<()> {
        self.consume(&TokenKind::Semicolon);
        if self.current().is_eof() {
            Ok(())
        } else {
            Err(self.unexpected("end of statement"))
        }
    }

    fn most_specific(&mut self, error: CompileError) -> CompileError {
        match (error, self.last_error.take()) {
            (CompileError::Parse(error), Some(recorded)) => {
                CompileError::Parse(more_specific(error, recorded))
            }
            (error, _) => error,
        }
    }

    // --- Token helpers ---

    fn current(&self) -> &Token {
        self.source.current()
    }

    fn peek(&self, n: usize) -> &Token {
        self.source.peek(n)
    }

    fn advance(&mut self) -> Token {
        self.source.advance()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        core::mem::discriminant(&self.current().kind) == core::mem::discriminant(kind)
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        self.current().is_keyword(keyword)
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<Token> {
        if self.check_keyword(keyword) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(keyword.as_str()))
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        match self.current().identifier() {
            Some(name) => {
                let name = name.to_owned();
                self.advance();
                Ok(name)
            }
            None => Err(self.unexpected("identifier")),
        }
    }

    /// A syntax error at the current token.
    fn unexpected(&self, expected: &str) -> CompileError {
        let token = self.current();
        let error = match &token.kind {
            TokenKind::Error(message) => ParseError::new(message.clone(), token.span, self.nesting),
            found => ParseError::unexpected(expected, found.clone(), token.span, self.nesting),
        };
        CompileError::Parse(error)
    }

    // --- Speculation ---

    /// Runs `f`; on a syntax error, records it, rewinds and returns `None`.
    fn attempt<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<Option<T>> {
        let position = self.source.position();
        let nesting = self.nesting;
        let depth = self.context.depth();
        let in_with = self.context.in_with();
        match f(self) {
            Ok(value) => Ok(Some(value)),
            Err(CompileError::Parse(error)) => {
                trace!(position, error = %error, "rewinding speculative parse");
                self.record(error);
                self.source.rewind(position);
                self.context.rewind(position);
                self.context.set_depth(depth);
                self.context.set_in_with(in_with);
                self.nesting = nesting;
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    /// Tries `first`, then `second` from the same position.
    ///
    /// Syntax errors recorded inside are dropped when either alternative
    /// succeeds. When both fail, the more specific of the final error and the
    /// errors recorded on the way is returned.
    fn either<T>(
        &mut self,
        first: impl FnOnce(&mut Self) -> Result<T>,
        second: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let outer = self.last_error.take();
        let result = match self.attempt(first) {
            Ok(Some(value)) => Ok(value),
            Ok(None) => {
                trace!(position = self.position(), "trying second alternative");
                second(self)
            }
            Err(error) => Err(error),
        };
        let inner = core::mem::replace(&mut self.last_error, outer);
        match (result, inner) {
            (Err(CompileError::Parse(error)), Some(recorded)) => {
                Err(CompileError::Parse(more_specific(error, recorded)))
            }
            (result, _) => result,
        }
    }

    fn record(&mut self, error: ParseError) {
        let keep = self
            .last_error
            .as_ref()
            .is_some_and(|recorded| recorded.specificity(&error) == Ordering::Greater);
        if !keep {
            self.last_error = Some(error);
        }
    }

    /// Runs `f` one nesting level deeper.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.nesting >= self.options.max_depth {
            return Err(CompileError::semantic(
                ErrorCode::TooComplex,
                format!(
                    "statement too complex: nesting exceeds {}",
                    self.options.max_depth
                ),
            ));
        }
        self.nesting += 1;
        let result = f(self);
        self.nesting -= 1;
        result
    }

    /// Runs `f` as a nested query block.
    fn query_block<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.nested(|p| {
            p.context.enter_block();
            let result = f(p);
            p.context.leave_block();
            result
        })
    }

    /// Parses a column name list `(a, b, ...)`.
    ///
    /// # Errors
    ///
    /// Returns a syntax error when the list is malformed.
    pub fn read_column_name_list(&mut self) -> Result<Vec<String>> {
        self.expect(&TokenKind::LeftParen)?;
        let mut names = vec![self.expect_identifier()?];
        while self.consume(&TokenKind::Comma) {
            names.push(self.expect_identifier()?);
        }
        self.expect(&TokenKind::RightParen)?;
        Ok(names)
    }
}

fn more_specific(error: ParseError, recorded: ParseError) -> ParseError {
    if recorded.specificity(&error) == Ordering::Greater {
        recorded
    } else {
        error
    }
}

/// Parses a type name such as `DECIMAL(10,2)` or `VARCHAR(20) ARRAY`.
///
/// # Errors
///
/// Returns a syntax error for unknown or malformed type names.
pub fn parse_type_definition(text: &str) -> Result<DataType> {
    let options = CompileOptions::default();
    let mut parser = Parser::new(text, &EmptyCatalog, &options);
    let data_type = parser.read_type_definition()?;
    if parser.current().is_eof() {
        Ok(data_type)
    } else {
        Err(parser.unexpected("end of type"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Span;

    fn parser<'a>(sql: &str, options: &'a CompileOptions) -> Parser<'a> {
        Parser::new(sql, &EmptyCatalog, options)
    }

    #[test]
    fn test_attempt_rewinds_on_syntax_error() {
        let options = CompileOptions::default();
        let mut p = parser("A B", &options);
        let result = p
            .attempt(|p| {
                p.advance();
                p.expect(&TokenKind::Comma)
            })
            .unwrap();
        assert!(result.is_none());
        assert_eq!(p.position(), 0);
        assert!(p.last_error.is_some());
    }

    #[test]
    fn test_attempt_keeps_fatal_errors() {
        let options = CompileOptions::default();
        let mut p = parser("A", &options);
        let result: Result<Option<()>> = p.attempt(|_| {
            Err(CompileError::semantic(ErrorCode::DuplicateLimit, "x"))
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_either_restores_outer_error() {
        let options = CompileOptions::default();
        let mut p = parser("A", &options);
        let outer = ParseError::new("outer", Span::new(0, 0), 0);
        p.last_error = Some(outer.clone());
        let value = p
            .either(
                |p| Err::<u8, _>(p.unexpected("never")),
                |_| Ok(7),
            )
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(p.last_error, Some(outer));
    }

    #[test]
    fn test_either_prefers_deeper_failure() {
        let options = CompileOptions::default();
        let mut p = parser("A", &options);
        let err = p
            .either(
                |_| {
                    Err::<(), _>(CompileError::Parse(ParseError::new(
                        "deep",
                        Span::new(0, 1),
                        3,
                    )))
                },
                |_| {
                    Err(CompileError::Parse(ParseError::new(
                        "shallow",
                        Span::new(0, 1),
                        0,
                    )))
                },
            )
            .unwrap_err();
        assert!(matches!(err, CompileError::Parse(e) if e.message == "deep"));
    }

    #[test]
    fn test_nesting_limit() {
        let options = CompileOptions {
            max_depth: 1,
            ..CompileOptions::default()
        };
        let mut p = parser("A", &options);
        let err = p.nested(|p| p.nested(|_| Ok(()))).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::TooComplex));
        assert_eq!(p.nesting, 0);
    }

    #[test]
    fn test_column_name_list() {
        let options = CompileOptions::default();
        let mut p = parser("(A, \"b\", FIRST)", &options);
        assert_eq!(
            p.read_column_name_list().unwrap(),
            vec!["A".to_string(), "b".to_string(), "FIRST".to_string()]
        );
    }

    #[test]
    fn test_parse_type_definition() {
        assert_eq!(
            parse_type_definition("decimal(10, 2)").unwrap(),
            DataType::Decimal {
                precision: 10,
                scale: 2
            }
        );
        assert!(parse_type_definition("INTEGER junk").is_err());
    }
}
