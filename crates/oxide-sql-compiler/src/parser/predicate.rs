//! Boolean expressions and predicates.
//!
//! BETWEEN, IN and the IS TRUE/FALSE forms are desugared here; see the
//! individual readers for the exact rewrites.

use super::expression::starts_query;
use super::pratt::comparison_op;
use super::Parser;
use crate::error::Result;
use crate::expression::{
    ComparisonOp, ExprKind, Expression, MatchKind, Quantifier, SubqueryKind,
};
use crate::lexer::{Keyword, TokenKind};

impl Parser<'_> {
    /// Parses a boolean value expression (OR level).
    ///
    /// # Errors
    ///
    /// Returns a syntax error when no expression starts here.
    pub fn read_boolean_expression(&mut self) -> Result<Expression> {
        let mut left = self.read_boolean_term()?;
        while self.consume_keyword(Keyword::Or) {
            let right = self.read_boolean_term()?;
            left = Expression::or(left, right);
        }
        Ok(left)
    }

    fn read_boolean_term(&mut self) -> Result<Expression> {
        let mut left = self.read_boolean_factor()?;
        while self.consume_keyword(Keyword::And) {
            let right = self.read_boolean_factor()?;
            left = Expression::and(left, right);
        }
        Ok(left)
    }

    fn read_boolean_factor(&mut self) -> Result<Expression> {
        if self.consume_keyword(Keyword::Not) {
            let operand = self.nested(Self::read_boolean_factor)?;
            return Ok(Expression::not(operand));
        }
        self.read_predicate()
    }

    fn read_predicate(&mut self) -> Result<Expression> {
        if self.check_keyword(Keyword::Exists) || self.check_keyword(Keyword::Unique) {
            let exists = self.advance().is_keyword(Keyword::Exists);
            let query = self.nested(Self::read_subquery)?;
            return Ok(Expression::new(if exists {
                ExprKind::Exists(query)
            } else {
                ExprKind::Unique(query)
            }));
        }

        let left = self.read_row_expression()?;

        if let Some(op) = comparison_op(&self.current().kind) {
            self.advance();
            return self.read_comparison(op, left);
        }

        let negated = self.check_keyword(Keyword::Not)
            && matches!(
                self.peek(1).as_keyword(),
                Some(Keyword::Between | Keyword::In | Keyword::Like)
            );
        if negated {
            self.advance();
        }

        let predicate = match self.current().as_keyword() {
            Some(Keyword::Is) => return self.read_is(left),
            Some(Keyword::Between) => self.read_between(left)?,
            Some(Keyword::In) => self.read_in(left)?,
            Some(Keyword::Like) => self.read_like(left)?,
            Some(Keyword::Starts) => {
                self.advance();
                self.expect_keyword(Keyword::With)?;
                let prefix = self.read_value_expression()?;
                return Ok(Expression::new(ExprKind::StartsWith {
                    value: Box::new(left),
                    prefix: Box::new(prefix),
                }));
            }
            Some(Keyword::Match) => return self.read_match(left),
            Some(Keyword::Overlaps) => {
                self.advance();
                let right = self.read_row_expression()?;
                return Ok(Expression::new(ExprKind::Overlaps {
                    left: Box::new(left),
                    right: Box::new(right),
                }));
            }
            _ => return Ok(left),
        };

        Ok(if negated {
            Expression::not(predicate)
        } else {
            predicate
        })
    }

    /// Right-hand side of `left <op>`, quantified or not.
    fn read_comparison(&mut self, op: ComparisonOp, left: Expression) -> Result<Expression> {
        let quantifier = match self.current().as_keyword() {
            Some(Keyword::Any | Keyword::Some) => Some(Quantifier::Any),
            Some(Keyword::All) => Some(Quantifier::All),
            _ => None,
        };
        let Some(quantifier) = quantifier else {
            let right = self.read_row_expression()?;
            return Ok(Expression::compare(op, left, right));
        };
        self.advance();
        let right = self.read_quantified_operand()?;
        Ok(Expression::compare_quantified(op, quantifier, left, right))
    }

    /// `(query)` or `(value, ...)` after ANY/ALL/IN.
    fn read_quantified_operand(&mut self) -> Result<Expression> {
        if !self.check(&TokenKind::LeftParen) {
            return Err(self.unexpected("("));
        }
        if starts_query(self.peek(1)) {
            return self.read_subquery_expression(SubqueryKind::Table);
        }
        if self.peek(1).kind == TokenKind::LeftParen {
            return self.either(
                |p| p.read_subquery_expression(SubqueryKind::Table),
                Self::read_value_list,
            );
        }
        self.read_value_list()
    }

    fn read_value_list(&mut self) -> Result<Expression> {
        self.nested(|p| {
            p.expect(&TokenKind::LeftParen)?;
            let values = p.read_expression_list()?;
            p.expect(&TokenKind::RightParen)?;
            Ok(Expression::value_list(values))
        })
    }

    /// `IS [NOT] NULL | UNKNOWN | TRUE | FALSE | DISTINCT FROM x`.
    fn read_is(&mut self, left: Expression) -> Result<Expression> {
        self.expect_keyword(Keyword::Is)?;
        let not = self.consume_keyword(Keyword::Not);
        let positive = match self.current().as_keyword() {
            Some(Keyword::Null | Keyword::Unknown) => {
                self.advance();
                Expression::is_null(left)
            }
            Some(keyword @ (Keyword::True | Keyword::False)) => {
                self.advance();
                Expression::not_distinct(left, Expression::boolean(keyword == Keyword::True))
            }
            Some(Keyword::Distinct) => {
                self.advance();
                self.expect_keyword(Keyword::From)?;
                let right = self.read_row_expression()?;
                // IS DISTINCT FROM is the negation of IS NOT DISTINCT FROM.
                let not_distinct = Expression::not_distinct(left, right);
                return Ok(if not {
                    not_distinct
                } else {
                    Expression::not(not_distinct)
                });
            }
            _ => return Err(self.unexpected("NULL, UNKNOWN, TRUE, FALSE or DISTINCT")),
        };
        Ok(if not {
            Expression::not(positive)
        } else {
            positive
        })
    }

    /// `BETWEEN [ASYMMETRIC|SYMMETRIC] low AND high`, rewritten as range
    /// comparisons.
    fn read_between(&mut self, value: Expression) -> Result<Expression> {
        self.expect_keyword(Keyword::Between)?;
        let symmetric = if self.consume_keyword(Keyword::Symmetric) {
            true
        } else {
            self.consume_keyword(Keyword::Asymmetric);
            false
        };
        let low = self.read_row_expression()?;
        self.expect_keyword(Keyword::And)?;
        let high = self.read_row_expression()?;

        let ascending = Expression::and(
            Expression::compare(ComparisonOp::GreaterOrEqual, value.duplicate(), low.duplicate()),
            Expression::compare(ComparisonOp::LessOrEqual, value.duplicate(), high.duplicate()),
        );
        if !symmetric {
            return Ok(ascending);
        }
        let descending = Expression::and(
            Expression::compare(ComparisonOp::LessOrEqual, value.duplicate(), low),
            Expression::compare(ComparisonOp::GreaterOrEqual, value, high),
        );
        Ok(Expression::or(ascending, descending))
    }

    /// `IN ?`, `IN (query)` or `IN (list)`.
    ///
    /// Outside constraint predicates every form becomes `= ANY`.
    fn read_in(&mut self, value: Expression) -> Result<Expression> {
        self.expect_keyword(Keyword::In)?;
        if self.check(&TokenKind::Question) {
            let parameter = self.read_parameter();
            return Ok(Expression::compare_quantified(
                ComparisonOp::Equal,
                Quantifier::Any,
                value,
                parameter,
            ));
        }
        let right = match self.read_quantified_operand()?.into_kind() {
            ExprKind::ValueList(list) if self.options.constraint_context => {
                return Ok(Expression::new(ExprKind::In {
                    value: Box::new(value),
                    list,
                }));
            }
            kind => Expression::new(kind),
        };
        Ok(Expression::compare_quantified(
            ComparisonOp::Equal,
            Quantifier::Any,
            value,
            right,
        ))
    }

    fn read_like(&mut self, value: Expression) -> Result<Expression> {
        self.expect_keyword(Keyword::Like)?;
        let pattern = self.read_value_expression()?;
        let escape = if self.consume_keyword(Keyword::Escape) {
            Some(Box::new(self.read_value_expression()?))
        } else {
            None
        };
        Ok(Expression::new(ExprKind::Like {
            value: Box::new(value),
            pattern: Box::new(pattern),
            escape,
        }))
    }

    /// `MATCH [UNIQUE] [SIMPLE|PARTIAL|FULL] (query)`.
    fn read_match(&mut self, value: Expression) -> Result<Expression> {
        self.expect_keyword(Keyword::Match)?;
        let unique = self.consume_keyword(Keyword::Unique);
        let kind = match self.current().as_keyword() {
            Some(Keyword::Partial) => Some(MatchKind::Partial),
            Some(Keyword::Full) => Some(MatchKind::Full),
            Some(Keyword::Simple) => Some(MatchKind::Simple),
            _ => None,
        };
        if kind.is_some() {
            self.advance();
        }
        let kind = kind.unwrap_or(MatchKind::Simple);
        let query = self.nested(Self::read_subquery)?;
        Ok(Expression::new(ExprKind::Match {
            kind,
            unique,
            value: Box::new(value),
            query,
        }))
    }
}
