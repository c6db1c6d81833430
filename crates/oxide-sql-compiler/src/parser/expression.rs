//! Value expressions: the arithmetic cascade and its primaries.

use tracing::trace;

use super::pratt::{arithmetic_op, infix_binding_power, is_sign, PREFIX_BINDING_POWER};
use super::Parser;
use crate::error::Result;
use crate::expression::{
    ColumnName, ComparisonOp, ExprKind, Expression, FunctionCall, Literal, ObjectName,
    ScalarFunction, SubQuery, SubqueryKind,
};
use crate::lexer::{Keyword, Token, TokenKind};
use crate::types::DataType;

/// Returns true if `token` can open a query expression.
pub(super) fn starts_query(token: &Token) -> bool {
    matches!(
        token.as_keyword(),
        Some(Keyword::Select | Keyword::With | Keyword::Values | Keyword::Table)
    )
}

impl Parser<'_> {
    /// Parses a numeric, string or datetime value expression.
    ///
    /// # Errors
    ///
    /// Returns a syntax error when no value expression starts here.
    pub fn read_value_expression(&mut self) -> Result<Expression> {
        self.read_value_with(0)
    }

    /// Parses a value expression or a row value constructor.
    ///
    /// # Errors
    ///
    /// Returns a syntax error when neither starts here.
    pub fn read_row_expression(&mut self) -> Result<Expression> {
        self.read_value_expression()
    }

    fn read_value_with(&mut self, min_bp: u8) -> Result<Expression> {
        let mut lhs = self.read_factor()?;

        loop {
            let Some((l_bp, r_bp)) = infix_binding_power(&self.current().kind) else {
                break;
            };
            if l_bp < min_bp {
                break;
            }
            let operator = self.advance().kind;
            let rhs = self.read_value_with(r_bp)?;
            lhs = match arithmetic_op(&operator) {
                Some(op) => Expression::arithmetic(op, lhs, rhs),
                None => Expression::concat(lhs, rhs),
            };
        }

        Ok(lhs)
    }

    fn read_factor(&mut self) -> Result<Expression> {
        if !is_sign(&self.current().kind) {
            return self.read_primary();
        }
        let negative = self.advance().kind == TokenKind::Minus;
        if negative {
            if let Some(literal) = numeric_literal(&self.current().kind).and_then(|l| l.negated()) {
                self.advance();
                return Ok(Expression::value(literal));
            }
        }
        let operand = self.nested(|p| p.read_value_with(PREFIX_BINDING_POWER))?;
        Ok(if negative {
            Expression::negate(operand)
        } else {
            operand
        })
    }

    /// Parses a value expression primary.
    fn read_primary(&mut self) -> Result<Expression> {
        if let Some(literal) = numeric_literal(&self.current().kind) {
            self.advance();
            return Ok(Expression::value(literal));
        }
        match &self.current().kind {
            TokenKind::String(s) => {
                let literal = Literal::String(s.clone());
                self.advance();
                Ok(Expression::value(literal))
            }
            TokenKind::Binary(bytes) => {
                let literal = Literal::Binary(bytes.clone());
                self.advance();
                Ok(Expression::value(literal))
            }
            TokenKind::Question => Ok(self.read_parameter()),
            TokenKind::LeftParen => self.read_parenthesized(),
            TokenKind::Identifier(_) | TokenKind::QuotedIdentifier(_) => self.read_name_primary(),
            TokenKind::Keyword(keyword) => self.read_keyword_primary(*keyword),
            _ => Err(self.unexpected("expression")),
        }
    }

    pub(super) fn read_parameter(&mut self) -> Expression {
        let index = self.context.add_parameter(self.position());
        self.advance();
        Expression::parameter(index)
    }

    fn read_keyword_primary(&mut self, keyword: Keyword) -> Result<Expression> {
        match keyword {
            Keyword::Null => {
                self.advance();
                Ok(Expression::null())
            }
            Keyword::True | Keyword::False => {
                self.advance();
                Ok(Expression::boolean(keyword == Keyword::True))
            }
            Keyword::Unknown => {
                self.advance();
                let mut unknown = Expression::null();
                unknown.set_data_type(Some(DataType::Boolean));
                Ok(unknown)
            }
            Keyword::Case => self.read_case(),
            Keyword::Cast => self.read_cast(),
            Keyword::Row => {
                self.advance();
                let fields = self.nested(|p| {
                    p.expect(&TokenKind::LeftParen)?;
                    let fields = p.read_expression_list()?;
                    p.expect(&TokenKind::RightParen)?;
                    Ok(fields)
                })?;
                Ok(Expression::row(fields))
            }
            Keyword::Array => {
                self.advance();
                let elements = self.nested(|p| {
                    p.expect(&TokenKind::LeftBracket)?;
                    if p.consume(&TokenKind::RightBracket) {
                        return Ok(Vec::new());
                    }
                    let elements = p.read_expression_list()?;
                    p.expect(&TokenKind::RightBracket)?;
                    Ok(elements)
                })?;
                Ok(Expression::new(ExprKind::Array(elements)))
            }
            Keyword::Date | Keyword::Time | Keyword::Timestamp
                if matches!(self.peek(1).kind, TokenKind::String(_)) =>
            {
                self.advance();
                let TokenKind::String(text) = self.advance().kind else {
                    return Err(self.unexpected("string"));
                };
                let literal = match keyword {
                    Keyword::Date => Literal::Date(text),
                    Keyword::Time => Literal::Time(text),
                    _ => Literal::Timestamp(text),
                };
                Ok(Expression::value(literal))
            }
            Keyword::Next
                if self.peek(1).is_keyword(Keyword::Value) && self.peek(2).is_keyword(Keyword::For) =>
            {
                self.read_next_value()
            }
            Keyword::Some | Keyword::Any if self.peek(1).kind == TokenKind::LeftParen => {
                self.advance();
                self.read_function_call(vec![keyword.as_str().to_owned()], false)
            }
            _ if !keyword.is_reserved() => self.read_name_primary(),
            _ => Err(self.unexpected("expression")),
        }
    }

    /// Identifier chain: a column reference, a function call or a niladic
    /// function.
    fn read_name_primary(&mut self) -> Result<Expression> {
        let quoted = matches!(self.current().kind, TokenKind::QuotedIdentifier(_));
        let mut parts = vec![self.expect_identifier()?];
        while self.check(&TokenKind::Dot) && self.peek(1).identifier().is_some() {
            self.advance();
            parts.push(self.expect_identifier()?);
        }

        if self.check(&TokenKind::LeftParen) {
            return self.read_function_call(parts, quoted);
        }

        if parts.len() == 1 && !quoted {
            if let Some(function) = ScalarFunction::from_name(&parts[0]).filter(|f| f.is_niladic()) {
                return Ok(Expression::new(ExprKind::Function(FunctionCall {
                    function,
                    arguments: Vec::new(),
                })));
            }
        }

        let mut parts = parts.into_iter().rev();
        let column = parts.next().unwrap_or_default();
        let table = parts.next();
        let schema = parts.next();
        if parts.next().is_some() {
            return Err(self.unexpected("column reference"));
        }
        Ok(Expression::column(ColumnName {
            schema,
            table,
            column,
        }))
    }

    /// `( ... )`: a subquery, a parenthesized expression or a row.
    fn read_parenthesized(&mut self) -> Result<Expression> {
        if starts_query(self.peek(1)) {
            return self.read_subquery_expression(SubqueryKind::Scalar);
        }
        if self.peek(1).kind == TokenKind::LeftParen {
            trace!(position = self.position(), "ambiguous parenthesis");
            return self.either(
                |p| p.read_subquery_expression(SubqueryKind::Scalar),
                Self::read_parenthesized_list,
            );
        }
        self.read_parenthesized_list()
    }

    fn read_parenthesized_list(&mut self) -> Result<Expression> {
        self.nested(|p| {
            p.expect(&TokenKind::LeftParen)?;
            let mut items = p.read_expression_list()?;
            p.expect(&TokenKind::RightParen)?;
            Ok(if items.len() == 1 {
                items.remove(0)
            } else {
                Expression::row(items)
            })
        })
    }

    /// Comma separated boolean-capable expressions.
    pub(super) fn read_expression_list(&mut self) -> Result<Vec<Expression>> {
        let mut items = vec![self.read_boolean_expression()?];
        while self.consume(&TokenKind::Comma) {
            items.push(self.read_boolean_expression()?);
        }
        Ok(items)
    }

    /// `( query )` as a nested block.
    pub(super) fn read_subquery(&mut self) -> Result<SubQuery> {
        self.expect(&TokenKind::LeftParen)?;
        let (query, depth) = self.query_block(|p| {
            let depth = p.context.depth();
            Ok((p.read_query_expression()?, depth))
        })?;
        self.expect(&TokenKind::RightParen)?;
        Ok(SubQuery::new(query, depth))
    }

    /// A subquery used as a value. A scalar subquery of more than one
    /// column is a row subquery.
    pub(super) fn read_subquery_expression(&mut self, kind: SubqueryKind) -> Result<Expression> {
        let query = self.read_subquery()?;
        let kind = match kind {
            SubqueryKind::Scalar if query.query.degree() > 1 => SubqueryKind::Row,
            other => other,
        };
        Ok(Expression::new(ExprKind::Subquery { kind, query }))
    }

    fn read_case(&mut self) -> Result<Expression> {
        self.expect_keyword(Keyword::Case)?;
        self.nested(|p| {
            let operand = if p.check_keyword(Keyword::When) {
                None
            } else {
                Some(p.read_row_expression()?)
            };

            let mut branches = Vec::new();
            while p.consume_keyword(Keyword::When) {
                let condition = match &operand {
                    Some(operand) => {
                        let mut condition = None;
                        loop {
                            let value = p.read_row_expression()?;
                            let test =
                                Expression::compare(ComparisonOp::Equal, operand.duplicate(), value);
                            condition = Some(match condition {
                                Some(previous) => Expression::or(previous, test),
                                None => test,
                            });
                            if !p.consume(&TokenKind::Comma) {
                                break;
                            }
                        }
                        condition.ok_or_else(|| p.unexpected("WHEN operand"))?
                    }
                    None => p.read_boolean_expression()?,
                };
                p.expect_keyword(Keyword::Then)?;
                let result = p.read_boolean_expression()?;
                branches.push((condition, result));
            }
            if branches.is_empty() {
                return Err(p.unexpected("WHEN"));
            }

            let mut otherwise = if p.consume_keyword(Keyword::Else) {
                p.read_boolean_expression()?
            } else {
                Expression::null()
            };
            p.expect_keyword(Keyword::End)?;

            for (condition, result) in branches.into_iter().rev() {
                otherwise = Expression::case_when(condition, result, otherwise);
            }
            Ok(otherwise)
        })
    }

    fn read_cast(&mut self) -> Result<Expression> {
        self.expect_keyword(Keyword::Cast)?;
        self.nested(|p| {
            p.expect(&TokenKind::LeftParen)?;
            let operand = p.read_boolean_expression()?;
            p.expect_keyword(Keyword::As)?;
            let target = p.read_type_definition()?;
            p.expect(&TokenKind::RightParen)?;
            Ok(Expression::new(ExprKind::Cast {
                operand: Box::new(operand),
                target,
            }))
        })
    }

    fn read_next_value(&mut self) -> Result<Expression> {
        let position = self.position();
        self.advance();
        self.advance();
        self.expect_keyword(Keyword::For)?;
        let name = self.read_object_name()?;

        let found = self
            .catalog
            .sequence(&name, &self.options.default_schema)
            .map(|sequence| {
                (
                    ObjectName::qualified(sequence.schema.clone(), sequence.name.clone()),
                    sequence.data_type.clone(),
                )
            });
        match found {
            Some((qualified, data_type)) => {
                self.context.add_sequence(position, qualified.clone());
                let mut expr = Expression::new(ExprKind::Sequence(qualified));
                expr.set_data_type(Some(data_type));
                Ok(expr)
            }
            None => {
                self.context.add_unresolved(position, name.to_string());
                Ok(Expression::new(ExprKind::Sequence(name)))
            }
        }
    }

    /// `[schema.]name`.
    pub(super) fn read_object_name(&mut self) -> Result<ObjectName> {
        let first = self.expect_identifier()?;
        if self.check(&TokenKind::Dot) && self.peek(1).identifier().is_some() {
            self.advance();
            let name = self.expect_identifier()?;
            return Ok(ObjectName::qualified(first, name));
        }
        Ok(ObjectName::new(first))
    }
}

/// The literal for a numeric token.
fn numeric_literal(kind: &TokenKind) -> Option<Literal> {
    match kind {
        TokenKind::Integer(n) => Some(Literal::Integer(*n)),
        TokenKind::Decimal(text) => Some(Literal::Decimal(text.clone())),
        TokenKind::Double(v) => Some(Literal::Double(*v)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::{ColumnSchema, EmptyCatalog, SchemaCatalog, SequenceSchema, TableSchema};
    use crate::config::CompileOptions;
    use crate::expression::{ExprKind, Literal, OpType, SubqueryKind};
    use crate::parser::Parser;
    use crate::types::DataType;

    fn value(sql: &str) -> crate::expression::Expression {
        let catalog = SchemaCatalog::new().with_table(TableSchema::new(
            "T",
            vec![ColumnSchema::new("A", DataType::Integer)],
        ));
        let options = CompileOptions::default();
        let mut parser = Parser::new(sql, &catalog, &options);
        let expr = parser.read_value_expression().unwrap();
        assert!(parser.current().is_eof(), "trailing input in {sql}");
        expr
    }

    #[test]
    fn test_precedence() {
        assert_eq!(value("1 + 2 * 3").to_string(), "(1 + (2 * 3))");
        assert_eq!(value("1 - 2 - 3").to_string(), "((1 - 2) - 3)");
        assert_eq!(value("'a' || 'b' || 'c'").to_string(), "(('a' || 'b') || 'c')");
    }

    #[test]
    fn test_minus_folds_into_literal() {
        assert_eq!(value("-5").as_literal(), Some(&Literal::Integer(-5)));
        assert_eq!(value("-1.50").as_literal(), Some(&Literal::Decimal("-1.50".into())));
        assert_eq!(value("-A").op_type(), OpType::Negate);
        assert_eq!(value("-(5)").op_type(), OpType::Negate);
    }

    #[test]
    fn test_column_qualifiers() {
        let expr = value("S.T.C");
        let column = expr.as_column().unwrap();
        assert_eq!(column.name.schema.as_deref(), Some("S"));
        assert_eq!(column.name.table.as_deref(), Some("T"));
        assert_eq!(column.name.column, "C");
    }

    #[test]
    fn test_parameters_are_numbered() {
        let expr = value("? + ?");
        let ExprKind::Arithmetic { left, right, .. } = expr.kind() else {
            panic!("expected arithmetic");
        };
        assert_eq!(left.kind(), &ExprKind::Parameter(0));
        assert_eq!(right.kind(), &ExprKind::Parameter(1));
    }

    #[test]
    fn test_simple_case_builds_case_when_chain() {
        let expr = value("CASE A WHEN 1 THEN 'x' WHEN 2 THEN 'y' END");
        assert_eq!(
            expr.to_string(),
            "CASEWHEN((A = 1), 'x', CASEWHEN((A = 2), 'y', NULL))"
        );
    }

    #[test]
    fn test_parenthesized_subquery() {
        let expr = value("(SELECT 1 FROM T)");
        assert_eq!(expr.op_type(), OpType::ScalarSubquery);
        let row = value("(SELECT 1, 2 FROM T)");
        assert!(matches!(
            row.kind(),
            ExprKind::Subquery {
                kind: SubqueryKind::Row,
                ..
            }
        ));
    }

    #[test]
    fn test_double_parenthesis_backtracks() {
        assert_eq!(value("((1 + 2))").to_string(), "(1 + 2)");
        assert_eq!(value("((SELECT 1 FROM T) + 1)").op_type(), OpType::Add);
        assert_eq!(value("((1, 2))").op_type(), OpType::Row);
    }

    #[test]
    fn test_typed_literals_and_cast() {
        assert_eq!(
            value("DATE '2024-01-31'").as_literal(),
            Some(&Literal::Date("2024-01-31".into()))
        );
        let cast = value("CAST(A AS VARCHAR(10))");
        assert_eq!(cast.data_type(), Some(&DataType::Varchar(10)));
    }

    #[test]
    fn test_niladic_function() {
        assert_eq!(value("CURRENT_DATE").op_type(), OpType::Function);
    }

    #[test]
    fn test_sequence_lookup() {
        let catalog = SchemaCatalog::new().with_sequence(SequenceSchema {
            schema: "PUBLIC".into(),
            name: "SEQ".into(),
            data_type: DataType::Integer,
        });
        let options = CompileOptions::default();
        let mut parser = Parser::new("NEXT VALUE FOR SEQ", &catalog, &options);
        let expr = parser.read_value_expression().unwrap();
        assert_eq!(expr.data_type(), Some(&DataType::Integer));
        assert_eq!(expr.to_string(), "NEXT VALUE FOR PUBLIC.SEQ");
        assert_eq!(parser.context().objects().count(), 1);

        let mut parser = Parser::new("NEXT VALUE FOR NOPE", &EmptyCatalog, &options);
        parser.read_value_expression().unwrap();
        assert_eq!(parser.context().unresolved().count(), 1);
    }
}
