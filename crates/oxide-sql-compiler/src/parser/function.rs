//! Function invocations: aggregates, window functions, built-ins and
//! catalog routines.

use super::{ParseError, Parser};
use crate::error::{CompileError, ErrorCode, Result};
use crate::expression::{
    AggregateCall, AggregateFunction, ComparisonOp, ExprKind, Expression, FunctionCall,
    ObjectName, RoutineCall, ScalarFunction, WindowCall, WindowFunction,
};
use crate::lexer::{Keyword, TokenKind};

impl Parser<'_> {
    /// Parses the argument part of `name(...)`; the name is already consumed.
    pub(super) fn read_function_call(&mut self, parts: Vec<String>, quoted: bool) -> Result<Expression> {
        if parts.len() == 1 && !quoted {
            let name = parts[0].as_str();
            if let Some(function) = AggregateFunction::from_name(name) {
                return self.read_aggregate(function);
            }
            match name {
                "RANK" | "DENSE_RANK" | "ROW_NUMBER" => {
                    self.nested(|p| {
                        p.expect(&TokenKind::LeftParen)?;
                        p.expect(&TokenKind::RightParen).map(drop)
                    })?;
                    let function = match name {
                        "RANK" => WindowFunction::Rank,
                        "DENSE_RANK" => WindowFunction::DenseRank,
                        _ => WindowFunction::RowNumber,
                    };
                    return self.read_window(function);
                }
                "COALESCE" | "IFNULL" => return self.read_coalesce(name),
                "NULLIF" => {
                    let [left, right] = self.read_fixed_arguments::<2>(name)?;
                    let test = Expression::compare(ComparisonOp::Equal, left.duplicate(), right);
                    return Ok(Expression::case_when(test, Expression::null(), left));
                }
                "CASEWHEN" => {
                    let [condition, then, otherwise] = self.read_fixed_arguments::<3>(name)?;
                    return Ok(Expression::case_when(condition, then, otherwise));
                }
                "DECODE" => return self.read_decode(),
                "CONVERT" => return self.read_convert(),
                _ => {}
            }
            if let Some(function) = ScalarFunction::from_name(name) {
                return self.read_builtin(function);
            }
        }
        self.read_routine(parts)
    }

    fn read_aggregate(&mut self, function: AggregateFunction) -> Result<Expression> {
        let call = self.nested(|p| {
            p.expect(&TokenKind::LeftParen)?;
            if p.check(&TokenKind::Star) {
                if function != AggregateFunction::Count {
                    return Err(p.unexpected("expression"));
                }
                p.advance();
                p.expect(&TokenKind::RightParen)?;
                return Ok(AggregateCall {
                    function,
                    distinct: false,
                    argument: Box::new(Expression::new(ExprKind::Asterisk)),
                    order_by: Vec::new(),
                    separator: None,
                });
            }

            let quantified = p.check_keyword(Keyword::Distinct) || p.check_keyword(Keyword::All);
            if quantified && function.is_statistical() {
                return Err(CompileError::semantic(
                    ErrorCode::QuantifierNotAllowed,
                    format!("DISTINCT or ALL not allowed in {}", function.as_str()),
                ));
            }
            let distinct = p.consume_keyword(Keyword::Distinct);
            if !distinct {
                p.consume_keyword(Keyword::All);
            }

            let argument = p.read_boolean_expression()?;
            let mut order_by = Vec::new();
            let mut separator = None;
            if matches!(
                function,
                AggregateFunction::GroupConcat | AggregateFunction::ArrayAgg
            ) {
                if p.check_keyword(Keyword::Order) {
                    order_by = p.read_order_by()?;
                }
                if function == AggregateFunction::GroupConcat && p.consume_keyword(Keyword::Separator)
                {
                    let TokenKind::String(text) = p.current().kind.clone() else {
                        return Err(p.unexpected("string"));
                    };
                    p.advance();
                    separator = Some(text);
                }
            }
            p.expect(&TokenKind::RightParen)?;
            Ok(AggregateCall {
                function,
                distinct,
                argument: Box::new(argument),
                order_by,
                separator,
            })
        })?;

        if self.check_keyword(Keyword::Over) {
            if call.distinct {
                return Err(CompileError::semantic(
                    ErrorCode::QuantifierNotAllowed,
                    format!("DISTINCT not allowed in window function {}", call.function.as_str()),
                ));
            }
            return self.read_window(WindowFunction::Aggregate(call));
        }
        Ok(Expression::new(ExprKind::Aggregate(Box::new(call))))
    }

    /// `OVER ([PARTITION BY ...] [ORDER BY ...])`.
    fn read_window(&mut self, function: WindowFunction) -> Result<Expression> {
        self.expect_keyword(Keyword::Over)?;
        self.nested(|p| {
            p.expect(&TokenKind::LeftParen)?;
            let mut partition_by = Vec::new();
            if p.consume_keyword(Keyword::Partition) {
                p.expect_keyword(Keyword::By)?;
                partition_by.push(p.read_value_expression()?);
                while p.consume(&TokenKind::Comma) {
                    partition_by.push(p.read_value_expression()?);
                }
            }
            let order_by = if p.check_keyword(Keyword::Order) {
                p.read_order_by()?
            } else {
                Vec::new()
            };
            p.expect(&TokenKind::RightParen)?;
            Ok(Expression::new(ExprKind::Window(Box::new(WindowCall {
                function,
                partition_by,
                order_by,
            }))))
        })
    }

    /// `(arg, ...)`; an empty list is allowed.
    fn read_arguments(&mut self) -> Result<Vec<Expression>> {
        self.nested(|p| {
            p.expect(&TokenKind::LeftParen)?;
            if p.consume(&TokenKind::RightParen) {
                return Ok(Vec::new());
            }
            let arguments = p.read_expression_list()?;
            p.expect(&TokenKind::RightParen)?;
            Ok(arguments)
        })
    }

    fn read_fixed_arguments<const N: usize>(&mut self, name: &str) -> Result<[Expression; N]> {
        let arguments = self.read_arguments()?;
        let count = arguments.len();
        <[Expression; N]>::try_from(arguments).map_err(|_| self.argument_count(name, count))
    }

    /// A syntax error for a call with the wrong number of arguments.
    fn argument_count(&self, name: &str, count: usize) -> CompileError {
        let span = self.source.previous().map_or(self.current().span, |token| token.span);
        CompileError::Parse(ParseError::new(
            format!("wrong number of arguments for {name}: {count}"),
            span,
            self.nesting,
        ))
    }

    /// COALESCE(e1, ..., en) becomes
    /// `CASEWHEN(e1 IS NULL, CASEWHEN(e2 IS NULL, ..., e2), e1)`.
    fn read_coalesce(&mut self, name: &str) -> Result<Expression> {
        let mut arguments = self.read_arguments()?;
        let valid = if name == "IFNULL" {
            arguments.len() == 2
        } else {
            arguments.len() >= 2
        };
        if !valid {
            return Err(self.argument_count(name, arguments.len()));
        }
        let Some(mut result) = arguments.pop() else {
            return Err(self.argument_count(name, 0));
        };
        for argument in arguments.into_iter().rev() {
            let test = Expression::is_null(argument.duplicate());
            result = Expression::case_when(test, result, argument);
        }
        Ok(result)
    }

    /// DECODE(value, k1, v1, ..., [default]) compares with IS NOT DISTINCT
    /// FROM, so a NULL key matches a NULL value.
    fn read_decode(&mut self) -> Result<Expression> {
        let arguments = self.read_arguments()?;
        if arguments.len() < 3 {
            return Err(self.argument_count("DECODE", arguments.len()));
        }
        let mut arguments = arguments.into_iter();
        let Some(value) = arguments.next() else {
            return Err(self.argument_count("DECODE", 0));
        };
        let rest: Vec<Expression> = arguments.collect();
        let mut pairs = rest.chunks_exact(2);
        let mut result = match pairs.remainder() {
            [default] => default.duplicate(),
            _ => Expression::null(),
        };
        let pairs: Vec<&[Expression]> = pairs.by_ref().collect();
        for pair in pairs.into_iter().rev() {
            let test = Expression::not_distinct(value.duplicate(), pair[0].duplicate());
            result = Expression::case_when(test, pair[1].duplicate(), result);
        }
        Ok(result)
    }

    /// CONVERT(value, type) is a CAST.
    fn read_convert(&mut self) -> Result<Expression> {
        self.nested(|p| {
            p.expect(&TokenKind::LeftParen)?;
            let operand = p.read_boolean_expression()?;
            p.expect(&TokenKind::Comma)?;
            let target = p.read_type_definition()?;
            p.expect(&TokenKind::RightParen)?;
            Ok(Expression::new(ExprKind::Cast {
                operand: Box::new(operand),
                target,
            }))
        })
    }

    fn read_builtin(&mut self, function: ScalarFunction) -> Result<Expression> {
        let arguments = if function == ScalarFunction::Substring {
            self.read_substring_arguments()?
        } else {
            self.read_arguments()?
        };
        let (min, max) = function.arity();
        if arguments.len() < min || max.is_some_and(|max| arguments.len() > max) {
            return Err(self.argument_count(function.as_str(), arguments.len()));
        }
        Ok(Expression::new(ExprKind::Function(FunctionCall {
            function,
            arguments,
        })))
    }

    /// Accepts both `SUBSTRING(s, start [, length])` and
    /// `SUBSTRING(s FROM start [FOR length])`.
    fn read_substring_arguments(&mut self) -> Result<Vec<Expression>> {
        self.nested(|p| {
            p.expect(&TokenKind::LeftParen)?;
            let mut arguments = vec![p.read_value_expression()?];
            if p.consume_keyword(Keyword::From) {
                arguments.push(p.read_value_expression()?);
                if p.consume_keyword(Keyword::For) {
                    arguments.push(p.read_value_expression()?);
                }
            } else {
                while p.consume(&TokenKind::Comma) {
                    arguments.push(p.read_value_expression()?);
                }
            }
            p.expect(&TokenKind::RightParen)?;
            Ok(arguments)
        })
    }

    /// A catalog routine. Unknown names are recorded and a NULL placeholder
    /// stands in for the call.
    fn read_routine(&mut self, parts: Vec<String>) -> Result<Expression> {
        let position = self.position();
        let name = match parts.as_slice() {
            [name] => ObjectName::new(name.clone()),
            [schema, name] => ObjectName::qualified(schema.clone(), name.clone()),
            _ => return Err(self.unexpected("routine name")),
        };
        let arguments = self.read_arguments()?;

        let routine = self
            .catalog
            .routine(&name, &self.options.default_schema)
            .filter(|routine| routine.parameters.len() == arguments.len());
        let Some(routine) = routine else {
            self.context.add_unresolved(position, name.to_string());
            return Ok(Expression::null());
        };

        let qualified = ObjectName::qualified(routine.schema.clone(), routine.name.clone());
        let return_type = routine.returns.clone();
        let mut call = Expression::new(ExprKind::Routine(RoutineCall {
            name: qualified.clone(),
            arguments,
            parameter_types: routine.parameters.clone(),
            return_type: return_type.clone(),
        }));
        call.set_data_type(Some(return_type));
        self.context.add_routine(position, qualified);
        Ok(call)
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::{ColumnSchema, RoutineSchema, SchemaCatalog, TableSchema};
    use crate::config::CompileOptions;
    use crate::error::{CompileError, ErrorCode};
    use crate::expression::{ExprKind, Expression, OpType, WindowFunction};
    use crate::parser::Parser;
    use crate::types::DataType;

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::new()
            .with_table(TableSchema::new(
                "T",
                vec![
                    ColumnSchema::new("A", DataType::Integer),
                    ColumnSchema::new("B", DataType::Varchar(20)),
                ],
            ))
            .with_routine(RoutineSchema {
                schema: "PUBLIC".into(),
                name: "TWICE".into(),
                parameters: vec![DataType::Integer],
                returns: DataType::BigInt,
            })
    }

    fn parse(sql: &str) -> Result<Expression, CompileError> {
        let catalog = catalog();
        let options = CompileOptions::default();
        let mut parser = Parser::new(sql, &catalog, &options);
        parser.parse_condition()
    }

    fn expr(sql: &str) -> Expression {
        parse(sql).unwrap()
    }

    #[test]
    fn test_count_star() {
        assert_eq!(expr("COUNT(*)").to_string(), "COUNT(*)");
        assert!(parse("SUM(*)").is_err());
    }

    #[test]
    fn test_distinct_rejected_for_statistical_aggregates() {
        let err = parse("STDDEV_POP(DISTINCT A)").unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::QuantifierNotAllowed));
        assert!(expr("COUNT(DISTINCT A)").is_aggregate());
    }

    #[test]
    fn test_group_concat_options() {
        assert_eq!(
            expr("GROUP_CONCAT(B ORDER BY A DESC SEPARATOR ';')").to_string(),
            "GROUP_CONCAT(B ORDER BY A DESC SEPARATOR ';')"
        );
    }

    #[test]
    fn test_window_functions() {
        let rank = expr("RANK() OVER (PARTITION BY A ORDER BY B)");
        let ExprKind::Window(call) = rank.kind() else {
            panic!("expected window");
        };
        assert_eq!(call.function, WindowFunction::Rank);
        assert!(!rank.is_aggregate());

        let sum = expr("SUM(A) OVER ()");
        assert_eq!(sum.op_type(), OpType::Window);
        assert!(parse("RANK()").is_err());
    }

    #[test]
    fn test_coalesce_desugars_to_case_when() {
        assert_eq!(
            expr("COALESCE(A, 0)"),
            expr("CASE WHEN A IS NULL THEN 0 ELSE A END")
        );
        assert_eq!(
            expr("COALESCE(A, B, 0)").to_string(),
            "CASEWHEN((A IS NULL), CASEWHEN((B IS NULL), 0, B), A)"
        );
        assert!(parse("IFNULL(A)").is_err());
        assert!(parse("COALESCE(A)").is_err());
    }

    #[test]
    fn test_nullif_and_decode() {
        assert_eq!(
            expr("NULLIF(A, 1)").to_string(),
            "CASEWHEN((A = 1), NULL, A)"
        );
        assert_eq!(
            expr("DECODE(A, 1, 'one', 'other')").to_string(),
            "CASEWHEN((A IS NOT DISTINCT FROM 1), 'one', 'other')"
        );
    }

    #[test]
    fn test_convert_is_cast() {
        assert_eq!(expr("CONVERT(A, BIGINT)"), expr("CAST(A AS BIGINT)"));
    }

    #[test]
    fn test_builtin_arity() {
        assert_eq!(expr("ABS(A)").op_type(), OpType::Function);
        assert!(matches!(parse("ABS(A, 1)"), Err(CompileError::Parse(_))));
        assert_eq!(
            expr("SUBSTRING(B FROM 2 FOR 3)"),
            expr("SUBSTRING(B, 2, 3)")
        );
    }

    #[test]
    fn test_routine_lookup() {
        let call = expr("TWICE(A)");
        assert_eq!(call.data_type(), Some(&DataType::BigInt));
        assert_eq!(call.to_string(), "PUBLIC.TWICE(A)");

        let catalog = catalog();
        let options = CompileOptions::default();
        let mut parser = Parser::new("NOPE(A)", &catalog, &options);
        let placeholder = parser.parse_condition().unwrap();
        assert_eq!(placeholder, Expression::null());
        assert_eq!(
            parser.context().unresolved().cloned().collect::<Vec<_>>(),
            vec!["NOPE".to_string()]
        );
    }
}
